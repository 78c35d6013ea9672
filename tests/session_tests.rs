use battleship_mp::transport::in_memory::InMemoryTransport;
use battleship_mp::transport::Transport;
use battleship_mp::{
    Coord, ErrorKind, ErrorPayload, Exchange, GameSession, Message, Orientation, SessionError,
    SessionState, ShipPlacement, PROTOCOL_VERSION,
};

/// Open a session against a scripted server end that already answered the
/// handshake.
async fn open(name: &str) -> anyhow::Result<(GameSession<InMemoryTransport>, InMemoryTransport)> {
    let (mut server, client) = InMemoryTransport::pair();
    server
        .send(Message::Welcome {
            identifier: "Bob".into(),
            first: true,
        })
        .await?;
    let session = GameSession::start(Some(name), client).await?;
    assert_eq!(
        server.recv().await?,
        Message::Handshake {
            identifier: name.into(),
            version: PROTOCOL_VERSION.into(),
        }
    );
    Ok((session, server))
}

fn small_fleet() -> Vec<ShipPlacement> {
    vec![
        ShipPlacement::new(3, (0, 0), Orientation::Horizontal),
        ShipPlacement::new(1, (2, 2), Orientation::Vertical),
    ]
}

async fn placed(name: &str) -> anyhow::Result<(GameSession<InMemoryTransport>, InMemoryTransport)> {
    let (mut session, mut server) = open(name).await?;
    server.send(Message::from_fleet(&small_fleet())).await?;
    session.place_ships(&small_fleet()).await?;
    server.recv().await?;
    Ok((session, server))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_learns_opponent_and_order() -> anyhow::Result<()> {
    let (session, _server) = open("Alice").await?;
    assert_eq!(session.name(), "Alice");
    assert_eq!(session.opponent(), "Bob");
    assert!(session.first());
    assert_eq!(session.state(), SessionState::Created);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_anonymous_player_gets_a_name() -> anyhow::Result<()> {
    let (mut server, client) = InMemoryTransport::pair();
    server
        .send(Message::Welcome {
            identifier: "Bob".into(),
            first: false,
        })
        .await?;
    let session = GameSession::start(None, client).await?;
    assert!(session.name().starts_with("Anonymous "));
    match server.recv().await? {
        Message::Handshake { identifier, .. } => assert_eq!(identifier, session.name()),
        other => panic!("expected handshake, got {:?}", other),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_placement_returns_the_opponent_fleet() -> anyhow::Result<()> {
    let (mut session, mut server) = open("Alice").await?;
    let theirs = vec![ShipPlacement::new(2, (1, 1), Orientation::Vertical)];
    server.send(Message::from_fleet(&theirs)).await?;

    let got = session.place_ships(&small_fleet()).await?;
    assert_eq!(got, Exchange::Continue(theirs));
    assert_eq!(server.recv().await?, Message::from_fleet(&small_fleet()));
    assert_eq!(session.state(), SessionState::ShipsPlaced);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shots_before_placement_fail_the_session() -> anyhow::Result<()> {
    for announce in [true, false] {
        let (mut session, mut server) = open("Alice").await?;
        let err = if announce {
            session.announce_shot(Coord::new(0, 0)).await.unwrap_err()
        } else {
            session.expect_shot().await.unwrap_err()
        };
        assert!(matches!(err, SessionError::IllegalTransition(_)), "{:?}", err);
        assert_eq!(err.kind(), ErrorKind::Game);
        assert_eq!(session.state(), SessionState::Failed);

        // the server hears about it so it can end the match
        match server.recv().await? {
            Message::Error(ErrorPayload { kind, message }) => {
                assert_eq!(kind, ErrorKind::Game);
                assert!(message.starts_with("Alice - "), "{}", message);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ships_cannot_be_placed_twice() -> anyhow::Result<()> {
    let (mut session, _server) = placed("Alice").await?;
    let err = session.place_ships(&small_fleet()).await.unwrap_err();
    assert!(matches!(err, SessionError::IllegalTransition(_)));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_game_is_allowed_from_every_live_state() -> anyhow::Result<()> {
    for shots_fired in [None, Some(0), Some(2)] {
        let (mut session, mut server) = match shots_fired {
            None => open("Alice").await?,
            Some(_) => placed("Alice").await?,
        };
        for _ in 0..shots_fired.unwrap_or(0) {
            server.send(Message::Ack).await?;
            session.announce_shot(Coord::new(1, 1)).await?;
            server.recv().await?;
        }

        server
            .send(Message::Outcome {
                winner: Some("Alice".into()),
            })
            .await?;
        let winner = session.end_game(Some("Alice"), false).await?;
        assert_eq!(winner.as_deref(), Some("Alice"));
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(
            server.recv().await?,
            Message::EndClaim {
                winner: Some("Alice".into()),
                forfeit: false
            }
        );
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_forfeit_names_the_opponent() -> anyhow::Result<()> {
    let (mut session, mut server) = placed("Alice").await?;
    server
        .send(Message::Outcome {
            winner: Some("Bob".into()),
        })
        .await?;
    assert_eq!(session.end_game(Some("Alice"), true).await?.as_deref(), Some("Bob"));
    assert_eq!(
        server.recv().await?,
        Message::EndClaim {
            winner: Some("Bob".into()),
            forfeit: true
        }
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nothing_is_allowed_after_the_end() -> anyhow::Result<()> {
    let (mut session, mut server) = open("Alice").await?;
    server.send(Message::Outcome { winner: None }).await?;
    session.end_game(None, false).await?;

    assert!(session.end_game(None, false).await.is_err());
    assert!(session.expect_shot().await.is_err());
    assert!(session.place_ships(&small_fleet()).await.is_err());
    assert!(session.state().is_over());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nothing_is_allowed_after_a_failure() -> anyhow::Result<()> {
    let (mut session, mut server) = placed("Alice").await?;
    server
        .send(Message::Error(ErrorPayload {
            kind: ErrorKind::Deadlock,
            message: "both peers expect a shot".into(),
        }))
        .await?;
    let err = session.expect_shot().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deadlock);
    assert_eq!(session.state(), SessionState::Failed);

    let err = session.end_game(None, true).await.unwrap_err();
    assert!(matches!(err, SessionError::IllegalTransition(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_opponent_may_end_the_game_mid_round() -> anyhow::Result<()> {
    let (mut session, mut server) = placed("Alice").await?;
    server
        .send(Message::Outcome {
            winner: Some("Bob".into()),
        })
        .await?;
    let got = session.announce_shot(Coord::new(0, 2)).await?;
    assert_eq!(got, Exchange::Ended(Some("Bob".into())));
    assert_eq!(session.state(), SessionState::Ended);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unexpected_reply_fails_the_session() -> anyhow::Result<()> {
    let (mut session, mut server) = placed("Alice").await?;
    server.send(Message::Ack).await?;
    let err = session.expect_shot().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lost_server_fails_the_session() -> anyhow::Result<()> {
    let (mut session, server) = placed("Alice").await?;
    drop(server);
    assert!(session.announce_shot(Coord::new(0, 0)).await.is_err());
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}
