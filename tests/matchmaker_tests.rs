use std::collections::HashSet;
use std::sync::Arc;

use battleship_mp::transport::in_memory::InMemoryTransport;
use battleship_mp::transport::Transport;
use battleship_mp::{ErrorKind, MatchConfig, MatchOutcome, Matchmaker, Message};
use tokio::time::{sleep, Duration};

type Lobby = Arc<Matchmaker<InMemoryTransport>>;

async fn wait_until_pending(matchmaker: &Lobby) {
    while !matchmaker.has_pending().await {
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_registrations_form_one_match() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::new(MatchConfig::default()));
    let (server_a, mut client_a) = InMemoryTransport::pair();
    let (server_b, mut client_b) = InMemoryTransport::pair();

    let (handle_a, handle_b) = tokio::try_join!(
        matchmaker.register("Alice", server_a),
        matchmaker.register("Bob", server_b)
    )?;
    assert_eq!(handle_a.id(), handle_b.id());
    assert_eq!(handle_a.players(), handle_b.players());
    let players: HashSet<&str> = handle_a.players().iter().map(String::as_str).collect();
    assert_eq!(players, HashSet::from(["Alice", "Bob"]));
    assert!(!matchmaker.has_pending().await);

    // the welcome agrees with the handle on who shoots first
    let alice_first = handle_a.first_shooter() == "Alice";
    assert_eq!(
        client_a.recv().await?,
        Message::Welcome {
            identifier: "Bob".into(),
            first: alice_first
        }
    );
    assert_eq!(
        client_b.recv().await?,
        Message::Welcome {
            identifier: "Alice".into(),
            first: !alice_first
        }
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_registrant_waits_for_a_partner() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::with_seed(MatchConfig::default(), 3));
    let (server_a, _client_a) = InMemoryTransport::pair();
    let (server_b, _client_b) = InMemoryTransport::pair();

    let lobby = matchmaker.clone();
    let waiting = tokio::spawn(async move { lobby.register("Alice", server_a).await });
    wait_until_pending(&matchmaker).await;
    assert!(!waiting.is_finished());

    let handle_b = matchmaker.register("Bob", server_b).await?;
    let handle_a = waiting.await??;
    assert_eq!(handle_a.id(), handle_b.id());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_third_registrant_stays_pending() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::with_seed(MatchConfig::default(), 11));
    let mut clients = Vec::new();
    let mut servers = Vec::new();
    for _ in 0..4 {
        let (server, client) = InMemoryTransport::pair();
        servers.push(server);
        clients.push(client);
    }
    let mut servers = servers.into_iter();

    let (first, second) = tokio::try_join!(
        matchmaker.register("a", servers.next().unwrap()),
        matchmaker.register("b", servers.next().unwrap())
    )?;
    assert_eq!(first.id(), second.id());

    let lobby = matchmaker.clone();
    let third_channel = servers.next().unwrap();
    let third = tokio::spawn(async move { lobby.register("c", third_channel).await });
    wait_until_pending(&matchmaker).await;
    sleep(Duration::from_millis(50)).await;
    assert!(!third.is_finished());

    let fourth = matchmaker.register("d", servers.next().unwrap()).await?;
    let third = third.await??;
    assert_eq!(third.id(), fourth.id());
    assert_ne!(third.id(), first.id());
    let players: HashSet<&str> = third.players().iter().map(String::as_str).collect();
    assert_eq!(players, HashSet::from(["c", "d"]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_shooter_is_a_fair_coin() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::new(MatchConfig::default()));
    let trials = 400;
    let mut alice_first = 0;
    for _ in 0..trials {
        let (server_a, _client_a) = InMemoryTransport::pair();
        let (server_b, _client_b) = InMemoryTransport::pair();
        let (handle, _) = tokio::try_join!(
            matchmaker.register("Alice", server_a),
            matchmaker.register("Bob", server_b)
        )?;
        if handle.first_shooter() == "Alice" {
            alice_first += 1;
        }
    }
    // 400 fair flips land in 140..260 with overwhelming probability
    assert!((140..260).contains(&alice_first), "Alice went first {} times", alice_first);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handle_reports_the_outcome() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::with_seed(MatchConfig::default(), 5));
    let (server_a, mut client_a) = InMemoryTransport::pair();
    let (server_b, client_b) = InMemoryTransport::pair();

    let (handle_a, handle_b) = tokio::try_join!(
        matchmaker.register("Alice", server_a),
        matchmaker.register("Bob", server_b)
    )?;
    client_a.recv().await?;
    drop(client_b);

    let outcome = handle_a.finished().await;
    assert!(matches!(
        outcome,
        MatchOutcome::Failed {
            kind: ErrorKind::Disconnected,
            ..
        }
    ));
    assert_eq!(handle_b.finished().await, outcome);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abandoned_waiter_is_not_paired() -> anyhow::Result<()> {
    let matchmaker: Lobby = Arc::new(Matchmaker::with_seed(MatchConfig::default(), 8));
    let (server_a, _client_a) = InMemoryTransport::pair();
    let (server_b, _client_b) = InMemoryTransport::pair();
    let (server_c, _client_c) = InMemoryTransport::pair();

    let lobby = matchmaker.clone();
    let gone = tokio::spawn(async move { lobby.register("Alice", server_a).await });
    wait_until_pending(&matchmaker).await;
    gone.abort();
    assert!(gone.await.unwrap_err().is_cancelled());
    assert!(!matchmaker.has_pending().await);

    // Bob must wait for a live partner instead of pairing with Alice
    let lobby = matchmaker.clone();
    let waiting = tokio::spawn(async move { lobby.register("Bob", server_b).await });
    wait_until_pending(&matchmaker).await;
    sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    let handle_c = matchmaker.register("Carol", server_c).await?;
    let handle_b = waiting.await??;
    assert_eq!(handle_b.id(), handle_c.id());
    let players: HashSet<&str> = handle_b.players().iter().map(String::as_str).collect();
    assert_eq!(players, HashSet::from(["Bob", "Carol"]));
    Ok(())
}
