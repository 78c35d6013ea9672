//! Server side of a match.
//!
//! A [`MatchCoordinator`] owns both peers' channels for the whole life of a
//! match and walks them through handshake, placement and the turn loop.
//! Every read is a round: both peers' messages are awaited together, the
//! round is resolved by the pure functions in [`crate::round`], and only then
//! are replies sent. The next round starts once both replies went out.

use std::ops::ControlFlow;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::{timeout, Duration};

use crate::config::MatchConfig;
use crate::error::{ErrorKind, SessionError};
use crate::matchmaker::{ClientHandle, Match};
use crate::protocol::{check_placement_shape, EndClaim, ErrorPayload, Message, TurnAction};
use crate::round::{arbitrate, resolve_round, ShotBuffer};
use crate::transport::Transport;

/// How a match ended, as published to both registrants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MatchOutcome {
    Finished { winner: Option<String> },
    Failed { kind: ErrorKind, message: String },
}

impl MatchOutcome {
    pub fn winner(&self) -> Option<&str> {
        match self {
            MatchOutcome::Finished { winner } => winner.as_deref(),
            MatchOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MatchOutcome::Failed { .. })
    }
}

/// One peer's message for the current round.
#[derive(Debug)]
enum PeerInput {
    /// Kept as received so it can be forwarded untouched.
    Placement(Message),
    Turn(TurnAction),
    End(EndClaim),
}

impl PeerInput {
    fn name(&self) -> &'static str {
        match self {
            PeerInput::Placement(_) => "Placement",
            PeerInput::Turn(TurnAction::AnnounceShot(_)) => "AnnounceShot",
            PeerInput::Turn(TurnAction::ExpectShot) => "ExpectShot",
            PeerInput::End(_) => "EndClaim",
        }
    }
}

pub struct MatchCoordinator<T: Transport> {
    game: Match<T>,
    config: MatchConfig,
}

impl<T: Transport> MatchCoordinator<T> {
    pub fn new(game: Match<T>, config: MatchConfig) -> Self {
        Self { game, config }
    }

    /// Drive the match to its end. Failures are reported to both peers and
    /// returned as [`MatchOutcome::Failed`]; the channels are dropped on return.
    pub async fn run(mut self) -> MatchOutcome {
        let id = self.game.id();
        let [a, b] = self.game.identifiers();
        info!("match {}: {} vs {} started", id, a, b);

        match self.drive().await {
            Ok(winner) => {
                info!("match {}: finished, winner {:?}", id, winner);
                MatchOutcome::Finished { winner }
            }
            Err(err) => {
                warn!("match {}: aborted: {}", id, err);
                self.abort(&err).await;
                MatchOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    async fn drive(&mut self) -> Result<Option<String>, SessionError> {
        self.handshake().await?;
        if let ControlFlow::Break(winner) = self.placement().await? {
            return Ok(winner);
        }
        self.turns().await
    }

    async fn handshake(&mut self) -> Result<(), SessionError> {
        let a_first = self.game.a_shoots_first;
        let [a, b] = &self.game.peers;
        let to_a = Message::Welcome {
            identifier: b.identifier.clone(),
            first: a_first,
        };
        let to_b = Message::Welcome {
            identifier: a.identifier.clone(),
            first: !a_first,
        };
        self.send_pair(to_a, to_b).await
    }

    async fn placement(&mut self) -> Result<ControlFlow<Option<String>>, SessionError> {
        let inputs = self.read_round().await?;
        if let Some(winner) = self.try_end(&inputs).await? {
            return Ok(ControlFlow::Break(winner));
        }

        let [from_a, from_b] = inputs;
        let fleet_a = self.expect_placement(0, from_a)?;
        let fleet_b = self.expect_placement(1, from_b)?;
        debug!("match {}: exchanging fleets", self.game.id());
        self.send_pair(fleet_b, fleet_a).await?;
        Ok(ControlFlow::Continue(()))
    }

    async fn turns(&mut self) -> Result<Option<String>, SessionError> {
        let mut buffer: Option<ShotBuffer> = None;
        let mut round = 0u64;
        loop {
            round += 1;
            let inputs = self.read_round().await?;
            if let Some(winner) = self.try_end(&inputs).await? {
                return Ok(winner);
            }

            let [from_a, from_b] = inputs;
            let action_a = self.expect_turn(0, from_a)?;
            let action_b = self.expect_turn(1, from_b)?;
            let resolution = resolve_round(action_a, action_b, buffer)?;
            debug!(
                "match {} round {}: {:?} / {:?} -> {:?} / {:?}",
                self.game.id(),
                round,
                action_a,
                action_b,
                resolution.to_a,
                resolution.to_b
            );
            self.send_pair(resolution.to_a.into(), resolution.to_b.into())
                .await?;
            buffer = resolution.buffer;
        }
    }

    /// If any peer sent an end claim, arbitrate and broadcast the winner.
    async fn try_end(&mut self, inputs: &[PeerInput; 2]) -> Result<Option<Option<String>>, SessionError> {
        let claim = |input: &PeerInput| match input {
            PeerInput::End(claim) => Some(claim.clone()),
            _ => None,
        };
        let claims = [claim(&inputs[0]), claim(&inputs[1])];
        if claims.iter().all(Option::is_none) {
            return Ok(None);
        }

        let winner = {
            let [a, b] = self.game.identifiers();
            arbitrate([a, b], [claims[0].as_ref(), claims[1].as_ref()])
        };
        debug!(
            "match {}: end claims {:?} / {:?} -> {:?}",
            self.game.id(),
            claims[0],
            claims[1],
            winner
        );
        let outcome = Message::Outcome {
            winner: winner.clone(),
        };
        self.send_pair(outcome.clone(), outcome).await?;
        Ok(Some(winner))
    }

    fn expect_placement(&self, slot: usize, input: PeerInput) -> Result<Message, SessionError> {
        match input {
            PeerInput::Placement(msg) => Ok(msg),
            other => Err(SessionError::Protocol(format!(
                "{} sent {} during placement",
                self.game.peers[slot].identifier,
                other.name()
            ))),
        }
    }

    fn expect_turn(&self, slot: usize, input: PeerInput) -> Result<TurnAction, SessionError> {
        match input {
            PeerInput::Turn(action) => Ok(action),
            other => Err(SessionError::Protocol(format!(
                "{} sent {} during the turn loop",
                self.game.peers[slot].identifier,
                other.name()
            ))),
        }
    }

    /// Read one message from each peer. Nothing is sent before both arrived;
    /// a failing peer, a remote `Error` or a malformed message ends the wait
    /// for the other one immediately.
    async fn read_round(&mut self) -> Result<[PeerInput; 2], SessionError> {
        let limit = self.config.round_timeout;
        let [a, b] = &mut self.game.peers;
        let (input_a, input_b) = tokio::try_join!(read_input(a, limit), read_input(b, limit))?;
        Ok([input_a, input_b])
    }

    async fn send_pair(&mut self, to_a: Message, to_b: Message) -> Result<(), SessionError> {
        let [a, b] = &mut self.game.peers;
        tokio::try_join!(send_to(a, to_a), send_to(b, to_b))?;
        Ok(())
    }

    /// Tell both peers the match is over. A peer whose channel is already
    /// gone cannot be told; that is only logged.
    async fn abort(&mut self, err: &SessionError) {
        let payload = err.to_payload();
        let [a, b] = &mut self.game.peers;
        let (res_a, res_b) = tokio::join!(
            send_to(a, Message::Error(payload.clone())),
            send_to(b, Message::Error(payload))
        );
        for res in [res_a, res_b] {
            if let Err(e) = res {
                debug!("match {}: could not deliver failure: {}", self.game.id(), e);
            }
        }
    }
}

async fn recv_from<T: Transport>(
    peer: &mut ClientHandle<T>,
    limit: Option<Duration>,
) -> Result<Message, SessionError> {
    let received = match limit {
        Some(limit) => timeout(limit, peer.channel.recv()).await.map_err(|_| {
            SessionError::Timeout(format!("{} sent nothing for {:?}", peer.identifier, limit))
        })?,
        None => peer.channel.recv().await,
    };
    received.map_err(|e| SessionError::Disconnected(format!("{} disconnected: {}", peer.identifier, e)))
}

async fn read_input<T: Transport>(
    peer: &mut ClientHandle<T>,
    limit: Option<Duration>,
) -> Result<PeerInput, SessionError> {
    let msg = recv_from(peer, limit).await?;
    classify(peer, msg)
}

async fn send_to<T: Transport>(peer: &mut ClientHandle<T>, msg: Message) -> Result<(), SessionError> {
    peer.channel
        .send(msg)
        .await
        .map_err(|e| SessionError::Disconnected(format!("{} disconnected: {}", peer.identifier, e)))
}

fn classify<T>(peer: &ClientHandle<T>, msg: Message) -> Result<PeerInput, SessionError> {
    if let Message::Placement {
        sizes,
        coords,
        vertical,
    } = &msg
    {
        check_placement_shape(sizes, coords, vertical).map_err(|e| {
            SessionError::Protocol(format!("{} sent a malformed placement: {}", peer.identifier, e))
        })?;
        return Ok(PeerInput::Placement(msg));
    }

    match msg {
        Message::AnnounceShot { coord } => Ok(PeerInput::Turn(TurnAction::AnnounceShot(coord))),
        Message::ExpectShot => Ok(PeerInput::Turn(TurnAction::ExpectShot)),
        Message::EndClaim { winner, forfeit } => Ok(PeerInput::End(EndClaim { winner, forfeit })),
        Message::Error(ErrorPayload { kind, message }) => Err(SessionError::from_remote(ErrorPayload {
            kind,
            message: format!("{} gave up: {}", peer.identifier, message),
        })),
        other => Err(SessionError::Protocol(format!(
            "{} sent unexpected {}",
            peer.identifier,
            other.name()
        ))),
    }
}
