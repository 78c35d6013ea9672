//! Client side of a match.
//!
//! [`GameSession`] wraps a channel to the server and only lets calls through
//! in the order the coordinator expects them:
//!
//! ```text
//! start -> place_ships -> (announce_shot | expect_shot)* -> end_game
//! ```
//!
//! `end_game` may be called at any point before the session is over. A call
//! out of order fails the session and tells the server, so both players
//! abandon the match together.

use rand::seq::IndexedRandom;

use crate::error::{ErrorKind, SessionError};
use crate::protocol::{
    fleet_from_parts, Coord, EndClaim, ErrorPayload, Message, ShipPlacement, TurnAction,
    PROTOCOL_VERSION,
};
use crate::transport::Transport;

/// Names picked for players who do not choose one.
pub const DEFAULT_NAMES: [&str; 9] = [
    "Dog",
    "Cat",
    "Fox",
    "Quokka",
    "Red Panda",
    "Pika",
    "Capybara",
    "Rabbit",
    "Axolotl",
];

/// Where a session is in the protocol. States only move forward; `Failed`
/// and `Ended` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    ShipsPlaced,
    Firing,
    Ended,
    Failed,
}

/// The guarded session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    PlaceShips,
    AnnounceShot,
    ExpectShot,
    EndGame,
}

impl Operation {
    /// States the operation may start from.
    pub fn allowed_from(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Operation::PlaceShips => &[Created],
            Operation::AnnounceShot | Operation::ExpectShot => &[ShipsPlaced, Firing],
            Operation::EndGame => &[Created, ShipsPlaced, Firing],
        }
    }

    /// State the session is in once the operation was accepted.
    pub fn target(self) -> SessionState {
        match self {
            Operation::PlaceShips => SessionState::ShipsPlaced,
            Operation::AnnounceShot | Operation::ExpectShot => SessionState::Firing,
            Operation::EndGame => SessionState::Ended,
        }
    }
}

/// An operation was attempted from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation:?} is not allowed in state {from:?} (allowed from {allowed:?})")]
pub struct IllegalTransition {
    pub operation: Operation,
    pub from: SessionState,
    pub allowed: &'static [SessionState],
}

impl SessionState {
    /// Look up the transition table.
    pub fn advance(self, operation: Operation) -> Result<SessionState, IllegalTransition> {
        let allowed = operation.allowed_from();
        if allowed.contains(&self) {
            Ok(operation.target())
        } else {
            Err(IllegalTransition {
                operation,
                from: self,
                allowed,
            })
        }
    }

    pub fn is_over(self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Failed)
    }
}

/// Result of an exchange that the opponent may cut short by ending the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange<T> {
    Continue(T),
    /// The game was ended in this round; carries the arbitrated winner.
    Ended(Option<String>),
}

impl<T> Exchange<T> {
    pub fn is_ended(&self) -> bool {
        matches!(self, Exchange::Ended(_))
    }
}

/// Handle to an open game at the server.
pub struct GameSession<T: Transport> {
    name: String,
    opponent: String,
    first: bool,
    state: SessionState,
    transport: T,
}

impl<T: Transport> GameSession<T> {
    /// Introduce ourselves to the server and wait to be paired.
    ///
    /// Without a name the player is called "Anonymous" plus a random animal.
    pub async fn start(name: Option<&str>, mut transport: T) -> Result<Self, SessionError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => anonymous_name(),
        };
        transport
            .send(Message::Handshake {
                identifier: name.clone(),
                version: PROTOCOL_VERSION.to_string(),
            })
            .await
            .map_err(SessionError::Channel)?;
        match transport.recv().await.map_err(SessionError::Channel)? {
            Message::Welcome { identifier, first } => Ok(Self {
                name,
                opponent: identifier,
                first,
                state: SessionState::Created,
                transport,
            }),
            Message::Error(payload) => Err(SessionError::from_remote(payload)),
            other => Err(SessionError::Protocol(format!(
                "expected Welcome, got {}",
                other.name()
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier the opponent registered with.
    pub fn opponent(&self) -> &str {
        &self.opponent
    }

    /// Whether this player shoots first.
    pub fn first(&self) -> bool {
        self.first
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Exchange our fleet for the opponent's.
    pub async fn place_ships(
        &mut self,
        ships: &[ShipPlacement],
    ) -> Result<Exchange<Vec<ShipPlacement>>, SessionError> {
        self.enter(Operation::PlaceShips).await?;
        let reply = self.communicate(Message::from_fleet(ships)).await?;
        let result = match reply {
            Message::Placement {
                sizes,
                coords,
                vertical,
            } => fleet_from_parts(sizes, coords, vertical).map(Exchange::Continue),
            other => self.ended_or_unexpected(other, "Placement"),
        };
        self.settle(result)
    }

    /// Tell the opponent where we fired.
    pub async fn announce_shot(&mut self, coord: Coord) -> Result<Exchange<()>, SessionError> {
        self.enter(Operation::AnnounceShot).await?;
        let reply = self.communicate(TurnAction::AnnounceShot(coord).into()).await?;
        let result = match reply {
            Message::Ack => Ok(Exchange::Continue(())),
            other => self.ended_or_unexpected(other, "Ack"),
        };
        self.settle(result)
    }

    /// Wait for the opponent's shot and return where it landed.
    pub async fn expect_shot(&mut self) -> Result<Exchange<Coord>, SessionError> {
        self.enter(Operation::ExpectShot).await?;
        let reply = self.communicate(TurnAction::ExpectShot.into()).await?;
        let result = match reply {
            Message::Shot { coord } => Ok(Exchange::Continue(coord)),
            other => self.ended_or_unexpected(other, "Shot"),
        };
        self.settle(result)
    }

    /// End the game, naming a `winner` or forfeiting. A forfeit claims the
    /// opponent as winner. Returns the winner the server settled on.
    pub async fn end_game(
        &mut self,
        winner: Option<&str>,
        forfeit: bool,
    ) -> Result<Option<String>, SessionError> {
        self.enter(Operation::EndGame).await?;
        let winner = if forfeit {
            Some(self.opponent.clone())
        } else {
            winner.map(str::to_string)
        };
        let reply = self
            .communicate(EndClaim { winner, forfeit }.into())
            .await?;
        let result = match reply {
            Message::Outcome { winner } => Ok(winner),
            other => Err(unexpected(other, "Outcome")),
        };
        self.settle(result)
    }

    /// Check the transition table; on refusal fail the session and tell
    /// the server before reporting the error locally.
    async fn enter(&mut self, operation: Operation) -> Result<(), SessionError> {
        match self.state.advance(operation) {
            Ok(next) => {
                self.state = next;
                Ok(())
            }
            Err(illegal) => {
                self.state = SessionState::Failed;
                let notice = Message::Error(ErrorPayload {
                    kind: ErrorKind::Game,
                    message: format!("{} - {}", self.name, illegal),
                });
                if let Err(e) = self.transport.send(notice).await {
                    log::debug!("could not report failure to server: {}", e);
                }
                Err(illegal.into())
            }
        }
    }

    async fn communicate(&mut self, msg: Message) -> Result<Message, SessionError> {
        let exchange = async {
            self.transport.send(msg).await?;
            self.transport.recv().await
        };
        match exchange.await {
            Ok(Message::Error(payload)) => {
                self.state = SessionState::Failed;
                Err(SessionError::from_remote(payload))
            }
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(SessionError::Channel(e))
            }
        }
    }

    fn ended_or_unexpected<R>(
        &mut self,
        reply: Message,
        expected: &str,
    ) -> Result<Exchange<R>, SessionError> {
        match reply {
            Message::Outcome { winner } => {
                self.state = SessionState::Ended;
                Ok(Exchange::Ended(winner))
            }
            other => Err(unexpected(other, expected)),
        }
    }

    fn settle<R>(&mut self, result: Result<R, SessionError>) -> Result<R, SessionError> {
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }
}

fn unexpected(reply: Message, expected: &str) -> SessionError {
    SessionError::Protocol(format!("expected {}, got {}", expected, reply.name()))
}

fn anonymous_name() -> String {
    let animal = DEFAULT_NAMES.choose(&mut rand::rng()).copied().unwrap_or("Dog");
    format!("Anonymous {}", animal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    const ALL_STATES: [SessionState; 5] = [Created, ShipsPlaced, Firing, Ended, Failed];
    const ALL_OPS: [Operation; 4] = [
        Operation::PlaceShips,
        Operation::AnnounceShot,
        Operation::ExpectShot,
        Operation::EndGame,
    ];

    #[test]
    fn happy_path_transitions() {
        let state = Created.advance(Operation::PlaceShips).unwrap();
        assert_eq!(state, ShipsPlaced);
        let state = state.advance(Operation::AnnounceShot).unwrap();
        assert_eq!(state, Firing);
        let state = state.advance(Operation::ExpectShot).unwrap();
        assert_eq!(state, Firing);
        assert_eq!(state.advance(Operation::EndGame).unwrap(), Ended);
    }

    #[test]
    fn shots_before_placement_are_illegal() {
        for op in [Operation::AnnounceShot, Operation::ExpectShot] {
            let err = Created.advance(op).unwrap_err();
            assert_eq!(err.from, Created);
            assert_eq!(err.operation, op);
        }
    }

    #[test]
    fn ships_are_placed_once() {
        assert!(ShipsPlaced.advance(Operation::PlaceShips).is_err());
        assert!(Firing.advance(Operation::PlaceShips).is_err());
    }

    #[test]
    fn end_game_is_legal_until_the_session_is_over() {
        for state in [Created, ShipsPlaced, Firing] {
            assert_eq!(state.advance(Operation::EndGame).unwrap(), Ended);
        }
    }

    #[test]
    fn final_states_refuse_everything() {
        for state in ALL_STATES.iter().copied().filter(|s| s.is_over()) {
            for op in ALL_OPS {
                assert!(state.advance(op).is_err(), "{:?} accepted {:?}", state, op);
            }
        }
    }

    #[test]
    fn transitions_never_go_back() {
        let rank = |s: SessionState| ALL_STATES.iter().position(|x| *x == s).unwrap();
        for state in ALL_STATES {
            for op in ALL_OPS {
                if let Ok(next) = state.advance(op) {
                    assert!(rank(next) >= rank(state));
                }
            }
        }
    }

    #[test]
    fn anonymous_names_come_from_the_list() {
        let name = anonymous_name();
        let animal = name.strip_prefix("Anonymous ").unwrap();
        assert!(DEFAULT_NAMES.contains(&animal));
    }
}
