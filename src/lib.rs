//! Two-player naval combat matches over a strict session protocol.
//!
//! Peers register with a [`Matchmaker`], which pairs them and runs a
//! [`MatchCoordinator`] per match. Clients drive their half of the protocol
//! through a [`GameSession`], which refuses calls made out of order.

pub mod config;
pub mod coordinator;
pub mod demo;
pub mod error;
mod logging;
pub mod matchmaker;
pub mod protocol;
pub mod round;
pub mod server;
pub mod session;
pub mod transport;

pub use config::*;
pub use coordinator::{MatchCoordinator, MatchOutcome};
pub use error::{ErrorKind, SessionError};
pub use logging::init_logging;
pub use matchmaker::{ClientHandle, Match, MatchHandle, Matchmaker};
pub use protocol::*;
pub use server::{serve, serve_listener, Server};
pub use session::{Exchange, GameSession, IllegalTransition, Operation, SessionState};
pub use transport::{in_memory::InMemoryTransport, tcp::TcpTransport, Transport};
