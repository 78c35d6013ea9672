//! Pairing of registering peers into matches.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{oneshot, watch, Mutex};

use crate::config::MatchConfig;
use crate::coordinator::{MatchCoordinator, MatchOutcome};
use crate::error::{ErrorKind, SessionError};
use crate::transport::Transport;

/// A registered peer: the name it chose and its channel.
pub struct ClientHandle<T> {
    pub identifier: String,
    pub channel: T,
}

impl<T> ClientHandle<T> {
    pub fn new(identifier: impl Into<String>, channel: T) -> Self {
        Self {
            identifier: identifier.into(),
            channel,
        }
    }
}

/// Exactly two peers in arrival order, plus who shoots first.
pub struct Match<T> {
    id: u64,
    pub(crate) peers: [ClientHandle<T>; 2],
    pub(crate) a_shoots_first: bool,
}

impl<T> Match<T> {
    pub fn new(id: u64, a: ClientHandle<T>, b: ClientHandle<T>, a_shoots_first: bool) -> Self {
        Self {
            id,
            peers: [a, b],
            a_shoots_first,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identifiers in arrival order.
    pub fn identifiers(&self) -> [&str; 2] {
        [&self.peers[0].identifier, &self.peers[1].identifier]
    }

    /// Identifiers with the first shooter first.
    pub fn turn_order(&self) -> [String; 2] {
        let [a, b] = self.identifiers();
        if self.a_shoots_first {
            [a.to_string(), b.to_string()]
        } else {
            [b.to_string(), a.to_string()]
        }
    }
}

/// What each of the two registrants gets back once paired.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    id: u64,
    turn_order: [String; 2],
    outcome: watch::Receiver<Option<MatchOutcome>>,
}

impl MatchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identifier of the peer that shoots first.
    pub fn first_shooter(&self) -> &str {
        &self.turn_order[0]
    }

    /// Both identifiers, first shooter first.
    pub fn players(&self) -> &[String; 2] {
        &self.turn_order
    }

    /// Wait until the coordinator of this match terminates.
    pub async fn finished(mut self) -> MatchOutcome {
        let outcome = match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(vanished)
    }
}

fn vanished() -> MatchOutcome {
    MatchOutcome::Failed {
        kind: ErrorKind::Disconnected,
        message: "match task ended without an outcome".to_string(),
    }
}

struct Pending<T> {
    client: ClientHandle<T>,
    paired: oneshot::Sender<MatchHandle>,
}

struct Lobby<T> {
    pending: Option<Pending<T>>,
    rng: SmallRng,
}

/// Holds at most one waiting peer. The next registration is paired with it
/// and the resulting match runs on its own task.
pub struct Matchmaker<T> {
    lobby: Mutex<Lobby<T>>,
    next_id: AtomicU64,
    config: MatchConfig,
}

impl<T: Transport + 'static> Matchmaker<T> {
    pub fn new(config: MatchConfig) -> Self {
        Self::with_rng(config, SmallRng::from_rng(&mut rand::rng()))
    }

    /// Reproducible turn order, for tests and simulations.
    pub fn with_seed(config: MatchConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: MatchConfig, rng: SmallRng) -> Self {
        Self {
            lobby: Mutex::new(Lobby { pending: None, rng }),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a peer. The first caller waits (without limit) for a partner;
    /// the second one forms the match and both get the same [`MatchHandle`].
    /// A waiter whose call was dropped before pairing is discarded.
    pub async fn register(
        &self,
        identifier: impl Into<String>,
        channel: T,
    ) -> Result<MatchHandle, SessionError> {
        let client = ClientHandle::new(identifier, channel);
        let waiting = {
            let mut lobby = self.lobby.lock().await;
            // a waiter whose register call was cancelled cannot be paired
            let pending = lobby.pending.take().filter(|pending| {
                let abandoned = pending.paired.is_closed();
                if abandoned {
                    debug!("{} stopped waiting, dropping it", pending.client.identifier);
                }
                !abandoned
            });
            match pending {
                Some(pending) => {
                    let a_shoots_first = lobby.rng.random_bool(0.5);
                    let handle = self.start_match(pending.client, client, a_shoots_first);
                    if pending.paired.send(handle.clone()).is_err() {
                        warn!("match {}: waiting peer stopped listening before pairing", handle.id());
                    }
                    return Ok(handle);
                }
                None => {
                    debug!("{} is waiting for an opponent", client.identifier);
                    let (paired, waiting) = oneshot::channel();
                    lobby.pending = Some(Pending { client, paired });
                    waiting
                }
            }
        };
        waiting
            .await
            .map_err(|_| SessionError::Disconnected("matchmaker shut down before pairing".to_string()))
    }

    /// Whether a peer is currently waiting for an opponent and still listening.
    pub async fn has_pending(&self) -> bool {
        self.lobby
            .lock()
            .await
            .pending
            .as_ref()
            .is_some_and(|pending| !pending.paired.is_closed())
    }

    fn start_match(&self, a: ClientHandle<T>, b: ClientHandle<T>, a_shoots_first: bool) -> MatchHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let game = Match::new(id, a, b, a_shoots_first);
        let turn_order = game.turn_order();
        info!("match {}: paired {} (first) with {}", id, turn_order[0], turn_order[1]);

        let (report, outcome) = watch::channel(None);
        let coordinator = MatchCoordinator::new(game, self.config.clone());
        tokio::spawn(async move {
            let result = coordinator.run().await;
            report.send_replace(Some(result));
        });

        MatchHandle {
            id,
            turn_order,
            outcome,
        }
    }
}
