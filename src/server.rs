//! Front door of the match server: handshake, version check, matchmaking.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::TcpListener;

use crate::config::{MatchConfig, ServerConfig};
use crate::coordinator::MatchOutcome;
use crate::error::SessionError;
use crate::matchmaker::Matchmaker;
use crate::protocol::{Message, PROTOCOL_VERSION};
use crate::transport::{tcp::TcpTransport, Transport};

/// Accepts peers on any kind of channel and hands them to one matchmaker.
pub struct Server<T> {
    matchmaker: Arc<Matchmaker<T>>,
}

impl<T> Clone for Server<T> {
    fn clone(&self) -> Self {
        Self {
            matchmaker: Arc::clone(&self.matchmaker),
        }
    }
}

impl<T: Transport + 'static> Server<T> {
    pub fn new(config: MatchConfig) -> Self {
        Self::with_matchmaker(Matchmaker::new(config))
    }

    pub fn with_matchmaker(matchmaker: Matchmaker<T>) -> Self {
        Self {
            matchmaker: Arc::new(matchmaker),
        }
    }

    pub fn matchmaker(&self) -> &Matchmaker<T> {
        &self.matchmaker
    }

    /// Serve one freshly connected peer until its match is over.
    ///
    /// Reads the handshake request, rejects other protocol versions, then
    /// waits in the lobby for an opponent.
    pub async fn handle_connection(&self, mut channel: T) -> Result<MatchOutcome, SessionError> {
        let (identifier, version) = match channel.recv().await.map_err(SessionError::Channel)? {
            Message::Handshake {
                identifier,
                version,
            } => (identifier, version),
            Message::Error(payload) => return Err(SessionError::from_remote(payload)),
            other => {
                let err = SessionError::Protocol(format!(
                    "expected Handshake, got {}",
                    other.name()
                ));
                reject(&mut channel, &err).await;
                return Err(err);
            }
        };

        if version != PROTOCOL_VERSION {
            let err = SessionError::Protocol(format!(
                "{} speaks protocol {}, server speaks {}",
                identifier, version, PROTOCOL_VERSION
            ));
            reject(&mut channel, &err).await;
            return Err(err);
        }

        debug!("{} registered", identifier);
        let handle = self.matchmaker.register(identifier, channel).await?;
        Ok(handle.finished().await)
    }
}

async fn reject<T: Transport>(channel: &mut T, err: &SessionError) {
    warn!("rejecting peer: {}", err);
    if let Err(e) = channel.send(Message::Error(err.to_payload())).await {
        debug!("could not deliver rejection: {}", e);
    }
}

/// Accept TCP peers forever, one task per connection.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind).await?;
    info!("listening on {}", listener.local_addr()?);
    serve_listener(listener, config).await
}

/// Like [`serve`], on an already bound listener.
pub async fn serve_listener(listener: TcpListener, config: ServerConfig) -> anyhow::Result<()> {
    let server: Server<TcpTransport> = Server::new(config.matches.clone());
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("connection from {}", addr);
        let transport = TcpTransport::with_config(stream, config.io_timeout, config.max_message_size);
        let server = server.clone();
        tokio::spawn(async move {
            match server.handle_connection(transport).await {
                Ok(outcome) => debug!("{} done: {:?}", addr, outcome),
                Err(e) => error!("{}: {}", addr, e),
            }
        });
    }
}
