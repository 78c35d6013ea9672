use std::time::Duration;

/// Address the server binds to when none is given.
pub const DEFAULT_BIND: &str = "0.0.0.0:8765";

/// Address clients connect to when none is given.
pub const DEFAULT_SERVER: &str = "127.0.0.1:8765";

/// Largest frame the TCP transport accepts (10 MB).
pub const MAX_MESSAGE_SIZE: u32 = 10_000_000;

/// Environment variable read by [`crate::init_logging`].
pub const LOG_ENV: &str = "BATTLESHIP_MP_LOG";

/// Settings applied to every match a [`crate::Matchmaker`] starts.
#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    /// Longest the coordinator waits for a peer's message in any phase.
    /// `None` waits forever.
    pub round_timeout: Option<Duration>,
}

/// Settings of the TCP front door.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Per-operation timeout of each client's TCP transport. Must be `None`
    /// or generous: it also bounds how long a lone client waits for a partner.
    pub io_timeout: Option<Duration>,
    pub max_message_size: u32,
    pub matches: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            io_timeout: None,
            max_message_size: MAX_MESSAGE_SIZE,
            matches: MatchConfig::default(),
        }
    }
}
