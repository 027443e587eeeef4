/// Default path of the display daemon's request socket
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/regmsgd.sock";

/// Default time to wait for the daemon's reply in milliseconds
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;

/// Default maximum number of connection attempts
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Default delay between connection attempts in milliseconds
pub const DEFAULT_CONNECT_DELAY_MS: u64 = 250;

/// Options for talking to the display daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcConfig {
    /// Timeout for the whole request/reply exchange in milliseconds
    pub reply_timeout_ms: u64,

    /// Maximum number of connection attempts, at least one is always made
    pub max_connect_attempts: u32,

    /// Delay between connection attempts in milliseconds
    pub connect_delay_ms: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            connect_delay_ms: DEFAULT_CONNECT_DELAY_MS,
        }
    }
}

impl IpcConfig {
    /// Creates a new IPC configuration with custom values
    pub fn new(reply_timeout_ms: u64, max_connect_attempts: u32, connect_delay_ms: u64) -> Self {
        Self {
            reply_timeout_ms,
            max_connect_attempts,
            connect_delay_ms,
        }
    }

    /// Creates a new IPC configuration that gives up after the first failed connect
    pub fn without_retry() -> Self {
        Self {
            max_connect_attempts: 1,
            ..Self::default()
        }
    }
}
