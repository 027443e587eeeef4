use std::io::{self, Write};
use std::sync::Once;
use thiserror::Error;

pub mod config;
pub mod daemon;
pub mod drm;
pub mod hook;
pub mod selection;

/// Error type for the drmhook library
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Symbol resolution error: {0}")]
    Resolution(String),

    #[error("Malformed mode override: {0}")]
    MalformedOverride(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Prefix carried by every diagnostic line the interceptor writes.
pub const LOG_PREFIX: &str = "[drmhook]";

static HOOK_LOGGING: Once = Once::new();

/// Initializes logging for the command-line tool.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

/// Initializes logging inside a host process that preloaded the library.
///
/// Runs at most once. A logger the host already installed is left alone; the
/// failed `try_init` is simply ignored.
pub fn init_hook_logging(settings: &config::HookSettings) {
    HOOK_LOGGING.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(log::LevelFilter::Info)
            .format(|buf, record| writeln!(buf, "{} {}", LOG_PREFIX, record.args()));

        if let Some(filter) = &settings.log_filter {
            builder.parse_filters(filter);
        }

        if let Some(path) = &settings.log_file {
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    eprintln!("{} cannot open log file {}: {}", LOG_PREFIX, path.display(), e);
                }
            }
        }

        let _ = builder.try_init();

        for warning in &settings.warnings {
            log::warn!("{}", warning);
        }
    });
}

/// Returns the version of the library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use config::{read_override, HookSettings, OverrideTarget};
pub use daemon::{DaemonClient, DaemonCommand, DaemonRequest};
pub use selection::{select_preferred, DisplayMode, PreferencePolicy, Selection};
