//! Client side of the display daemon's request/reply socket.
//!
//! Requests are single human-readable lines such as `setMode 1920x1080@60
//! --screen HDMI-A-1`. The client writes the line, half-closes the stream and
//! reads the reply until the daemon closes its end.

use crate::config::ipc::{IpcConfig, DEFAULT_SOCKET_PATH};
use crate::{Error, Result};
use clap::Subcommand;
use log::{debug, error, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};

/// Commands understood by the display daemon
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
#[command(rename_all = "camelCase")]
pub enum DaemonCommand {
    #[command(about = "Lists the display modes of the specified screen.")]
    ListModes,
    #[command(about = "Lists all available display outputs.")]
    ListOutputs,
    #[command(about = "Displays the current display mode for the specified screen.")]
    CurrentMode,
    #[command(about = "Displays the current output (e.g., HDMI, VGA).")]
    CurrentOutput,
    #[command(about = "Displays the current resolution for the specified screen.")]
    CurrentResolution,
    #[command(about = "Displays the current screen rotation for the specified screen.")]
    CurrentRotation,
    #[command(about = "Displays the current refresh rate for the specified screen.")]
    CurrentRefresh,
    #[command(about = "Displays the current window system.")]
    CurrentBackend,
    #[command(about = "Sets the display mode for the specified screen.")]
    SetMode { mode: String },
    #[command(about = "Sets the output resolution and refresh rate (e.g., WxH@R or WxH).")]
    SetOutput { output: String },
    #[command(about = "Sets the screen rotation for the specified screen.")]
    SetRotation {
        #[arg(value_parser = ["0", "90", "180", "270"])]
        rotation: String,
    },
    #[command(about = "Takes a screenshot of the current screen.")]
    GetScreenshot,
    #[command(about = "Maps the touchscreen to the correct display.")]
    MapTouchScreen,
    #[command(about = "Sets the screen resolution to the maximum supported resolution.")]
    MinToMaxResolution,
}

impl DaemonCommand {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListModes => "listModes",
            Self::ListOutputs => "listOutputs",
            Self::CurrentMode => "currentMode",
            Self::CurrentOutput => "currentOutput",
            Self::CurrentResolution => "currentResolution",
            Self::CurrentRotation => "currentRotation",
            Self::CurrentRefresh => "currentRefresh",
            Self::CurrentBackend => "currentBackend",
            Self::SetMode { .. } => "setMode",
            Self::SetOutput { .. } => "setOutput",
            Self::SetRotation { .. } => "setRotation",
            Self::GetScreenshot => "getScreenshot",
            Self::MapTouchScreen => "mapTouchScreen",
            Self::MinToMaxResolution => "minToMaxResolution",
        }
    }

    /// The command's own argument, for the commands that take one
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::SetMode { mode } => Some(mode),
            Self::SetOutput { output } => Some(output),
            Self::SetRotation { rotation } => Some(rotation),
            _ => None,
        }
    }
}

/// A command plus the optional screen filter and pass-through arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonRequest {
    pub command: DaemonCommand,
    pub screen: Option<String>,
    pub args: Vec<String>,
}

impl DaemonRequest {
    pub fn new(command: DaemonCommand) -> Self {
        Self {
            command,
            screen: None,
            args: Vec::new(),
        }
    }

    pub fn with_screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Formats as `<command>[ <argument>][ --screen <name>][ <arg>...]`.
impl fmt::Display for DaemonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command.name())?;
        if let Some(argument) = self.command.argument() {
            write!(f, " {}", argument)?;
        }
        if let Some(screen) = &self.screen {
            write!(f, " --screen {}", screen)?;
        }
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Client for the display daemon's Unix socket
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    config: IpcConfig,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

impl DaemonClient {
    /// Creates a client for the socket at `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_config(socket_path, IpcConfig::default())
    }

    /// Creates a client with custom IPC configuration
    pub fn with_config(socket_path: impl Into<PathBuf>, config: IpcConfig) -> Self {
        Self {
            socket_path: socket_path.into(),
            config,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connects to the daemon, retrying as configured.
    async fn connect(&self) -> Result<UnixStream> {
        let max_attempts = self.config.max_connect_attempts.max(1);
        let delay = Duration::from_millis(self.config.connect_delay_ms);
        let mut attempt = 1;

        loop {
            debug!(
                "Connecting to daemon socket {} (attempt {}/{})",
                self.socket_path.display(),
                attempt,
                max_attempts
            );

            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Failed to connect to daemon socket (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        max_attempts,
                        delay.as_millis(),
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to connect to daemon socket {} after {} attempts: {}",
                        self.socket_path.display(),
                        max_attempts,
                        e
                    );
                    return Err(Error::Io(e));
                }
            }
        }
    }

    /// Sends `request` and returns the daemon's reply.
    pub async fn send(&self, request: &DaemonRequest) -> Result<String> {
        let line = request.to_string();
        let limit = Duration::from_millis(self.config.reply_timeout_ms);

        let exchange = async {
            let mut stream = self.connect().await?;
            debug!("Sending command: {}", line);
            stream.write_all(line.as_bytes()).await?;
            stream.shutdown().await?;

            let mut reply = String::new();
            stream.read_to_string(&mut reply).await?;
            Ok::<_, Error>(reply)
        };

        let reply = timeout(limit, exchange)
            .await
            .map_err(|_| Error::Timeout(format!("no reply to '{}' within {}ms", line, limit.as_millis())))??;

        if reply.is_empty() {
            return Err(Error::Daemon(format!("empty reply to '{}'", line)));
        }
        Ok(reply)
    }
}
