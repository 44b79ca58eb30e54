use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LwshellError {
    #[error("server not found: {0}")]
    HostNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("no credentials configured: set a password or a private key path")]
    NoCredentials,

    #[error(
        "encrypted private key {} is not supported, use an unencrypted key or configure a password: {source}",
        .path.display()
    )]
    EncryptedKeyUnsupported {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },

    #[error("failed to read private key {}: {source}", .path.display())]
    KeyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read private key {}: {source}", .path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },

    #[error("Invalid port number: {0}")]
    InvalidPort(i64),

    #[error("connection to {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: russh::Error,
    },

    #[error("authentication as {user} on {addr} was rejected")]
    AuthRejected { user: String, addr: String },

    #[error("failed to open session: {0}")]
    SessionOpen(#[source] russh::Error),

    #[error("failed to request PTY: {0}")]
    PtyRequest(#[source] russh::Error),

    #[error("failed to start remote shell: {0}")]
    ShellRequest(#[source] russh::Error),

    #[error("session channel error: {0}")]
    Channel(#[source] russh::Error),

    #[error("standard input is not a terminal, cannot start an interactive session")]
    NotATerminal,

    #[error("failed to switch terminal to raw mode: {0}")]
    RawMode(#[source] std::io::Error),

    #[error("terminal I/O failed: {0}")]
    SessionIo(#[source] std::io::Error),

    #[error("opening a new terminal window is not supported on {0}")]
    UnsupportedPlatform(String),

    #[error("failed to open terminal: {0}")]
    Launch(#[source] std::io::Error),

    #[error("failed to open terminal: {0}")]
    LaunchFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, LwshellError>;

/// Which stage of a connection attempt an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Credential,
    Transport,
    Environment,
    Launcher,
}

impl LwshellError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HostNotFound(_)
            | Self::ConfigError(_)
            | Self::InvalidPort(_)
            | Self::IoError(_)
            | Self::JsonError(_)
            | Self::SerializationError(_)
            | Self::DeserializationError(_) => ErrorCategory::Configuration,
            Self::NoCredentials
            | Self::EncryptedKeyUnsupported { .. }
            | Self::KeyFileUnreadable { .. }
            | Self::KeyRead { .. } => ErrorCategory::Credential,
            Self::Dial { .. }
            | Self::AuthRejected { .. }
            | Self::SessionOpen(_)
            | Self::PtyRequest(_)
            | Self::ShellRequest(_)
            | Self::Channel(_) => ErrorCategory::Transport,
            Self::NotATerminal | Self::RawMode(_) | Self::SessionIo(_) => {
                ErrorCategory::Environment
            }
            Self::UnsupportedPlatform(_) | Self::Launch(_) | Self::LaunchFailed(_) => {
                ErrorCategory::Launcher
            }
        }
    }
}
