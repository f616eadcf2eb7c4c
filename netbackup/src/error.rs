//! Error types for netbackup.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netbackup operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Interactive channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Backup session errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// OS profile errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Configuration loading errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// True when a single credential was refused by the device.
    ///
    /// This is the only error the credential cycler recovers from.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::AuthenticationFailed { .. })
        )
    }

    /// True when every candidate credential was refused.
    pub fn is_all_credentials_rejected(&self) -> bool {
        matches!(
            self,
            Error::Driver(DriverError::AllCredentialsRejected { .. })
        )
    }

    /// Phase and progress of a capture timeout, if this is one.
    pub fn phase_timeout(&self) -> Option<(Phase, Progress)> {
        match self {
            Error::Driver(DriverError::PhaseTimeout {
                phase, progress, ..
            }) => Some((*phase, *progress)),
            _ => None,
        }
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host not present in known_hosts under strict checking
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (prompt matching, PTY reads and writes).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel closed before a prompt was seen
    #[error("Channel closed")]
    Closed,

    /// Read or write on the channel failed
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Capture phase bounded by its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first prompt after login.
    PromptSync,
    /// Running the paging-disable commands.
    DisablePaging,
    /// Running the show-command.
    ShowCommand,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PromptSync => "prompt-sync",
            Phase::DisablePaging => "disable-paging",
            Phase::ShowCommand => "show-command",
        };
        f.write_str(name)
    }
}

/// How far an interactive capture got before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub prompt_synced: bool,
    pub paging_disabled: bool,
}

/// Driver layer errors (login, capture).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Every candidate credential was refused
    #[error("No valid username/password ({attempts})")]
    AllCredentialsRejected { attempts: usize },

    /// A capture phase did not finish in time
    #[error(
        "Timeout during {phase} after {after:?} (at_prompt={}, paging_disabled={})",
        .progress.prompt_synced,
        .progress.paging_disabled
    )]
    PhaseTimeout {
        phase: Phase,
        progress: Progress,
        after: Duration,
    },

    /// Capture attempted before a successful login
    #[error("Not connected")]
    NotConnected,

    /// The admission throttle was shut down while waiting for a slot
    #[error("Admission throttle closed")]
    ThrottleClosed,
}

/// OS profile errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid profile definition
    #[error("Invalid OS profile '{name}': {message}")]
    InvalidDefinition { name: String, message: String },
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid configuration
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing the config file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using netbackup's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejected_classification() {
        let err: Error = TransportError::AuthenticationFailed {
            user: "admin".into(),
        }
        .into();
        assert!(err.is_auth_rejected());
        assert!(!err.is_all_credentials_rejected());

        let err: Error = TransportError::Timeout(Duration::from_secs(60)).into();
        assert!(!err.is_auth_rejected());
    }

    #[test]
    fn test_phase_timeout_display() {
        let err: Error = DriverError::PhaseTimeout {
            phase: Phase::DisablePaging,
            progress: Progress {
                prompt_synced: true,
                paging_disabled: false,
            },
            after: Duration::from_secs(30),
        }
        .into();

        let text = err.to_string();
        assert!(text.contains("disable-paging"));
        assert!(text.contains("at_prompt=true"));
        assert!(text.contains("paging_disabled=false"));

        let (phase, progress) = err.phase_timeout().unwrap();
        assert_eq!(phase, Phase::DisablePaging);
        assert!(progress.prompt_synced);
    }

    #[test]
    fn test_exhausted_message_carries_count() {
        let err = DriverError::AllCredentialsRejected { attempts: 3 };
        assert_eq!(err.to_string(), "No valid username/password (3)");
    }
}
