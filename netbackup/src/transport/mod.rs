//! Transport layer: connecting, authenticating and opening channels.
//!
//! The backup engine only talks to the [`Transport`] and [`Connection`]
//! traits. [`SshTransport`] implements them on top of russh; tests plug in
//! scripted fakes.

pub mod config;
mod ssh;

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

pub use config::{Credential, HostKeyVerification, SshConfig, SshSettings};
pub use ssh::{SshConnection, SshTransport};

use crate::error::Result;

/// Factory for authenticated connections.
pub trait Transport: Send + Sync {
    /// The connection type produced by a successful login.
    type Connection: Connection;

    /// Connect to `host` and authenticate with `credential`.
    ///
    /// A refused credential must surface as
    /// [`TransportError::AuthenticationFailed`](crate::error::TransportError::AuthenticationFailed)
    /// so the credential cycler can move on to the next candidate.
    fn connect(
        &self,
        host: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An authenticated connection to one device.
pub trait Connection: Send {
    /// Duplex byte stream of an interactive shell.
    type Channel: AsyncRead + AsyncWrite + Unpin + Send;

    /// Run a single command non-interactively and return its output.
    fn run_once(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

    /// Open an interactive shell channel.
    fn open_interactive(&mut self) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Close the connection and wait for it to shut down.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}
