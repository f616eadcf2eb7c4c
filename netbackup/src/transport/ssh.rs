//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{ChannelMsg, ChannelStream};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;

use super::config::{Credential, HostKeyVerification, SshConfig, SshSettings};
use super::{Connection, Transport};
use crate::error::{Result, TransportError};

/// Terminal type requested for interactive shells.
const TERM_TYPE: &str = "vt100";

/// Password-authenticating SSH transport wrapping the russh client.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    settings: SshSettings,
}

impl SshTransport {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Settings applied to every connection.
    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }
}

impl Transport for SshTransport {
    type Connection = SshConnection;

    async fn connect(&self, host: &str, credential: &Credential) -> Result<SshConnection> {
        let config = SshConfig {
            host: host.to_string(),
            port: self.settings.port,
            username: credential.username.clone(),
        };

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: self.settings.inactivity_timeout,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: self.settings.host_key_verification.clone(),
            known_hosts_path: self.settings.known_hosts.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let socket = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|source| TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                source,
            })?;
        if let Err(e) = socket.set_nodelay(true) {
            debug!("set_nodelay failed for {}: {}", config.host, e);
        }

        let mut session = client::connect_stream(ssh_config, socket, handler)
            .await
            .map_err(|e| {
                // If check_server_key stored a detailed error, use that instead
                // of the generic russh::Error::UnknownKey
                let stored = host_key_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                stored.unwrap_or(TransportError::Ssh(e))
            })?;

        let auth = session
            .authenticate_password(&config.username, credential.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?;

        if !auth.success() {
            return Err(TransportError::AuthenticationFailed {
                user: config.username,
            }
            .into());
        }

        Ok(SshConnection {
            session,
            terminal_width: self.settings.terminal_width,
            terminal_height: self.settings.terminal_height,
        })
    }
}

/// An authenticated russh session.
pub struct SshConnection {
    /// The russh session handle.
    session: Handle<SshHandler>,

    terminal_width: u32,
    terminal_height: u32,
}

impl Connection for SshConnection {
    type Channel = ChannelStream<Msg>;

    async fn run_once(&mut self, command: &str) -> Result<String> {
        let mut channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .exec(true, command)
            .await
            .map_err(TransportError::Ssh)?;

        let mut output = Vec::new();

        // EOF may arrive before the last Data message, so drain until the
        // channel itself goes away.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => {
                    debug!("{:?} exited with {}", command, exit_status);
                }
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn open_interactive(&mut self) -> Result<ChannelStream<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                TERM_TYPE,
                self.terminal_width,
                self.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel.into_stream())
    }

    async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    // Unknown host, learn the key
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
