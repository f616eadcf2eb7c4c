//! Per-device backup session state machine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::time;

use super::credentials::CredentialCycler;
use super::throttle::AdmissionThrottle;
use crate::channel::PtyChannel;
use crate::config::{DeviceTarget, Timeouts};
use crate::error::{DriverError, Phase, Progress, Result};
use crate::platform::OsProfile;
use crate::transport::{Connection, Transport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Logged in; `interactive` when capture goes through a PTY shell.
    Authenticated { interactive: bool },
    PromptSynced,
    PagingDisabled,
    ConfigCaptured,
    Closed,

    LoginFailed,
    TimedOut(Phase),
    CaptureError,
}

impl SessionState {
    /// True for the states a session ends in after an error.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionState::LoginFailed | SessionState::TimedOut(_) | SessionState::CaptureError
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::Authenticated { interactive: true } => {
                f.write_str("authenticated (interactive)")
            }
            SessionState::Authenticated { interactive: false } => f.write_str("authenticated"),
            SessionState::PromptSynced => f.write_str("prompt-synced"),
            SessionState::PagingDisabled => f.write_str("paging-disabled"),
            SessionState::ConfigCaptured => f.write_str("config-captured"),
            SessionState::Closed => f.write_str("closed"),
            SessionState::LoginFailed => f.write_str("login-failed"),
            SessionState::TimedOut(phase) => write!(f, "timed-out ({phase})"),
            SessionState::CaptureError => f.write_str("capture-error"),
        }
    }
}

/// One backup attempt against one device.
///
/// Owns the connection and, for interactive profiles, the PTY channel.
pub struct Session<'a, C: Connection> {
    target: &'a DeviceTarget,
    profile: Arc<OsProfile>,
    state: SessionState,
    username: Option<String>,
    connection: Option<C>,
    channel: Option<PtyChannel<C::Channel>>,
}

impl<'a, C: Connection> Session<'a, C> {
    pub fn new(target: &'a DeviceTarget, profile: Arc<OsProfile>) -> Self {
        Self {
            target,
            profile,
            state: SessionState::Idle,
            username: None,
            connection: None,
            channel: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Username of the accepted credential.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The last prompt seen on the interactive channel.
    pub fn prompt(&self) -> Option<&str> {
        self.channel.as_ref().and_then(|c| c.prompt())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Log in with the first accepted credential.
    pub async fn login<T>(
        &mut self,
        transport: &T,
        credentials: &CredentialCycler<'_>,
        throttle: &AdmissionThrottle,
        connect_timeout: Duration,
    ) -> Result<()>
    where
        T: Transport<Connection = C>,
    {
        self.state = SessionState::Connecting;

        match credentials
            .login(transport, self.target, throttle, connect_timeout)
            .await
        {
            Ok((connection, credential)) => {
                self.connection = Some(connection);
                self.username = Some(credential.username.clone());
                self.state = SessionState::Authenticated {
                    interactive: self.profile.is_interactive(),
                };
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::LoginFailed;
                Err(e)
            }
        }
    }

    /// Retrieve the running configuration.
    ///
    /// On error the session is left in `TimedOut(phase)` or `CaptureError`.
    pub async fn capture(&mut self, timeouts: &Timeouts) -> Result<String> {
        let result = if self.profile.is_interactive() {
            self.capture_interactive(timeouts).await
        } else {
            self.capture_once(timeouts).await
        };

        self.state = match &result {
            Ok(_) => SessionState::ConfigCaptured,
            Err(e) => match e.phase_timeout() {
                Some((phase, _)) => SessionState::TimedOut(phase),
                None => SessionState::CaptureError,
            },
        };
        result
    }

    async fn capture_interactive(&mut self, timeouts: &Timeouts) -> Result<String> {
        let profile = self.profile.clone();
        let connection = self.connection.as_mut().ok_or(DriverError::NotConnected)?;

        let stream = connection.open_interactive().await?;
        let channel = self
            .channel
            .insert(PtyChannel::with_matcher(stream, profile.prompt_matcher()?));

        let mut progress = Progress::default();

        within(
            Phase::PromptSync,
            timeouts.prompt_sync,
            progress,
            channel.read_until_prompt(),
        )
        .await?;
        progress.prompt_synced = true;
        self.state = SessionState::PromptSynced;
        debug!("{}: prompt {:?}", self.target.name(), channel.prompt());

        within(Phase::DisablePaging, timeouts.disable_paging, progress, async {
            for command in profile.paging_commands() {
                channel.run_command(command).await?;
            }
            Ok(())
        })
        .await?;
        progress.paging_disabled = true;
        self.state = SessionState::PagingDisabled;

        info!("GET-CONFIG: {}", self.target.name());
        within(
            Phase::ShowCommand,
            timeouts.show_command,
            progress,
            channel.run_command(&profile.show_running),
        )
        .await
    }

    async fn capture_once(&mut self, timeouts: &Timeouts) -> Result<String> {
        let command = self.profile.show_running.as_str();
        let connection = self.connection.as_mut().ok_or(DriverError::NotConnected)?;

        info!("GET-CONFIG: {}", self.target.name());
        let output = within(
            Phase::ShowCommand,
            timeouts.show_command,
            Progress::default(),
            connection.run_once(command),
        )
        .await?;

        Ok(after_echo(&output, command).to_string())
    }

    /// Close the connection if one is open. The session ends `Closed`.
    pub async fn close(&mut self) -> Result<()> {
        self.channel = None;
        let result = match self.connection.take() {
            Some(connection) => {
                let result = connection.close().await;
                info!("CLOSED: {}", self.target.name());
                result
            }
            None => Ok(()),
        };
        self.state = SessionState::Closed;
        result
    }
}

/// Run one capture phase under its own time limit.
async fn within<F, T>(phase: Phase, limit: Duration, progress: Progress, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::PhaseTimeout {
            phase,
            progress,
            after: limit,
        }
        .into()),
    }
}

/// Drop everything up to and including the first echo of `command` and the
/// character following it. Output without an echo is returned as is.
fn after_echo<'o>(output: &'o str, command: &str) -> &'o str {
    match output.find(command) {
        Some(pos) => {
            let mut rest = output[pos + command.len()..].chars();
            rest.next();
            rest.as_str()
        }
        None => output,
    }
}
