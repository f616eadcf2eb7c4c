//! Backup task: one device, login through persistence.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use super::credentials::CredentialCycler;
use super::session::{Session, SessionState};
use super::throttle::AdmissionThrottle;
use crate::config::{AppConfig, DeviceTarget};
use crate::error::{Error, Result};
use crate::platform::OsProfile;
use crate::storage::ConfigStore;
use crate::transport::Transport;

/// Everything a backup task shares with the rest of the fleet.
pub struct BackupContext<T, S> {
    settings: Arc<AppConfig>,
    transport: Arc<T>,
    throttle: AdmissionThrottle,
    store: Arc<S>,
}

impl<T, S> Clone for BackupContext<T, S> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            transport: self.transport.clone(),
            throttle: self.throttle.clone(),
            store: self.store.clone(),
        }
    }
}

impl<T: Transport, S: ConfigStore> BackupContext<T, S> {
    /// Create a context whose throttle admits `defaults.max_startups`.
    pub fn new(settings: impl Into<Arc<AppConfig>>, transport: T, store: S) -> Self {
        let settings = settings.into();
        let throttle = AdmissionThrottle::new(settings.defaults.max_startups);
        Self {
            settings,
            transport: Arc::new(transport),
            throttle,
            store: Arc::new(store),
        }
    }

    /// Use an existing throttle, e.g. one shared with another context.
    pub fn with_throttle(mut self, throttle: AdmissionThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn throttle(&self) -> &AdmissionThrottle {
        &self.throttle
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Outcome of one `backup_config` run.
#[derive(Debug)]
pub struct BackupResult {
    /// Device name.
    pub device: String,

    /// Username of the accepted credential.
    pub username: Option<String>,

    /// Captured configuration text.
    pub config: Option<String>,

    /// Where the configuration was written.
    pub save_file: Option<PathBuf>,

    /// Login or capture error, if the backup failed.
    pub failure: Option<Error>,

    /// Last state reached before the connection was closed.
    pub state: SessionState,
}

impl BackupResult {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            username: None,
            config: None,
            save_file: None,
            failure: None,
            state: SessionState::Idle,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.save_file.is_some()
    }
}

/// Backs up the running configuration of one device.
pub struct ConfigBackup<'a, T, S> {
    target: &'a DeviceTarget,
    profile: Arc<OsProfile>,
    ctx: BackupContext<T, S>,
}

impl<'a, T: Transport, S: ConfigStore> ConfigBackup<'a, T, S> {
    pub fn new(target: &'a DeviceTarget, profile: Arc<OsProfile>, ctx: BackupContext<T, S>) -> Self {
        Self {
            target,
            profile,
            ctx,
        }
    }

    pub fn target(&self) -> &DeviceTarget {
        self.target
    }

    pub fn profile(&self) -> &OsProfile {
        &self.profile
    }

    /// Log in, capture the configuration and save it.
    ///
    /// Login and capture failures are logged and recorded in the result.
    /// Only persistence and connection-close errors are returned as `Err`.
    /// Each call uses a fresh session, so repeated calls are independent.
    pub async fn backup_config(&self) -> Result<BackupResult> {
        let name = self.target.name();
        let mut result = BackupResult::new(name);
        let mut session = Session::new(self.target, self.profile.clone());

        let outcome = self.login_and_capture(&mut session).await;
        result.username = session.username().map(str::to_string);
        result.state = session.state();

        let closed = session.close().await;

        match outcome {
            Ok(config) => result.config = Some(config),
            Err(e) => {
                error!("BACKUP FAILED: {}: {}", name, e);
                result.failure = Some(e);
            }
        }

        closed?;

        if let Some(config) = &result.config {
            let path = self.ctx.store.save(name, config).await?;
            info!("SAVED: {} -> {}", name, path.display());
            result.save_file = Some(path);
        }

        Ok(result)
    }

    /// Only log in, then close.
    ///
    /// Returns the accepted username, or `None` when every credential was
    /// rejected. Other errors are returned.
    pub async fn test_login(&self) -> Result<Option<String>> {
        let mut session = Session::new(self.target, self.profile.clone());

        let login = self.login(&mut session).await;
        let username = session.username().map(str::to_string);
        session.close().await?;

        match login {
            Ok(()) => Ok(username),
            Err(e) if e.is_all_credentials_rejected() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn login_and_capture(
        &self,
        session: &mut Session<'a, T::Connection>,
    ) -> Result<String> {
        self.login(session).await?;
        session.capture(&self.ctx.settings.defaults.timeouts).await
    }

    async fn login(&self, session: &mut Session<'a, T::Connection>) -> Result<()> {
        let settings = &self.ctx.settings;
        let credentials =
            CredentialCycler::new(&settings.credentials, self.target.credential.as_ref());

        session
            .login(
                self.ctx.transport.as_ref(),
                &credentials,
                &self.ctx.throttle,
                settings.defaults.timeouts.connect,
            )
            .await
    }
}
