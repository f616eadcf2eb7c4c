//! # netbackup
//!
//! Async SSH backup of running configurations for fleets of network devices.
//!
//! For every device netbackup logs in with the first accepted credential,
//! optionally opens an interactive shell to turn off output paging, runs the
//! OS-specific show-command and writes the captured text to disk.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Host-specific and global credentials tried in order
//! - Fleet-wide limit on concurrent connection setups
//! - Prompt detection that only rescans the final line of output
//! - Separate timeouts for prompt sync, paging disable and show-command
//! - Built-in OS profiles (IOS, NX-OS, EOS, Junos, SR OS), extensible via TOML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netbackup::{BackupContext, Config, FsConfigStore, SshTransport, backup_all};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netbackup::Error> {
//!     let config = Config::load("netbackup.toml").await?;
//!     let registry = config.app.profile_registry()?;
//!
//!     let transport = SshTransport::new(config.app.ssh.clone());
//!     let store = FsConfigStore::new(&config.app.defaults.configs_dir);
//!     let ctx = BackupContext::new(config.app, transport, store);
//!
//!     for result in backup_all(&ctx, &registry, &config.devices).await {
//!         let result = result?;
//!         println!("{}: {}", result.device, result.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod storage;
pub mod transport;

// Re-export main types for convenience
pub use config::{AppConfig, Config, DeviceTarget, Timeouts};
pub use driver::{
    AdmissionThrottle, BackupContext, BackupResult, ConfigBackup, SessionState, backup_all,
    test_logins,
};
pub use error::{Error, Result};
pub use platform::{OsProfile, ProfileRegistry};
pub use storage::{ConfigStore, FsConfigStore};
pub use transport::{Credential, SshTransport};
