//! Backup engine: admission control, login, capture and orchestration.
//!
//! A [`ConfigBackup`] drives one [`Session`] per call through login,
//! capture and close. Sessions share nothing except the
//! [`AdmissionThrottle`] carried by the [`BackupContext`].

mod backup;
mod credentials;
pub mod fleet;
mod session;
mod throttle;

pub use backup::{BackupContext, BackupResult, ConfigBackup};
pub use credentials::CredentialCycler;
pub use fleet::{backup_all, test_logins};
pub use session::{Session, SessionState};
pub use throttle::{AdmissionPermit, AdmissionThrottle};
