//! OS profiles for multi-vendor support.
//!
//! A profile tells the backup session which command prints the running
//! configuration and which commands must run first to turn off paging.

mod definition;
mod registry;
pub mod vendors;

pub use definition::{DEFAULT_SHOW_RUNNING, OsProfile};
pub use registry::ProfileRegistry;

/// Name of the fallback profile used for unknown OS names.
pub const DEFAULT_PROFILE: &str = "default";
