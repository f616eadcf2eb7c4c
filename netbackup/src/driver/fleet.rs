//! Run many devices concurrently over one shared throttle.

use futures_util::future::join_all;
use log::info;

use super::backup::{BackupContext, BackupResult, ConfigBackup};
use crate::config::DeviceTarget;
use crate::error::Result;
use crate::platform::ProfileRegistry;
use crate::storage::ConfigStore;
use crate::transport::Transport;

/// Back up every device. Results are in device order.
pub async fn backup_all<'a, T, S>(
    ctx: &BackupContext<T, S>,
    registry: &ProfileRegistry,
    devices: impl IntoIterator<Item = &'a DeviceTarget>,
) -> Vec<Result<BackupResult>>
where
    T: Transport,
    S: ConfigStore,
{
    let backups: Vec<_> = devices
        .into_iter()
        .map(|target| ConfigBackup::new(target, registry.resolve(&target.os_name), ctx.clone()))
        .collect();

    info!(
        "backing up {} devices (max startups {})",
        backups.len(),
        ctx.throttle().limit()
    );

    join_all(backups.iter().map(|backup| backup.backup_config())).await
}

/// Test login on every device. Results are in device order.
pub async fn test_logins<'a, T, S>(
    ctx: &BackupContext<T, S>,
    registry: &ProfileRegistry,
    devices: impl IntoIterator<Item = &'a DeviceTarget>,
) -> Vec<Result<Option<String>>>
where
    T: Transport,
    S: ConfigStore,
{
    let backups: Vec<_> = devices
        .into_iter()
        .map(|target| ConfigBackup::new(target, registry.resolve(&target.os_name), ctx.clone()))
        .collect();

    join_all(backups.iter().map(|backup| backup.test_login())).await
}
