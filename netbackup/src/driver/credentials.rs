//! Credential ordering and login attempts.

use std::time::Duration;

use log::{info, warn};
use tokio::time;

use super::throttle::AdmissionThrottle;
use crate::config::DeviceTarget;
use crate::error::{DriverError, Result, TransportError};
use crate::transport::{Credential, Transport};

/// Ordered list of credentials to try against one device.
///
/// A complete host-specific credential goes first, followed by the global
/// credentials in configuration order.
#[derive(Debug)]
pub struct CredentialCycler<'a> {
    candidates: Vec<&'a Credential>,
}

impl<'a> CredentialCycler<'a> {
    pub fn new(global: &'a [Credential], host: Option<&'a Credential>) -> Self {
        let mut candidates = Vec::with_capacity(global.len() + 1);
        candidates.extend(host.filter(|c| c.is_complete()));
        candidates.extend(global);
        Self { candidates }
    }

    /// Credentials in the order they will be tried.
    pub fn candidates(&self) -> &[&'a Credential] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Try each credential until one is accepted.
    ///
    /// Every attempt holds a throttle permit only while connecting and is
    /// bounded by `connect_timeout`. A rejected credential moves on to the
    /// next one; any other failure ends the login immediately.
    pub async fn login<T: Transport>(
        &self,
        transport: &T,
        target: &DeviceTarget,
        throttle: &AdmissionThrottle,
        connect_timeout: Duration,
    ) -> Result<(T::Connection, &'a Credential)> {
        let name = target.name();

        for &credential in &self.candidates {
            let permit = throttle.acquire().await?;
            info!(
                "LOGIN: {} ({}) as {}",
                name, target.os_name, credential.username
            );

            let attempt =
                time::timeout(connect_timeout, transport.connect(target.address(), credential))
                    .await;
            permit.release();

            match attempt {
                Ok(Ok(connection)) => {
                    info!("CONNECTED: {}", name);
                    return Ok((connection, credential));
                }
                Ok(Err(e)) if e.is_auth_rejected() => {
                    warn!("{}: login as {} rejected", name, credential.username);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(TransportError::Timeout(connect_timeout).into()),
            }
        }

        Err(DriverError::AllCredentialsRejected {
            attempts: self.candidates.len(),
        }
        .into())
    }
}
