//! Admission control for connection setup.
//!
//! Every login attempt holds an [`AdmissionPermit`] for the duration of its
//! connect/authenticate phase, so no more than `limit` SSH handshakes are in
//! flight at once across the whole fleet.

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{DriverError, Result};

/// Shared gate limiting concurrent connection setups.
///
/// Cloning yields another handle to the same gate.
#[derive(Debug, Clone)]
pub struct AdmissionThrottle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    semaphore: Arc<Semaphore>,
    limits: Mutex<Limits>,
}

#[derive(Debug)]
struct Limits {
    limit: usize,
    /// Permits to retire as they come back after the limit was lowered
    /// below the number currently granted.
    debt: usize,
}

impl AdmissionThrottle {
    /// Create a throttle admitting `limit` concurrent holders (at least 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(limit)),
                limits: Mutex::new(Limits { limit, debt: 0 }),
            }),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DriverError::ThrottleClosed)?;

        Ok(AdmissionPermit {
            permit: Some(permit),
            inner: self.inner.clone(),
        })
    }

    /// Change the limit. Permits already granted stay valid.
    ///
    /// Raising the limit frees slots immediately. Lowering it takes effect
    /// as outstanding permits are returned.
    pub fn set_limit(&self, limit: usize) {
        let limit = limit.max(1);
        let mut limits = self.lock();

        if limit > limits.limit {
            let extra = limit - limits.limit;
            let repaid = extra.min(limits.debt);
            limits.debt -= repaid;
            self.inner.semaphore.add_permits(extra - repaid);
        } else if limit < limits.limit {
            let cut = limits.limit - limit;
            let forgotten = self.inner.semaphore.forget_permits(cut);
            limits.debt += cut - forgotten;
        }

        debug!(
            "admission limit {} -> {} (pending retirements: {})",
            limits.limit, limit, limits.debt
        );
        limits.limit = limit;
    }

    /// Current limit.
    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    /// Slots that could be granted right now without waiting.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Limits> {
        self.inner.lock()
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Limits> {
        self.limits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdmissionThrottle {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_STARTUPS)
    }
}

/// A granted slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    permit: Option<OwnedSemaphorePermit>,
    inner: Arc<Inner>,
}

impl AdmissionPermit {
    /// Give the slot back.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };

        let mut limits = self.inner.lock();
        if limits.debt > 0 {
            limits.debt -= 1;
            permit.forget();
        }
    }
}
