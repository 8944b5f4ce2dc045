//! Single-flight TTL cache.
//!
//! One value, one refresh in flight at a time. Callers that arrive
//! while a refresh runs wait on the refresh mutex and then observe
//! the value it produced instead of starting their own. A failed
//! refresh serves the stale value when one exists.

use std::future::Future;
use std::time::Duration;

use depinchat_types::Result;
use tokio::time::Instant;

struct Slot<T> {
    value: T,
    updated_at: Instant,
}

/// TTL cache with single-flight refresh.
pub struct Cache<T> {
    ttl: Duration,
    slot: tokio::sync::Mutex<Option<Slot<T>>>,
    /// Held for the duration of a refresh; waiters queue here.
    refresh: tokio::sync::Mutex<()>,
}

impl<T: Clone> Cache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: tokio::sync::Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the cached value when fresh; otherwise runs (or joins)
    /// a refresh.
    ///
    /// `force` skips the freshness check but still joins an in-flight
    /// refresh rather than stacking a second one. On refresh failure
    /// the stale value is served when present; the error propagates
    /// only on a cold cache.
    pub async fn get_or_refresh<F, Fut>(&self, force: bool, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let entered_at = Instant::now();

        if !force {
            if let Some(value) = self.fresh_value().await {
                return Ok(value);
            }
        }

        let _guard = self.refresh.lock().await;

        // Someone may have refreshed while we waited for the guard;
        // their result satisfies this call (single-flight).
        {
            let slot = self.slot.lock().await;
            if let Some(entry) = slot.as_ref() {
                if entry.updated_at > entered_at
                    || (!force && entry.updated_at.elapsed() < self.ttl)
                {
                    return Ok(entry.value.clone());
                }
            }
        }

        match fetch().await {
            Ok(value) => {
                let mut slot = self.slot.lock().await;
                *slot = Some(Slot {
                    value: value.clone(),
                    updated_at: Instant::now(),
                });
                Ok(value)
            }
            Err(e) => {
                let slot = self.slot.lock().await;
                match slot.as_ref() {
                    Some(entry) => Ok(entry.value.clone()),
                    None => Err(e),
                }
            }
        }
    }

    /// The cached value regardless of freshness.
    pub async fn peek(&self) -> Option<T> {
        self.slot.lock().await.as_ref().map(|s| s.value.clone())
    }

    async fn fresh_value(&self) -> Option<T> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|entry| entry.updated_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
