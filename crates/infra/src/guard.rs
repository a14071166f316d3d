//! Duplicate-submission protection for user-facing writes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Identity of one caller session. Minted per tenant resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// At most one in-flight operation per session.
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashSet<SessionId>>,
}

impl SingleFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the slot for `session`, or `None` while another call holds it.
    /// The slot is released when the returned permit is dropped.
    pub fn try_acquire(self: &Arc<Self>, session: SessionId) -> Option<FlightPermit> {
        let mut in_flight = self.in_flight.lock().ok()?;
        if !in_flight.insert(session) {
            return None;
        }
        Some(FlightPermit {
            owner: Arc::clone(self),
            session,
        })
    }
}

#[derive(Debug)]
pub struct FlightPermit {
    owner: Arc<SingleFlight>,
    session: SessionId,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.owner.in_flight.lock() {
            in_flight.remove(&self.session);
        }
    }
}

/// Lower bound on how long a successful call takes, measured from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinLatency {
    floor: Duration,
    start: Instant,
}

impl MinLatency {
    pub fn start(floor: Duration) -> Self {
        Self {
            floor,
            start: Instant::now(),
        }
    }

    /// Sleep until the floor has elapsed. Returns immediately if it already has.
    pub async fn wait(self) {
        tokio::time::sleep_until(self.start + self.floor).await;
    }
}
