//! Time sources for the event log
//!
//! Authorization decisions never consult the clock. Only the bounded
//! [`EventLog`](crate::events::EventLog) does, to timestamp entries and to
//! expire them, so the clock is injectable for tests.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

pub use aliri_clock::{Clock, System, TestClock, UnixTime};

/// The time `secs` seconds after `time`, saturating at the maximum
#[inline]
#[must_use]
pub const fn plus(time: UnixTime, secs: u64) -> UnixTime {
    UnixTime(time.0.saturating_add(secs))
}

/// A manually driven clock whose handles all read the same time
///
/// Unlike [`TestClock`], advancing one handle is visible through every
/// clone, so a test can keep a handle while an event log owns another.
#[derive(Clone, Debug, Default)]
pub struct SharedTestClock(Arc<AtomicU64>);

impl SharedTestClock {
    /// Creates a new shared clock reading the specified time
    #[inline]
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Sets the current time for every handle
    #[inline]
    pub fn set(&self, time: UnixTime) {
        self.0.store(time.0, Ordering::SeqCst);
    }

    /// Moves every handle forward by `secs` seconds
    #[inline]
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for SharedTestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}
