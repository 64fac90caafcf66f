//! A bounded, shared log of authorization decisions
//!
//! The log is an observation sink for the calling layer. The decision engine
//! never reads from or writes to it.
//!
//! ```
//! use forwardauth::{
//!     clock::{TestClock, UnixTime},
//!     events::{EventLog, EventLogConfig},
//!     token::Token,
//!     Application, Authorizer, RequestContext, RequestedUrl,
//! };
//!
//! let log = EventLog::with_clock(
//!     EventLogConfig::default().with_capacity(2),
//!     TestClock::new(UnixTime(1_000)),
//! );
//!
//! for path in ["/a", "/b", "/c"] {
//!     let ctx = RequestContext::api(
//!         RequestedUrl::new("https", "api.example.com", path, "GET"),
//!         Application::new("api"),
//!         Token::opaque("xyz"),
//!     );
//!     let result = Authorizer::create(ctx.clone()).authorize();
//!     log.record(&ctx, &result);
//! }
//!
//! let paths: Vec<_> = log.all().into_iter().map(|e| e.path).collect();
//! assert_eq!(paths, ["/b", "/c"]);
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    clock::{plus, Clock, System, UnixTime},
    fsm::{Mode, State},
    request::RequestContext,
    result::AuthorizerResult,
};

const DEFAULT_CAPACITY: usize = 1000;

/// Bounds on an [`EventLog`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
#[must_use]
pub struct EventLogConfig {
    capacity: usize,
    ttl_secs: Option<u64>,
}

impl Default for EventLogConfig {
    #[inline]
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_secs: None,
        }
    }
}

impl EventLogConfig {
    /// Sets the maximum number of retained events
    ///
    /// A capacity of zero retains nothing.
    #[inline]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Drops events once they are older than `ttl_secs`
    #[inline]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// The maximum number of retained events
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How long an event is retained, in seconds
    #[inline]
    #[must_use]
    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }
}

/// One recorded decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthorizationEvent {
    /// When the decision was recorded
    pub timestamp: UnixTime,
    /// The mode the request was evaluated in
    pub mode: Mode,
    /// The request method
    pub method: String,
    /// The request host
    pub host: String,
    /// The request path
    pub path: String,
    /// The terminal state reached
    pub state: State,
    /// The diagnostic message, if a guard recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An append-only log of decisions, bounded by capacity and optionally by age
///
/// Safe to share between request handlers. When full, the oldest event is
/// evicted to make room.
#[derive(Debug)]
pub struct EventLog<C = System> {
    config: EventLogConfig,
    clock: C,
    entries: Mutex<VecDeque<AuthorizationEvent>>,
}

impl EventLog {
    /// An empty log using the system clock
    pub fn new(config: EventLogConfig) -> Self {
        Self::with_clock(config, System)
    }
}

impl<C: Clock> EventLog<C> {
    /// An empty log using `clock` for timestamps and expiry
    pub fn with_clock(config: EventLogConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// The bounds this log enforces
    #[inline]
    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }

    /// Records the decision reached for `context`
    pub fn record(&self, context: &RequestContext, result: &AuthorizerResult) {
        let url = context.requested_url();
        self.put(AuthorizationEvent {
            timestamp: self.clock.now(),
            mode: context.mode(),
            method: url.method().to_owned(),
            host: url.host().to_owned(),
            path: url.path().to_owned(),
            state: result.state(),
            message: result.message(),
        });
    }

    /// Appends an event, evicting expired events and then the oldest ones
    /// until it fits
    pub fn put(&self, event: AuthorizationEvent) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.drop_expired(&mut entries, now);

        if self.config.capacity == 0 {
            return;
        }

        while entries.len() >= self.config.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::trace!(
                    timestamp = evicted.timestamp.0,
                    "event log full, evicting oldest"
                );
            }
        }

        entries.push_back(event);
    }

    /// A snapshot of the retained events, newest last
    #[must_use]
    pub fn all(&self) -> Vec<AuthorizationEvent> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.drop_expired(&mut entries, now);
        entries.iter().cloned().collect()
    }

    /// The number of retained events, including any not yet expired out
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no events are retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every retained event
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn drop_expired(&self, entries: &mut VecDeque<AuthorizationEvent>, now: UnixTime) {
        if let Some(ttl) = self.config.ttl_secs {
            entries.retain(|e| plus(e.timestamp, ttl) > now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{SharedTestClock, TestClock};

    fn event(path: &str, timestamp: u64) -> AuthorizationEvent {
        AuthorizationEvent {
            timestamp: UnixTime(timestamp),
            mode: Mode::Api,
            method: "GET".to_owned(),
            host: "api.example.com".to_owned(),
            path: path.to_owned(),
            state: State::AccessGranted,
            message: None,
        }
    }

    fn paths<C: Clock>(log: &EventLog<C>) -> Vec<String> {
        log.all().into_iter().map(|e| e.path).collect()
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let log = EventLog::with_clock(
            EventLogConfig::default().with_capacity(3),
            TestClock::new(UnixTime(0)),
        );

        for (i, path) in ["/1", "/2", "/3", "/4", "/5"].iter().enumerate() {
            log.put(event(path, i as u64));
        }

        assert_eq!(paths(&log), ["/3", "/4", "/5"]);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let log = EventLog::with_clock(
            EventLogConfig::default().with_capacity(0),
            TestClock::new(UnixTime(0)),
        );

        log.put(event("/1", 0));

        assert!(log.is_empty());
    }

    #[test]
    fn ttl_drops_old_events_on_read_and_write() {
        let clock = SharedTestClock::new(UnixTime(100));
        let log = EventLog::with_clock(
            EventLogConfig::default().with_ttl_secs(10),
            clock.clone(),
        );

        log.put(event("/old", 100));
        clock.advance(5);
        log.put(event("/new", 105));
        assert_eq!(paths(&log), ["/old", "/new"]);

        clock.advance(5);
        assert_eq!(paths(&log), ["/new"]);

        clock.advance(20);
        log.put(event("/latest", 130));
        assert_eq!(log.len(), 1);
        assert_eq!(log.config().ttl_secs(), Some(10));
    }

    #[test]
    fn config_defaults_and_keys() {
        let config: EventLogConfig =
            serde_json::from_str(r#"{ "ttl-secs": 60 }"#).unwrap();

        assert_eq!(config.capacity(), 1000);
        assert_eq!(config.ttl_secs(), Some(60));
    }

    #[test]
    fn concurrent_appends_are_all_retained() {
        let log = Arc::new(EventLog::with_clock(
            EventLogConfig::default(),
            TestClock::new(UnixTime(0)),
        ));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.put(event(&format!("/{t}/{i}"), 0));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 200);
    }
}
