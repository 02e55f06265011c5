//! Polling change feed.
//!
//! Emulates a push subscription over the `/sync` cursor endpoint: one timer
//! per feed multiplexes any number of registered callbacks, the way a real
//! push channel multiplexes listeners over one connection. Each tick asks
//! the server for anything newer than the last observed `updatedAt`; a
//! strictly newer document advances the cursor and is dispatched
//! synchronously to every callback registered for the event kind. Writes
//! landing within one interval coalesce to the latest document.
//!
//! The feed owns its lifecycle: `start` is idempotent, `stop` is safe when
//! not running, and dropping the feed stops it. A session token that expires
//! server-side shows up as failed polls; the loop keeps running until
//! stopped explicitly.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::api::ApiClient;

/// Event kind dispatched when the config document changes.
pub const CONFIG_UPDATED: &str = "config.updated";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub kind: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

type Callback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, Callback)>>,
}

impl Registry {
    fn add(&mut self, kind: &str, callback: Callback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners
            .entry(kind.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    fn remove(&mut self, kind: &str, id: u64) -> bool {
        if let Some(entries) = self.listeners.get_mut(kind) {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            return entries.len() < before;
        }
        false
    }

    fn dispatch(&self, event: &ChangeEvent) -> usize {
        let Some(entries) = self.listeners.get(&event.kind) else {
            return 0;
        };
        for (_, callback) in entries {
            callback(event);
        }
        entries.len()
    }
}

struct FeedShared {
    registry: Mutex<Registry>,
    cursor: Mutex<Option<DateTime<Utc>>>,
}

impl FeedShared {
    fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor.lock().map(|guard| *guard).unwrap_or(None)
    }

    /// Advance the cursor and fan the document out; a stale `updated_at` is
    /// a no-op. Returns the number of callbacks invoked.
    fn apply_update(&self, data: Value, updated_at: DateTime<Utc>) -> usize {
        {
            let Ok(mut cursor) = self.cursor.lock() else {
                return 0;
            };
            if !should_advance(*cursor, updated_at) {
                return 0;
            }
            *cursor = Some(updated_at);
        }

        let event = ChangeEvent {
            kind: CONFIG_UPDATED.to_string(),
            data,
            updated_at,
        };
        self.registry
            .lock()
            .map(|registry| registry.dispatch(&event))
            .unwrap_or(0)
    }
}

fn should_advance(cursor: Option<DateTime<Utc>>, updated_at: DateTime<Utc>) -> bool {
    cursor.map_or(true, |cursor| updated_at > cursor)
}

/// Handle returned by [`ChangeFeed::subscribe`]; consumes itself to
/// unregister the callback.
pub struct SubscriptionHandle {
    shared: Weak<FeedShared>,
    kind: String,
    id: u64,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            if let Ok(mut registry) = shared.registry.lock() {
                registry.remove(&self.kind, self.id);
            }
        }
    }
}

pub struct ChangeFeed {
    client: Arc<ApiClient>,
    interval: Duration,
    shared: Arc<FeedShared>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
            shared: Arc::new(FeedShared {
                registry: Mutex::new(Registry::default()),
                cursor: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Register a callback for `kind` events. Callbacks run inline on the
    /// polling tick, so they must not block.
    pub fn subscribe(
        &self,
        kind: &str,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self
            .shared
            .registry
            .lock()
            .map(|mut registry| registry.add(kind, Box::new(callback)))
            .unwrap_or(0);
        SubscriptionHandle {
            shared: Arc::downgrade(&self.shared),
            kind: kind.to_string(),
            id,
        }
    }

    /// Start the polling timer. Idempotent: at most one timer runs per feed
    /// no matter how many callbacks are registered.
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }

        let client = Arc::clone(&self.client);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let since = shared.cursor();
                match client.sync_since(since).await {
                    Ok(snapshot) => {
                        if let (Some(data), Some(updated_at)) =
                            (snapshot.data, snapshot.updated_at)
                        {
                            let notified = shared.apply_update(data, updated_at);
                            if notified > 0 {
                                debug!(%updated_at, notified, "config change dispatched");
                            }
                        }
                    }
                    Err(err) => debug!("sync poll failed: {err}"),
                }
            }
        }));
    }

    /// Cancel the polling timer; safe to call when not running.
    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.is_some())
            .unwrap_or(false)
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn feed() -> ChangeFeed {
        let client = Arc::new(ApiClient::new("http://127.0.0.1:9").expect("client"));
        ChangeFeed::new(client).with_interval(Duration::from_secs(3600))
    }

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("timestamp")
    }

    #[test]
    fn should_advance_requires_strictly_newer() {
        assert!(should_advance(None, ts(10)));
        assert!(should_advance(Some(ts(10)), ts(11)));
        assert!(!should_advance(Some(ts(10)), ts(10)));
        assert!(!should_advance(Some(ts(10)), ts(9)));
    }

    #[test]
    fn apply_update_dispatches_to_subscribers() {
        let feed = feed();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let _handle = feed.subscribe(CONFIG_UPDATED, move |event| {
            assert_eq!(event.kind, CONFIG_UPDATED);
            assert_eq!(event.data, json!({"theme": "dark"}));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let notified = feed.shared.apply_update(json!({"theme": "dark"}), ts(100));
        assert_eq!(notified, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(feed.shared.cursor(), Some(ts(100)));
    }

    #[test]
    fn stale_update_is_coalesced_away() {
        let feed = feed();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let _handle = feed.subscribe(CONFIG_UPDATED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(feed.shared.apply_update(json!({"v": 1}), ts(100)), 1);
        // Same cursor: no dispatch, cursor unchanged.
        assert_eq!(feed.shared.apply_update(json!({"v": 2}), ts(100)), 0);
        assert_eq!(feed.shared.apply_update(json!({"v": 0}), ts(50)), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(feed.shared.cursor(), Some(ts(100)));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let feed = feed();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let handle = feed.subscribe(CONFIG_UPDATED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(feed.shared.apply_update(json!({"v": 1}), ts(1)), 1);
        handle.unsubscribe();
        assert_eq!(feed.shared.apply_update(json!({"v": 2}), ts(2)), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_event_kinds_are_not_dispatched() {
        let feed = feed();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let _handle = feed.subscribe("auth.changed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(feed.shared.apply_update(json!({"v": 1}), ts(1)), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_safe() {
        let feed = feed();
        assert!(!feed.is_running());

        // stop before start is a no-op
        feed.stop();
        assert!(!feed.is_running());

        feed.start();
        assert!(feed.is_running());
        feed.start();
        assert!(feed.is_running());

        feed.stop();
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn drop_stops_the_timer() {
        let feed = feed();
        feed.start();
        assert!(feed.is_running());
        drop(feed);
    }
}
