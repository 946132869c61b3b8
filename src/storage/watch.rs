//! Change notifications
//!
//! Writes made through a [`LocalStore`] publish a [`StoreEvent`] straight
//! away. Writes made by another process sharing the same backend are only
//! visible by looking, so [`StoreWatcher`] polls the store's keys on an
//! interval and publishes an `External` event whenever a value changes to
//! something this store did not write itself.

use crate::i18n::Language;
use crate::storage::store::{parse_language, LocalStore};
use crate::storage::types::Session;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Where a change came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Written through this store
    Local,
    /// Written by someone else sharing the backend
    External,
}

/// A change to one of the store's keys
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The root document was replaced
    DocumentChanged { revision: u64, origin: ChangeOrigin },
    /// Someone signed in or out
    SessionChanged {
        session: Option<Session>,
        origin: ChangeOrigin,
    },
    /// The language preference changed
    LanguageChanged {
        language: Option<Language>,
        origin: ChangeOrigin,
    },
}

impl StoreEvent {
    pub fn origin(&self) -> ChangeOrigin {
        match self {
            StoreEvent::DocumentChanged { origin, .. }
            | StoreEvent::SessionChanged { origin, .. }
            | StoreEvent::LanguageChanged { origin, .. } => *origin,
        }
    }
}

/// Polls a store's keys for writes from other processes
pub struct StoreWatcher {
    store: Arc<LocalStore>,
    /// Last raw value seen per key
    seen: HashMap<String, Option<String>>,
}

impl StoreWatcher {
    /// Create a watcher, taking the current values as the baseline
    pub fn new(store: Arc<LocalStore>) -> Self {
        let mut watcher = Self {
            store,
            seen: HashMap::new(),
        };
        let keys: Vec<String> = watcher
            .store
            .config()
            .keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        for key in keys {
            let current = watcher.store.backend().get(&key).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "Watcher could not read baseline");
                None
            });
            watcher.seen.insert(key, current);
        }
        watcher
    }

    /// Compare every key with the last poll; publish and return the
    /// external changes found
    pub fn poll(&mut self) -> Vec<StoreEvent> {
        let config = self.store.config().clone();
        let mut events = Vec::new();

        for key in config.keys() {
            let current = match self.store.backend().get(key) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Watcher failed to read key");
                    continue;
                }
            };

            let previous = self.seen.insert(key.to_string(), current.clone());
            if previous.as_ref() == Some(&current) {
                continue;
            }
            if self.store.take_last_written(key, &current) {
                // Our own write; already announced
                continue;
            }

            let event = if key == config.data_key {
                StoreEvent::DocumentChanged {
                    revision: self.store.stored_revision().unwrap_or(0),
                    origin: ChangeOrigin::External,
                }
            } else if key == config.session_key {
                StoreEvent::SessionChanged {
                    session: current
                        .as_deref()
                        .and_then(|raw| serde_json::from_str::<Option<Session>>(raw).ok())
                        .flatten(),
                    origin: ChangeOrigin::External,
                }
            } else {
                StoreEvent::LanguageChanged {
                    language: current.as_deref().and_then(parse_language),
                    origin: ChangeOrigin::External,
                }
            };

            tracing::debug!(key = %key, "External change detected");
            self.store.publish(event.clone());
            events.push(event);
        }

        events
    }

    /// Poll on an interval until `shutdown` flips to true. Backend reads
    /// run on the blocking pool.
    pub fn spawn(
        self,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut watcher = self;
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let polled = tokio::task::spawn_blocking(move || {
                            let mut watcher = watcher;
                            watcher.poll();
                            watcher
                        })
                        .await;
                        watcher = match polled {
                            Ok(watcher) => watcher,
                            Err(e) => {
                                tracing::error!(error = %e, "Store watcher poll failed");
                                break;
                            }
                        };
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Store watcher stopped");
        })
    }
}
