//! The local store
//!
//! One boundary for every read and write of the persisted keys:
//! - Root document: load, save, and the atomic `update` cycle
//! - Session pointer: load and save (saving `None` removes the key)
//! - Language preference
//!
//! Every save replaces the whole document. `update` commits through the
//! backend's compare-and-set against the exact value it read, so a write
//! from another store or process in between is detected instead of
//! silently overwritten.

use crate::i18n::Language;
use crate::storage::backend::{FileBackend, KeyValueBackend, MemoryBackend};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::{Document, Session};
use crate::storage::watch::{ChangeOrigin, StoreEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// What to do when a stored value cannot be parsed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionPolicy {
    /// Back up the unreadable blob and continue with defaults
    #[default]
    Recover,
    /// Fail with [`StoreError::Corruption`]
    Strict,
}

impl std::str::FromStr for CorruptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recover" => Ok(CorruptionPolicy::Recover),
            "strict" => Ok(CorruptionPolicy::Strict),
            other => Err(format!("unknown corruption policy '{}'", other)),
        }
    }
}

/// Configuration for the local store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key of the root document
    pub data_key: String,
    /// Key of the session pointer
    pub session_key: String,
    /// Key of the language preference
    pub language_key: String,
    /// Handling of unparseable values
    pub corruption_policy: CorruptionPolicy,
    /// Extra attempts `update` makes after detecting a concurrent write
    pub max_update_retries: u32,
    /// Capacity of the change event channel
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_key: "novellahub_data".to_string(),
            session_key: "novellahub_user".to_string(),
            language_key: "novellahub_lng".to_string(),
            corruption_policy: CorruptionPolicy::Recover,
            max_update_retries: 3,
            event_capacity: 256,
        }
    }
}

impl StoreConfig {
    /// Key the unreadable document is copied to under the recover policy
    pub fn corrupt_backup_key(&self) -> String {
        format!("{}.corrupt", self.data_key)
    }

    /// Every key the store owns
    pub fn keys(&self) -> [&str; 3] {
        [&self.data_key, &self.session_key, &self.language_key]
    }
}

#[derive(Deserialize)]
struct RevisionProbe {
    #[serde(default)]
    revision: u64,
}

/// The NovellaHub local store
pub struct LocalStore {
    /// Configuration
    config: StoreConfig,
    /// Host key-value storage
    backend: Arc<dyn KeyValueBackend>,
    /// Serializes read-modify-write cycles through this store
    write_lock: Mutex<()>,
    /// Raw values this store wrote last, per key (lets the watcher tell
    /// local writes from external ones)
    last_written: Mutex<HashMap<String, Option<String>>>,
    /// Change notifications
    events: broadcast::Sender<StoreEvent>,
}

impl LocalStore {
    /// Create a store over any backend
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            backend,
            write_lock: Mutex::new(()),
            last_written: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Create a store over a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), StoreConfig::default())
    }

    /// Create a store persisting into `dir`
    pub fn open(dir: impl Into<PathBuf>, config: StoreConfig) -> StoreResult<Self> {
        let backend = FileBackend::open(dir)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Read the root document, falling back to the seeded default when the
    /// key is absent (or unreadable under [`CorruptionPolicy::Recover`])
    pub fn load(&self) -> StoreResult<Document> {
        let raw = self.backend.get(&self.config.data_key)?;
        self.parse_document(raw.as_deref())
    }

    fn parse_document(&self, raw: Option<&str>) -> StoreResult<Document> {
        let key = &self.config.data_key;
        let Some(raw) = raw else {
            return Ok(Document::default());
        };

        match serde_json::from_str::<Document>(raw) {
            Ok(mut doc) => {
                if doc.ensure_seed_room() {
                    tracing::debug!("Seed room missing from stored document, restored");
                }
                Ok(doc)
            }
            Err(e) => match self.config.corruption_policy {
                CorruptionPolicy::Strict => Err(StoreError::Corruption {
                    key: key.clone(),
                    reason: e.to_string(),
                }),
                CorruptionPolicy::Recover => {
                    let backup = self.config.corrupt_backup_key();
                    tracing::warn!(
                        key = %key,
                        backup = %backup,
                        error = %e,
                        "Stored document is unreadable, continuing with defaults"
                    );
                    self.backend.set(&backup, raw)?;
                    Ok(Document::default())
                }
            },
        }
    }

    /// Overwrite the root document, bumping its revision.
    ///
    /// This is a blind last-write-wins save; prefer [`LocalStore::update`].
    pub fn save(&self, doc: &mut Document) -> StoreResult<()> {
        let _guard = self.lock_writes()?;
        self.write_document(doc)
    }

    /// Read a fresh snapshot and run `f` over it
    pub fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> StoreResult<T> {
        let doc = self.load()?;
        Ok(f(&doc))
    }

    /// Atomic read-modify-write of the root document.
    ///
    /// `f` runs against a fresh snapshot. If it fails nothing is written.
    /// The result is committed only if the stored value is still the one
    /// the snapshot came from; otherwise the cycle is retried with a new
    /// snapshot, up to `max_update_retries` times, then fails with
    /// [`StoreError::Conflict`].
    pub fn update<T, E>(&self, mut f: impl FnMut(&mut Document) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _guard = self.lock_writes()?;
        let key = &self.config.data_key;
        let mut attempt = 0u32;

        loop {
            let raw = self.backend.get(key)?;
            let mut doc = self.parse_document(raw.as_deref())?;
            let base = doc.revision;
            let out = f(&mut doc)?;

            doc.revision += 1;
            let next = serde_json::to_string(&doc).map_err(StoreError::from)?;
            if self.backend.compare_and_set(key, raw.as_deref(), &next)? {
                self.record_write(key, Some(&next))?;
                self.document_saved(doc.revision);
                return Ok(out);
            }

            let found = self.stored_revision()?;
            if attempt < self.config.max_update_retries {
                attempt += 1;
                tracing::warn!(
                    expected = base,
                    found,
                    attempt,
                    "Document changed underneath update, retrying"
                );
                continue;
            }
            return Err(StoreError::Conflict {
                expected: base,
                found,
            }
            .into());
        }
    }

    /// Revision currently persisted (0 if absent or unreadable)
    pub fn stored_revision(&self) -> StoreResult<u64> {
        Ok(self
            .backend
            .get(&self.config.data_key)?
            .and_then(|raw| serde_json::from_str::<RevisionProbe>(&raw).ok())
            .map(|p| p.revision)
            .unwrap_or(0))
    }

    fn write_document(&self, doc: &mut Document) -> StoreResult<()> {
        doc.revision += 1;
        let raw = serde_json::to_string(doc)?;
        self.write_raw(&self.config.data_key, Some(&raw))?;
        self.document_saved(doc.revision);
        Ok(())
    }

    fn document_saved(&self, revision: u64) {
        tracing::debug!(revision, "Saved document");
        self.publish(StoreEvent::DocumentChanged {
            revision,
            origin: ChangeOrigin::Local,
        });
    }

    /// Read the session pointer
    pub fn load_session(&self) -> StoreResult<Option<Session>> {
        let key = &self.config.session_key;
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };

        // The browser client wrote a literal `null` before it learned to remove the key
        match serde_json::from_str::<Option<Session>>(&raw) {
            Ok(session) => Ok(session),
            Err(e) => match self.config.corruption_policy {
                CorruptionPolicy::Strict => Err(StoreError::Corruption {
                    key: key.clone(),
                    reason: e.to_string(),
                }),
                CorruptionPolicy::Recover => {
                    tracing::warn!(key = %key, error = %e, "Stored session is unreadable, ignoring");
                    Ok(None)
                }
            },
        }
    }

    /// Write the session pointer; `None` removes the key
    pub fn save_session(&self, session: Option<&Session>) -> StoreResult<()> {
        let raw = session.map(serde_json::to_string).transpose()?;
        self.write_raw(&self.config.session_key, raw.as_deref())?;

        self.publish(StoreEvent::SessionChanged {
            session: session.cloned(),
            origin: ChangeOrigin::Local,
        });
        Ok(())
    }

    /// Read the language preference; unknown codes read as unset
    pub fn load_language(&self) -> StoreResult<Option<Language>> {
        let Some(raw) = self.backend.get(&self.config.language_key)? else {
            return Ok(None);
        };
        Ok(parse_language(&raw))
    }

    /// Persist the language preference as a bare locale code
    pub fn save_language(&self, language: Language) -> StoreResult<()> {
        self.write_raw(&self.config.language_key, Some(language.code()))?;
        self.publish(StoreEvent::LanguageChanged {
            language: Some(language),
            origin: ChangeOrigin::Local,
        });
        Ok(())
    }

    /// Consume the record of this store's last write under `key`, returning
    /// whether it matches `current`
    pub(crate) fn take_last_written(&self, key: &str, current: &Option<String>) -> bool {
        self.last_written
            .lock()
            .ok()
            .and_then(|mut m| m.remove(key))
            .is_some_and(|written| &written == current)
    }

    fn write_raw(&self, key: &str, raw: Option<&str>) -> StoreResult<()> {
        match raw {
            Some(value) => self.backend.set(key, value)?,
            None => self.backend.remove(key)?,
        }
        self.record_write(key, raw)
    }

    fn record_write(&self, key: &str, raw: Option<&str>) -> StoreResult<()> {
        let mut written = self
            .last_written
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to record write: {}", e)))?;
        written.insert(key.to_string(), raw.map(str::to_string));
        Ok(())
    }

    fn lock_writes(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire store lock: {}", e)))
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let doc = self.load()?;
        Ok(StoreStats {
            users: doc.users.len(),
            rooms: doc.rooms.len(),
            messages: doc.message_count(),
            posts: doc.posts.len(),
            revision: doc.revision,
        })
    }
}

/// Accept both a bare code and a JSON-encoded string
pub(crate) fn parse_language(raw: &str) -> Option<Language> {
    let code = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());
    match code.parse() {
        Ok(lang) => Some(lang),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "Ignoring stored language preference");
            None
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub rooms: usize,
    pub messages: usize,
    pub posts: usize,
    pub revision: u64,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Users: {}, Rooms: {}, Messages: {}, Posts: {}, Revision: {}",
            self.users, self.rooms, self.messages, self.posts, self.revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{Post, PostKind, Room};
    use tempfile::tempdir;

    fn shared_pair() -> (LocalStore, LocalStore) {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
        (
            LocalStore::new(Arc::clone(&backend), StoreConfig::default()),
            LocalStore::new(backend, StoreConfig::default()),
        )
    }

    fn sample_post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            author: "ada".into(),
            author_name: "Ada".into(),
            title: "T".into(),
            content: "C".into(),
            kind: PostKind::Novel,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_load_absent_returns_default() {
        let store = LocalStore::in_memory();
        let doc = store.load().unwrap();
        assert_eq!(doc, Document::default());
    }

    #[test]
    fn test_save_and_load() {
        let store = LocalStore::in_memory();
        let mut doc = store.load().unwrap();
        doc.rooms.push(Room::new("r1", "Poetry"));
        store.save(&mut doc).unwrap();
        assert_eq!(doc.revision, 1);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.rooms.len(), 2);
        assert_eq!(loaded.revision, 1);
    }

    #[test]
    fn test_corrupt_document_recovers_with_backup() {
        let store = LocalStore::in_memory();
        store.backend().set("novellahub_data", "{not json").unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc, Document::default());
        assert_eq!(
            store
                .backend()
                .get("novellahub_data.corrupt")
                .unwrap()
                .as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_corrupt_document_strict_fails() {
        let config = StoreConfig {
            corruption_policy: CorruptionPolicy::Strict,
            ..Default::default()
        };
        let store = LocalStore::new(Arc::new(MemoryBackend::new()), config);
        store.backend().set("novellahub_data", "[]").unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corruption { .. })));
        let result: Result<(), StoreError> = store.update(|_| Ok(()));
        assert!(result.is_err());
        // Nothing was overwritten
        assert_eq!(
            store.backend().get("novellahub_data").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_session_round_trip_and_removal() {
        let store = LocalStore::in_memory();
        assert_eq!(store.load_session().unwrap(), None);

        let session = Session::new("ada", "Ada");
        store.save_session(Some(&session)).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session));

        store.save_session(None).unwrap();
        assert_eq!(store.load_session().unwrap(), None);
        // Removed, not written as a null literal
        assert_eq!(store.backend().get("novellahub_user").unwrap(), None);
    }

    #[test]
    fn test_null_session_literal_reads_as_none() {
        let store = LocalStore::in_memory();
        store.backend().set("novellahub_user", "null").unwrap();
        assert_eq!(store.load_session().unwrap(), None);
    }

    #[test]
    fn test_update_aborts_without_writing_on_error() {
        let store = LocalStore::in_memory();
        let result: Result<(), StoreError> = store.update(|doc| {
            doc.posts.push(sample_post("1"));
            Err(StoreError::InvalidKey("boom".into()))
        });
        assert!(result.is_err());
        assert!(store.backend().get("novellahub_data").unwrap().is_none());
    }

    #[test]
    fn test_update_sees_previous_updates() {
        let (a, b) = shared_pair();
        a.update(|doc| {
            doc.posts.insert(0, sample_post("1"));
            Ok::<_, StoreError>(())
        })
        .unwrap();
        b.update(|doc| {
            doc.posts.insert(0, sample_post("2"));
            Ok::<_, StoreError>(())
        })
        .unwrap();

        let doc = a.load().unwrap();
        let ids: Vec<&str> = doc.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(doc.revision, 2);
    }

    #[test]
    fn test_update_retries_after_external_write() {
        let (a, b) = shared_pair();
        let mut calls = 0;

        a.update(|doc| {
            calls += 1;
            if calls == 1 {
                // Another tab writes between our read and our write
                let mut other = b.load().unwrap();
                other.posts.push(sample_post("theirs"));
                b.save(&mut other).unwrap();
            }
            doc.posts.insert(0, sample_post("ours"));
            Ok::<_, StoreError>(())
        })
        .unwrap();

        assert_eq!(calls, 2);
        let doc = a.load().unwrap();
        assert_eq!(doc.posts.len(), 2);
    }

    #[test]
    fn test_update_gives_up_with_conflict() {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
        let a = LocalStore::new(
            Arc::clone(&backend),
            StoreConfig {
                max_update_retries: 1,
                ..Default::default()
            },
        );
        let b = LocalStore::new(backend, StoreConfig::default());

        let result = a.update(|doc| {
            let mut other = b.load().unwrap();
            b.save(&mut other).unwrap();
            doc.posts.push(sample_post("never"));
            Ok::<_, StoreError>(())
        });

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(a.load().unwrap().posts.is_empty());
    }

    fn concurrent_publish(backend: Arc<dyn KeyValueBackend>, per_thread: usize) {
        let stores = [
            LocalStore::new(Arc::clone(&backend), StoreConfig::default()),
            LocalStore::new(backend, StoreConfig::default()),
        ];

        let committed: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = stores
                .iter()
                .enumerate()
                .map(|(tab, store)| {
                    scope.spawn(move || {
                        let mut ok = Vec::new();
                        for i in 0..per_thread {
                            let id = format!("{}-{}", tab, i);
                            let result = store.update(|doc| {
                                doc.posts.push(sample_post(&id));
                                Ok::<_, StoreError>(())
                            });
                            match result {
                                Ok(()) => ok.push(id),
                                Err(StoreError::Conflict { .. }) => {}
                                Err(e) => panic!("unexpected error: {}", e),
                            }
                        }
                        ok
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let doc = stores[0].load().unwrap();
        assert_eq!(doc.posts.len(), committed.len());
        for id in &committed {
            assert!(doc.posts.iter().any(|p| &p.id == id), "lost update {}", id);
        }
        assert_eq!(doc.revision, committed.len() as u64);
    }

    #[test]
    fn test_concurrent_updates_never_lost_in_memory() {
        concurrent_publish(Arc::new(MemoryBackend::new()), 500);
    }

    #[test]
    fn test_concurrent_updates_never_lost_on_disk() {
        let dir = tempdir().unwrap();
        concurrent_publish(Arc::new(FileBackend::open(dir.path()).unwrap()), 50);
    }

    #[test]
    fn test_partial_theme_keeps_document() {
        let store = LocalStore::in_memory();
        store
            .backend()
            .set(
                "novellahub_data",
                r##"{
                    "users": {
                        "ada": {"name": "Ada", "password": "pw", "theme": {"accent": "#112233"}},
                        "bob": {"name": "Bob", "password": "pw", "theme": {"accent": "#111", "primary": "#222"}}
                    },
                    "posts": [{"id": "1", "author": "ada", "authorName": "Ada", "title": "T",
                               "content": "C", "type": "poem", "createdAt": "2024-01-01T00:00:00.000Z"}]
                }"##,
            )
            .unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.users.len(), 2);
        assert_eq!(doc.posts.len(), 1);
        let theme = doc.user("ada").unwrap().theme.clone().unwrap();
        assert_eq!(theme.accent, "#112233");
        assert_eq!(theme.background, crate::storage::types::DEFAULT_BACKGROUND);
        assert!(store.backend().get("novellahub_data.corrupt").unwrap().is_none());
    }

    #[test]
    fn test_language_round_trip() {
        let store = LocalStore::in_memory();
        assert_eq!(store.load_language().unwrap(), None);

        store.save_language(Language::Bn).unwrap();
        assert_eq!(store.load_language().unwrap(), Some(Language::Bn));
        assert_eq!(
            store.backend().get("novellahub_lng").unwrap().as_deref(),
            Some("bn")
        );

        store.backend().set("novellahub_lng", "\"zh\"").unwrap();
        assert_eq!(store.load_language().unwrap(), Some(Language::Zh));

        store.backend().set("novellahub_lng", "xx").unwrap();
        assert_eq!(store.load_language().unwrap(), None);
    }

    #[test]
    fn test_events_published_on_writes() {
        let store = LocalStore::in_memory();
        let mut rx = store.subscribe();

        store
            .update(|_| Ok::<_, StoreError>(()))
            .unwrap();
        store.save_session(Some(&Session::new("ada", "Ada"))).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::DocumentChanged {
                revision: 1,
                origin: ChangeOrigin::Local
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            StoreEvent::SessionChanged { session: Some(_), .. }
        ));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path(), StoreConfig::default()).unwrap();
            store
                .update(|doc| {
                    doc.posts.push(sample_post("1"));
                    Ok::<_, StoreError>(())
                })
                .unwrap();
        }

        let store = LocalStore::open(dir.path(), StoreConfig::default()).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.posts, 1);
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.revision, 1);
    }

    #[test]
    fn test_corruption_policy_parse() {
        assert_eq!(
            "Strict".parse::<CorruptionPolicy>().unwrap(),
            CorruptionPolicy::Strict
        );
        assert!("lenient".parse::<CorruptionPolicy>().is_err());
    }
}
