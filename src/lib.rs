//! # NovellaHub
//!
//! Local-first data layer for a small "publish and discuss" community:
//! accounts, posts, chat rooms, per-user themes and language preference,
//! all persisted as JSON values in a key-value store.
//!
//! ## Features
//!
//! - **One boundary**: every read and write goes through [`storage::LocalStore`]
//! - **Atomic updates**: read-modify-write under a lock, with a revision
//!   check that catches writers in other processes
//! - **Corruption policy**: recover with a backup, or fail loudly
//! - **Change events**: local and external writes published on a broadcast channel
//! - **Theme sync**: the signed-in user's colors follow them across sessions
//!
//! ## Modules
//!
//! - [`storage`]: Document types, backends, the store and its watcher
//! - [`community`]: Accounts, posts and rooms
//! - [`theme`]: Applying saved themes to a presentation context
//! - [`i18n`]: Interface language preference
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use novellahub::{Community, CssVariables, LocalStore, PostKind, StoreConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LocalStore::open("./data", StoreConfig::default())?);
//!     let mut hub = Community::new(store, Box::new(CssVariables::new()));
//!
//!     // Pick up whoever signed in last and apply their theme
//!     hub.restore_session()?;
//!
//!     if hub.current_user().is_none() {
//!         hub.register("ada", "correct horse", Some("Ada"))?;
//!     }
//!
//!     hub.publish("Tide", "The sea came in at noon", PostKind::Poem)?;
//!     println!("{} posts", hub.posts()?.len());
//!
//!     Ok(())
//! }
//! ```

pub mod community;
pub mod config;
pub mod i18n;
pub mod storage;
pub mod theme;

// Re-export top-level types for convenience
pub use storage::{
    ChangeOrigin, CorruptionPolicy, Document, FileBackend, KeyValueBackend, LocalStore,
    MemoryBackend, Message, Post, PostKind, Room, Session, StoreConfig, StoreError, StoreEvent,
    StoreResult, StoreStats, StoreWatcher, Theme, UserRecord,
};

pub use community::{Community, CommunityError, CommunityResult, Credentials, Sender};

pub use theme::{CssVariables, ThemeTarget};

pub use i18n::Language;

pub use config::{AuthConfig, Config, ConfigError, LoggingConfig, WatchConfig};
