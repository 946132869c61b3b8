//! NovellaHub Local Store
//!
//! This module provides the persisted state of the site:
//!
//! - **types**: Root document, users, rooms, messages, posts, session
//! - **backend**: Key-value backends (memory, directory of files)
//! - **store**: The single read/write boundary over the backend
//! - **watch**: Change events and the external-write poller
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Update Path:
//!   lock → load (snapshot) → mutate → revision check → save (whole document) → event
//!
//! Read Path:
//!   load → parse (corrupt → policy) → snapshot
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use novellahub::storage::{LocalStore, StoreConfig, StoreError, Room};
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = LocalStore::open("./data", StoreConfig::default())?;
//!
//!     store.update(|doc| {
//!         doc.rooms.push(Room::new("poetry", "Poetry"));
//!         Ok::<_, StoreError>(())
//!     })?;
//!
//!     let rooms = store.read(|doc| doc.rooms.len())?;
//!     println!("{} rooms", rooms);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod store;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use error::{StoreError, StoreResult};
pub use store::{CorruptionPolicy, LocalStore, StoreConfig, StoreStats};
pub use types::{
    Document, Message, Post, PostKind, Room, Session, Theme, UserRecord, GUEST_AUTHOR,
    GUEST_NAME, SEED_ROOM_ID,
};
pub use watch::{ChangeOrigin, StoreEvent, StoreWatcher};
