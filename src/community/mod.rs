//! Community operations
//!
//! [`Community`] is what the interface calls: accounts and sessions,
//! posts, rooms and themes. Every mutation is one [`LocalStore::update`]
//! cycle, gated on the signed-in session where the operation needs one.
//!
//! - **accounts**: register, login, logout, rename, save theme
//! - **posts**: publish and list posts
//! - **rooms**: create, join, send, report
//! - **credentials**: password hashing
//!
//! # Example
//!
//! ```rust,no_run
//! use novellahub::community::{Community, Sender};
//! use novellahub::storage::{LocalStore, PostKind};
//! use novellahub::theme::CssVariables;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LocalStore::in_memory());
//!     let mut hub = Community::new(store, Box::new(CssVariables::new()));
//!     hub.restore_session()?;
//!
//!     hub.register("ada", "secret", Some("Ada"))?;
//!     hub.publish("Tide", "The sea came in", PostKind::Poem)?;
//!     hub.send_message("general", "hello", Sender::Guest)?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod credentials;
pub mod error;
pub mod posts;
pub mod rooms;

pub use credentials::Credentials;
pub use error::{CommunityError, CommunityResult};
pub use rooms::Sender;

use crate::i18n::Language;
use crate::storage::{LocalStore, Session};
use crate::theme::{apply_saved_theme, ThemeTarget};
use std::sync::Arc;

/// The signed-in view of the store
pub struct Community {
    store: Arc<LocalStore>,
    credentials: Credentials,
    session: Option<Session>,
    theme: Box<dyn ThemeTarget>,
}

impl Community {
    /// Create with no one signed in; call [`Community::restore_session`]
    /// to pick up the last session
    pub fn new(store: Arc<LocalStore>, theme: Box<dyn ThemeTarget>) -> Self {
        Self {
            store,
            credentials: Credentials::default(),
            session: None,
            theme,
        }
    }

    /// Use custom password hashing parameters
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The signed-in user, if any
    pub fn current_user(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The presentation context themes are applied to
    pub fn theme(&self) -> &dyn ThemeTarget {
        self.theme.as_ref()
    }

    /// Restore the last signed-in user and apply their saved theme.
    ///
    /// A session pointing at a user that no longer exists is cleared.
    pub fn restore_session(&mut self) -> CommunityResult<Option<Session>> {
        let Some(session) = self.store.load_session()? else {
            tracing::debug!("No stored session, keeping default theme");
            self.session = None;
            return Ok(None);
        };

        let doc = self.store.load()?;
        if doc.user(&session.username).is_none() {
            tracing::warn!(user = %session.username, "Stored session refers to unknown user, clearing");
            self.store.save_session(None)?;
            self.session = None;
            return Ok(None);
        }

        if !apply_saved_theme(&doc, &session.username, self.theme.as_mut()) {
            self.theme.reset();
        }
        tracing::info!(user = %session.username, "Restored session");
        self.session = Some(session.clone());
        Ok(Some(session))
    }

    /// Preferred interface language (English when unset)
    pub fn language(&self) -> CommunityResult<Language> {
        Ok(self.store.load_language()?.unwrap_or_default())
    }

    pub fn set_language(&self, language: Language) -> CommunityResult<()> {
        self.store.save_language(language)?;
        tracing::info!(language = %language, "Language changed");
        Ok(())
    }

    fn require_session(&self, action: &'static str) -> CommunityResult<&Session> {
        self.session
            .as_ref()
            .ok_or(CommunityError::NotSignedIn(action))
    }
}

/// Reject empty or whitespace-only input
pub(crate) fn required<'a>(field: &str, value: &'a str) -> CommunityResult<&'a str> {
    if value.trim().is_empty() {
        Err(CommunityError::Validation(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::{KeyValueBackend, MemoryBackend, StoreConfig};
    use crate::theme::CssVariables;

    pub fn credentials() -> Credentials {
        Credentials::new(64, 1, 1).unwrap()
    }

    pub fn community() -> Community {
        community_on(Arc::new(LocalStore::in_memory()))
    }

    pub fn community_on(store: Arc<LocalStore>) -> Community {
        Community::new(store, Box::new(CssVariables::new())).with_credentials(credentials())
    }

    /// Two communities over one backend, like two browser tabs
    pub fn two_tabs() -> (Community, Community) {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
        (
            community_on(Arc::new(LocalStore::new(
                Arc::clone(&backend),
                StoreConfig::default(),
            ))),
            community_on(Arc::new(LocalStore::new(backend, StoreConfig::default()))),
        )
    }
}
