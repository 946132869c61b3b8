//! Accounts, sessions and themes

use crate::community::credentials::is_hashed;
use crate::community::error::{CommunityError, CommunityResult};
use crate::community::{required, Community};
use crate::storage::{Session, Theme, UserRecord};
use crate::theme::apply_saved_theme;

impl Community {
    /// Create an account and sign it in.
    ///
    /// The display name defaults to the username; the theme currently in
    /// effect becomes the account's saved theme.
    pub fn register(
        &mut self,
        username: &str,
        password: &str,
        name: Option<&str>,
    ) -> CommunityResult<Session> {
        let username = required("username", username)?;
        if username.trim() != username {
            return Err(CommunityError::Validation(
                "username cannot start or end with whitespace".to_string(),
            ));
        }
        let username = username.to_string();
        required("password", password)?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&username)
            .to_string();

        if self.store.read(|doc| doc.user(&username).is_some())? {
            return Err(CommunityError::UsernameTaken(username));
        }

        let password_hash = self.credentials.hash(password)?;
        let theme = self.theme.current();

        self.store.update(|doc| {
            if doc.users.contains_key(&username) {
                return Err(CommunityError::UsernameTaken(username.clone()));
            }
            doc.users.insert(
                username.clone(),
                UserRecord {
                    name: name.clone(),
                    password: password_hash.clone(),
                    theme: Some(theme.clone()),
                },
            );
            Ok(())
        })?;

        tracing::info!(user = %username, "Registered user");
        self.sign_in(Session::new(username, name))
    }

    /// Sign in with a username and password
    pub fn login(&mut self, username: &str, password: &str) -> CommunityResult<Session> {
        let record = self
            .store
            .read(|doc| doc.user(username).cloned())?
            .ok_or(CommunityError::InvalidCredentials)?;

        if !self.credentials.verify(&record.password, password) {
            tracing::info!(user = %username, "Rejected sign-in");
            return Err(CommunityError::InvalidCredentials);
        }

        if !is_hashed(&record.password) {
            self.upgrade_password(username, &record.password, password)?;
        }

        self.sign_in(Session::new(username, record.name))
    }

    /// Replace a legacy plaintext password with a hash
    fn upgrade_password(&self, username: &str, legacy: &str, password: &str) -> CommunityResult<()> {
        let hash = self.credentials.hash(password)?;
        self.store.update(|doc| {
            // Leave it alone if someone changed it meanwhile
            if let Some(user) = doc.user_mut(username).filter(|u| u.password == legacy) {
                user.password = hash.clone();
            }
            Ok::<_, CommunityError>(())
        })?;
        tracing::info!(user = %username, "Upgraded plaintext password to hash");
        Ok(())
    }

    fn sign_in(&mut self, session: Session) -> CommunityResult<Session> {
        self.store.save_session(Some(&session))?;

        let doc = self.store.load()?;
        if !apply_saved_theme(&doc, &session.username, self.theme.as_mut()) {
            self.theme.reset();
        }

        tracing::info!(user = %session.username, "Signed in");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Sign out: clear the session pointer and return to the default theme
    pub fn logout(&mut self) -> CommunityResult<()> {
        self.store.save_session(None)?;
        self.theme.reset();
        if let Some(session) = self.session.take() {
            tracing::info!(user = %session.username, "Signed out");
        }
        Ok(())
    }

    /// Change the signed-in user's display name
    pub fn rename(&mut self, name: &str) -> CommunityResult<Session> {
        let name = required("name", name)?.trim().to_string();
        let username = self.require_session("change your name")?.username.clone();

        self.store.update(|doc| {
            let user = doc
                .user_mut(&username)
                .ok_or_else(|| CommunityError::NotFound(format!("user {}", username)))?;
            user.name = name.clone();
            Ok::<_, CommunityError>(())
        })?;

        let session = Session::new(username, name);
        self.store.save_session(Some(&session))?;
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Save and apply the signed-in user's theme; other users' records are
    /// untouched
    pub fn save_theme(&mut self, theme: Theme) -> CommunityResult<()> {
        if !theme.is_valid() {
            return Err(CommunityError::Validation(format!(
                "colors must be #rgb or #rrggbb, got accent {:?} and background {:?}",
                theme.accent, theme.background
            )));
        }
        let username = self.require_session("save a theme")?.username.clone();

        self.store.update(|doc| {
            let user = doc
                .user_mut(&username)
                .ok_or_else(|| CommunityError::NotFound(format!("user {}", username)))?;
            user.theme = Some(theme.clone());
            Ok::<_, CommunityError>(())
        })?;

        self.theme.apply(&theme);
        tracing::info!(user = %username, accent = %theme.accent, background = %theme.background, "Saved theme");
        Ok(())
    }
}
