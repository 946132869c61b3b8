//! Core data types for the NovellaHub local store
//!
//! This module defines the persisted shape of the root document and the
//! session pointer:
//! - `Document`: users, rooms and posts stored under one key
//! - `UserRecord` and `Theme`: account data and saved colors
//! - `Room` and `Message`: chat channels with an append-only log
//! - `Post` and `PostKind`: published works, most recent first
//! - `Session`: the last signed-in user
//!
//! Field names on the wire follow the browser application that first wrote
//! these documents (`authorName`, `createdAt`, `type`).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Id of the room every fresh document starts with
pub const SEED_ROOM_ID: &str = "general";

/// Title of the seed room
pub const SEED_ROOM_TITLE: &str = "General";

/// Author marker stored on posts and messages written without an account
pub const GUEST_AUTHOR: &str = "guest";

/// Display name stored alongside [`GUEST_AUTHOR`]
pub const GUEST_NAME: &str = "Guest";

/// Default accent color
pub const DEFAULT_ACCENT: &str = "#0ea5a4";

/// Default page background color
pub const DEFAULT_BACKGROUND: &str = "#f8fafc";

/// The single JSON blob holding all users, rooms and posts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Accounts keyed by username (case-sensitive)
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
    /// Chat rooms in creation order
    #[serde(default = "seed_rooms")]
    pub rooms: Vec<Room>,
    /// Posts, most recent first
    #[serde(default)]
    pub posts: Vec<Post>,
    /// Write counter, bumped on every save
    #[serde(default)]
    pub revision: u64,
}

fn seed_rooms() -> Vec<Room> {
    vec![Room::new(SEED_ROOM_ID, SEED_ROOM_TITLE)]
}

impl Default for Document {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            rooms: seed_rooms(),
            posts: Vec::new(),
            revision: 0,
        }
    }
}

impl Document {
    /// Look up a user record
    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    /// Look up a user record for mutation
    pub fn user_mut(&mut self, username: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(username)
    }

    /// Look up a room by id
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Look up a room by id for mutation
    pub fn room_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == id)
    }

    /// Re-insert the seed room if a hand-edited document lost it
    pub fn ensure_seed_room(&mut self) -> bool {
        if self.room(SEED_ROOM_ID).is_some() {
            return false;
        }
        self.rooms.insert(0, Room::new(SEED_ROOM_ID, SEED_ROOM_TITLE));
        true
    }

    /// Generate a time-derived room id not yet used in this document
    pub fn next_room_id(&self, now: DateTime<Utc>) -> String {
        time_id(now, |id| self.room(id).is_some())
    }

    /// Generate a time-derived post id not yet used in this document
    pub fn next_post_id(&self, now: DateTime<Utc>) -> String {
        time_id(now, |id| self.posts.iter().any(|p| p.id == id))
    }

    /// Total messages across all rooms
    pub fn message_count(&self) -> usize {
        self.rooms.iter().map(|r| r.messages.len()).sum()
    }
}

/// Build an id from the millisecond timestamp, bumping it until `taken`
/// reports it free.
pub fn time_id(now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let id = millis.to_string();
        if !taken(&id) {
            return id;
        }
        millis += 1;
    }
}

/// Format a timestamp the way the store persists it (ISO-8601, UTC, millis)
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// An account record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// Display name
    pub name: String,
    /// Argon2 PHC string, or plaintext for records written by older clients
    pub password: String,
    /// Saved colors, absent until the user customizes or registers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

/// A user's saved colors
///
/// Older documents wrote `bg` for the background and some wrote `primary`
/// for the accent. Missing or empty colors read as the defaults, so one
/// half-written theme never makes the whole document unreadable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredTheme")]
pub struct Theme {
    pub accent: String,
    pub background: String,
}

/// Every spelling a stored theme may use
#[derive(Deserialize)]
struct StoredTheme {
    #[serde(default)]
    accent: Option<String>,
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    bg: Option<String>,
}

impl From<StoredTheme> for Theme {
    fn from(raw: StoredTheme) -> Self {
        fn pick(preferred: Option<String>, legacy: Option<String>, fallback: &str) -> String {
            preferred
                .into_iter()
                .chain(legacy)
                .find(|c| !c.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        }

        Self {
            accent: pick(raw.accent, raw.primary, DEFAULT_ACCENT),
            background: pick(raw.background, raw.bg, DEFAULT_BACKGROUND),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: DEFAULT_ACCENT.to_string(),
            background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl Theme {
    pub fn new(accent: impl Into<String>, background: impl Into<String>) -> Self {
        Self {
            accent: accent.into().trim().to_string(),
            background: background.into().trim().to_string(),
        }
    }

    /// Both colors are `#rgb` or `#rrggbb` hex strings
    pub fn is_valid(&self) -> bool {
        is_hex_color(&self.accent) && is_hex_color(&self.background)
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// A named chat channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: String,
    pub title: String,
    /// Usernames that joined; order is irrelevant
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Append-only message log
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Room {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            members: BTreeSet::new(),
            messages: Vec::new(),
        }
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.contains(username)
    }

    /// Add a member; returns false if already present
    pub fn add_member(&mut self, username: impl Into<String>) -> bool {
        self.members.insert(username.into())
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Generate a time-derived message id unique within this room
    pub fn next_message_id(&self, now: DateTime<Utc>) -> String {
        time_id(now, |id| self.messages.iter().any(|m| m.id == id))
    }
}

/// A chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    /// Username, or [`GUEST_AUTHOR`]
    pub author: String,
    #[serde(rename = "authorName")]
    pub author_name: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(default)]
    pub reported: bool,
}

impl Message {
    pub fn is_guest(&self) -> bool {
        self.author.eq_ignore_ascii_case(GUEST_AUTHOR)
    }
}

/// Kind of published work
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Novel,
    Poem,
    Song,
}

impl PostKind {
    /// Get all kinds for iteration
    pub fn all() -> &'static [PostKind] {
        &[PostKind::Novel, PostKind::Poem, PostKind::Song]
    }
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostKind::Novel => write!(f, "novel"),
            PostKind::Poem => write!(f, "poem"),
            PostKind::Song => write!(f, "song"),
        }
    }
}

impl std::str::FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "novel" => Ok(PostKind::Novel),
            "poem" => Ok(PostKind::Poem),
            "song" => Ok(PostKind::Song),
            other => Err(format!("unknown post type '{}'", other)),
        }
    }
}

/// A published work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    /// Username, or [`GUEST_AUTHOR`]
    pub author: String,
    #[serde(rename = "authorName")]
    pub author_name: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl Post {
    /// First `limit` characters of the body, with an ellipsis if cut
    pub fn excerpt(&self, limit: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(limit).collect();
        if chars.next().is_some() {
            format!("{}…", head)
        } else {
            head
        }
    }
}

/// The session pointer: who signed in last
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub name: String,
}

impl Session {
    pub fn new(username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
        }
    }
}
