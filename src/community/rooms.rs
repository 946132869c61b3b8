//! Rooms and messages

use crate::community::error::{CommunityError, CommunityResult};
use crate::community::{required, Community};
use crate::storage::types::iso_timestamp;
use crate::storage::{Message, Room, GUEST_AUTHOR, GUEST_NAME};
use chrono::Utc;

/// Who a message is sent as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The signed-in user
    Member,
    /// Anonymous, regardless of any session
    Guest,
}

fn room_not_found(id: &str) -> CommunityError {
    CommunityError::NotFound(format!("room {}", id))
}

impl Community {
    /// Create a room; requires a session
    pub fn create_room(&self, title: &str) -> CommunityResult<Room> {
        let user = self.require_session("create a room")?;
        let title = required("room title", title)?.trim().to_string();

        let room = self.store.update(|doc| {
            let room = Room::new(doc.next_room_id(Utc::now()), title.clone());
            doc.rooms.push(room.clone());
            Ok::<_, CommunityError>(room)
        })?;

        tracing::info!(room_id = %room.id, user = %user.username, "Created room");
        Ok(room)
    }

    /// Join a room; requires a session. Returns false if already a member.
    pub fn join_room(&self, room_id: &str) -> CommunityResult<bool> {
        let username = self.require_session("join rooms")?.username.clone();

        let joined = self.store.update(|doc| {
            let room = doc.room_mut(room_id).ok_or_else(|| room_not_found(room_id))?;
            Ok::<_, CommunityError>(room.add_member(username.clone()))
        })?;

        if joined {
            tracing::info!(room_id = %room_id, user = %username, "Joined room");
        }
        Ok(joined)
    }

    /// Append a message to a room's log
    pub fn send_message(&self, room_id: &str, text: &str, sender: Sender) -> CommunityResult<Message> {
        required("message", text)?;

        let (author, author_name) = match sender {
            Sender::Guest => (GUEST_AUTHOR.to_string(), GUEST_NAME.to_string()),
            Sender::Member => {
                let user = self.require_session("send messages")?;
                (user.username.clone(), user.name.clone())
            }
        };

        let message = self.store.update(|doc| {
            let room = doc.room_mut(room_id).ok_or_else(|| room_not_found(room_id))?;
            let now = Utc::now();
            let message = Message {
                id: room.next_message_id(now),
                author: author.clone(),
                author_name: author_name.clone(),
                text: text.to_string(),
                created_at: iso_timestamp(now),
                reported: false,
            };
            room.messages.push(message.clone());
            Ok::<_, CommunityError>(message)
        })?;

        tracing::debug!(room_id = %room_id, message_id = %message.id, author = %message.author, "Sent message");
        Ok(message)
    }

    /// Flag a message for moderation
    pub fn report_message(&self, room_id: &str, message_id: &str) -> CommunityResult<Message> {
        let message = self.store.update(|doc| {
            let room = doc.room_mut(room_id).ok_or_else(|| room_not_found(room_id))?;
            let message = room.message_mut(message_id).ok_or_else(|| {
                CommunityError::NotFound(format!("message {} in room {}", message_id, room_id))
            })?;
            message.reported = true;
            Ok::<_, CommunityError>(message.clone())
        })?;

        tracing::info!(room_id = %room_id, message_id = %message_id, "Reported message");
        Ok(message)
    }

    /// All rooms in creation order
    pub fn rooms(&self) -> CommunityResult<Vec<Room>> {
        Ok(self.store.read(|doc| doc.rooms.clone())?)
    }

    /// One room with its members and messages
    pub fn room(&self, room_id: &str) -> CommunityResult<Room> {
        self.store
            .read(|doc| doc.room(room_id).cloned())?
            .ok_or_else(|| room_not_found(room_id))
    }
}
