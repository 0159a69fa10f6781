use std::collections::HashMap;

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::message::Message;

/// The aggregate root: two users, their two pets, and the conversation log.
///
/// Persisted as one document and always written back whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user1: ObjectId,
    pub user2: ObjectId,
    pub pet1: ObjectId,
    pub pet2: ObjectId,
    pub status: MatchStatus,
    #[serde(default)]
    pub blocked_by: Vec<ObjectId>,
    pub last_activity: DateTime,
    pub last_message_at: Option<DateTime>,
    /// Bumped on every save; a save against a stale version is rejected.
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub messages: MatchLog,
    pub created_at: DateTime,
}

impl Match {
    pub const COLLECTION: &'static str = "matches";

    pub fn new(user1: ObjectId, user2: ObjectId, pet1: ObjectId, pet2: ObjectId) -> Self {
        let now = DateTime::now();
        Self {
            id: ObjectId::new(),
            user1,
            user2,
            pet1,
            pet2,
            status: MatchStatus::Active,
            blocked_by: Vec::new(),
            last_activity: now,
            last_message_at: None,
            version: 0,
            messages: MatchLog::default(),
            created_at: now,
        }
    }

    pub fn is_participant(&self, user_id: ObjectId) -> bool {
        self.user1 == user_id || self.user2 == user_id
    }

    pub fn participants(&self) -> [ObjectId; 2] {
        [self.user1, self.user2]
    }

    /// The other participant, or `None` when `user_id` is not part of the match.
    pub fn counterpart(&self, user_id: ObjectId) -> Option<ObjectId> {
        if self.user1 == user_id {
            Some(self.user2)
        } else if self.user2 == user_id {
            Some(self.user1)
        } else {
            None
        }
    }

    pub fn is_blocked_by(&self, user_id: ObjectId) -> bool {
        self.blocked_by.contains(&user_id)
    }

    pub fn unread_count(&self, user_id: ObjectId) -> usize {
        self.messages.iter().filter(|m| !m.is_read_by(user_id)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Archived,
    Blocked,
    Deleted,
    Completed,
}

/// Ordered message log with an id index kept beside the entries.
///
/// Serialized as a plain array; the index is rebuilt on load. Message ids are
/// assigned once at send time and never rewritten, which keeps the index valid
/// across `get_mut`.
#[derive(Debug, Clone, Default)]
pub struct MatchLog {
    entries: Vec<Message>,
    index: HashMap<ObjectId, usize>,
}

impl MatchLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, message: Message) -> &Message {
        let pos = self.entries.len();
        self.index.insert(message.id, pos);
        self.entries.push(message);
        &self.entries[pos]
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Message> {
        self.index.get(&id).map(|&pos| &self.entries[pos])
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Message> {
        match self.index.get(&id) {
            Some(&pos) => self.entries.get_mut(pos),
            None => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Message> {
        self.entries.iter_mut()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }
}

impl From<Vec<Message>> for MatchLog {
    fn from(entries: Vec<Message>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(pos, m)| (m.id, pos))
            .collect();
        Self { entries, index }
    }
}

impl Serialize for MatchLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MatchLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Message>::deserialize(deserializer).map(MatchLog::from)
    }
}
