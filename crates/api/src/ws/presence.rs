use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::{Message, WebSocket};
use bson::oid::ObjectId;
use dashmap::DashMap;
use futures::stream::SplitSink;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

struct Socket<S> {
    sender: S,
    typing_in: Option<ObjectId>,
}

/// What a closed socket leaves behind for its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub user_id: ObjectId,
    /// True when this was the user's last open socket.
    pub went_offline: bool,
    /// Match the socket was typing in when it closed.
    pub typing_in: Option<ObjectId>,
}

/// Which pet owners are connected, on which sockets, and where they are typing.
///
/// A user may hold several sockets at once (phone and desktop). Typing state is
/// per socket so closing one tab only stops the indicator that tab started.
pub struct Presence<S = WsSender> {
    users: DashMap<ObjectId, HashMap<Uuid, Socket<S>>>,
    owners: DashMap<Uuid, ObjectId>,
}

impl<S: Clone> Presence<S> {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// Registers a socket and returns its connection id.
    pub fn join(&self, user_id: ObjectId, sender: S) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.users.entry(user_id).or_default().insert(
            connection_id,
            Socket {
                sender,
                typing_in: None,
            },
        );
        self.owners.insert(connection_id, user_id);
        connection_id
    }

    pub fn leave(&self, connection_id: Uuid) -> Option<Departure> {
        let (_, user_id) = self.owners.remove(&connection_id)?;
        let typing_in = self
            .users
            .get_mut(&user_id)
            .and_then(|mut sockets| sockets.remove(&connection_id))
            .and_then(|socket| socket.typing_in);
        let went_offline = self
            .users
            .remove_if(&user_id, |_, sockets| sockets.is_empty())
            .is_some();
        Some(Departure {
            user_id,
            went_offline,
            typing_in,
        })
    }

    pub fn senders(&self, user_id: &ObjectId) -> Vec<S> {
        self.users
            .get(user_id)
            .map(|sockets| sockets.values().map(|s| s.sender.clone()).collect())
            .unwrap_or_default()
    }

    pub fn sender(&self, connection_id: Uuid) -> Option<S> {
        let user_id = *self.owners.get(&connection_id)?;
        self.users
            .get(&user_id)?
            .get(&connection_id)
            .map(|s| s.sender.clone())
    }

    pub fn is_online(&self, user_id: &ObjectId) -> bool {
        self.users.contains_key(user_id)
    }

    /// Records the match a socket is typing in and returns the previous one.
    pub fn set_typing(&self, connection_id: Uuid, match_id: Option<ObjectId>) -> Option<ObjectId> {
        let user_id = *self.owners.get(&connection_id)?;
        let mut sockets = self.users.get_mut(&user_id)?;
        let socket = sockets.get_mut(&connection_id)?;
        std::mem::replace(&mut socket.typing_in, match_id)
    }

    pub fn online_users(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }
}

impl<S: Clone> Default for Presence<S> {
    fn default() -> Self {
        Self::new()
    }
}
