use bson::oid::ObjectId;
use pawchat_db::models::{Message, ModerationStatus, Reaction};

/// A state change pushed live to connected clients.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    NewMessage {
        match_id: ObjectId,
        message: Box<Message>,
    },
    MessageEdited {
        match_id: ObjectId,
        message: Box<Message>,
    },
    MessageDeleted {
        match_id: ObjectId,
        message_id: ObjectId,
    },
    ReactionAdded {
        match_id: ObjectId,
        message_id: ObjectId,
        reaction: Reaction,
    },
    ReactionRemoved {
        match_id: ObjectId,
        message_id: ObjectId,
        user_id: ObjectId,
        emoji: String,
    },
    MessagesRead {
        match_id: ObjectId,
        user_id: ObjectId,
        count: usize,
    },
    HistoryCleared {
        match_id: ObjectId,
        user_id: ObjectId,
    },
    MessageModerated {
        match_id: ObjectId,
        message_id: ObjectId,
        status: ModerationStatus,
    },
    CallIncoming {
        session_id: String,
        match_id: ObjectId,
        caller_id: ObjectId,
        room_name: String,
        token: String,
        token_placeholder: bool,
    },
    CallAccepted {
        session_id: String,
        room_name: String,
    },
    CallRejected {
        session_id: String,
    },
    CallEnded {
        session_id: String,
        duration_secs: i64,
    },
    CallMissed {
        session_id: String,
    },
    CallMuteChanged {
        session_id: String,
        user_id: ObjectId,
        muted: bool,
    },
    CallVideoChanged {
        session_id: String,
        user_id: ObjectId,
        video_enabled: bool,
    },
    CallCameraSwitched {
        session_id: String,
        user_id: ObjectId,
    },
}

impl RealtimeEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage { .. } => "new_message",
            RealtimeEvent::MessageEdited { .. } => "message_edited",
            RealtimeEvent::MessageDeleted { .. } => "message_deleted",
            RealtimeEvent::ReactionAdded { .. } => "reaction_added",
            RealtimeEvent::ReactionRemoved { .. } => "reaction_removed",
            RealtimeEvent::MessagesRead { .. } => "messages_read",
            RealtimeEvent::HistoryCleared { .. } => "history_cleared",
            RealtimeEvent::MessageModerated { .. } => "message_moderated",
            RealtimeEvent::CallIncoming { .. } => "call_incoming",
            RealtimeEvent::CallAccepted { .. } => "call_accepted",
            RealtimeEvent::CallRejected { .. } => "call_rejected",
            RealtimeEvent::CallEnded { .. } => "call_ended",
            RealtimeEvent::CallMissed { .. } => "call_missed",
            RealtimeEvent::CallMuteChanged { .. } => "call_mute_changed",
            RealtimeEvent::CallVideoChanged { .. } => "call_video_changed",
            RealtimeEvent::CallCameraSwitched { .. } => "call_camera_switched",
        }
    }
}

/// Delivers an event to every live connection of the recipients.
///
/// Fire-and-forget: implementations must not block the caller, and delivery is
/// best-effort. A disconnected recipient simply misses the event.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, recipients: &[ObjectId], event: RealtimeEvent);
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn dispatch(&self, _recipients: &[ObjectId], _event: RealtimeEvent) {}
}
