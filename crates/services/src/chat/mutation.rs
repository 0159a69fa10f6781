use bson::{DateTime, oid::ObjectId};
use pawchat_db::models::{
    Attachment, Match, MatchStatus, Message, MessageBody, MessageKind, ModerationRecord,
    ModerationStatus, Reaction, ReadReceipt, TOMBSTONE_CONTENT,
};
use serde::Deserialize;
use tracing::info;

use super::{ChatError, ChatResult, ChatService, Target, require_participant};
use crate::clock::millis_between;
use crate::notify::RealtimeEvent;

/// Input of [`ChatService::send`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessage {
    pub content: Option<String>,
    pub kind: Option<MessageKind>,
    /// Kind-specific payload; required for payload-bearing kinds.
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<ObjectId>,
}

impl SendMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

fn build_body(kind: MessageKind, payload: Option<serde_json::Value>) -> ChatResult<MessageBody> {
    let body = match kind {
        MessageKind::Text => MessageBody::Text,
        MessageKind::Image => MessageBody::Image,
        MessageKind::Video => MessageBody::Video,
        MessageKind::Location => MessageBody::Location,
        MessageKind::Voice => MessageBody::Voice,
        MessageKind::File => MessageBody::File,
        MessageKind::System => MessageBody::System,
        MessageKind::PetProfile
        | MessageKind::PlaydateProposal
        | MessageKind::HealthAlert
        | MessageKind::Compatibility => {
            let payload = payload.ok_or_else(|| {
                ChatError::Validation(format!("{} messages require a payload", kind.as_str()))
            })?;
            serde_json::from_value(serde_json::json!({ "kind": kind, "payload": payload }))
                .map_err(|e| {
                    ChatError::Validation(format!("Invalid {} payload: {e}", kind.as_str()))
                })?
        }
    };
    Ok(body)
}

/// Readable fallback text for payload messages sent without content.
fn summary_of(body: &MessageBody) -> Option<String> {
    match body {
        MessageBody::PetProfile(card) => Some(format!("Shared {}'s profile", card.name)),
        MessageBody::PlaydateProposal(p) => Some(format!(
            "Playdate proposed for {}",
            p.proposed_time.format("%Y-%m-%d %H:%M UTC")
        )),
        MessageBody::HealthAlert(alert) => Some(alert.title.clone()),
        MessageBody::Compatibility(c) => Some(format!("Compatibility score: {}%", c.score)),
        _ => None,
    }
}

impl ChatService {
    /// Appends a message to the match log and notifies the counterpart.
    pub async fn send(
        &self,
        match_id: ObjectId,
        sender_id: ObjectId,
        input: SendMessage,
    ) -> ChatResult<Message> {
        let kind = input.kind.unwrap_or(MessageKind::Text);
        let body = build_body(kind, input.payload)?;
        let content = match input.content {
            Some(c) if !c.trim().is_empty() => c,
            _ => summary_of(&body).unwrap_or_default(),
        };
        if content.trim().is_empty() && input.attachments.is_empty() {
            return Err(ChatError::Validation(
                "Message content or attachment is required".to_string(),
            ));
        }
        if content.chars().count() > self.settings.max_content_len {
            return Err(ChatError::Validation(format!(
                "Message content cannot exceed {} characters",
                self.settings.max_content_len
            )));
        }

        let message_id = ObjectId::new();
        let (_, (message, counterpart)) = self
            .modify(Target::Match(match_id), |m, now| {
                let counterpart = m
                    .counterpart(sender_id)
                    .ok_or_else(|| ChatError::NotFound("Match".to_string()))?;
                if m.status != MatchStatus::Active {
                    return Err(ChatError::Conflict("Match is not active".to_string()));
                }
                if m.is_blocked_by(counterpart) {
                    return Err(ChatError::Forbidden(
                        "You cannot send messages to this match".to_string(),
                    ));
                }
                if let Some(reply_to) = input.reply_to
                    && !m.messages.contains(reply_to)
                {
                    return Err(ChatError::Validation(
                        "Replied-to message does not exist in this match".to_string(),
                    ));
                }

                let mut message = Message {
                    id: message_id,
                    sender: sender_id,
                    content: content.clone(),
                    body: body.clone(),
                    attachments: input.attachments.clone(),
                    reply_to: input.reply_to,
                    reactions: Vec::new(),
                    read_by: vec![ReadReceipt {
                        user: sender_id,
                        read_at: now,
                    }],
                    sent_at: now,
                    edited_at: None,
                    deleted_at: None,
                    is_edited: false,
                    is_deleted: false,
                    moderation_status: ModerationStatus::None,
                    moderation_log: Vec::new(),
                };
                if kind.requires_review() {
                    message.moderation_status = ModerationStatus::Pending;
                    message.moderation_log.push(ModerationRecord {
                        from: ModerationStatus::None,
                        to: ModerationStatus::Pending,
                        actor_id: sender_id,
                        reason: None,
                        at: now,
                    });
                }

                m.last_activity = now;
                m.last_message_at = Some(now);
                Ok((m.messages.push(message).clone(), counterpart))
            })
            .await?;

        info!(%match_id, message_id = %message.id, kind = kind.as_str(), "Message sent");
        self.notify(
            &[counterpart],
            RealtimeEvent::NewMessage {
                match_id,
                message: Box::new(message.clone()),
            },
        );
        Ok(message)
    }

    /// Rewrites the content of a text message within the edit window.
    pub async fn edit(
        &self,
        message_id: ObjectId,
        editor_id: ObjectId,
        new_content: &str,
    ) -> ChatResult<Message> {
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(ChatError::Validation("Message content is required".to_string()));
        }
        if new_content.chars().count() > self.settings.max_content_len {
            return Err(ChatError::Validation(format!(
                "Message content cannot exceed {} characters",
                self.settings.max_content_len
            )));
        }
        let window_ms = self.settings.edit_window_secs * 1000;

        let (m, (message, counterpart)) = self
            .modify(Target::Message(message_id), |m, now| {
                let counterpart = require_participant(m, editor_id)?;
                let msg = message_mut(m, message_id)?;
                if msg.sender != editor_id {
                    return Err(ChatError::Forbidden(
                        "You can only edit your own messages".to_string(),
                    ));
                }
                if msg.kind() != MessageKind::Text {
                    return Err(ChatError::Validation(
                        "Only text messages can be edited".to_string(),
                    ));
                }
                if msg.is_deleted {
                    return Err(ChatError::Conflict("Message has been deleted".to_string()));
                }
                if millis_between(msg.sent_at, now) > window_ms {
                    return Err(ChatError::WindowExpired(
                        "Messages can only be edited within 5 minutes of sending".to_string(),
                    ));
                }
                msg.content = new_content.to_string();
                msg.is_edited = true;
                msg.edited_at = Some(now);
                Ok((msg.clone(), counterpart))
            })
            .await?;

        self.notify(
            &[counterpart],
            RealtimeEvent::MessageEdited {
                match_id: m.id,
                message: Box::new(message.clone()),
            },
        );
        Ok(message)
    }

    /// Tombstones the sender's own message within the delete window.
    pub async fn delete(
        &self,
        message_id: ObjectId,
        requester_id: ObjectId,
    ) -> ChatResult<Message> {
        let window_ms = self.settings.delete_window_secs * 1000;

        let (m, (message, counterpart)) = self
            .modify(Target::Message(message_id), |m, now| {
                let counterpart = require_participant(m, requester_id)?;
                let msg = message_mut(m, message_id)?;
                if msg.sender != requester_id {
                    return Err(ChatError::Forbidden(
                        "You can only delete your own messages".to_string(),
                    ));
                }
                if msg.is_deleted {
                    return Err(ChatError::Conflict("Message already deleted".to_string()));
                }
                if millis_between(msg.sent_at, now) > window_ms {
                    return Err(ChatError::WindowExpired(
                        "Messages can only be deleted within 1 hour of sending".to_string(),
                    ));
                }
                msg.tombstone(TOMBSTONE_CONTENT, now);
                msg.body.cancel_payload();
                Ok((msg.clone(), counterpart))
            })
            .await?;

        info!(match_id = %m.id, %message_id, "Message deleted");
        self.notify(
            &[counterpart],
            RealtimeEvent::MessageDeleted {
                match_id: m.id,
                message_id,
            },
        );
        Ok(message)
    }

    pub async fn add_reaction(
        &self,
        message_id: ObjectId,
        user_id: ObjectId,
        emoji: &str,
    ) -> ChatResult<Message> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ChatError::Validation("Emoji is required".to_string()));
        }

        let (m, (message, reaction, counterpart)) = self
            .modify(Target::Message(message_id), |m, now| {
                let counterpart = require_participant(m, user_id)?;
                let msg = message_mut(m, message_id)?;
                if msg.is_deleted {
                    return Err(ChatError::Conflict(
                        "Cannot react to a deleted message".to_string(),
                    ));
                }
                if msg.has_reaction(user_id, emoji) {
                    return Err(ChatError::Conflict("Reaction already exists".to_string()));
                }
                let reaction = Reaction {
                    user: user_id,
                    emoji: emoji.to_string(),
                    reacted_at: now,
                };
                msg.reactions.push(reaction.clone());
                Ok((msg.clone(), reaction, counterpart))
            })
            .await?;

        self.notify(
            &[counterpart],
            RealtimeEvent::ReactionAdded {
                match_id: m.id,
                message_id,
                reaction,
            },
        );
        Ok(message)
    }

    pub async fn remove_reaction(
        &self,
        message_id: ObjectId,
        user_id: ObjectId,
        emoji: &str,
    ) -> ChatResult<Message> {
        let (m, (message, counterpart)) = self
            .modify(Target::Message(message_id), |m, _| {
                let counterpart = require_participant(m, user_id)?;
                let msg = message_mut(m, message_id)?;
                let pos = msg
                    .reactions
                    .iter()
                    .position(|r| r.user == user_id && r.emoji == emoji)
                    .ok_or_else(|| ChatError::NotFound("Reaction".to_string()))?;
                msg.reactions.remove(pos);
                Ok((msg.clone(), counterpart))
            })
            .await?;

        self.notify(
            &[counterpart],
            RealtimeEvent::ReactionRemoved {
                match_id: m.id,
                message_id,
                user_id,
                emoji: emoji.to_string(),
            },
        );
        Ok(message)
    }

    /// Adds a read receipt for every message the caller has not read yet.
    /// Returns how many messages were marked.
    pub async fn mark_read(&self, match_id: ObjectId, user_id: ObjectId) -> ChatResult<usize> {
        let (_, (count, counterpart)) = self
            .modify(Target::Match(match_id), |m, now| {
                let counterpart = m
                    .counterpart(user_id)
                    .ok_or_else(|| ChatError::NotFound("Match".to_string()))?;
                let mut count = 0;
                for msg in m.messages.iter_mut().filter(|msg| !msg.is_read_by(user_id)) {
                    msg.read_by.push(ReadReceipt {
                        user: user_id,
                        read_at: now,
                    });
                    count += 1;
                }
                Ok((count, counterpart))
            })
            .await?;

        if count > 0 {
            self.notify(
                &[counterpart],
                RealtimeEvent::MessagesRead {
                    match_id,
                    user_id,
                    count,
                },
            );
        }
        Ok(count)
    }

    /// Blocks or unblocks the counterpart from sending into this match.
    pub async fn set_blocked(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
        blocked: bool,
    ) -> ChatResult<Match> {
        let (m, ()) = self
            .modify(Target::Match(match_id), |m, now| {
                if !m.is_participant(user_id) {
                    return Err(ChatError::NotFound("Match".to_string()));
                }
                if blocked && !m.is_blocked_by(user_id) {
                    m.blocked_by.push(user_id);
                } else if !blocked {
                    m.blocked_by.retain(|u| *u != user_id);
                }
                m.last_activity = now;
                Ok(())
            })
            .await?;
        info!(%match_id, %user_id, blocked, "Match block state changed");
        Ok(m)
    }

    /// Tombstones the whole log. The log keeps its length.
    pub async fn clear_history(&self, match_id: ObjectId, user_id: ObjectId) -> ChatResult<usize> {
        let (_, (cleared, counterpart)) = self
            .modify(Target::Match(match_id), |m, now| {
                let counterpart = m
                    .counterpart(user_id)
                    .ok_or_else(|| ChatError::NotFound("Match".to_string()))?;
                let mut cleared = 0;
                for msg in m.messages.iter_mut().filter(|msg| !msg.is_deleted) {
                    msg.tombstone(TOMBSTONE_CONTENT, now);
                    msg.body.cancel_payload();
                    cleared += 1;
                }
                m.last_message_at = None;
                Ok((cleared, counterpart))
            })
            .await?;

        info!(%match_id, %user_id, cleared, "Chat history cleared");
        self.notify(
            &[counterpart],
            RealtimeEvent::HistoryCleared { match_id, user_id },
        );
        Ok(cleared)
    }
}

fn message_mut(m: &mut Match, message_id: ObjectId) -> ChatResult<&mut Message> {
    m.messages
        .get_mut(message_id)
        .ok_or_else(|| ChatError::NotFound("Message".to_string()))
}
