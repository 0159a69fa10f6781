use bson::oid::ObjectId;
use pawchat_db::models::{
    MODERATOR_TOMBSTONE_CONTENT, Message, MessageKind, ModerationRecord, ModerationStatus,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ChatError, ChatResult, ChatService, Target};
use crate::auth::Role;
use crate::dao::base::{PaginatedResult, PaginationParams};
use crate::notify::RealtimeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Submit,
    Approve,
    Reject,
    Flag,
    /// Reject and replace the content with the moderator tombstone.
    Remove,
}

impl ModerationAction {
    pub fn target(self) -> ModerationStatus {
        match self {
            ModerationAction::Submit => ModerationStatus::Pending,
            ModerationAction::Approve => ModerationStatus::Approved,
            ModerationAction::Reject | ModerationAction::Remove => ModerationStatus::Rejected,
            ModerationAction::Flag => ModerationStatus::Flagged,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModerationQueueItem {
    pub match_id: ObjectId,
    pub message: Message,
}

/// Checks a transition against the moderation state machine.
///
/// `none` only leads to `pending`; decisions are taken from `pending` or
/// replace an earlier decision. Nothing leads back to `none`.
fn check_transition(
    message: &Message,
    action: ModerationAction,
) -> ChatResult<ModerationStatus> {
    let from = message.moderation_status;
    let to = action.target();
    match (action, from) {
        (ModerationAction::Submit, ModerationStatus::None) => Ok(to),
        (ModerationAction::Submit, _) => Err(ChatError::Conflict(format!(
            "Message is already {}",
            from.as_str()
        ))),
        (ModerationAction::Remove, _) if message.is_deleted => {
            Err(ChatError::Conflict("Message already removed".to_string()))
        }
        (ModerationAction::Remove, _) => Ok(to),
        (_, ModerationStatus::None) => Err(ChatError::Conflict(
            "Message has not been submitted for review".to_string(),
        )),
        _ if from == to => Err(ChatError::Conflict(format!(
            "Message is already {}",
            to.as_str()
        ))),
        _ => Ok(to),
    }
}

impl ChatService {
    /// Applies a moderator decision to one message and notifies both participants.
    pub async fn moderate(
        &self,
        match_id: ObjectId,
        message_id: ObjectId,
        actor_id: ObjectId,
        role: Role,
        action: ModerationAction,
        reason: Option<String>,
    ) -> ChatResult<Message> {
        if !role.can_moderate() {
            return Err(ChatError::Forbidden(
                "Moderator role required".to_string(),
            ));
        }

        let (m, (message, from)) = self
            .modify(Target::Match(match_id), |m, now| {
                let msg = m
                    .messages
                    .get_mut(message_id)
                    .ok_or_else(|| ChatError::NotFound("Message".to_string()))?;
                let from = msg.moderation_status;
                let to = check_transition(msg, action)?;

                msg.moderation_status = to;
                msg.moderation_log.push(ModerationRecord {
                    from,
                    to,
                    actor_id,
                    reason: reason.clone(),
                    at: now,
                });
                if to == ModerationStatus::Rejected {
                    msg.body.cancel_payload();
                }
                if action == ModerationAction::Remove {
                    msg.tombstone(MODERATOR_TOMBSTONE_CONTENT, now);
                }
                Ok((msg.clone(), from))
            })
            .await?;

        info!(
            %match_id,
            %message_id,
            %actor_id,
            from = from.as_str(),
            to = message.moderation_status.as_str(),
            "Message moderated"
        );
        self.notify(
            &m.participants(),
            RealtimeEvent::MessageModerated {
                match_id,
                message_id,
                status: message.moderation_status,
            },
        );
        Ok(message)
    }

    /// Messages in `status` across all matches, oldest first.
    pub async fn moderation_queue(
        &self,
        role: Role,
        status: ModerationStatus,
        kind: Option<MessageKind>,
        params: &PaginationParams,
    ) -> ChatResult<PaginatedResult<ModerationQueueItem>> {
        if !role.can_moderate() {
            return Err(ChatError::Forbidden(
                "Moderator role required".to_string(),
            ));
        }
        let matches = self.store.find_with_moderation_status(status).await?;

        let mut items: Vec<ModerationQueueItem> = matches
            .iter()
            .flat_map(|m| {
                m.messages
                    .iter()
                    .filter(|msg| msg.moderation_status == status)
                    .filter(|msg| kind.is_none_or(|k| msg.kind() == k))
                    .map(|msg| ModerationQueueItem {
                        match_id: m.id,
                        message: msg.clone(),
                    })
            })
            .collect();
        items.sort_by(|a, b| a.message.sent_at.cmp(&b.message.sent_at));
        let (page, limit) = self.page_bounds(params);
        Ok(PaginatedResult::from_ordered(items, page, limit))
    }
}
