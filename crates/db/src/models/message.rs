use bson::{oid::ObjectId, DateTime};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Replacement body for messages removed by their sender.
pub const TOMBSTONE_CONTENT: &str = "This message was deleted";
/// Replacement body for messages removed by a moderator.
pub const MODERATOR_TOMBSTONE_CONTENT: &str = "[Message deleted by moderator]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub sender: ObjectId,
    pub content: String,
    pub body: MessageBody,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<ObjectId>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
    pub sent_at: DateTime,
    pub edited_at: Option<DateTime>,
    pub deleted_at: Option<DateTime>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub moderation_status: ModerationStatus,
    #[serde(default)]
    pub moderation_log: Vec<ModerationRecord>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn is_read_by(&self, user_id: ObjectId) -> bool {
        self.read_by.iter().any(|r| r.user == user_id)
    }

    pub fn has_reaction(&self, user_id: ObjectId, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user == user_id && r.emoji == emoji)
    }

    /// Logical delete. The entry stays in the log with a placeholder body.
    pub fn tombstone(&mut self, placeholder: &str, at: DateTime) {
        self.content = placeholder.to_string();
        self.is_deleted = true;
        self.deleted_at = Some(at);
        self.attachments.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub user: ObjectId,
    pub emoji: String,
    pub reacted_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user: ObjectId,
    pub read_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Location,
    Voice,
    File,
    System,
    PetProfile,
    PlaydateProposal,
    HealthAlert,
    Compatibility,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Location => "location",
            MessageKind::Voice => "voice",
            MessageKind::File => "file",
            MessageKind::System => "system",
            MessageKind::PetProfile => "pet_profile",
            MessageKind::PlaydateProposal => "playdate_proposal",
            MessageKind::HealthAlert => "health_alert",
            MessageKind::Compatibility => "compatibility",
        }
    }

    /// Kinds whose payload carries an actionable invitation and therefore
    /// starts life in the moderation queue.
    pub fn requires_review(self) -> bool {
        matches!(self, MessageKind::PlaydateProposal | MessageKind::HealthAlert)
    }
}

/// Discriminated message body. Payload-bearing kinds carry exactly their own payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MessageBody {
    Text,
    Image,
    Video,
    Location,
    Voice,
    File,
    System,
    PetProfile(PetProfileCard),
    PlaydateProposal(PlaydateProposal),
    HealthAlert(HealthAlert),
    Compatibility(CompatibilityIndicator),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text => MessageKind::Text,
            MessageBody::Image => MessageKind::Image,
            MessageBody::Video => MessageKind::Video,
            MessageBody::Location => MessageKind::Location,
            MessageBody::Voice => MessageKind::Voice,
            MessageBody::File => MessageKind::File,
            MessageBody::System => MessageKind::System,
            MessageBody::PetProfile(_) => MessageKind::PetProfile,
            MessageBody::PlaydateProposal(_) => MessageKind::PlaydateProposal,
            MessageBody::HealthAlert(_) => MessageKind::HealthAlert,
            MessageBody::Compatibility(_) => MessageKind::Compatibility,
        }
    }

    /// Cancels any invitation carried by the payload. Returns `true` when
    /// something was cancelled.
    pub fn cancel_payload(&mut self) -> bool {
        match self {
            MessageBody::PlaydateProposal(p) if p.status != ProposalStatus::Cancelled => {
                p.status = ProposalStatus::Cancelled;
                true
            }
            MessageBody::HealthAlert(a) if a.status != AlertStatus::Cancelled => {
                a.status = AlertStatus::Cancelled;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetProfileCard {
    pub pet_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub age: Option<u32>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaydateProposal {
    pub proposed_time: chrono::DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub location: Option<Place>,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Proposed,
    Accepted,
    Declined,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAlert {
    pub pet_id: String,
    #[serde(rename = "type")]
    pub alert_type: HealthAlertType,
    pub title: String,
    pub message: String,
    pub priority: AlertPriority,
    pub date: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthAlertType {
    Vaccination,
    VetAppointment,
    Medication,
    HealthUpdate,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Active,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityIndicator {
    /// 0-100.
    pub score: u8,
    #[serde(default)]
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
    Flagged,
}

impl ModerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModerationStatus::None => "none",
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
            ModerationStatus::Flagged => "flagged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub from: ModerationStatus,
    pub to: ModerationStatus,
    pub actor_id: ObjectId,
    pub reason: Option<String>,
    pub at: DateTime,
}
