use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiating,
    Ringing,
    Active,
    Ended,
    Rejected,
    Missed,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Rejected | CallStatus::Missed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Initiating => "initiating",
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
            CallStatus::Rejected => "rejected",
            CallStatus::Missed => "missed",
        }
    }
}

/// One client-side quality measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySample {
    /// Percent, 0-100.
    pub packet_loss: f64,
    /// Round-trip latency in milliseconds.
    pub latency: f64,
    pub jitter: f64,
    /// Kilobits per second.
    pub bitrate: f64,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuality {
    pub user_id: ObjectId,
    pub sample: QualitySample,
    pub reported_at: DateTime,
}

/// Aggregated quality for a finished call: the last sample of each side plus averages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitySummary {
    #[serde(default)]
    pub per_user: Vec<UserQuality>,
    pub avg_packet_loss: Option<f64>,
    pub avg_latency: Option<f64>,
    pub avg_jitter: Option<f64>,
    pub avg_bitrate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub session_id: String,
    pub match_id: ObjectId,
    pub caller_id: ObjectId,
    pub receiver_id: ObjectId,
    pub status: CallStatus,
    pub room_name: String,
    pub started_at: Option<DateTime>,
    pub ended_at: DateTime,
    pub duration_secs: i64,
    #[serde(default)]
    pub quality: QualitySummary,
}

impl CallHistoryEntry {
    pub const COLLECTION: &'static str = "call_history";
}
