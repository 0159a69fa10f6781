use std::collections::HashMap;

use bson::oid::ObjectId;
use pawchat_config::CallSettings;
use pawchat_db::models::{QualitySample, QualitySummary, UserQuality};

use super::{CallError, CallResult};

pub fn validate(sample: &QualitySample) -> CallResult<()> {
    let fields = [
        ("packetLoss", sample.packet_loss),
        ("latency", sample.latency),
        ("jitter", sample.jitter),
        ("bitrate", sample.bitrate),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(CallError::Validation(format!(
                "{name} must be a non-negative number"
            )));
        }
    }
    if sample.packet_loss > 100.0 {
        return Err(CallError::Validation(
            "packetLoss is a percentage between 0 and 100".to_string(),
        ));
    }
    if sample.frame_rate.is_some_and(|f| !f.is_finite() || f < 0.0) {
        return Err(CallError::Validation(
            "frameRate must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

pub fn is_poor(sample: &QualitySample, settings: &CallSettings) -> bool {
    sample.packet_loss > settings.packet_loss_threshold
        || sample.latency > settings.latency_threshold_ms
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / f64::from(count))
}

/// Latest sample of each side plus the averages across sides.
pub fn summarize(quality: &HashMap<ObjectId, UserQuality>) -> QualitySummary {
    let mut per_user: Vec<UserQuality> = quality.values().cloned().collect();
    per_user.sort_by(|a, b| a.reported_at.cmp(&b.reported_at));

    QualitySummary {
        avg_packet_loss: average(per_user.iter().map(|q| q.sample.packet_loss)),
        avg_latency: average(per_user.iter().map(|q| q.sample.latency)),
        avg_jitter: average(per_user.iter().map(|q| q.sample.jitter)),
        avg_bitrate: average(per_user.iter().map(|q| q.sample.bitrate)),
        per_user,
    }
}
