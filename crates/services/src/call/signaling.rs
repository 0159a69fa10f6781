use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use pawchat_config::CallSettings;
use pawchat_db::models::{
    CallHistoryEntry, CallStatus, Match, MatchStatus, QualitySample, UserQuality,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::registry::SessionRegistry;
use super::telemetry;
use super::token::{MediaGrant, MediaToken, MediaTokenIssuer};
use super::{CallError, CallResult, CallSession, new_session_id};
use crate::clock::Clock;
use crate::dao::base::DaoError;
use crate::dao::call_history::CallHistoryStore;
use crate::dao::match_store::MatchStore;
use crate::notify::{Notifier, RealtimeEvent};

/// Returned to the caller of [`CallService::initiate`].
#[derive(Debug, Clone)]
pub struct InitiatedCall {
    pub session: CallSession,
    pub token: MediaToken,
    pub server_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinToken {
    pub session_id: String,
    pub room_name: String,
    pub token: MediaToken,
    pub can_publish: bool,
    pub server_url: String,
}

/// Call lifecycle: `initiating -> ringing -> active -> ended`, with `rejected`
/// and `missed` as the other terminal states.
#[derive(Clone)]
pub struct CallService {
    matches: Arc<dyn MatchStore>,
    history: Arc<dyn CallHistoryStore>,
    registry: Arc<dyn SessionRegistry>,
    tokens: Arc<dyn MediaTokenIssuer>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: CallSettings,
    server_url: String,
}

impl CallService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        matches: Arc<dyn MatchStore>,
        history: Arc<dyn CallHistoryStore>,
        registry: Arc<dyn SessionRegistry>,
        tokens: Arc<dyn MediaTokenIssuer>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: CallSettings,
        server_url: String,
    ) -> Self {
        Self {
            matches,
            history,
            registry,
            tokens,
            notifier,
            clock,
            settings,
            server_url,
        }
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistry> {
        &self.registry
    }

    async fn load_match_for(&self, match_id: ObjectId, user_id: ObjectId) -> CallResult<Match> {
        match self.matches.find_by_id(match_id).await {
            Ok(m) if m.is_participant(user_id) => Ok(m),
            Ok(_) | Err(DaoError::NotFound) => Err(CallError::NotFound("Match".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Session visible to `user_id`; sessions of other people look absent.
    fn session_for(&self, session_id: &str, user_id: ObjectId) -> CallResult<CallSession> {
        self.registry
            .get(session_id)
            .filter(|s| s.is_participant(user_id))
            .ok_or_else(|| CallError::NotFound("Call session".to_string()))
    }

    fn grant(
        &self,
        session: &CallSession,
        user_id: ObjectId,
        can_publish: bool,
    ) -> CallResult<MediaToken> {
        self.tokens.issue(&MediaGrant {
            room_name: session.room_name.clone(),
            identity: user_id.to_hex(),
            can_publish,
            can_subscribe: true,
        })
    }

    pub async fn initiate(
        &self,
        match_id: ObjectId,
        caller_id: ObjectId,
        receiver_id: ObjectId,
    ) -> CallResult<InitiatedCall> {
        if caller_id == receiver_id {
            return Err(CallError::Validation("You cannot call yourself".to_string()));
        }
        let m = self.load_match_for(match_id, caller_id).await?;
        if m.counterpart(caller_id) != Some(receiver_id) {
            return Err(CallError::Forbidden(
                "Receiver is not part of this match".to_string(),
            ));
        }
        if m.status != MatchStatus::Active {
            return Err(CallError::Conflict("Match is not active".to_string()));
        }
        if m.is_blocked_by(receiver_id) {
            return Err(CallError::Forbidden(
                "You cannot call this match".to_string(),
            ));
        }

        let session = CallSession::new(
            new_session_id(),
            match_id,
            caller_id,
            receiver_id,
            self.clock.now(),
        );
        let session_id = session.session_id.clone();
        self.registry.insert_exclusive(session.clone())?;

        let tokens = self
            .grant(&session, caller_id, true)
            .and_then(|caller| Ok((caller, self.grant(&session, receiver_id, false)?)));
        let (caller_token, receiver_token) = match tokens {
            Ok(pair) => pair,
            Err(e) => {
                self.registry.remove(&session_id);
                error!(%match_id, %session_id, %e, "Media token issuance failed");
                return Err(e);
            }
        };

        let session = self.registry.update(&session_id, &mut |s| {
            s.status = CallStatus::Ringing;
            Ok(())
        })?;

        info!(%match_id, %session_id, %caller_id, %receiver_id, "Call initiated");
        self.notifier.dispatch(
            &[receiver_id],
            RealtimeEvent::CallIncoming {
                session_id: session_id.clone(),
                match_id,
                caller_id,
                room_name: session.room_name.clone(),
                token: receiver_token.token,
                token_placeholder: receiver_token.placeholder,
            },
        );
        self.schedule_ring_timeout(session_id);

        Ok(InitiatedCall {
            session,
            token: caller_token,
            server_url: self.server_url.clone(),
        })
    }

    /// Fresh token for a participant. Only the caller, or the receiver once
    /// the call is active, may publish.
    pub fn get_token(&self, session_id: &str, user_id: ObjectId) -> CallResult<JoinToken> {
        let session = self.session_for(session_id, user_id)?;
        if !session.is_live() {
            return Err(CallError::Conflict(format!(
                "Call is {}",
                session.status.as_str()
            )));
        }
        let can_publish = user_id == session.caller_id || session.status == CallStatus::Active;
        let token = self.grant(&session, user_id, can_publish)?;
        Ok(JoinToken {
            session_id: session.session_id,
            room_name: session.room_name,
            token,
            can_publish,
            server_url: self.server_url.clone(),
        })
    }

    pub fn accept(&self, session_id: &str, user_id: ObjectId) -> CallResult<JoinToken> {
        let session = self.session_for(session_id, user_id)?;
        if session.receiver_id != user_id {
            return Err(CallError::Forbidden(
                "Only the receiver can accept this call".to_string(),
            ));
        }
        let token = self.grant(&session, user_id, true)?;

        let now = self.clock.now();
        let session = self.registry.update(session_id, &mut |s| {
            if s.status != CallStatus::Ringing {
                return Err(CallError::Conflict(format!(
                    "Call is {}",
                    s.status.as_str()
                )));
            }
            s.status = CallStatus::Active;
            s.started_at = Some(now);
            Ok(())
        })?;

        info!(match_id = %session.match_id, %session_id, "Call accepted");
        self.notifier.dispatch(
            &[session.caller_id],
            RealtimeEvent::CallAccepted {
                session_id: session.session_id.clone(),
                room_name: session.room_name.clone(),
            },
        );
        Ok(JoinToken {
            session_id: session.session_id,
            room_name: session.room_name,
            token,
            can_publish: true,
            server_url: self.server_url.clone(),
        })
    }

    pub fn reject(&self, session_id: &str, user_id: ObjectId) -> CallResult<CallSession> {
        let session = self.session_for(session_id, user_id)?;
        if session.receiver_id != user_id {
            return Err(CallError::Forbidden(
                "Only the receiver can reject this call".to_string(),
            ));
        }

        let now = self.clock.now();
        let session = self.registry.update(session_id, &mut |s| {
            if s.status != CallStatus::Ringing {
                return Err(CallError::Conflict(format!(
                    "Call is {}",
                    s.status.as_str()
                )));
            }
            s.status = CallStatus::Rejected;
            s.ended_at = Some(now);
            Ok(())
        })?;

        info!(match_id = %session.match_id, %session_id, "Call rejected");
        self.notifier.dispatch(
            &[session.caller_id],
            RealtimeEvent::CallRejected {
                session_id: session.session_id.clone(),
            },
        );
        self.schedule_eviction(session.session_id.clone());
        Ok(session)
    }

    /// Hangs up. An active call becomes `ended` and is written to history; a
    /// call that never connected becomes `missed`.
    pub async fn end(&self, session_id: &str, user_id: ObjectId) -> CallResult<CallSession> {
        self.session_for(session_id, user_id)?;

        let now = self.clock.now();
        let session = self.registry.update(session_id, &mut |s| {
            s.status = match s.status {
                CallStatus::Active => CallStatus::Ended,
                CallStatus::Initiating | CallStatus::Ringing => CallStatus::Missed,
                done => {
                    return Err(CallError::Conflict(format!("Call is {}", done.as_str())));
                }
            };
            s.ended_at = Some(now);
            Ok(())
        })?;

        let recorded = if session.status == CallStatus::Ended {
            self.record(&session).await
        } else {
            Ok(())
        };

        let duration_secs = session.duration_secs();
        info!(
            match_id = %session.match_id,
            %session_id,
            status = session.status.as_str(),
            duration_secs,
            "Call finished"
        );
        let event = match session.status {
            CallStatus::Ended => RealtimeEvent::CallEnded {
                session_id: session.session_id.clone(),
                duration_secs,
            },
            _ => RealtimeEvent::CallMissed {
                session_id: session.session_id.clone(),
            },
        };
        if let Some(other) = session.counterpart(user_id) {
            self.notifier.dispatch(&[other], event);
        }
        self.schedule_eviction(session.session_id.clone());

        recorded?;
        Ok(session)
    }

    async fn record(&self, session: &CallSession) -> CallResult<()> {
        let entry = CallHistoryEntry {
            id: None,
            session_id: session.session_id.clone(),
            match_id: session.match_id,
            caller_id: session.caller_id,
            receiver_id: session.receiver_id,
            status: session.status,
            room_name: session.room_name.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at.unwrap_or_else(|| self.clock.now()),
            duration_secs: session.duration_secs(),
            quality: telemetry::summarize(&session.quality),
        };
        self.history.insert(&entry).await.map_err(|e| {
            error!(session_id = %session.session_id, %e, "Failed to record call history");
            CallError::from(e)
        })
    }

    /// Moves a call nobody answered to `missed`. Returns `None` when the call
    /// already left the ringing phase.
    pub fn expire_ringing(&self, session_id: &str) -> Option<CallSession> {
        let now = self.clock.now();
        let session = self
            .registry
            .update(session_id, &mut |s| {
                if !matches!(s.status, CallStatus::Initiating | CallStatus::Ringing) {
                    return Err(CallError::Conflict(String::new()));
                }
                s.status = CallStatus::Missed;
                s.ended_at = Some(now);
                Ok(())
            })
            .ok()?;

        info!(match_id = %session.match_id, %session_id, "Call not answered");
        self.notifier.dispatch(
            &[session.caller_id, session.receiver_id],
            RealtimeEvent::CallMissed {
                session_id: session.session_id.clone(),
            },
        );
        self.schedule_eviction(session.session_id.clone());
        Some(session)
    }

    fn active_session(&self, session_id: &str, user_id: ObjectId) -> CallResult<CallSession> {
        let session = self.session_for(session_id, user_id)?;
        if session.status != CallStatus::Active {
            return Err(CallError::Conflict("Call is not active".to_string()));
        }
        Ok(session)
    }

    fn relay(&self, session: &CallSession, user_id: ObjectId, event: RealtimeEvent) {
        if let Some(other) = session.counterpart(user_id) {
            self.notifier.dispatch(&[other], event);
        }
    }

    pub fn toggle_mute(&self, session_id: &str, user_id: ObjectId, muted: bool) -> CallResult<()> {
        let session = self.active_session(session_id, user_id)?;
        self.relay(
            &session,
            user_id,
            RealtimeEvent::CallMuteChanged {
                session_id: session.session_id.clone(),
                user_id,
                muted,
            },
        );
        Ok(())
    }

    pub fn toggle_video(
        &self,
        session_id: &str,
        user_id: ObjectId,
        video_enabled: bool,
    ) -> CallResult<()> {
        let session = self.active_session(session_id, user_id)?;
        self.relay(
            &session,
            user_id,
            RealtimeEvent::CallVideoChanged {
                session_id: session.session_id.clone(),
                user_id,
                video_enabled,
            },
        );
        Ok(())
    }

    pub fn switch_camera(&self, session_id: &str, user_id: ObjectId) -> CallResult<()> {
        let session = self.active_session(session_id, user_id)?;
        self.relay(
            &session,
            user_id,
            RealtimeEvent::CallCameraSwitched {
                session_id: session.session_id.clone(),
                user_id,
            },
        );
        Ok(())
    }

    /// Keeps only the latest sample per participant.
    pub fn report_quality(
        &self,
        session_id: &str,
        user_id: ObjectId,
        sample: QualitySample,
    ) -> CallResult<()> {
        telemetry::validate(&sample)?;
        self.active_session(session_id, user_id)?;

        let now = self.clock.now();
        self.registry.update(session_id, &mut |s| {
            if s.status != CallStatus::Active {
                return Err(CallError::Conflict("Call is not active".to_string()));
            }
            s.quality.insert(
                user_id,
                UserQuality {
                    user_id,
                    sample: sample.clone(),
                    reported_at: now,
                },
            );
            Ok(())
        })?;

        if telemetry::is_poor(&sample, &self.settings) {
            warn!(
                %session_id,
                %user_id,
                packet_loss = sample.packet_loss,
                latency = sample.latency,
                jitter = sample.jitter,
                bitrate = sample.bitrate,
                "Poor call quality reported"
            );
        }
        Ok(())
    }

    /// The live session of a match, if any.
    pub async fn get_active_call(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
    ) -> CallResult<Option<CallSession>> {
        self.load_match_for(match_id, user_id).await?;
        Ok(self.registry.live_for_match(match_id))
    }

    pub async fn history(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
        limit: Option<usize>,
    ) -> CallResult<Vec<CallHistoryEntry>> {
        self.load_match_for(match_id, user_id).await?;
        let limit = limit
            .unwrap_or(self.settings.default_history_limit)
            .clamp(1, self.settings.default_history_limit.max(1) * 2);
        Ok(self.history.list_for_match(match_id, limit).await?)
    }

    fn schedule_eviction(&self, session_id: String) {
        let registry = self.registry.clone();
        let grace = Duration::from_secs(self.settings.eviction_grace_secs);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if registry.remove(&session_id).is_some() {
                debug!(%session_id, "Call session evicted");
            }
        });
    }

    fn schedule_ring_timeout(&self, session_id: String) {
        if self.settings.ring_timeout_secs == 0 {
            return;
        }
        let service = self.clone();
        let timeout = Duration::from_secs(self.settings.ring_timeout_secs);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            service.expire_ringing(&session_id);
        });
    }
}
