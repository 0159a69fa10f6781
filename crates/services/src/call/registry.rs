use bson::oid::ObjectId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CallError, CallResult, CallSession};

/// Table of call sessions keyed by session id.
///
/// The in-memory implementation is process-local: running more than one API
/// instance requires an implementation over a shared store.
pub trait SessionRegistry: Send + Sync {
    /// Inserts the session unless its match already has a live one.
    fn insert_exclusive(&self, session: CallSession) -> CallResult<()>;
    fn get(&self, session_id: &str) -> Option<CallSession>;
    /// Runs `apply` on the stored session and returns the updated copy.
    /// Nothing is changed when `apply` fails.
    fn update(
        &self,
        session_id: &str,
        apply: &mut dyn FnMut(&mut CallSession) -> CallResult<()>,
    ) -> CallResult<CallSession>;
    fn remove(&self, session_id: &str) -> Option<CallSession>;
    fn live_for_match(&self, match_id: ObjectId) -> Option<CallSession>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemorySessionRegistry {
    sessions: DashMap<String, CallSession>,
    /// match id -> id of its live session
    live_by_match: DashMap<ObjectId, String>,
}

impl InMemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|s| s.is_live())
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn insert_exclusive(&self, session: CallSession) -> CallResult<()> {
        match self.live_by_match.entry(session.match_id) {
            Entry::Occupied(mut entry) => {
                if self.is_live(entry.get()) {
                    return Err(CallError::Conflict(
                        "A call is already in progress for this match".to_string(),
                    ));
                }
                entry.insert(session.session_id.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(session.session_id.clone());
            }
        }
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn get(&self, session_id: &str) -> Option<CallSession> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    fn update(
        &self,
        session_id: &str,
        apply: &mut dyn FnMut(&mut CallSession) -> CallResult<()>,
    ) -> CallResult<CallSession> {
        let updated = {
            let mut stored = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| CallError::NotFound("Call session".to_string()))?;
            let mut draft = stored.clone();
            apply(&mut draft)?;
            *stored = draft.clone();
            draft
        };
        if !updated.is_live() {
            self.live_by_match
                .remove_if(&updated.match_id, |_, live| live == session_id);
        }
        Ok(updated)
    }

    fn remove(&self, session_id: &str) -> Option<CallSession> {
        let (_, removed) = self.sessions.remove(session_id)?;
        self.live_by_match
            .remove_if(&removed.match_id, |_, live| live == session_id);
        Some(removed)
    }

    fn live_for_match(&self, match_id: ObjectId) -> Option<CallSession> {
        let session_id = self.live_by_match.get(&match_id)?.clone();
        self.get(&session_id).filter(|s| s.is_live())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
