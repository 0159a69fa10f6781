use std::collections::{HashMap, HashSet};

use bson::{DateTime, oid::ObjectId};
use pawchat_db::models::{Match, MatchStatus, Message};
use serde::Serialize;
use tracing::info;

use super::{ChatError, ChatResult, ChatService};
use crate::clock::Clock;
use crate::dao::base::{PaginatedResult, PaginationParams};

const RECENT_ACTIVITY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: PaginatedResult<Message>,
    /// Messages in the whole match the caller has not read.
    pub unread_count: usize,
    pub match_status: MatchStatus,
    /// The caller has blocked the counterpart.
    pub blocked: bool,
    /// The counterpart has blocked the caller, so sending is refused.
    pub blocked_by_counterpart: bool,
}

/// Full message log of a match, in send order, as handed to a participant.
#[derive(Debug, Clone)]
pub struct ChatExport {
    pub match_id: ObjectId,
    pub exported_at: DateTime,
    pub messages: Vec<Message>,
}

/// A message with every reply that chains back to it.
#[derive(Debug, Clone)]
pub struct ThreadNode {
    pub message: Message,
    pub children: Vec<ThreadNode>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatStats {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub unread_messages: usize,
    /// Active matches with a message in the last 24 hours.
    pub recent_activity: usize,
    pub average_messages_per_conversation: usize,
}

/// Newest first. Messages sharing a timestamp keep reverse log order.
fn newest_first<'a>(messages: impl Iterator<Item = &'a Message>) -> Vec<Message> {
    let mut ordered: Vec<(usize, &Message)> = messages.enumerate().collect();
    ordered.sort_by(|(pa, a), (pb, b)| b.sent_at.cmp(&a.sent_at).then(pb.cmp(pa)));
    ordered.into_iter().map(|(_, m)| m.clone()).collect()
}

impl ChatService {
    pub(crate) fn page_bounds(&self, params: &PaginationParams) -> (u64, u64) {
        params.resolve(self.settings.default_page_size, self.settings.max_page_size)
    }

    pub async fn list_messages(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
        params: &PaginationParams,
    ) -> ChatResult<MessagePage> {
        let m = self.load_for(match_id, user_id).await?;
        let (page, limit) = self.page_bounds(params);

        let blocked_by_counterpart = m
            .counterpart(user_id)
            .is_some_and(|other| m.is_blocked_by(other));
        Ok(MessagePage {
            messages: PaginatedResult::from_ordered(newest_first(m.messages.iter()), page, limit),
            unread_count: m.unread_count(user_id),
            match_status: m.status,
            blocked: m.is_blocked_by(user_id),
            blocked_by_counterpart,
        })
    }

    /// Snapshot of the whole log for a participant, tombstones included.
    pub async fn export_chat(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
    ) -> ChatResult<ChatExport> {
        let m = self.load_for(match_id, user_id).await?;
        let export = ChatExport {
            match_id: m.id,
            exported_at: self.clock.now(),
            messages: m.messages.iter().cloned().collect(),
        };
        info!(%match_id, %user_id, messages = export.messages.len(), "Chat exported");
        Ok(export)
    }

    /// Case-insensitive substring search over messages that are not deleted.
    pub async fn search_messages(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
        query: &str,
        params: &PaginationParams,
    ) -> ChatResult<PaginatedResult<Message>> {
        let query = query.trim();
        if query.chars().count() < self.settings.min_search_len {
            return Err(ChatError::Validation(format!(
                "Search query must be at least {} characters",
                self.settings.min_search_len
            )));
        }
        let m = self.load_for(match_id, user_id).await?;
        let (page, limit) = self.page_bounds(params);

        let needle = query.to_lowercase();
        let hits = newest_first(
            m.messages
                .iter()
                .filter(|msg| !msg.is_deleted && msg.content.to_lowercase().contains(&needle)),
        );
        Ok(PaginatedResult::from_ordered(hits, page, limit))
    }

    /// Builds the reply tree under `root_id`. Children keep log order.
    pub async fn get_thread(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
        root_id: ObjectId,
    ) -> ChatResult<ThreadNode> {
        let m = self.load_for(match_id, user_id).await?;
        build_thread(&m, root_id).ok_or_else(|| ChatError::NotFound("Message".to_string()))
    }

    pub async fn stats(&self, user_id: ObjectId) -> ChatResult<ChatStats> {
        let matches = self
            .store
            .find_for_user(user_id, Some(MatchStatus::Active))
            .await?;
        let now = self.clock.now();

        let mut stats = ChatStats {
            total_conversations: matches.len(),
            ..ChatStats::default()
        };
        for m in &matches {
            stats.total_messages += m.messages.len();
            stats.unread_messages += m.unread_count(user_id);
            if m.last_message_at.is_some_and(|at| is_recent(at, now)) {
                stats.recent_activity += 1;
            }
        }
        if stats.total_conversations > 0 {
            stats.average_messages_per_conversation = (stats.total_messages as f64
                / stats.total_conversations as f64)
                .round() as usize;
        }
        Ok(stats)
    }
}

fn is_recent(at: DateTime, now: DateTime) -> bool {
    now.timestamp_millis() - at.timestamp_millis() <= RECENT_ACTIVITY_MS
}

/// Iterative so that long reply chains cannot exhaust the stack.
fn build_thread(m: &Match, root_id: ObjectId) -> Option<ThreadNode> {
    m.messages.get(root_id)?;

    let mut children: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    for msg in m.messages.iter() {
        if let Some(parent) = msg.reply_to {
            children.entry(parent).or_default().push(msg.id);
        }
    }

    // Pre-order walk, then assemble bottom-up in reverse so every child node
    // exists before its parent claims it.
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().rev());
        }
    }

    let mut built: HashMap<ObjectId, ThreadNode> = HashMap::new();
    for id in order.into_iter().rev() {
        let message = m.messages.get(id)?.clone();
        let nodes = children
            .get(&id)
            .map(|kids| kids.iter().filter_map(|k| built.remove(k)).collect())
            .unwrap_or_default();
        built.insert(
            id,
            ThreadNode {
                message,
                children: nodes,
            },
        );
    }
    built.remove(&root_id)
}
