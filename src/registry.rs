use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::ThreadError;
use crate::profile::EngagementProfile;

/// One post within a thread. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyRecord {
    pub character_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_originating_post: bool,
}

/// All engagement state anchored to one content item.
///
/// Invariant: for every character, `replies_by_character[c].len()` never
/// exceeds that character's `max_replies_per_thread`, including the
/// originating post and under concurrent recording.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadEngagementState {
    pub thread_id: String,
    pub original_content_id: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub replies_by_character: BTreeMap<String, Vec<ReplyRecord>>,
    last_author: Option<String>,
}

impl ThreadEngagementState {
    fn new(thread_id: String, content_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            thread_id,
            original_content_id: content_id.to_string(),
            created_at,
            is_active: true,
            replies_by_character: BTreeMap::new(),
            last_author: None,
        }
    }

    fn record(&mut self, character_id: &str, timestamp: DateTime<Utc>, originating: bool) -> ReplyRecord {
        let record = ReplyRecord {
            character_id: character_id.to_string(),
            timestamp,
            is_originating_post: originating,
        };
        self.replies_by_character
            .entry(character_id.to_string())
            .or_default()
            .push(record.clone());
        self.last_author = Some(character_id.to_string());
        record
    }

    fn reply_count(&self, character_id: &str) -> u32 {
        self.replies_by_character
            .get(character_id)
            .map_or(0, |replies| saturating_u32(replies.len()))
    }

    /// Total posts including the originating one.
    pub fn turn_count(&self) -> u32 {
        self.replies_by_character
            .values()
            .map(|replies| saturating_u32(replies.len()))
            .sum()
    }

    /// Distinct characters that have posted.
    pub fn participant_count(&self) -> u32 {
        saturating_u32(self.replies_by_character.len())
    }

    /// Character that posted most recently.
    pub fn last_author(&self) -> Option<&str> {
        self.last_author.as_deref()
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Thread-activity summary consumed by the decision evaluator to compute
/// conversation-momentum boosts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReplyContext {
    pub participant_count: u32,
    pub turn_count: u32,
}

struct RegistryIndex {
    threads: HashMap<String, Arc<Mutex<ThreadEngagementState>>>,
    by_content: HashMap<String, String>,
}

/// Owns all active thread state.
///
/// Arena+index layout: the index lock is held only to look up or create a
/// thread's cell; every mutation happens under the per-thread mutex, which
/// linearizes `record_reply` calls so a racing second call observes the
/// first's effect. An explicit, injected store rather than an ambient
/// singleton, so tests instantiate isolated registries.
pub struct ThreadEngagementRegistry {
    index: Mutex<RegistryIndex>,
}

impl Default for ThreadEngagementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadEngagementRegistry {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(RegistryIndex {
                threads: HashMap::new(),
                by_content: HashMap::new(),
            }),
        }
    }

    fn cell(&self, thread_id: &str) -> Result<Arc<Mutex<ThreadEngagementState>>, ThreadError> {
        let index = self
            .index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        index
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| ThreadError::UnknownThread {
                thread_id: thread_id.to_string(),
            })
    }

    /// Open a thread for a content item, recording the originating post.
    ///
    /// Enforces the one-discoverer invariant at the registry level: a second
    /// attempt for the same content id fails with `DuplicateOrigin` even when
    /// two workers race, since the index lock covers the check and insert.
    pub fn create_thread(
        &self,
        content_id: &str,
        originating_character_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ThreadError> {
        let mut index = self
            .index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if index.by_content.contains_key(content_id) {
            return Err(ThreadError::DuplicateOrigin {
                content_id: content_id.to_string(),
            });
        }

        let thread_id = format!("thread_{}", Uuid::new_v4().simple());
        let mut state = ThreadEngagementState::new(thread_id.clone(), content_id, now);
        state.record(originating_character_id, now, true);

        index
            .by_content
            .insert(content_id.to_string(), thread_id.clone());
        index
            .threads
            .insert(thread_id.clone(), Arc::new(Mutex::new(state)));

        Ok(thread_id)
    }

    /// Advisory check; `record_reply` re-validates atomically at commit time.
    pub fn can_reply(&self, thread_id: &str, profile: &EngagementProfile) -> bool {
        let Ok(cell) = self.cell(thread_id) else {
            return false;
        };
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.is_active && state.reply_count(&profile.character_id) < profile.max_replies_per_thread
    }

    /// Append a reply, re-checking the preconditions under the thread lock.
    ///
    /// Two workers racing to reply for the same character will have the
    /// second observe the first's effect and fail `ReplyBudgetExceeded` once
    /// the budget is exhausted.
    pub fn record_reply(
        &self,
        thread_id: &str,
        profile: &EngagementProfile,
        now: DateTime<Utc>,
    ) -> Result<ReplyRecord, ThreadError> {
        let cell = self.cell(thread_id)?;
        let mut state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !state.is_active {
            return Err(ThreadError::ThreadInactive {
                thread_id: thread_id.to_string(),
            });
        }
        if state.reply_count(&profile.character_id) >= profile.max_replies_per_thread {
            return Err(ThreadError::ReplyBudgetExceeded {
                thread_id: thread_id.to_string(),
                character_id: profile.character_id.clone(),
            });
        }

        Ok(state.record(&profile.character_id, now, false))
    }

    /// Idempotent. Replies are preserved; only further recording stops.
    pub fn deactivate(&self, thread_id: &str) {
        if let Ok(cell) = self.cell(thread_id) {
            let mut state = cell
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.is_active = false;
        }
    }

    /// Momentum inputs for the decision evaluator.
    pub fn reply_context(&self, thread_id: &str) -> Option<ReplyContext> {
        let cell = self.cell(thread_id).ok()?;
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Some(ReplyContext {
            participant_count: state.participant_count(),
            turn_count: state.turn_count(),
        })
    }

    pub fn last_author(&self, thread_id: &str) -> Option<String> {
        let cell = self.cell(thread_id).ok()?;
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.last_author().map(str::to_string)
    }

    pub fn active_threads(&self) -> Vec<String> {
        let index = self
            .index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ids: Vec<String> = index
            .threads
            .iter()
            .filter(|(_, cell)| {
                cell.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .is_active
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn thread_for_content(&self, content_id: &str) -> Option<String> {
        let index = self
            .index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        index.by_content.get(content_id).cloned()
    }

    /// Copy of a thread's state for observability and tests.
    pub fn snapshot(&self, thread_id: &str) -> Option<ThreadEngagementState> {
        let cell = self.cell(thread_id).ok()?;
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Some(state.clone())
    }
}
