use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::profile::EngagementProfile;

/// Mutable per-character interaction counters.
///
/// Owned exclusively by the [`RateLimiter`]; the 24h counter is reset by an
/// external daily-rollover process via [`RateLimiter::reset_daily_counts`].
#[derive(Debug, Clone, Serialize)]
pub struct CharacterRuntimeState {
    pub character_id: String,
    pub interaction_count_24h: u32,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl CharacterRuntimeState {
    fn new(character_id: &str) -> Self {
        Self {
            character_id: character_id.to_string(),
            interaction_count_24h: 0,
            last_interaction_at: None,
        }
    }
}

/// Tracks per-character interaction counters and answers "is character X
/// eligible to act right now".
///
/// The outer map lock is held only to fetch or insert a character's cell;
/// mutation happens under the per-character mutex, so concurrent workers
/// touching different characters never contend.
#[derive(Debug, Default)]
pub struct RateLimiter {
    states: Mutex<HashMap<String, Arc<Mutex<CharacterRuntimeState>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, character_id: &str) -> Arc<Mutex<CharacterRuntimeState>> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            states
                .entry(character_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CharacterRuntimeState::new(character_id)))),
        )
    }

    /// False while the cooldown window is open or the daily cap is reached.
    /// A failed check is a pure boolean, never an error.
    pub fn is_eligible(&self, profile: &EngagementProfile, now: DateTime<Utc>) -> bool {
        let cell = self.cell(&profile.character_id);
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if state.interaction_count_24h >= profile.max_daily_interactions {
            return false;
        }
        if let Some(last) = state.last_interaction_at {
            if now - last < Duration::minutes(profile.cooldown_minutes) {
                return false;
            }
        }
        true
    }

    /// Commit one interaction. Callers invoke this exactly once per
    /// successful engagement; it is deliberately not idempotent.
    pub fn record_interaction(&self, character_id: &str, now: DateTime<Utc>) {
        let cell = self.cell(character_id);
        let mut state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.interaction_count_24h = state.interaction_count_24h.saturating_add(1);
        state.last_interaction_at = Some(now);
    }

    /// Copy of a character's counters for observability and selection.
    pub fn runtime_snapshot(&self, character_id: &str) -> CharacterRuntimeState {
        let cell = self.cell(character_id);
        let state = cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.clone()
    }

    /// Hook for the external daily-rollover process. Cooldown timestamps are
    /// preserved; only the 24h counters reset.
    pub fn reset_daily_counts(&self) {
        let states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for cell in states.values() {
            let mut state = cell
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.interaction_count_24h = 0;
        }
    }
}
