use anyhow::Result;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigError;

/// Per-character engagement configuration snapshot.
///
/// Produced by the external configuration collaborator, validated on load,
/// and treated as immutable for the duration of a cycle. The core never
/// parses raw configuration itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementProfile {
    pub character_id: String,
    /// Base willingness to engage, in [0, 1]. Doubles as the floor of the
    /// engagement probability and (inverted) as a discovery-weight factor.
    pub engagement_threshold: f64,
    pub cooldown_minutes: i64,
    pub max_daily_interactions: u32,
    /// Per-thread reply budget, counting the originating post. Must be >= 1
    /// for any character that participates at all.
    pub max_replies_per_thread: u32,
    /// Topic affinity weights, each in [0, 1].
    #[serde(default)]
    pub topic_weights: BTreeMap<String, f64>,
    pub base_energy: f64,
}

impl EngagementProfile {
    pub fn validate(&self) -> Result<()> {
        if self.character_id.trim().is_empty() {
            anyhow::bail!("profile character_id must not be empty");
        }
        validate_unit(self.engagement_threshold, &self.character_id, "engagement_threshold")?;
        validate_unit(self.base_energy, &self.character_id, "base_energy")?;
        if self.cooldown_minutes < 0 {
            anyhow::bail!(
                "profile {}: cooldown_minutes must be >= 0",
                self.character_id
            );
        }
        if self.max_replies_per_thread == 0 {
            anyhow::bail!(
                "profile {}: max_replies_per_thread must be >= 1",
                self.character_id
            );
        }
        for (topic, weight) in &self.topic_weights {
            if weight.is_nan() || !(0.0..=1.0).contains(weight) {
                anyhow::bail!(
                    "profile {}: topic weight for {topic:?} must be in [0.0, 1.0]",
                    self.character_id
                );
            }
        }
        Ok(())
    }
}

fn validate_unit(value: f64, character_id: &str, label: &str) -> Result<()> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        anyhow::bail!("profile {character_id}: {label} must be in [0.0, 1.0]");
    }
    Ok(())
}

// ─── Roster snapshot ────────────────────────────────────────────────────────

/// Validated, immutable roster of profiles for one cycle.
#[derive(Debug, Default)]
pub struct ProfileSet {
    by_id: BTreeMap<String, Arc<EngagementProfile>>,
}

impl ProfileSet {
    pub fn from_profiles(profiles: Vec<EngagementProfile>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for profile in profiles {
            profile.validate()?;
            let id = profile.character_id.clone();
            if by_id.insert(id.clone(), Arc::new(profile)).is_some() {
                anyhow::bail!("duplicate engagement profile for character {id}");
            }
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, character_id: &str) -> Option<&Arc<EngagementProfile>> {
        self.by_id.get(character_id)
    }

    /// Lookup that is fatal when the character is referenced but unknown.
    pub fn require(
        &self,
        character_id: &str,
    ) -> std::result::Result<&Arc<EngagementProfile>, ConfigError> {
        self.by_id
            .get(character_id)
            .ok_or_else(|| ConfigError::MissingProfile {
                character_id: character_id.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EngagementProfile>> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Holder for the current roster snapshot.
///
/// Reloads between cycles swap the whole set atomically; workers read the
/// snapshot lock-free and keep their `Arc` for the duration of a tick.
#[derive(Debug)]
pub struct ProfileStore {
    current: ArcSwap<ProfileSet>,
}

impl ProfileStore {
    pub fn new(set: ProfileSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(set),
        }
    }

    pub fn empty() -> Self {
        Self::new(ProfileSet::default())
    }

    pub fn snapshot(&self) -> Arc<ProfileSet> {
        self.current.load_full()
    }

    pub fn replace(&self, set: ProfileSet) {
        self.current.store(Arc::new(set));
    }
}
