use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Engine tuning knobs.
///
/// The numeric policy constants (boost factors, momentum tiers, selector
/// epsilon) are empirically chosen defaults, not derived values, so every one
/// of them is exposed here rather than baked into the components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrent workers processing content items and thread evaluations.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Upper bound on content items drained from the source per tick.
    #[serde(default = "default_max_items_per_tick")]
    pub max_items_per_tick: usize,
    /// Deadline for one external generate+publish attempt.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default)]
    pub selector: SelectorTuning,
    #[serde(default)]
    pub decision: DecisionTuning,
}

/// Discovery-selector weighting policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectorTuning {
    /// Additive constant keeping every eligible candidate's weight nonzero.
    #[serde(default = "default_weight_epsilon")]
    pub weight_epsilon: f64,
    /// Scale applied to substring topic matches relative to exact matches.
    #[serde(default = "default_partial_match_scale")]
    pub partial_match_scale: f64,
}

/// Decision-evaluator probability composition policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTuning {
    #[serde(default = "default_topic_boost_factor")]
    pub topic_boost_factor: f64,
    #[serde(default = "default_energy_boost_factor")]
    pub energy_boost_factor: f64,
    /// Momentum tiers, checked in order; first tier whose thresholds are both
    /// met wins. Must be monotonic: thresholds and boosts non-increasing.
    #[serde(default = "default_momentum_tiers")]
    pub momentum_tiers: Vec<MomentumTier>,
    /// Boost applied when a reply context exists but no tier matches.
    #[serde(default = "default_momentum_floor")]
    pub momentum_floor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MomentumTier {
    pub min_turns: u32,
    pub min_participants: u32,
    pub boost: f64,
}

fn default_worker_count() -> usize {
    4
}

fn default_max_items_per_tick() -> usize {
    8
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_weight_epsilon() -> f64 {
    0.05
}

fn default_partial_match_scale() -> f64 {
    0.8
}

fn default_topic_boost_factor() -> f64 {
    0.3
}

fn default_energy_boost_factor() -> f64 {
    0.3
}

fn default_momentum_floor() -> f64 {
    0.05
}

fn default_momentum_tiers() -> Vec<MomentumTier> {
    vec![
        MomentumTier {
            min_turns: 4,
            min_participants: 3,
            boost: 0.3,
        },
        MomentumTier {
            min_turns: 3,
            min_participants: 2,
            boost: 0.2,
        },
        MomentumTier {
            min_turns: 2,
            min_participants: 1,
            boost: 0.1,
        },
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_items_per_tick: default_max_items_per_tick(),
            generation_timeout_secs: default_generation_timeout_secs(),
            selector: SelectorTuning::default(),
            decision: DecisionTuning::default(),
        }
    }
}

impl Default for SelectorTuning {
    fn default() -> Self {
        Self {
            weight_epsilon: default_weight_epsilon(),
            partial_match_scale: default_partial_match_scale(),
        }
    }
}

impl Default for DecisionTuning {
    fn default() -> Self {
        Self {
            topic_boost_factor: default_topic_boost_factor(),
            energy_boost_factor: default_energy_boost_factor(),
            momentum_tiers: default_momentum_tiers(),
            momentum_floor: default_momentum_floor(),
        }
    }
}

fn validate_unit_interval(value: f64, label: &str) -> Result<()> {
    if value.is_nan() {
        anyhow::bail!("{label} must not be NaN");
    }
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{label} must be in [0.0, 1.0]");
    }
    Ok(())
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            anyhow::bail!("worker_count must be >= 1");
        }
        if self.max_items_per_tick == 0 {
            anyhow::bail!("max_items_per_tick must be >= 1");
        }
        if self.generation_timeout_secs == 0 {
            anyhow::bail!("generation_timeout_secs must be >= 1");
        }
        self.selector.validate()?;
        self.decision.validate()?;
        Ok(())
    }
}

impl SelectorTuning {
    pub fn validate(&self) -> Result<()> {
        if self.weight_epsilon.is_nan() || self.weight_epsilon <= 0.0 {
            anyhow::bail!("selector.weight_epsilon must be > 0.0");
        }
        validate_unit_interval(self.partial_match_scale, "selector.partial_match_scale")?;
        Ok(())
    }
}

impl DecisionTuning {
    pub fn validate(&self) -> Result<()> {
        validate_unit_interval(self.topic_boost_factor, "decision.topic_boost_factor")?;
        validate_unit_interval(self.energy_boost_factor, "decision.energy_boost_factor")?;
        validate_unit_interval(self.momentum_floor, "decision.momentum_floor")?;

        for (idx, tier) in self.momentum_tiers.iter().enumerate() {
            validate_unit_interval(tier.boost, "decision.momentum_tiers.boost")?;
            if tier.min_turns == 0 {
                anyhow::bail!("decision.momentum_tiers[{idx}].min_turns must be >= 1");
            }
        }

        // Tiers are checked in order; require them monotonic in turn count,
        // participant count, and boost so a busier thread never earns less.
        for pair in self.momentum_tiers.windows(2) {
            let (higher, lower) = (&pair[0], &pair[1]);
            if lower.min_turns > higher.min_turns
                || lower.min_participants > higher.min_participants
                || lower.boost > higher.boost
            {
                anyhow::bail!(
                    "decision.momentum_tiers must be non-increasing in thresholds and boost"
                );
            }
        }

        if let Some(last) = self.momentum_tiers.last() {
            if self.momentum_floor > last.boost {
                anyhow::bail!("decision.momentum_floor must not exceed the lowest tier boost");
            }
        }

        Ok(())
    }

    /// Momentum boost for a thread with the given activity level.
    pub fn momentum_boost(&self, turn_count: u32, participant_count: u32) -> f64 {
        for tier in &self.momentum_tiers {
            if turn_count >= tier.min_turns && participant_count >= tier.min_participants {
                return tier.boost;
            }
        }
        self.momentum_floor
    }
}
