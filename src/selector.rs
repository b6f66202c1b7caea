use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::SelectorTuning;
use crate::content::ContentItem;
use crate::limiter::RateLimiter;
use crate::profile::EngagementProfile;
use crate::random::RandomSource;

/// Topical fit between a character's weights and a content item's topics.
///
/// Takes the best single match: an exact topic hit scores its full weight, a
/// substring overlap in either direction scores the weight scaled down by
/// `partial_scale`.
pub fn topic_relevance(
    weights: &BTreeMap<String, f64>,
    topics: &BTreeSet<String>,
    partial_scale: f64,
) -> f64 {
    let mut best = 0.0_f64;
    for (weighted_topic, weight) in weights {
        for topic in topics {
            let score = if weighted_topic == topic {
                *weight
            } else if weighted_topic.contains(topic.as_str())
                || topic.contains(weighted_topic.as_str())
            {
                *weight * partial_scale
            } else {
                continue;
            };
            if score > best {
                best = score;
            }
        }
    }
    best
}

/// Picks exactly one character to be the first discoverer of a content item.
///
/// Lower engagement threshold and higher topical fit increase the chance of
/// surfacing content first. Weights are floored at epsilon so every eligible
/// candidate keeps a nonzero chance; no single character is ever guaranteed
/// sole discovery.
#[derive(Debug, Clone, Copy)]
pub struct DiscoverySelector {
    tuning: SelectorTuning,
}

impl DiscoverySelector {
    pub fn new(tuning: SelectorTuning) -> Self {
        Self { tuning }
    }

    /// `None` when no candidate is eligible this tick; the caller may
    /// requeue the item.
    pub fn select_discoverer(
        &self,
        item: &ContentItem,
        candidates: &[Arc<EngagementProfile>],
        limiter: &RateLimiter,
        now: DateTime<Utc>,
        rng: &mut dyn RandomSource,
    ) -> Option<String> {
        let eligible: Vec<&Arc<EngagementProfile>> = candidates
            .iter()
            .filter(|profile| limiter.is_eligible(profile, now))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let epsilon = self.tuning.weight_epsilon;
        let weights: Vec<f64> = eligible
            .iter()
            .map(|profile| {
                let relevance = topic_relevance(
                    &profile.topic_weights,
                    &item.topics,
                    self.tuning.partial_match_scale,
                );
                let weight = relevance * (1.0 - profile.engagement_threshold + epsilon);
                weight.max(epsilon)
            })
            .collect();

        let winner = weighted_draw(&weights, rng)?;
        Some(eligible[winner].character_id.clone())
    }
}

/// One draw from the normalized weight distribution.
fn weighted_draw(weights: &[f64], rng: &mut dyn RandomSource) -> Option<usize> {
    let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }

    let mark = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        if mark < cumulative {
            return Some(idx);
        }
    }
    // Floating-point accumulation can land exactly on the upper edge.
    weights.iter().rposition(|w| *w > 0.0)
}
