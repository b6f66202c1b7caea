use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::DecisionTuning;
use crate::profile::EngagementProfile;
use crate::random::RandomSource;
use crate::registry::ReplyContext;
use crate::selector::topic_relevance;

/// What a decision is about: a fresh content item or an existing thread.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionSubject {
    Content { content_id: String },
    Thread { thread_id: String },
}

impl DecisionSubject {
    pub fn id(&self) -> &str {
        match self {
            Self::Content { content_id } => content_id,
            Self::Thread { thread_id } => thread_id,
        }
    }
}

/// Inputs to one engage/ignore evaluation.
#[derive(Debug, Clone)]
pub enum DecisionContext {
    /// First-discovery path: the character weighs the bare content item.
    NewThread {
        topics: BTreeSet<String>,
        relevance_score: f64,
    },
    /// Reply path: the character weighs an ongoing conversation.
    ExistingThread { reply: ReplyContext },
}

/// Outcome of one evaluation. Produced per call, consumed for logging and
/// control flow; never persisted by the core.
#[derive(Debug, Clone, Serialize)]
pub struct EngagementDecision {
    pub character_id: String,
    pub subject: DecisionSubject,
    pub probability: f64,
    pub engaged: bool,
    /// Which boosts were nonzero. Diagnostic only, never authoritative.
    pub reason_codes: Vec<&'static str>,
}

/// Computes an engagement probability and renders a stochastic decision.
///
/// The draw keeps engagement probabilistic rather than a hard threshold,
/// which smooths discovery across ticks and keeps character behavior from
/// being fully predictable.
#[derive(Debug, Clone)]
pub struct DecisionEvaluator {
    tuning: DecisionTuning,
    partial_match_scale: f64,
}

impl DecisionEvaluator {
    pub fn new(tuning: DecisionTuning, partial_match_scale: f64) -> Self {
        Self {
            tuning,
            partial_match_scale,
        }
    }

    pub fn evaluate(
        &self,
        profile: &EngagementProfile,
        subject: DecisionSubject,
        context: &DecisionContext,
        rng: &mut dyn RandomSource,
    ) -> EngagementDecision {
        let mut reason_codes = vec!["base"];
        let base = profile.engagement_threshold;

        let topic_boost = match context {
            DecisionContext::NewThread { topics, .. } => {
                let relevance =
                    topic_relevance(&profile.topic_weights, topics, self.partial_match_scale);
                (relevance * self.tuning.topic_boost_factor).max(0.0)
            }
            DecisionContext::ExistingThread { .. } => 0.0,
        };
        if topic_boost > 0.0 {
            reason_codes.push("topic_boost");
        }

        let energy_boost = (profile.base_energy * self.tuning.energy_boost_factor).max(0.0);
        if energy_boost > 0.0 {
            reason_codes.push("energy_boost");
        }

        let momentum_boost = match context {
            DecisionContext::NewThread { .. } => 0.0,
            DecisionContext::ExistingThread { reply } => self
                .tuning
                .momentum_boost(reply.turn_count, reply.participant_count)
                .max(0.0),
        };
        if momentum_boost > 0.0 {
            reason_codes.push("momentum_boost");
        }

        let probability = (base + topic_boost + energy_boost + momentum_boost).min(1.0);
        let draw = rng.next_f64();

        EngagementDecision {
            character_id: profile.character_id.clone(),
            subject,
            probability,
            engaged: probability > draw,
            reason_codes,
        }
    }
}
