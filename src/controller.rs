//! Orchestration cycle controller.
//!
//! Drives the per-item state machine DISCOVERED → SELECTING → DECIDING →
//! {ENGAGED | DROPPED} and the THREAD_ACTIVE → THREAD_CLOSED loop across
//! repeated ticks. Work fans out to a bounded pool of workers; the only
//! shared mutable state is behind the registry's per-thread locks and the
//! limiter's per-character locks, and no lock is ever held across an
//! external collaborator call. State is committed strictly after a
//! successful generate+publish, so a collaborator failure leaves the engine
//! as if the attempt never happened.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use crate::collaborators::{
    ClosureSignal, ContentSource, ProfileSource, Publisher, ResponseGenerator,
};
use crate::config::EngineConfig;
use crate::content::ContentItem;
use crate::error::{CollaboratorError, ConfigError, Result, ThreadError};
use crate::evaluator::{DecisionContext, DecisionEvaluator, DecisionSubject};
use crate::events::{CloseReason, EngineEvent, EventReceiver, EventSender, event_bus};
use crate::limiter::RateLimiter;
use crate::profile::{EngagementProfile, ProfileSet, ProfileStore};
use crate::random::{SplitMixRandom, mix_seed};
use crate::registry::ThreadEngagementRegistry;
use crate::selector::DiscoverySelector;

/// External capabilities the engine consumes. All opaque; the closure
/// authority is optional.
pub struct CollaboratorSet {
    pub content: Arc<dyn ContentSource>,
    pub profiles: Arc<dyn ProfileSource>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub publisher: Arc<dyn Publisher>,
    pub closure: Option<Arc<dyn ClosureSignal>>,
}

/// Advisory counters for one tick.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub items_pulled: u32,
    pub engagements: u32,
    pub replies: u32,
    pub threads_closed: u32,
}

struct Shared {
    config: EngineConfig,
    collaborators: CollaboratorSet,
    profiles: ProfileStore,
    limiter: RateLimiter,
    registry: ThreadEngagementRegistry,
    selector: DiscoverySelector,
    evaluator: DecisionEvaluator,
    events: EventSender,
    workers: Arc<Semaphore>,
    seed: u64,
    tick: AtomicU64,
}

/// Sequences discovery, decisions, and state updates across repeated ticks.
pub struct CycleController {
    shared: Arc<Shared>,
}

impl CycleController {
    pub fn new(config: EngineConfig, collaborators: CollaboratorSet, seed: u64) -> Result<Self> {
        config
            .validate()
            .map_err(|error| ConfigError::Validation(error.to_string()))?;

        let (events, _) = event_bus(256);
        let workers = Arc::new(Semaphore::new(config.worker_count));
        let selector = DiscoverySelector::new(config.selector);
        let evaluator =
            DecisionEvaluator::new(config.decision.clone(), config.selector.partial_match_scale);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                collaborators,
                profiles: ProfileStore::empty(),
                limiter: RateLimiter::new(),
                registry: ThreadEngagementRegistry::new(),
                selector,
                evaluator,
                events,
                workers,
                seed,
                tick: AtomicU64::new(0),
            }),
        })
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    pub fn registry(&self) -> &ThreadEngagementRegistry {
        &self.shared.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.shared.limiter
    }

    /// Run one full tick: refresh the roster, process fresh content, run the
    /// reply pass over threads that were active at tick start, then close
    /// threads nobody can extend.
    ///
    /// Only a roster that fails to load or validate is fatal; any single
    /// character's failure is isolated to its own attempt.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let tick = self.shared.tick.fetch_add(1, Ordering::Relaxed);
        let roster = self.refresh_profiles().await?;
        self.verify_roster_covers_threads(&roster)?;

        // Threads created this tick become visible to the reply path on the
        // next tick.
        let reply_targets = self.shared.registry.active_threads();

        let mut items = Vec::new();
        while items.len() < self.shared.config.max_items_per_tick {
            match self.shared.collaborators.content.next_content_item().await {
                Some(item) => items.push(item),
                None => break,
            }
        }
        let items_pulled = u32::try_from(items.len()).unwrap_or(u32::MAX);

        let candidates: Arc<Vec<Arc<EngagementProfile>>> =
            Arc::new(roster.iter().cloned().collect());

        let item_handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let shared = Arc::clone(&self.shared);
                let candidates = Arc::clone(&candidates);
                tokio::spawn(async move {
                    let _permit = match Arc::clone(&shared.workers).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return false,
                    };
                    shared.process_content_item(&item, &candidates, tick, now).await
                })
            })
            .collect();

        let mut engagements = 0u32;
        for outcome in join_all(item_handles).await {
            match outcome {
                Ok(true) => engagements += 1,
                Ok(false) => {}
                Err(error) => warn!(error = %error, "content worker panicked"),
            }
        }

        let reply_handles: Vec<_> = reply_targets
            .into_iter()
            .map(|thread_id| {
                let shared = Arc::clone(&self.shared);
                let candidates = Arc::clone(&candidates);
                tokio::spawn(async move {
                    let _permit = match Arc::clone(&shared.workers).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return 0,
                    };
                    shared.process_thread(&thread_id, &candidates, tick, now).await
                })
            })
            .collect();

        let mut replies = 0u32;
        for outcome in join_all(reply_handles).await {
            match outcome {
                Ok(count) => replies += count,
                Err(error) => warn!(error = %error, "reply worker panicked"),
            }
        }

        let threads_closed = self.shared.closure_pass(&candidates).await;

        Ok(TickSummary {
            tick,
            items_pulled,
            engagements,
            replies,
            threads_closed,
        })
    }

    async fn refresh_profiles(&self) -> Result<Arc<ProfileSet>> {
        let profiles = self
            .shared
            .collaborators
            .profiles
            .load_profiles()
            .await
            .map_err(|error| ConfigError::Load(error.to_string()))?;
        let set = ProfileSet::from_profiles(profiles)
            .map_err(|error| ConfigError::Validation(error.to_string()))?;
        self.shared.profiles.replace(set);
        Ok(self.shared.profiles.snapshot())
    }

    /// A character referenced by an active thread must have a profile;
    /// anything else fails fast at cycle start instead of mid-tick.
    fn verify_roster_covers_threads(&self, roster: &ProfileSet) -> Result<()> {
        for thread_id in self.shared.registry.active_threads() {
            if let Some(state) = self.shared.registry.snapshot(&thread_id) {
                for character_id in state.replies_by_character.keys() {
                    roster.require(character_id)?;
                }
            }
        }
        Ok(())
    }
}

impl Shared {
    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// DISCOVERED → SELECTING → DECIDING → {ENGAGED | DROPPED} for one item.
    /// Returns true when the item produced a new thread.
    async fn process_content_item(
        &self,
        item: &ContentItem,
        candidates: &[Arc<EngagementProfile>],
        tick: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let mut rng = SplitMixRandom::new(mix_seed(self.seed, tick, &item.id));

        let Some(character_id) =
            self.selector
                .select_discoverer(item, candidates, &self.limiter, now, &mut rng)
        else {
            debug!(content = %item.id, "no eligible discoverer");
            self.emit(EngineEvent::ContentDropped {
                content_id: item.id.clone(),
                reason: "no_eligible_candidate".into(),
            });
            return false;
        };

        self.emit(EngineEvent::DiscoverySelected {
            content_id: item.id.clone(),
            character_id: character_id.clone(),
        });

        let roster = self.profiles.snapshot();
        let Some(profile) = roster.get(&character_id) else {
            // Roster swapped mid-tick; the next tick re-verifies coverage.
            return false;
        };

        let subject = DecisionSubject::Content {
            content_id: item.id.clone(),
        };
        let context = DecisionContext::NewThread {
            topics: item.topics.clone(),
            relevance_score: item.relevance_score,
        };
        let decision = self
            .evaluator
            .evaluate(profile, subject.clone(), &context, &mut rng);

        self.emit(EngineEvent::EngagementDecided {
            character_id: character_id.clone(),
            subject_id: item.id.clone(),
            probability: decision.probability,
            engaged: decision.engaged,
        });

        if !decision.engaged {
            self.emit(EngineEvent::ContentDropped {
                content_id: item.id.clone(),
                reason: "declined".into(),
            });
            return false;
        }

        if let Err(error) = self.run_external(&character_id, &subject).await {
            warn!(character = %character_id, content = %item.id, error = %error, "engagement attempt failed");
            self.emit(EngineEvent::CollaboratorFailed {
                character_id: character_id.clone(),
                stage: error.stage().into(),
                message: error.to_string(),
            });
            return false;
        }

        // Commit strictly after the external calls succeeded.
        match self.registry.create_thread(&item.id, &character_id, now) {
            Ok(thread_id) => {
                self.limiter.record_interaction(&character_id, now);
                info!(character = %character_id, thread = %thread_id, content = %item.id, "thread.created");
                self.emit(EngineEvent::ReplyRecorded {
                    thread_id,
                    character_id,
                    is_originating_post: true,
                });
                true
            }
            Err(ThreadError::DuplicateOrigin { .. }) => {
                // Another worker already opened a thread for this item:
                // already handled, not a failure.
                debug!(content = %item.id, "duplicate origin, content already handled");
                false
            }
            Err(error) => {
                debug!(content = %item.id, error = %error, "thread creation rejected");
                false
            }
        }
    }

    /// THREAD_ACTIVE loop for one thread: every roster character other than
    /// the latest author weighs in, bounded by eligibility and the
    /// per-thread reply budget. Returns the number of replies recorded.
    async fn process_thread(
        &self,
        thread_id: &str,
        candidates: &[Arc<EngagementProfile>],
        tick: u64,
        now: DateTime<Utc>,
    ) -> u32 {
        let mut replies = 0u32;

        for profile in candidates {
            let character_id = profile.character_id.as_str();
            if self.registry.last_author(thread_id).as_deref() == Some(character_id) {
                continue;
            }
            if !self.limiter.is_eligible(profile, now) {
                continue;
            }
            // Advisory; record_reply re-checks atomically at commit time.
            if !self.registry.can_reply(thread_id, profile) {
                continue;
            }
            let Some(reply) = self.registry.reply_context(thread_id) else {
                break;
            };

            let mut rng = SplitMixRandom::new(mix_seed(
                self.seed,
                tick,
                &format!("{thread_id}:{character_id}"),
            ));
            let subject = DecisionSubject::Thread {
                thread_id: thread_id.to_string(),
            };
            let decision = self.evaluator.evaluate(
                profile,
                subject.clone(),
                &DecisionContext::ExistingThread { reply },
                &mut rng,
            );

            self.emit(EngineEvent::EngagementDecided {
                character_id: character_id.to_string(),
                subject_id: thread_id.to_string(),
                probability: decision.probability,
                engaged: decision.engaged,
            });

            if !decision.engaged {
                continue;
            }

            if let Err(error) = self.run_external(character_id, &subject).await {
                warn!(character = %character_id, thread = %thread_id, error = %error, "reply attempt failed");
                self.emit(EngineEvent::CollaboratorFailed {
                    character_id: character_id.to_string(),
                    stage: error.stage().into(),
                    message: error.to_string(),
                });
                continue;
            }

            match self.registry.record_reply(thread_id, profile, now) {
                Ok(record) => {
                    self.limiter.record_interaction(character_id, now);
                    replies += 1;
                    info!(character = %character_id, thread = %thread_id, "reply.recorded");
                    self.emit(EngineEvent::ReplyRecorded {
                        thread_id: thread_id.to_string(),
                        character_id: character_id.to_string(),
                        is_originating_post: record.is_originating_post,
                    });
                }
                Err(error) => {
                    // Budget or activity changed under us: ordinary control
                    // flow, the attempt simply does not land.
                    debug!(character = %character_id, thread = %thread_id, outcome = %error, "reply not recorded");
                }
            }
        }

        replies
    }

    /// One generate+publish attempt under the engine deadline. No lock is
    /// held while these run; no retry happens inside the core.
    async fn run_external(
        &self,
        character_id: &str,
        subject: &DecisionSubject,
    ) -> std::result::Result<(), CollaboratorError> {
        let deadline = Duration::from_secs(self.config.generation_timeout_secs);

        let generated = timeout(
            deadline,
            self.collaborators.generator.generate(character_id, subject),
        )
        .await;
        let text = match generated {
            Err(_) => {
                return Err(CollaboratorError::GenerationTimeout {
                    character_id: character_id.to_string(),
                    timeout_secs: self.config.generation_timeout_secs,
                });
            }
            Ok(Err(error)) => {
                return Err(CollaboratorError::GenerationFailed {
                    character_id: character_id.to_string(),
                    message: error.to_string(),
                });
            }
            Ok(Ok(text)) => text,
        };

        let published = timeout(
            deadline,
            self.collaborators
                .publisher
                .publish(character_id, &text, subject),
        )
        .await;
        match published {
            Err(_) => Err(CollaboratorError::PublishFailed {
                character_id: character_id.to_string(),
                message: format!("timed out after {}s", self.config.generation_timeout_secs),
            }),
            Ok(Err(error)) => Err(CollaboratorError::PublishFailed {
                character_id: character_id.to_string(),
                message: error.to_string(),
            }),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// THREAD_CLOSED transitions: external closure signal first, then pure
    /// budget exhaustion across the roster.
    async fn closure_pass(&self, candidates: &[Arc<EngagementProfile>]) -> u32 {
        let mut closed = 0u32;

        for thread_id in self.registry.active_threads() {
            if let Some(signal) = &self.collaborators.closure {
                if signal.should_close(&thread_id).await {
                    self.registry.deactivate(&thread_id);
                    info!(thread = %thread_id, "thread.closed by external signal");
                    self.emit(EngineEvent::ThreadClosed {
                        thread_id,
                        reason: CloseReason::ExternalSignal,
                    });
                    closed += 1;
                    continue;
                }
            }

            let exhausted = candidates
                .iter()
                .all(|profile| !self.registry.can_reply(&thread_id, profile));
            if exhausted {
                self.registry.deactivate(&thread_id);
                info!(thread = %thread_id, "thread.closed, reply budgets exhausted");
                self.emit(EngineEvent::ThreadClosed {
                    thread_id,
                    reason: CloseReason::BudgetExhausted,
                });
                closed += 1;
            }
        }

        closed
    }
}

impl CollaboratorError {
    fn stage(&self) -> &'static str {
        match self {
            Self::GenerationTimeout { .. } | Self::GenerationFailed { .. } => "generate",
            Self::PublishFailed { .. } => "publish",
        }
    }
}
