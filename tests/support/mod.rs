#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use troupe::{
    ClosureSignal, CollaboratorSet, ContentItem, ContentSource, CycleController, DecisionSubject,
    EngagementProfile, EngineConfig, ProfileSource, Publisher, ResponseGenerator,
};

/// Route engine logs through the test harness; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn profile(id: &str) -> EngagementProfile {
    EngagementProfile {
        character_id: id.into(),
        engagement_threshold: 0.3,
        cooldown_minutes: 0,
        max_daily_interactions: 100,
        max_replies_per_thread: 2,
        topic_weights: BTreeMap::from([("music".to_string(), 0.9)]),
        base_energy: 0.5,
    }
}

/// Probability composition saturates at 1.0, so this profile engages on
/// every draw.
pub fn eager_profile(id: &str) -> EngagementProfile {
    EngagementProfile {
        character_id: id.into(),
        engagement_threshold: 0.9,
        cooldown_minutes: 0,
        max_daily_interactions: 100,
        max_replies_per_thread: 2,
        topic_weights: BTreeMap::from([("music".to_string(), 1.0)]),
        base_energy: 1.0,
    }
}

/// Zero threshold, energy, and affinity: never engages.
pub fn reluctant_profile(id: &str) -> EngagementProfile {
    EngagementProfile {
        character_id: id.into(),
        engagement_threshold: 0.0,
        cooldown_minutes: 0,
        max_daily_interactions: 100,
        max_replies_per_thread: 2,
        topic_weights: BTreeMap::new(),
        base_energy: 0.0,
    }
}

pub fn item(id: &str) -> ContentItem {
    ContentItem {
        id: id.into(),
        headline: format!("{id} headline"),
        body: format!("{id} body"),
        topics: ["music".to_string()].into(),
        relevance_score: 0.9,
        published_at: fixed_now(),
    }
}

// ─── Mock collaborators ─────────────────────────────────────────────────────

pub struct QueueContent {
    items: Mutex<VecDeque<ContentItem>>,
}

impl QueueContent {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }
}

#[async_trait]
impl ContentSource for QueueContent {
    async fn next_content_item(&self) -> Option<ContentItem> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
    }
}

pub struct StaticProfiles {
    pub profiles: Mutex<Vec<EngagementProfile>>,
}

impl StaticProfiles {
    pub fn new(profiles: Vec<EngagementProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
        }
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn load_profiles(&self) -> anyhow::Result<Vec<EngagementProfile>> {
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }
}

pub struct FailingProfiles;

#[async_trait]
impl ProfileSource for FailingProfiles {
    async fn load_profiles(&self) -> anyhow::Result<Vec<EngagementProfile>> {
        anyhow::bail!("profile backend unavailable")
    }
}

#[derive(Default)]
pub struct RecordingGenerator {
    pub calls: AtomicU32,
}

#[async_trait]
impl ResponseGenerator for RecordingGenerator {
    async fn generate(
        &self,
        character_id: &str,
        subject: &DecisionSubject,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{character_id} reacts to {}", subject.id()))
    }
}

/// Never completes; exercises the generation deadline.
pub struct HangingGenerator;

#[async_trait]
impl ResponseGenerator for HangingGenerator {
    async fn generate(
        &self,
        _character_id: &str,
        _subject: &DecisionSubject,
    ) -> anyhow::Result<String> {
        std::future::pending().await
    }
}

pub struct FailingGenerator;

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(
        &self,
        _character_id: &str,
        _subject: &DecisionSubject,
    ) -> anyhow::Result<String> {
        anyhow::bail!("model backend exploded")
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        character_id: &str,
        response_text: &str,
        _subject: &DecisionSubject,
    ) -> anyhow::Result<()> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((character_id.to_string(), response_text.to_string()));
        Ok(())
    }
}

pub struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(
        &self,
        _character_id: &str,
        _response_text: &str,
        _subject: &DecisionSubject,
    ) -> anyhow::Result<()> {
        anyhow::bail!("transport rejected the post")
    }
}

pub struct CloseEverything;

#[async_trait]
impl ClosureSignal for CloseEverything {
    async fn should_close(&self, _thread_id: &str) -> bool {
        true
    }
}

// ─── Controller builder ─────────────────────────────────────────────────────

pub struct EngineBuilder {
    pub config: EngineConfig,
    pub items: Vec<ContentItem>,
    pub profiles: Vec<EngagementProfile>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub publisher: Arc<dyn Publisher>,
    pub closure: Option<Arc<dyn ClosureSignal>>,
    pub seed: u64,
}

impl EngineBuilder {
    pub fn new(profiles: Vec<EngagementProfile>) -> Self {
        Self {
            config: EngineConfig::default(),
            items: Vec::new(),
            profiles,
            generator: Arc::new(RecordingGenerator::default()),
            publisher: Arc::new(RecordingPublisher::default()),
            closure: None,
            seed: 42,
        }
    }

    pub fn with_items(mut self, items: Vec<ContentItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_closure(mut self, closure: Arc<dyn ClosureSignal>) -> Self {
        self.closure = Some(closure);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CycleController {
        CycleController::new(
            self.config,
            CollaboratorSet {
                content: Arc::new(QueueContent::new(self.items)),
                profiles: Arc::new(StaticProfiles::new(self.profiles)),
                generator: self.generator,
                publisher: self.publisher,
                closure: self.closure,
            },
            self.seed,
        )
        .expect("engine config should be valid")
    }
}

/// Drain whatever is currently buffered on the event channel.
pub fn drain_events(rx: &mut troupe::EventReceiver) -> Vec<troupe::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
