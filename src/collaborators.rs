use async_trait::async_trait;

use crate::content::ContentItem;
use crate::evaluator::DecisionSubject;
use crate::profile::EngagementProfile;

/// Supplies content items to the orchestration cycle. May be empty when no
/// item is ready; the controller simply moves on to the reply pass.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn next_content_item(&self) -> Option<ContentItem>;
}

/// Supplies the character roster. Refreshed once per cycle; the core never
/// parses raw configuration itself.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_profiles(&self) -> anyhow::Result<Vec<EngagementProfile>>;
}

/// Produces the actual response text. Opaque to the core: it may fail or
/// hang, so every call runs under the engine's generation deadline.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        character_id: &str,
        subject: &DecisionSubject,
    ) -> anyhow::Result<String>;
}

/// Delivers a generated response to the outside world. State is committed
/// only after this succeeds, so a failure leaves the engine exactly as if
/// the attempt never happened.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        character_id: &str,
        response_text: &str,
        subject: &DecisionSubject,
    ) -> anyhow::Result<()>;
}

/// Optional external closure authority (TTL, max total turns, moderation).
/// Polled during the closure pass on top of pure budget exhaustion.
#[async_trait]
pub trait ClosureSignal: Send + Sync {
    async fn should_close(&self, thread_id: &str) -> bool;
}
