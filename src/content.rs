use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A discrete piece of external material a character may engage with.
///
/// Produced by the external discovery collaborator; immutable once created
/// and owned by the orchestration cycle for the duration of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub headline: String,
    pub body: String,
    pub topics: BTreeSet<String>,
    /// Source-reported relevance in [0, 1]; carried through to events and
    /// decision diagnostics.
    pub relevance_score: f64,
    pub published_at: DateTime<Utc>,
}
