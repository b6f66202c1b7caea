#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

//! Troupe is a library-level engagement orchestration engine: it decides
//! *which* autonomous character agent acts *when* over a shared stream of
//! content items, enforces per-character and per-thread engagement budgets,
//! and keeps thread state consistent under concurrent decisions. Response
//! generation, publishing, configuration loading, and persistence are
//! external collaborators plugged in behind traits.

pub mod collaborators;
pub mod config;
pub mod content;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod limiter;
pub mod profile;
pub mod random;
pub mod registry;
pub mod selector;

pub use collaborators::{ClosureSignal, ContentSource, ProfileSource, Publisher, ResponseGenerator};
pub use config::{DecisionTuning, EngineConfig, MomentumTier, SelectorTuning};
pub use content::ContentItem;
pub use controller::{CollaboratorSet, CycleController, TickSummary};
pub use error::{CollaboratorError, ConfigError, EngineError, Result, ThreadError};
pub use evaluator::{DecisionContext, DecisionEvaluator, DecisionSubject, EngagementDecision};
pub use events::{CloseReason, EngineEvent, EventReceiver, EventSender};
pub use limiter::{CharacterRuntimeState, RateLimiter};
pub use profile::{EngagementProfile, ProfileSet, ProfileStore};
pub use random::{OsRandom, RandomSource, SplitMixRandom};
pub use registry::{ReplyContext, ReplyRecord, ThreadEngagementRegistry, ThreadEngagementState};
pub use selector::DiscoverySelector;
