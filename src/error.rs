use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the engagement engine.
///
/// Thread errors are ordinary control-flow signals of the reply path and are
/// never surfaced as failures; collaborator errors are true failures isolated
/// to a single character's attempt; config errors are fatal at cycle start.
/// Internal code continues to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Thread registry control flow ─────────────────────────────────────
    #[error("thread: {0}")]
    Thread(#[from] ThreadError),

    // ── External collaborators ──────────────────────────────────────────
    #[error("collaborator: {0}")]
    Collaborator(#[from] CollaboratorError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load profiles: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no engagement profile for character {character_id}")]
    MissingProfile { character_id: String },
}

// ─── Thread registry errors ──────────────────────────────────────────────────

/// Expected, frequent outcomes of the reply path. Callers treat these as
/// control flow, not failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThreadError {
    #[error("content {content_id} already has a thread")]
    DuplicateOrigin { content_id: String },

    #[error("thread {thread_id} is inactive")]
    ThreadInactive { thread_id: String },

    #[error("character {character_id} exhausted its reply budget in thread {thread_id}")]
    ReplyBudgetExceeded {
        thread_id: String,
        character_id: String,
    },

    #[error("unknown thread {thread_id}")]
    UnknownThread { thread_id: String },
}

// ─── Collaborator errors ────────────────────────────────────────────────────

/// Failures from the external generation/publish collaborators. Isolated to
/// the single character's attempt for the current tick; the core never
/// retries them.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("generation for character {character_id} timed out after {timeout_secs}s")]
    GenerationTimeout {
        character_id: String,
        timeout_secs: u64,
    },

    #[error("generation for character {character_id} failed: {message}")]
    GenerationFailed {
        character_id: String,
        message: String,
    },

    #[error("publish for character {character_id} failed: {message}")]
    PublishFailed {
        character_id: String,
        message: String,
    },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
