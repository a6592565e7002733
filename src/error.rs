//! Top-level error types for digestline.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistent store connection and migration errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("failed to connect to SQLite: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Event intake errors (§7 of the spec: signature, dedupe, payload shape).
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("signing secret not configured")]
    MissingSigningSecret,

    #[error("request body missing")]
    MissingBody,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Role/phase/project/user profile errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("unknown embedding: {0}")]
    UnknownEmbedding(String),

    #[error("user lacks channel access for this project")]
    AccessDenied,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Feedback application errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("invalid feedback action: {0}")]
    InvalidAction(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("external chat API call failed: {0}")]
    ExternalChatFailure(String),

    #[error("digest {0} already delivered")]
    DeliveryDuplicate(String),

    #[error("workspace not found for team {0}")]
    WorkspaceNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown timezone {0}, falling back to UTC")]
    UnknownTimezone(String),

    #[error("unknown schedule: {0}")]
    UnknownSchedule(String),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
