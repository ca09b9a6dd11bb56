//! Error types for Cadence

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Fatal(#[from] Fatal),
}

impl CadenceError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CadenceError::Fatal(fatal) => fatal.exit_code(),
            CadenceError::Config(_) => 2,
            CadenceError::Store(_) => 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse snapshot: {0}")]
    SnapshotError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to store {path}: {source}")]
    Append {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Category {0} is append-only")]
    AppendOnly(String),
}

/// Failures reported by an [`ActionProvider`](crate::provider::ActionProvider)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Login required: {0}")]
    LoginRequired(String),

    #[error("Challenge required: {0}")]
    ChallengeRequired(String),

    #[error("Invalid credentials: {0}")]
    BadCredentials(String),

    #[error("Unexpected provider failure: {0}")]
    Unexpected(String),
}

/// How the resilient wrapper reacts to a [`ProviderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Back off and let the next cycle try again
    Transient,
    /// The session is gone; log in again
    AuthExpired,
    /// The platform wants out-of-band verification
    ChallengeRequired,
    /// Wrong password or suspicious login; never retried
    InvalidCredentials,
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Network(_)
            | ProviderError::Client(_)
            | ProviderError::RateLimit(_)
            | ProviderError::Unexpected(_) => FailureKind::Transient,
            ProviderError::LoginRequired(_) => FailureKind::AuthExpired,
            ProviderError::ChallengeRequired(_) => FailureKind::ChallengeRequired,
            ProviderError::BadCredentials(_) => FailureKind::InvalidCredentials,
        }
    }

    /// True for failures that only affect the item being processed
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// Unrecoverable outcomes that end the process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    #[error("Invalid credentials or suspicious login: {0}")]
    InvalidCredentials(String),

    #[error("Manual verification required: {0}")]
    ChallengeRequired(String),
}

impl Fatal {
    pub fn exit_code(&self) -> i32 {
        match self {
            Fatal::InvalidCredentials(_) | Fatal::ChallengeRequired(_) => 1,
        }
    }
}
