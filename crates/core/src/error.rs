//! Error types for the Nami domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Nami operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reply generation errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Side-channel errors ---
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    // --- Ingestion errors ---
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("Sink not configured: {0}")]
    NotConfigured(String),

    #[error("Delivery failed to {sink}: {reason}")]
    DeliveryFailed { sink: String, reason: String },
}

/// Reasons an input is refused at the ingestion boundary.
///
/// These never reach producers as failures; the router logs one line and
/// drops the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("empty or whitespace-only text")]
    EmptyText,

    #[error("unknown source kind: {0}")]
    UnknownSource(String),

    #[error("source {0} is disabled")]
    SourceDisabled(String),

    #[error("unknown conversation state: {0}")]
    UnknownState(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),
}
