use thiserror::Error;

/// Failures that end a digest run.
///
/// Per-message summarization problems never show up here; they are folded
/// into a degraded `SummaryRecord` instead.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("mail query failed: {0:#}")]
    Query(anyhow::Error),

    #[error("digest delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

/// Failures of a single call to the LLM endpoint.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("request to LLM endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response envelope: {0}")]
    Envelope(String),
}
