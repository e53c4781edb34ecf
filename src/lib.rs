// Library exports for the newsletter-digest crate
// This allows tests and the binary to use the modules

pub mod config;
pub mod error;
pub mod gmail_client;
pub mod slack_notifier;
pub mod email;

// Normalize, summarize and render newsletters
pub mod digest;

// One digest run end to end
pub mod pipeline;

pub use error::{DigestError, SummarizeError};
pub use pipeline::{DigestPipeline, PipelineSettings, RunOutcome};
