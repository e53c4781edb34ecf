/// Newsletter summarization and digest rendering
pub mod assembler;
pub mod model;
pub mod normalizer;
pub mod response_parser;
pub mod summarizer;

pub use assembler::{assemble, DigestContext};
pub use model::{Category, DigestDocument, DigestEntry, SummaryRecord};
pub use normalizer::{clean_text, normalize};
pub use summarizer::{CompletionEndpoint, GenerationSettings, OpenAiEndpoint, Summarizer};
