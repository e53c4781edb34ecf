use futures::future::BoxFuture;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::model::SummaryRecord;
use super::response_parser;
use crate::config::OpenAiConfig;
use crate::error::SummarizeError;

/// Bodies shorter than this are not worth a model call
pub const MIN_SUMMARIZABLE_CHARS: usize = 50;

const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Something that answers a chat-completions request with the reply text
pub trait CompletionEndpoint: Send + Sync {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<String, SummarizeError>>;
}

/// OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiEndpoint {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiEndpoint {
    pub fn new(config: &OpenAiConfig) -> Result<Self, SummarizeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, request: &ChatRequest) -> Result<String, SummarizeError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let envelope: ChatResponse =
            serde_json::from_str(&body).map_err(|e| SummarizeError::Envelope(e.to_string()))?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| SummarizeError::Envelope("no message content in choices".to_string()))
    }
}

impl fmt::Debug for OpenAiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEndpoint")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CompletionEndpoint for OpenAiEndpoint {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<String, SummarizeError>> {
        Box::pin(self.post(request))
    }
}

/// Generation parameters sent with every request
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&OpenAiConfig> for GenerationSettings {
    fn from(config: &OpenAiConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 3000,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

/// Turns newsletter text into a `SummaryRecord`. Never fails: every problem
/// with the endpoint yields the fixed degraded record.
pub struct Summarizer<E> {
    endpoint: E,
    settings: GenerationSettings,
}

impl<E: CompletionEndpoint> Summarizer<E> {
    pub fn new(endpoint: E, settings: GenerationSettings) -> Self {
        Self { endpoint, settings }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub async fn summarize(&self, text: &str, subject: &str) -> SummaryRecord {
        if text.chars().count() < MIN_SUMMARIZABLE_CHARS {
            debug!("'{}' is too short to summarize ({} chars)", subject, text.chars().count());
            return SummaryRecord::too_short();
        }

        let request = self.build_request(text, subject);

        match self.endpoint.complete(&request).await {
            Ok(reply) => {
                let parsed = response_parser::parse(&reply);
                info!("📝 Summarized '{}' as {}", subject, parsed.category);
                SummaryRecord {
                    category: parsed.category,
                    insights: parsed.insights,
                    news_context: parsed.news_context,
                    bottom_line: parsed.bottom_line,
                    reading_time: reading_time(text),
                }
            }
            Err(e) => {
                warn!("⚠️  Summarization failed for '{}': {}", subject, e);
                SummaryRecord::failed()
            }
        }
    }

    pub fn build_request(&self, text: &str, subject: &str) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(text, subject),
            }],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
        }
    }
}

/// Estimated minutes to read, at 200 words per minute, at least one
pub fn reading_time(text: &str) -> u32 {
    let words = text.split_whitespace().count() as f64;
    ((words / WORDS_PER_MINUTE).round() as u32).max(1)
}

pub fn build_prompt(text: &str, subject: &str) -> String {
    format!(
        r#"You are an expert newsletter analyst tasked with creating a comprehensive yet concise summary of the following plain-text newsletter content (subject: "{subject}"):

"""
{text}
"""

Your task:
1) Categorize the newsletter as one of:
   - "News": Timely updates on recent events or developments.
   - "Analysis": In-depth insights or interpretations of topics.
   - "Opinion": Subjective perspectives or arguments.
2) Extract 4-6 essential takeaways or key news stories (if "News") as bullet points. Include specific details (e.g., names, numbers, examples) to make them standalone and informative.
3) If "News," provide a 2-3 sentence "News Context" summarizing the top story with key details (who, what, when, where, why).
4) Provide a "Bottom Line" of 1-2 sentences capturing the core message or actionable takeaway.

Return your response in this format:

Category: [News/Analysis/Opinion]

Essential Takeaways:
- Takeaway 1 with details
- Takeaway 2 with details
- Takeaway 3 with details
- Takeaway 4 with details

News Context (if News):
- 2-3 sentences about the top story.

Bottom Line:
- 1-2 sentences with the core message or takeaway.
"#
    )
}
