use serde::Deserialize;
use std::fmt;

use crate::error::DigestError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub openai: OpenAiConfig,
    pub digest: DigestConfig,
    pub scheduler: SchedulerConfig,
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["08:00"])
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
}

#[derive(Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    /// Gmail label the newsletters are filed under
    pub label: String,
    pub window_hours: i64,
    pub max_threads: usize,
    /// Simultaneous summarization calls, clamped to 1..=5
    pub concurrency: usize,
    /// Falls back to the authenticated Gmail address when unset
    pub recipient: Option<String>,
    pub greeting_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

pub const MAX_CONCURRENCY: usize = 5;

/// Longest look-back accepted for one digest
pub const MAX_WINDOW_HOURS: i64 = 24 * 31;

/// The window must be at least one hour and at most `MAX_WINDOW_HOURS`
pub fn check_window_hours(hours: i64) -> Result<i64, DigestError> {
    if (1..=MAX_WINDOW_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(DigestError::Configuration(format!(
            "DIGEST_WINDOW_HOURS must be between 1 and {}, got {}",
            MAX_WINDOW_HOURS, hours
        )))
    }
}

impl Config {
    pub fn new() -> Result<Self, DigestError> {
        // Fail before any query if a secret is missing
        Self::check_required_env_vars()?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| DigestError::Configuration("OPENAI_API_KEY".to_string()))?;

        Ok(Config {
            gmail: GmailConfig {
                credentials_path: env_or("GMAIL_CREDENTIALS_PATH", "./client_credentials.json"),
                token_cache_path: env_or("GMAIL_TOKEN_CACHE_PATH", "./gmail-token-cache.json"),
            },
            openai: OpenAiConfig {
                api_key,
                model: env_or("OPENAI_MODEL", "gpt-4o"),
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                max_tokens: env_parse("OPENAI_MAX_TOKENS", 3000),
                temperature: env_parse("OPENAI_TEMPERATURE", 0.7),
                top_p: env_parse("OPENAI_TOP_P", 1.0),
                timeout_secs: env_parse("OPENAI_TIMEOUT_SECS", 45),
            },
            digest: DigestConfig {
                label: env_or("DIGEST_LABEL", "substack"),
                window_hours: check_window_hours(env_parse("DIGEST_WINDOW_HOURS", 24))?,
                max_threads: env_parse("DIGEST_MAX_THREADS", 50),
                concurrency: env_parse::<usize>("DIGEST_CONCURRENCY", 3).clamp(1, MAX_CONCURRENCY),
                recipient: std::env::var("DIGEST_RECIPIENT").ok().filter(|s| !s.trim().is_empty()),
                greeting_name: std::env::var("DIGEST_GREETING_NAME")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            scheduler: SchedulerConfig {
                enabled: env_parse("SCHEDULER_ENABLED", false),
                schedule_times: env_or("SCHEDULER_TIMES", "08:00")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            slack: match (std::env::var("SLACK_BOT_TOKEN"), std::env::var("SLACK_CHANNEL_ID")) {
                (Ok(bot_token), Ok(channel_id)) => Some(SlackConfig {
                    bot_token,
                    channel_id,
                }),
                _ => {
                    log::debug!("SLACK_BOT_TOKEN or SLACK_CHANNEL_ID not set - Slack notifications disabled");
                    None
                }
            },
        })
    }

    fn check_required_env_vars() -> Result<(), DigestError> {
        let required_vars = ["OPENAI_API_KEY"];

        let missing_vars: Vec<&str> = required_vars
            .iter()
            .copied()
            .filter(|var| std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true))
            .collect();

        if !missing_vars.is_empty() {
            return Err(DigestError::Configuration(format!(
                "{}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your credentials:\n\
                    OPENAI_API_KEY=sk-...\n\
                    GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                 \n\
                 2. Or export the variables manually:\n\
                    export OPENAI_API_KEY=sk-...\n\
                    cargo run -- --dry-run",
                missing_vars.join(", ")
            )));
        }

        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value for {}: '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
