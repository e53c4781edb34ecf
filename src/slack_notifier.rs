use anyhow::{Context, Result};
use log::{error, info};
use slack_morphism::prelude::*;

use crate::config::SlackConfig;
use crate::pipeline::RunOutcome;

/// Tells the operator how each digest run went
pub struct SlackNotifier {
    client: SlackClient<SlackClientHyperHttpsConnector>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initializing Slack notifier");

        let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
        let token = SlackApiToken::new(config.bot_token.clone().into());
        let channel_id = SlackChannelId::new(config.channel_id.clone());

        Ok(SlackNotifier {
            client,
            token,
            channel_id,
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(text.to_string()),
        );

        let session = self.client.open_session(&self.token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                info!("✅ Slack message sent: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Error sending Slack message: {}", e);
                Err(e).context("Unable to send Slack message")
            }
        }
    }

    pub async fn notify_outcome(&self, outcome: &RunOutcome) -> Result<()> {
        self.send_message(&outcome_message(outcome)).await
    }

    pub async fn notify_run_failed(&self, error: &str) -> Result<()> {
        self.send_message(&failure_message(error)).await
    }
}

fn outcome_message(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NothingToSend => "📭 *Newsletter digest*: no newsletters in the window, nothing sent".to_string(),
        RunOutcome::Built(document) => format!(
            "🧪 *Newsletter digest* (dry run): built '{}' with {} entr{}",
            document.subject,
            document.entry_count,
            if document.entry_count == 1 { "y" } else { "ies" }
        ),
        RunOutcome::Delivered { entries, recipient } => format!(
            "✅ *Newsletter digest sent*\n\n• Recipient: {}\n• Newsletters: *{}*",
            recipient, entries
        ),
    }
}

fn failure_message(error: &str) -> String {
    format!("❌ *Newsletter digest run failed*\n\n• Error: ```{}```", error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        let delivered = RunOutcome::Delivered {
            entries: 4,
            recipient: "me@example.com".to_string(),
        };
        let text = outcome_message(&delivered);
        assert!(text.contains("me@example.com"));
        assert!(text.contains("*4*"));

        assert!(outcome_message(&RunOutcome::NothingToSend).contains("nothing sent"));
        assert!(failure_message("mail query failed: timeout").contains("```mail query failed: timeout```"));
    }
}
