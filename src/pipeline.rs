use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::config::{check_window_hours, DigestConfig, MAX_CONCURRENCY};
use crate::digest::{
    assemble, clean_text, normalize, CompletionEndpoint, DigestContext, DigestDocument, DigestEntry,
    Summarizer, SummaryRecord,
};
use crate::email::{extract_sender_name, MailDelivery, MailQuery, RawMessage};
use crate::error::DigestError;

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub label: String,
    pub window_hours: i64,
    pub max_threads: usize,
    pub concurrency: usize,
    pub recipient: String,
    pub greeting_name: Option<String>,
}

impl PipelineSettings {
    pub fn from_config(config: &DigestConfig, recipient: String) -> Self {
        Self {
            label: config.label.clone(),
            window_hours: config.window_hours,
            max_threads: config.max_threads,
            concurrency: config.concurrency,
            recipient,
            greeting_name: config.greeting_name.clone(),
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// No thread or no message inside the window; nothing was sent
    NothingToSend,
    /// Dry run: the digest was built but not delivered
    Built(DigestDocument),
    Delivered { entries: usize, recipient: String },
}

/// `after:2024/05/01 label:substack`
pub fn search_query(cutoff_date: NaiveDate, label: &str) -> String {
    format!("after:{} label:{}", cutoff_date.format("%Y/%m/%d"), label)
}

/// Start of the look-back window ending at `now`
pub fn window_cutoff(now: DateTime<Utc>, window_hours: i64) -> Result<DateTime<Utc>, DigestError> {
    let hours = check_window_hours(window_hours)?;
    Duration::try_hours(hours)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| DigestError::Configuration(format!("window of {} hours is out of range", hours)))
}

/// One digest run: query, summarize each message, assemble, deliver.
pub struct DigestPipeline<Q, D, E> {
    mail: Q,
    delivery: D,
    summarizer: Summarizer<E>,
    settings: PipelineSettings,
}

impl<Q, D, E> DigestPipeline<Q, D, E>
where
    Q: MailQuery,
    D: MailDelivery,
    E: CompletionEndpoint,
{
    pub fn new(mail: Q, delivery: D, summarizer: Summarizer<E>, settings: PipelineSettings) -> Self {
        Self {
            mail,
            delivery,
            summarizer,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Build the digest and send it, unless `dry_run` is set
    pub async fn run(&self, now: DateTime<Utc>, dry_run: bool) -> Result<RunOutcome, DigestError> {
        let Some(document) = self.build_digest(now).await? else {
            return Ok(RunOutcome::NothingToSend);
        };

        if dry_run {
            info!("🧪 Dry run: digest with {} entries built, not sent", document.entry_count);
            return Ok(RunOutcome::Built(document));
        }

        info!("📤 Sending digest '{}' to {}", document.subject, self.settings.recipient);
        self.delivery
            .send(
                &self.settings.recipient,
                &document.subject,
                &document.plain_text,
                &document.html,
            )
            .await
            .map_err(DigestError::Delivery)?;

        info!(
            "✅ Digest email with {} newsletter(s) sent to {}",
            document.entry_count, self.settings.recipient
        );

        Ok(RunOutcome::Delivered {
            entries: document.entry_count,
            recipient: self.settings.recipient.clone(),
        })
    }

    /// Returns `None` when there is nothing inside the window
    pub async fn build_digest(&self, now: DateTime<Utc>) -> Result<Option<DigestDocument>, DigestError> {
        let cutoff = window_cutoff(now, self.settings.window_hours)?;
        let messages = self.collect_messages(cutoff).await?;

        if messages.is_empty() {
            info!(
                "No newsletter emails found in the last {} hours with label '{}'",
                self.settings.window_hours, self.settings.label
            );
            return Ok(None);
        }

        let entries = self.build_entries(messages).await;

        let context = DigestContext {
            greeting_name: self.settings.greeting_name.clone(),
            label: self.settings.label.clone(),
            window_hours: self.settings.window_hours,
        };

        Ok(Some(assemble(&entries, &context)))
    }

    /// Messages received at or after `cutoff`, in the order the mail store returned them
    pub async fn collect_messages(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawMessage>, DigestError> {
        let query = search_query(cutoff.with_timezone(&Local).date_naive(), &self.settings.label);
        info!("🔍 Searching newsletters: {}", query);

        let threads = self
            .mail
            .search(&query, 0, self.settings.max_threads)
            .await
            .map_err(DigestError::Query)?;

        if threads.is_empty() {
            return Ok(Vec::new());
        }

        let fetched: usize = threads.iter().map(|t| t.messages().len()).sum();
        let messages: Vec<RawMessage> = threads
            .into_iter()
            .flat_map(|thread| thread.into_messages())
            .filter(|message| message.received_at >= cutoff)
            .collect();

        info!(
            "Found {} thread message(s), {} received since {}",
            fetched,
            messages.len(),
            cutoff.format("%Y-%m-%d %H:%M UTC")
        );

        Ok(messages)
    }

    /// Summarize every message and number the entries in arrival order.
    /// Summaries may run concurrently; `buffered` hands them back in input order.
    pub async fn build_entries(&self, messages: Vec<RawMessage>) -> Vec<DigestEntry> {
        let concurrency = self.settings.concurrency.clamp(1, MAX_CONCURRENCY);

        stream::iter(messages.into_iter().enumerate())
            .map(|(index, message)| async move {
                let summary = self.summarize_message(&message).await;
                DigestEntry {
                    anchor: DigestEntry::anchor_for(index + 1),
                    sender: clean_text(&extract_sender_name(&message.from)),
                    subject: clean_text(&message.subject),
                    received_at: message.received_at,
                    message_id: message.id,
                    summary,
                }
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn summarize_message(&self, message: &RawMessage) -> SummaryRecord {
        debug!("Summarizing message {} ({} bytes of HTML)", message.id, message.html_body.len());

        let subject = clean_text(&message.subject);
        let text = normalize(&message.html_body);
        let summary = self.summarizer.summarize(&text, &subject).await;

        if summary == SummaryRecord::failed() {
            warn!("Message {} gets a degraded summary", message.id);
        }

        summary
    }
}
