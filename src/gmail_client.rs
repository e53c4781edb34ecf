use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use lettre::message::{Mailbox, MultiPart};
use log::{debug, info, warn};

use crate::config::GmailConfig;
use crate::email::{MailDelivery, MailQuery, MailThread, RawMessage};

const USER_ID: &str = "me";

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        // Read OAuth2 client credentials from file
        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        // Scope::Modify covers searching, reading and sending
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailClient { hub })
    }

    /// Address of the authenticated account, used as the default recipient
    pub async fn user_email(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile(USER_ID)
            .add_scope(google_gmail1::api::Scope::Modify)
            .doit()
            .await
            .context("Unable to read Gmail profile")?;

        profile
            .email_address
            .context("Gmail profile has no email address")
    }

    /// Print every label, the digest label highlighted
    pub async fn list_labels(&self, highlight: &str) -> Result<()> {
        info!("Retrieving Gmail labels list");

        let result = self
            .hub
            .users()
            .labels_list(USER_ID)
            .add_scope(google_gmail1::api::Scope::Modify)
            .doit()
            .await
            .context("Unable to list labels")?;

        let mut labels = result.1.labels.unwrap_or_default();

        if labels.is_empty() {
            println!("No labels found.");
            return Ok(());
        }

        println!("Found {} label(s):\n", labels.len());
        println!("{:<40} {:<30} {:<15}", "Label Name", "Label ID", "Type");
        println!("{}", "=".repeat(85));

        labels.sort_by(|a, b| a.name.as_deref().unwrap_or("").cmp(b.name.as_deref().unwrap_or("")));

        for label in labels {
            let name = label.name.unwrap_or_else(|| "Unknown".to_string());
            let id = label.id.unwrap_or_else(|| "Unknown".to_string());
            let label_type = label.type_.unwrap_or_else(|| "Unknown".to_string());

            if name.eq_ignore_ascii_case(highlight) {
                println!("✨ {:<38} {:<30} {:<15}", name, id, label_type);
            } else {
                println!("{:<40} {:<30} {:<15}", name, id, label_type);
            }
        }

        Ok(())
    }

    pub async fn search_threads(&self, query: &str, offset: usize, max_results: usize) -> Result<Vec<MailThread>> {
        debug!("Search criteria: {} (offset {}, max {})", query, offset, max_results);

        // The API pages with tokens, not offsets: over-fetch and skip
        let wanted = u32::try_from(offset + max_results).unwrap_or(u32::MAX);
        let result = self
            .hub
            .users()
            .threads_list(USER_ID)
            .q(query)
            .max_results(wanted)
            .add_scope(google_gmail1::api::Scope::Modify)
            .doit()
            .await
            .context("Error searching for threads")?;

        let thread_ids: Vec<String> = result
            .1
            .threads
            .unwrap_or_default()
            .into_iter()
            .filter_map(|thread| thread.id)
            .skip(offset)
            .take(max_results)
            .collect();

        info!("Found {} thread(s) matching '{}'", thread_ids.len(), query);

        let mut threads = Vec::with_capacity(thread_ids.len());
        for thread_id in thread_ids {
            threads.push(self.fetch_thread(&thread_id).await?);
        }

        Ok(threads)
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<MailThread> {
        let (_, thread) = self
            .hub
            .users()
            .threads_get(USER_ID, thread_id)
            .format("minimal")
            .add_scope(google_gmail1::api::Scope::Modify)
            .doit()
            .await
            .with_context(|| format!("Unable to retrieve thread {}", thread_id))?;

        let mut messages = Vec::new();
        for message in thread.messages.unwrap_or_default() {
            let Some(message_id) = message.id else {
                continue;
            };
            let received_at = message
                .internal_date
                .and_then(DateTime::<Utc>::from_timestamp_millis);
            messages.push(self.fetch_message(&message_id, received_at).await?);
        }

        Ok(MailThread::new(thread_id, messages))
    }

    /// Fetch a message in RAW format and parse it.
    /// `received_at` is Gmail's internal date; the `Date` header is the fallback.
    pub async fn fetch_message(&self, message_id: &str, received_at: Option<DateTime<Utc>>) -> Result<RawMessage> {
        debug!("Complete email retrieval for ID: {}", message_id);

        let result = self
            .hub
            .users()
            .messages_get(USER_ID, message_id)
            .format("raw")
            .add_scope(google_gmail1::api::Scope::Modify)
            .doit()
            .await;

        let message = match result {
            Ok((_, msg)) => msg,
            Err(e) => {
                warn!("Error retrieving in RAW format: {}", e);
                return Err(anyhow::anyhow!("Unable to retrieve email {}: {}", message_id, e));
            }
        };

        // Raw content is already decoded by Gmail API (RFC822 format)
        let raw_bytes = message.raw.context("No raw content in email")?;
        debug!("Email retrieved, size: {} bytes", raw_bytes.len());

        parse_raw_message(message_id, &raw_bytes, received_at)
    }

    pub async fn send_message(&self, to: &str, subject: &str, plain_text: &str, html_body: &str) -> Result<()> {
        let raw = build_digest_email(to, subject, plain_text, html_body)?;
        let mime_type: mime::Mime = "message/rfc822".parse().context("Invalid MIME type")?;

        let (_, sent) = self
            .hub
            .users()
            .messages_send(google_gmail1::api::Message::default(), USER_ID)
            .add_scope(google_gmail1::api::Scope::Modify)
            .upload(std::io::Cursor::new(raw), mime_type)
            .await
            .context("Unable to send digest email")?;

        debug!("Digest sent, Gmail message ID: {:?}", sent.id);
        Ok(())
    }
}

impl MailQuery for GmailClient {
    fn search<'a>(
        &'a self,
        query: &'a str,
        offset: usize,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<MailThread>>> {
        Box::pin(self.search_threads(query, offset, max_results))
    }
}

impl MailDelivery for GmailClient {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        plain_text: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send_message(to, subject, plain_text, html_body))
    }
}

/// Parse an RFC822 message into the fields the digest needs
pub fn parse_raw_message(message_id: &str, raw: &[u8], received_at: Option<DateTime<Utc>>) -> Result<RawMessage> {
    let parsed_email = mail_parser::MessageParser::default()
        .parse(raw)
        .context("Unable to parse email")?;

    let received_at = received_at.unwrap_or_else(|| {
        parsed_email
            .date()
            .and_then(|date| DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0))
            .unwrap_or_else(|| {
                warn!("No date in email {}, using current date", message_id);
                Utc::now()
            })
    });

    let from = parsed_email
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (None, Some(email)) => email.to_string(),
            (Some(name), None) => name.to_string(),
            _ => "Unknown sender".to_string(),
        })
        .unwrap_or_else(|| "Unknown sender".to_string());

    let subject = parsed_email.subject().unwrap_or("No subject").to_string();

    // Newsletters are HTML; plain-text-only mail still goes through the normalizer fine
    let html_body = parsed_email
        .body_html(0)
        .or_else(|| parsed_email.body_text(0))
        .map(|body| body.into_owned())
        .unwrap_or_default();

    Ok(RawMessage {
        id: message_id.to_string(),
        from,
        subject,
        received_at,
        html_body,
    })
}

/// RFC822 `multipart/alternative` message with the plain-text fallback and the HTML digest
pub fn build_digest_email(to: &str, subject: &str, plain_text: &str, html_body: &str) -> Result<Vec<u8>> {
    let mailbox: Mailbox = to
        .parse()
        .with_context(|| format!("Invalid recipient address '{}'", to))?;

    let message = lettre::Message::builder()
        .from(mailbox.clone())
        .to(mailbox)
        .subject(subject)
        .multipart(MultiPart::alternative_plain_html(
            plain_text.to_string(),
            html_body.to_string(),
        ))
        .context("Unable to build digest email")?;

    Ok(message.formatted())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "From: \"Money Stuff\" <noreply@bloomberg.net>\r\n\
        To: reader@example.com\r\n\
        Subject: The bank run\r\n\
        Date: Tue, 05 Mar 2024 14:30:00 +0000\r\n\
        MIME-Version: 1.0\r\n\
        Content-Type: text/html; charset=utf-8\r\n\
        \r\n\
        <html><body><p>Banks are <b>fragile</b>.</p></body></html>\r\n";

    #[test]
    fn test_parse_raw_message() {
        let message = parse_raw_message("abc123", SAMPLE.as_bytes(), None).unwrap();
        assert_eq!(message.id, "abc123");
        assert_eq!(message.from, "Money Stuff <noreply@bloomberg.net>");
        assert_eq!(message.subject, "The bank run");
        assert_eq!(message.received_at.to_rfc3339(), "2024-03-05T14:30:00+00:00");
        assert!(message.html_body.contains("<b>fragile</b>"));
    }

    #[test]
    fn test_internal_date_wins_over_header() {
        let internal = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let message = parse_raw_message("abc123", SAMPLE.as_bytes(), Some(internal)).unwrap();
        assert_eq!(message.received_at, internal);
    }

    #[test]
    fn test_build_digest_email() {
        let raw = build_digest_email("reader@example.com", "Newsletter Digest: 2 newsletters", "plain", "<p>html</p>").unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("To: reader@example.com"));
        assert!(text.contains("<p>html</p>"));
    }

    #[test]
    fn test_build_digest_email_rejects_bad_address() {
        assert!(build_digest_email("not an address", "s", "p", "h").is_err());
    }
}
