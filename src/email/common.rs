/// Common structures shared by the mail adapters and the digest pipeline
use chrono::{DateTime, Utc};

/// A received message as handed over by the mail store
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub html_body: String,
}

/// A conversation returned by a mail search, messages in store order
#[derive(Debug, Clone, Default)]
pub struct MailThread {
    pub id: String,
    messages: Vec<RawMessage>,
}

impl MailThread {
    pub fn new(id: impl Into<String>, messages: Vec<RawMessage>) -> Self {
        Self {
            id: id.into(),
            messages,
        }
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<RawMessage> {
        self.messages
    }
}

/// Keep only the display name of a `From` header.
///
/// `"Jane Doe" <jane@example.com>` and `Jane Doe <jane@example.com>` both
/// give `Jane Doe`. Anything without a usable name is returned as-is.
pub fn extract_sender_name(from: &str) -> String {
    let trimmed = from.trim();
    let name_part = match trimmed.find('<') {
        Some(idx) if trimmed.ends_with('>') => &trimmed[..idx],
        Some(_) => return trimmed.to_string(),
        None => trimmed,
    };

    let name = name_part.trim().trim_matches('"').trim();
    if name.is_empty() || name.contains('"') {
        trimmed.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sender_name() {
        assert_eq!(extract_sender_name("\"Lenny Rachitsky\" <lenny@substack.com>"), "Lenny Rachitsky");
        assert_eq!(extract_sender_name("Matt Levine <money@bloomberg.net>"), "Matt Levine");
        assert_eq!(extract_sender_name("Stratechery"), "Stratechery");
        assert_eq!(extract_sender_name("<noreply@substack.com>"), "<noreply@substack.com>");
        assert_eq!(extract_sender_name("  news@example.com "), "news@example.com");
    }

    #[test]
    fn test_thread_keeps_message_order() {
        let msg = |id: &str| RawMessage {
            id: id.to_string(),
            from: "A <a@example.com>".to_string(),
            subject: "s".to_string(),
            received_at: Utc::now(),
            html_body: String::new(),
        };
        let thread = MailThread::new("t1", vec![msg("m1"), msg("m2")]);
        let ids: Vec<&str> = thread.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }
}
