use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

use super::model::{pluralize, Category, DigestDocument, DigestEntry};
use super::normalizer::clean_text;

const GMAIL_MESSAGE_URL: &str = "https://mail.google.com/mail/u/0/#inbox/";

/// Per-run details that are not part of any entry
#[derive(Debug, Clone)]
pub struct DigestContext {
    pub greeting_name: Option<String>,
    pub label: String,
    pub window_hours: i64,
}

pub fn message_link(message_id: &str) -> String {
    format!("{}{}", GMAIL_MESSAGE_URL, message_id)
}

/// Render the digest. Entries keep the order they are given in; callers
/// never pass an empty slice since an empty digest is not sent.
pub fn assemble(entries: &[DigestEntry], context: &DigestContext) -> DigestDocument {
    let count_phrase = pluralize(entries.len(), "newsletter");
    let window = match context.window_hours {
        1 => "hour".to_string(),
        hours => format!("{} hours", hours),
    };

    DigestDocument {
        subject: format!("Newsletter Digest: {} from the last {}", count_phrase, window),
        html: render_html(entries, context, &count_phrase, &window),
        plain_text: render_plain_text(entries, &count_phrase, &window),
        entry_count: entries.len(),
    }
}

fn render_html(entries: &[DigestEntry], context: &DigestContext, count_phrase: &str, window: &str) -> String {
    let mut html = String::with_capacity(4096 + entries.len() * 2048);

    html.push_str(
        "<html><body id=\"top\" style=\"font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; color: #333; line-height: 1.6;\">",
    );

    let greeting = match &context.greeting_name {
        Some(name) => format!("Good morning, {}! ☕️", escape(name)),
        None => "Good morning! ☕️".to_string(),
    };
    let _ = write!(
        html,
        "<h1 style=\"color: #2c3e50; font-size: 28px; margin-bottom: 10px;\">{}</h1>\
         <p>Here's your daily digest of {} from the last {}.</p>",
        greeting, count_phrase, window
    );

    // Table of contents
    html.push_str(
        "<div style=\"background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0;\">\
         <h2 style=\"color: #3498db; font-size: 22px; margin-top: 0;\">In This Digest</h2>\
         <ol style=\"padding-left: 20px;\">",
    );
    for entry in entries {
        let _ = write!(
            html,
            "<li style=\"margin-bottom: 10px;\"><a href=\"#{}\" style=\"color: #3498db;\">{}</a> — {} ({})</li>",
            entry.anchor,
            escape(&entry.subject),
            escape(&entry.sender),
            entry.summary.category
        );
    }
    html.push_str("</ol></div>");

    // Highlights
    html.push_str(
        "<div style=\"background-color: #f1f8ff; padding: 15px; border-radius: 8px; margin: 20px 0;\">\
         <h2 style=\"font-size: 20px; color: #2c3e50; margin-top: 0;\">Highlights</h2>\
         <ul style=\"padding-left: 20px;\">",
    );
    for entry in entries {
        let _ = write!(
            html,
            "<li style=\"margin-bottom: 10px;\"><a href=\"#{}\" style=\"color: #2c3e50; font-weight: bold;\">{}</a>: {}</li>",
            entry.anchor,
            escape(&entry.subject),
            escape(&entry.summary.bottom_line)
        );
    }
    html.push_str("</ul></div>");

    for entry in entries {
        render_entry(&mut html, entry);
    }

    let _ = write!(
        html,
        "<p style=\"font-size: 12px; color: #999; text-align: center; margin-top: 30px;\">\
         This digest was automatically generated from your newsletters labeled '{}'.</p>\
         </body></html>",
        escape(&context.label)
    );

    html
}

fn render_entry(html: &mut String, entry: &DigestEntry) {
    let summary = &entry.summary;

    let _ = write!(
        html,
        "<div style=\"padding: 20px; border-bottom: 1px solid #ddd; margin-bottom: 20px;\">\
         <h2 id=\"{anchor}\" style=\"font-size: 22px; color: #3498db; margin-bottom: 10px;\">\
         <a href=\"#{anchor}\" style=\"color: #3498db; text-decoration: none;\">{subject}</a></h2>\
         <p style=\"color: #888; font-size: 13px; margin: 0;\">{sender} • {date} • {minutes} min read</p>\
         <p style=\"font-weight: bold; color: #2c3e50; margin: 15px 0; font-size: 16px;\">{bottom_line}</p>",
        anchor = entry.anchor,
        subject = escape(&entry.subject),
        sender = escape(&entry.sender),
        date = format_timestamp(entry.received_at),
        minutes = summary.reading_time,
        bottom_line = escape(&summary.bottom_line),
    );

    html.push_str(
        "<h3 style=\"font-size: 16px; color: #555; margin: 15px 0 5px;\">Key Points:</h3>\
         <ul style=\"margin: 0 0 15px 20px; font-size: 14px; line-height: 1.6;\">",
    );
    for insight in &summary.insights {
        let _ = write!(html, "<li>{}</li>", escape(insight));
    }
    html.push_str("</ul>");

    if let Some(context) = news_context(entry) {
        let _ = write!(
            html,
            "<div style=\"background-color: #fff3e6; padding: 10px; border-left: 4px solid #ff9800; margin-bottom: 15px;\">\
             <strong>News Context:</strong> {}</div>",
            escape(context)
        );
    }

    let _ = write!(
        html,
        "<a href=\"{}\" style=\"color: #3498db; font-size: 13px;\">Read Full →</a> \
         <a href=\"#top\" style=\"color: #999; font-size: 12px; margin-left: 10px;\">Back to top ↑</a></div>",
        escape(&message_link(&entry.message_id))
    );
}

fn render_plain_text(entries: &[DigestEntry], count_phrase: &str, window: &str) -> String {
    let mut text = format!("Your daily digest of {} from the last {}.\n\nHIGHLIGHTS\n", count_phrase, window);

    for entry in entries {
        let _ = writeln!(text, "- {}: {}", clean_text(&entry.subject), clean_text(&entry.summary.bottom_line));
    }

    for (index, entry) in entries.iter().enumerate() {
        let summary = &entry.summary;
        let _ = write!(
            text,
            "\n{}. {}\n{} ({}) • {} • {} min read\n\n{}\n",
            index + 1,
            clean_text(&entry.subject),
            clean_text(&entry.sender),
            summary.category,
            format_timestamp(entry.received_at),
            summary.reading_time,
            clean_text(&summary.bottom_line)
        );
        for insight in &summary.insights {
            let _ = writeln!(text, "  * {}", clean_text(insight));
        }
        if let Some(context) = news_context(entry) {
            let _ = writeln!(text, "News Context: {}", clean_text(context));
        }
        let _ = writeln!(text, "Read full: {}", message_link(&entry.message_id));
    }

    text
}

/// The callout is only shown for News items that actually carry context
fn news_context(entry: &DigestEntry) -> Option<&str> {
    match (&entry.summary.category, &entry.summary.news_context) {
        (Category::News, Some(context)) if !context.trim().is_empty() => Some(context.as_str()),
        _ => None,
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%A, %b %-d, %-I:%M %p")
        .to_string()
}

/// Control characters removed, then HTML-escaped
fn escape(text: &str) -> String {
    let cleaned = clean_text(text);
    let mut out = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::model::SummaryRecord;

    fn entry(position: usize, subject: &str, category: Category, news_context: Option<&str>) -> DigestEntry {
        DigestEntry {
            anchor: DigestEntry::anchor_for(position),
            sender: format!("Sender {}", position),
            subject: subject.to_string(),
            received_at: Utc::now(),
            message_id: format!("msg{}", position),
            summary: SummaryRecord {
                category,
                insights: vec!["First insight".to_string(), "Second insight".to_string()],
                news_context: news_context.map(str::to_string),
                bottom_line: format!("Bottom line {}", position),
                reading_time: 3,
            },
        }
    }

    fn context() -> DigestContext {
        DigestContext {
            greeting_name: Some("Henrik".to_string()),
            label: "substack".to_string(),
            window_hours: 24,
        }
    }

    #[test]
    fn test_single_entry_is_singular() {
        let doc = assemble(&[entry(1, "Only one", Category::Analysis, None)], &context());
        assert_eq!(doc.subject, "Newsletter Digest: 1 newsletter from the last 24 hours");
        assert!(doc.html.contains("digest of 1 newsletter from"));
        assert!(doc.html.contains("Good morning, Henrik!"));
        assert_eq!(doc.entry_count, 1);
    }

    #[test]
    fn test_toc_and_highlights_follow_entry_order() {
        let entries = vec![
            entry(1, "Alpha", Category::Analysis, None),
            entry(2, "Beta", Category::Opinion, None),
            entry(3, "Gamma", Category::News, Some("Context")),
        ];
        let doc = assemble(&entries, &context());

        assert!(doc.subject.contains("3 newsletters"));
        assert!(doc.html.contains("<a href=\"#newsletter-2\" style=\"color: #3498db;\">Beta</a> — Sender 2 (Opinion)"));
        assert!(doc.html.contains("Beta</a>: Bottom line 2"));

        let alpha = doc.html.find("id=\"newsletter-1\"").unwrap();
        let beta = doc.html.find("id=\"newsletter-2\"").unwrap();
        let gamma = doc.html.find("id=\"newsletter-3\"").unwrap();
        assert!(alpha < beta && beta < gamma);
    }

    #[test]
    fn test_news_callout_only_for_news() {
        let entries = vec![
            entry(1, "Headlines", Category::News, Some("The Fed met on Tuesday.")),
            entry(2, "Hot take", Category::Opinion, Some("Should not render")),
            entry(3, "No context", Category::News, None),
        ];
        let doc = assemble(&entries, &context());

        assert_eq!(doc.html.matches("News Context:").count(), 1);
        assert!(doc.html.contains("The Fed met on Tuesday."));
        assert!(!doc.html.contains("Should not render"));
        assert!(!doc.plain_text.contains("Should not render"));
    }

    #[test]
    fn test_text_is_escaped_and_cleaned() {
        let doc = assemble(&[entry(1, "<b>Q&A</b>\u{0007}\u{FFFD}", Category::Analysis, None)], &context());
        assert!(doc.html.contains("&lt;b&gt;Q&amp;A&lt;/b&gt;"));
        assert!(!doc.html.contains('\u{0007}'));
        assert!(!doc.html.contains('\u{FFFD}'));
        assert!(!doc.html.contains("<style"));
    }

    #[test]
    fn test_deep_link_and_plain_text() {
        let doc = assemble(&[entry(1, "Alpha", Category::Analysis, None)], &context());
        assert!(doc.html.contains("https://mail.google.com/mail/u/0/#inbox/msg1"));
        assert!(doc.plain_text.contains("- Alpha: Bottom line 1"));
        assert!(doc.plain_text.contains("  * First insight"));
        assert!(doc.plain_text.contains("Read full: https://mail.google.com/mail/u/0/#inbox/msg1"));
    }

    #[test]
    fn test_greeting_without_name() {
        let ctx = DigestContext { greeting_name: None, label: "news".to_string(), window_hours: 1 };
        let doc = assemble(&[entry(1, "Alpha", Category::Analysis, None)], &ctx);
        assert!(doc.html.contains("Good morning! ☕️"));
        assert!(doc.html.contains("labeled 'news'"));
        assert_eq!(doc.subject, "Newsletter Digest: 1 newsletter from the last hour");
    }
}
