use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    News,
    Analysis,
    Opinion,
    /// Only produced when the body was too short to summarize
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "News",
            Category::Analysis => "Analysis",
            Category::Opinion => "Opinion",
            Category::Unknown => "Unknown",
        }
    }

    /// Case-insensitive match on the three labels a model may return
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "news" => Some(Category::News),
            "analysis" => Some(Category::Analysis),
            "opinion" => Some(Category::Opinion),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub category: Category,
    pub insights: Vec<String>,
    pub news_context: Option<String>,
    pub bottom_line: String,
    /// Minutes, always >= 1
    pub reading_time: u32,
}

impl SummaryRecord {
    /// Record used when the body has too little text to be worth a model call
    pub fn too_short() -> Self {
        Self {
            category: Category::Unknown,
            insights: vec!["Content too short to summarize.".to_string()],
            news_context: None,
            bottom_line: "No key takeaway available.".to_string(),
            reading_time: 1,
        }
    }

    /// Record used when the model call failed in any way
    pub fn failed() -> Self {
        Self {
            category: Category::Analysis,
            insights: vec!["Error summarizing content.".to_string()],
            news_context: None,
            bottom_line: "Unable to generate summary.".to_string(),
            reading_time: 1,
        }
    }
}

/// One newsletter's slot in the digest
#[derive(Debug, Clone, Serialize)]
pub struct DigestEntry {
    pub anchor: String,
    pub sender: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub message_id: String,
    pub summary: SummaryRecord,
}

impl DigestEntry {
    pub fn anchor_for(position: usize) -> String {
        format!("newsletter-{}", position)
    }
}

/// The rendered digest, ready to be handed to delivery
#[derive(Debug, Clone)]
pub struct DigestDocument {
    pub subject: String,
    pub html: String,
    pub plain_text: String,
    pub entry_count: usize,
}

impl DigestDocument {
    pub fn write_html(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.html)
            .with_context(|| format!("Unable to write digest to {}", path.display()))
    }
}

/// "1 newsletter", "3 newsletters"
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "newsletter"), "1 newsletter");
        assert_eq!(pluralize(0, "newsletter"), "0 newsletters");
        assert_eq!(pluralize(7, "newsletter"), "7 newsletters");
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("NEWS"), Some(Category::News));
        assert_eq!(Category::from_label(" opinion "), Some(Category::Opinion));
        assert_eq!(Category::from_label("Unknown"), None);
    }

    #[test]
    fn test_write_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.html");
        let doc = DigestDocument {
            subject: "s".to_string(),
            html: "<html></html>".to_string(),
            plain_text: String::new(),
            entry_count: 1,
        };
        doc.write_html(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
    }
}
