use super::model::Category;

/// Fields pulled out of a model reply. Each one degrades on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub category: Category,
    pub insights: Vec<String>,
    pub news_context: Option<String>,
    pub bottom_line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Category,
    Takeaways,
    NewsContext,
    BottomLine,
}

const LABELS: [(&str, Section); 4] = [
    ("category", Section::Category),
    ("essential takeaways", Section::Takeaways),
    ("news context", Section::NewsContext),
    ("bottom line", Section::BottomLine),
];

/// Parse a reply written in the format requested by the summarization prompt:
///
/// ```text
/// Category: News
///
/// Essential Takeaways:
/// - ...
///
/// News Context (if News):
/// - ...
///
/// Bottom Line:
/// - ...
/// ```
pub fn parse(reply: &str) -> ParsedSummary {
    let lines: Vec<&str> = reply.lines().collect();

    ParsedSummary {
        category: parse_category(&lines),
        insights: parse_insights(&lines),
        news_context: section_text(&lines, Section::NewsContext).filter(|s| !s.is_empty()),
        bottom_line: section_text(&lines, Section::BottomLine).unwrap_or_default(),
    }
}

fn parse_category(lines: &[&str]) -> Category {
    lines
        .iter()
        .filter_map(|line| match label_of(line) {
            Some((Section::Category, rest)) => first_category_word(rest),
            _ => None,
        })
        .next()
        .unwrap_or(Category::Analysis)
}

fn first_category_word(value: &str) -> Option<Category> {
    value
        .split(|c: char| !c.is_alphabetic())
        .find_map(Category::from_label)
}

fn parse_insights(lines: &[&str]) -> Vec<String> {
    let Some(start) = find_label(lines, Section::Takeaways) else {
        return Vec::new();
    };

    let mut insights = Vec::new();
    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // a bulleted line is a takeaway even when it opens with a label word
        match strip_bullet(trimmed) {
            Some(item) => {
                if !item.is_empty() {
                    insights.push(item.to_string());
                }
            }
            None => break,
        }
    }
    insights
}

/// Text after a label: its own line's remainder plus the following lines,
/// up to the next label or the first blank line once text was found.
fn section_text(lines: &[&str], section: Section) -> Option<String> {
    let start = find_label(lines, section)?;
    let mut parts: Vec<String> = Vec::new();

    if let Some((_, rest)) = label_of(lines[start]) {
        let rest = strip_bullet(rest).unwrap_or(rest).trim();
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }
    }

    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if parts.is_empty() {
                continue;
            }
            break;
        }
        if label_of(trimmed).is_some() {
            break;
        }
        let text = strip_bullet(trimmed).unwrap_or(trimmed).trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }

    Some(parts.join(" "))
}

fn find_label(lines: &[&str], section: Section) -> Option<usize> {
    lines
        .iter()
        .position(|line| matches!(label_of(line), Some((found, _)) if found == section))
}

/// Recognise `Label:`, `**Label:**`, `### Label (if News):` and friends.
/// Returns the section and whatever follows the colon on the same line.
/// Bullet lines are never labels.
fn label_of(line: &str) -> Option<(Section, &str)> {
    if strip_bullet(line).is_some() {
        return None;
    }
    let stripped = line.trim().trim_start_matches(['#', '*', '_', ' ']);

    for (label, section) in LABELS {
        let Some(head) = stripped.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }

        let mut rest = stripped[label.len()..].trim_start();
        if rest.starts_with('(') {
            rest = match rest.find(')') {
                Some(end) => rest[end + 1..].trim_start(),
                None => continue,
            };
        }
        rest = rest.trim_start_matches(['*', '_']);

        if let Some(after) = rest.strip_prefix(':') {
            return Some((section, after.trim_start_matches(['*', '_']).trim()));
        }
        if rest.trim_matches(['*', '_', ' ']).is_empty() {
            return Some((section, ""));
        }
    }
    None
}

/// Strip a leading `-`, `*`, `•` or `1.` / `1)` marker
fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix('•'))
        .or_else(|| line.strip_prefix('–'))
    {
        return Some(rest.trim());
    }
    if line == "-" || line == "*" {
        return Some("");
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = "Category: News\n\
        \n\
        Essential Takeaways:\n\
        - The ECB cut rates by 25bp to 3.5%.\n\
        - Lagarde signalled further cuts are data-dependent.\n\
        - Euro fell 0.4% against the dollar.\n\
        - Bund yields dropped to 2.4%.\n\
        \n\
        News Context (if News):\n\
        - The European Central Bank lowered its deposit rate on Thursday in Frankfurt.\n\
        It cited easing inflation.\n\
        \n\
        Bottom Line:\n\
        - Cheaper money is coming to Europe, slowly.\n";

    #[test]
    fn test_parse_full_reply() {
        let parsed = parse(FULL_REPLY);
        assert_eq!(parsed.category, Category::News);
        assert_eq!(parsed.insights.len(), 4);
        assert_eq!(parsed.insights[0], "The ECB cut rates by 25bp to 3.5%.");
        assert_eq!(
            parsed.news_context.as_deref(),
            Some("The European Central Bank lowered its deposit rate on Thursday in Frankfurt. It cited easing inflation.")
        );
        assert_eq!(parsed.bottom_line, "Cheaper money is coming to Europe, slowly.");
    }

    #[test]
    fn test_missing_news_context() {
        let reply = "Category: Opinion\n\nEssential Takeaways:\n- Remote work is here to stay.\n- Offices become clubhouses.\n\nBottom Line:\nManagers must adapt.";
        let parsed = parse(reply);
        assert_eq!(parsed.category, Category::Opinion);
        assert_eq!(parsed.news_context, None);
        assert_eq!(parsed.insights, vec!["Remote work is here to stay.", "Offices become clubhouses."]);
        assert_eq!(parsed.bottom_line, "Managers must adapt.");
    }

    #[test]
    fn test_defaults_on_garbage() {
        let parsed = parse("I'm sorry, I can't help with that.");
        assert_eq!(parsed.category, Category::Analysis);
        assert!(parsed.insights.is_empty());
        assert_eq!(parsed.news_context, None);
        assert_eq!(parsed.bottom_line, "");
    }

    #[test]
    fn test_markdown_decorated_labels() {
        let reply = "**Category:** [Analysis]\n\n### Essential Takeaways\n1. First point\n2) Second point\n* Third point\n\n**Bottom Line:** Read it twice.";
        let parsed = parse(reply);
        assert_eq!(parsed.category, Category::Analysis);
        assert_eq!(parsed.insights, vec!["First point", "Second point", "Third point"]);
        assert_eq!(parsed.bottom_line, "Read it twice.");
    }

    #[test]
    fn test_case_insensitive_labels() {
        let parsed = parse("CATEGORY: opinion\nbottom line: - Be skeptical.");
        assert_eq!(parsed.category, Category::Opinion);
        assert_eq!(parsed.bottom_line, "Be skeptical.");
    }

    #[test]
    fn test_unknown_category_value_defaults_to_analysis() {
        let parsed = parse("Category: Satire\nBottom Line: Funny.");
        assert_eq!(parsed.category, Category::Analysis);
        assert_eq!(parsed.bottom_line, "Funny.");
    }

    #[test]
    fn test_takeaways_stop_at_next_label() {
        let reply = "Essential Takeaways:\n- One\n- Two\nBottom Line:\n- Done.";
        let parsed = parse(reply);
        assert_eq!(parsed.insights, vec!["One", "Two"]);
        assert_eq!(parsed.bottom_line, "Done.");
    }

    #[test]
    fn test_bullets_starting_with_label_words_stay_takeaways() {
        let reply = "Category: Analysis\n\nEssential Takeaways:\n\
            - Bottom line: margins improve in Q3.\n\
            * Category leaders take most of the gains.\n\
            - News context matters less than guidance.\n\
            \n\
            Bottom Line:\n\
            - Hold the stock.";
        let parsed = parse(reply);
        assert_eq!(
            parsed.insights,
            vec![
                "Bottom line: margins improve in Q3.",
                "Category leaders take most of the gains.",
                "News context matters less than guidance.",
            ]
        );
        assert_eq!(parsed.category, Category::Analysis);
        assert_eq!(parsed.news_context, None);
        assert_eq!(parsed.bottom_line, "Hold the stock.");
    }

    #[test]
    fn test_empty_news_context_is_none() {
        let parsed = parse("Category: Analysis\nNews Context (if News):\n\nBottom Line:\n- Ok.");
        assert_eq!(parsed.news_context, None);
        assert_eq!(parsed.bottom_line, "Ok.");
    }

    #[test]
    fn test_label_of() {
        assert_eq!(label_of("Category: News"), Some((Section::Category, "News")));
        assert_eq!(label_of("News Context (if News):"), Some((Section::NewsContext, "")));
        assert_eq!(label_of("- Category theory is fun"), None);
        assert_eq!(label_of("- Bottom line: buy"), None);
        assert_eq!(label_of("**Bottom Line:** buy"), Some((Section::BottomLine, "buy")));
        assert_eq!(label_of("Bottom lines are hard"), None);
    }
}
