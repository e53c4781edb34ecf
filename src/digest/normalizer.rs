use log::warn;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Compiled patterns for the full cleaning pass.
/// `None` means one of them failed to compile and only the tag-stripping fallback is used.
static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| {
    let patterns = Patterns::compile();
    if patterns.is_none() {
        warn!("Normalizer patterns failed to compile, falling back to plain tag stripping");
    }
    patterns
});

struct Patterns {
    style: Regex,
    script: Regex,
    comment: Regex,
    tag: Regex,
    entity: Regex,
    boilerplate: Regex,
    url: Regex,
    whitespace: Regex,
}

impl Patterns {
    fn compile() -> Option<Self> {
        Some(Self {
            style: Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").ok()?,
            script: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").ok()?,
            comment: Regex::new(r"(?s)<!--.*?-->").ok()?,
            tag: Regex::new(r"<[^<>]+>").ok()?,
            entity: Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").ok()?,
            boilerplate: Regex::new(
                r"(?i)\b(?:unsubscribe|view (?:it |this (?:email|post) )?in (?:your )?browser|follow us|share this|click here|sponsored|sponsor|advertisement)\b",
            )
            .ok()?,
            url: Regex::new(r"(?i)\b(?:https?://|www\.)\S+").ok()?,
            whitespace: Regex::new(r"\s+").ok()?,
        })
    }

    /// Repeat the cleaning pass until nothing changes. After the first pass every
    /// change strictly shortens the text, so this terminates.
    fn normalize(&self, html: &str) -> String {
        let mut text = self.clean_once(html);
        loop {
            let next = self.clean_once(&text);
            if next == text {
                return text;
            }
            text = next;
        }
    }

    fn clean_once(&self, html: &str) -> String {
        let text = self.style.replace_all(html, " ");
        let text = self.script.replace_all(&text, " ");
        let text = self.comment.replace_all(&text, " ");
        // decoded `<`/`>` must still go through the tag pass
        let text = self
            .entity
            .replace_all(&text, |caps: &Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()));
        let text = self.tag.replace_all(&text, " ");
        let text = self.url.replace_all(&text, " ");
        let text = self.boilerplate.replace_all(&text, " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Turn a raw HTML newsletter body into plain text suitable for the model.
///
/// Style/script blocks disappear with their content. Entities are decoded before
/// the tag pass, every tag becomes a space, unsubscribe/share/sponsor boilerplate
/// and bare URLs are dropped, and whitespace is collapsed. Running it on its own
/// output changes nothing. Never fails.
pub fn normalize(html: &str) -> String {
    match PATTERNS.as_ref() {
        Some(patterns) => patterns.normalize(html),
        None => strip_tags(html),
    }
}

/// Fallback path: drop anything between `<` and `>` and collapse whitespace
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove control characters and U+FFFD so they can't leak into rendered markup
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}' | '\u{FFFD}'))
        .collect()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return Some(match char::from_u32(code)? {
            // zero-width fillers newsletters pad their preheader with
            '\u{034F}' | '\u{00AD}' | '\u{200B}'..='\u{200D}' | '\u{FEFF}' => String::new(),
            '\u{00A0}' => " ".to_string(),
            c => c.to_string(),
        });
    }

    let decoded = match name {
        "nbsp" | "ensp" | "emsp" | "thinsp" => " ",
        "zwnj" | "zwj" | "shy" => "",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "lsquo" | "rsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        _ => return None,
    };
    Some(decoded.to_string())
}
