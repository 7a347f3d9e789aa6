//! Strips markup and tracking noise from raw posting text.

use regex::{Captures, Regex};
use tracing::trace;

pub struct Sanitizer {
    entity: Regex,
    script_or_style: Regex,
    comment: Regex,
    tag: Regex,
    tracking: Vec<Regex>,
    url: Regex,
    email: Regex,
    whitespace: Regex,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        let tracking = [
            r"(?i)https?://\S*\.cloudfront\.net\S*",
            r"(?i)https?://\S*analytics\S*",
            r#"(?i)data-[a-z-]+=["'][^"']*["']"#,
            r"(?i)utm_[a-z]+=\S*",
            r"(?i)defer\s+src=",
            r"(?i)script\s+id=",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid tracking regex"))
        .collect();

        Self {
            entity: Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
                .expect("Invalid entity regex"),
            script_or_style: Regex::new(
                r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>",
            )
            .expect("Invalid script regex"),
            comment: Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"),
            tag: Regex::new(r"<[^>]+>").expect("Invalid tag regex"),
            tracking,
            url: Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("Invalid URL regex"),
            email: Regex::new(r"\S+@\S+\.\S+").expect("Invalid email regex"),
            whitespace: Regex::new(r"\s+").expect("Invalid whitespace regex"),
        }
    }

    /// Returns plain, single-spaced text. Never fails; empty in, empty out.
    ///
    /// Passes repeat until the output stops changing, so
    /// `sanitize(sanitize(x)) == sanitize(x)`. After the first pass the text is
    /// single-spaced, and from then on every change strictly shortens it.
    pub fn sanitize(&self, raw: &str) -> String {
        let mut current = self.scrub(raw);
        let mut passes = 1;
        loop {
            let next = self.scrub(&current);
            if next == current {
                if passes > 2 {
                    trace!("Sanitizer settled after {passes} passes");
                }
                return current;
            }
            current = next;
            passes += 1;
        }
    }

    fn scrub(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = self.decode_entities(text);
        let text = self.script_or_style.replace_all(&text, " ");
        let text = self.comment.replace_all(&text, " ");
        let mut text = self.tag.replace_all(&text, " ").into_owned();

        for pattern in &self.tracking {
            text = pattern.replace_all(&text, " ").into_owned();
        }

        let text = self.url.replace_all(&text, " ");
        let text = self.email.replace_all(&text, " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }

    /// Decodes until no entity remains; unknown entities become spaces.
    fn decode_entities(&self, text: &str) -> String {
        let mut current = text.to_string();
        while self.entity.is_match(&current) {
            current = self
                .entity
                .replace_all(&current, |caps: &Captures| {
                    decode_entity(&caps[1]).map_or_else(|| " ".to_string(), String::from)
                })
                .into_owned();
        }
        current
    }
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(&['x', 'X'][..]) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    let decoded = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(decoded)
}
