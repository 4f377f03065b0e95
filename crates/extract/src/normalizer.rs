use regex::Regex;
use std::sync::LazyLock;

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());
static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{00A0}\x{3000}]+").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

pub struct TextNormalizer {
    max_chars: usize,
}

impl TextNormalizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Clean extracted text: drop control characters, collapse whitespace,
    /// trim every line, keep at most one blank line between paragraphs.
    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "\n");
        let text = CONTROL_CHARS.replace_all(&text, "");
        let text = HORIZONTAL_SPACE.replace_all(&text, " ");

        let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
        let joined = trimmed.join("\n");
        let collapsed = BLANK_RUNS.replace_all(&joined, "\n\n");

        truncate_chars(collapsed.trim(), self.max_chars).to_string()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(30_000)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
