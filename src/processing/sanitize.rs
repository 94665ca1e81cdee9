//! Normalization applied to extracted text before it is chunked.

use regex::Regex;
use std::sync::OnceLock;

fn disallowed_characters() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s.,!?;:\-()]").expect("valid character class"))
}

fn whitespace_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn period_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.{2,}").expect("valid period pattern"))
}

/// Clean raw extracted text.
///
/// Characters other than word characters, whitespace, and `. , ! ? ; : - ( )` are dropped,
/// whitespace runs become a single space, repeated periods become one, and the result is
/// trimmed. Dropping characters happens first so that `clean_text(clean_text(x)) ==
/// clean_text(x)` holds for every input.
pub fn clean_text(text: &str) -> String {
    let kept = disallowed_characters().replace_all(text, "");
    let collapsed = whitespace_runs().replace_all(&kept, " ");
    let periods = period_runs().replace_all(&collapsed, ".");
    periods.trim().to_string()
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
