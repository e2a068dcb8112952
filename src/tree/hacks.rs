//! Repairs applied to the raw User-Agent before it is parsed.
//!
//! Real traffic contains User-Agents mangled by proxies, loggers and buggy
//! clients. Each repair here is cheap and applied in a fixed order.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Substrings that are noise and their replacement.
const KNOWN_GARBAGE: &[(&str, &str)] = &[("__", " "), ("; ;", ";")];

const SYNTHETIC_PRODUCT: &str = "Mozilla/5.0 ";

fn multiple_spaces() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(" {2,}").ok()).as_ref()
}

// "Version/4.0Mobile Safari" -> "Version/4.0 Mobile Safari"
fn missing_space() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(/[0-9]+\.[0-9]+)([A-Z][a-z][a-z][a-z]+ )").ok())
        .as_ref()
}

fn bare_comment_start() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^\(( |;|null|compatible|windows|android|linux)").ok())
        .as_ref()
}

/// Decode `%XX` escapes; invalid escapes are kept as they are.
pub fn percent_decode(input: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                decoded.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Apply every repair, in order, to a raw User-Agent.
///
/// ```rust
/// use useragent_engine::tree::hacks::fix_it;
///
/// assert_eq!(fix_it("(compatible; Bot)"), "Mozilla/5.0 (compatible; Bot)");
/// assert_eq!(fix_it("Foo/1.0  Bar"), "Foo/1.0 Bar");
/// ```
pub fn fix_it(user_agent: &str) -> String {
    let mut text: Cow<'_, str> = Cow::Borrowed(user_agent);

    if text.contains(['\u{202F}', '\u{00A0}']) {
        text = Cow::Owned(text.replace(['\u{202F}', '\u{00A0}'], " "));
    }

    if let Some(pattern) = multiple_spaces().filter(|p| p.is_match(&text)) {
        text = Cow::Owned(pattern.replace_all(&text, " ").into_owned());
    }

    if let Some(pattern) = missing_space().filter(|p| p.is_match(&text)) {
        text = Cow::Owned(pattern.replace_all(&text, "$1 $2").into_owned());
    }

    for (garbage, replacement) in KNOWN_GARBAGE {
        if text.contains(garbage) {
            text = Cow::Owned(text.replace(garbage, replacement));
        }
    }

    if text.contains("%20") {
        text = Cow::Owned(percent_decode(&text));
    }

    let trimmed = text.trim();
    if trimmed.starts_with('/') {
        return format!("Mozilla{trimmed}");
    }
    if bare_comment_start().is_some_and(|pattern| pattern.is_match(trimmed)) {
        return format!("{SYNTHETIC_PRODUCT}{trimmed}");
    }
    trimmed.to_string()
}
