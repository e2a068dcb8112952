//! String normalization helpers used by steps and rule outputs.
//!
//! These are pure functions with casing heuristics for human readable
//! brand and device names. `.`, `-`, `_` and space separate words and are
//! copied to the output unchanged.

use regex::Regex;
use std::sync::OnceLock;

fn is_token_separator(c: char) -> bool {
    matches!(c, ' ' | '-' | '_' | '.')
}

fn flush_word(result: &mut String, word: &str, word_length: usize, has_digits: bool) {
    if word_length <= 3 || has_digits {
        result.push_str(&word.to_uppercase());
    } else {
        result.push_str(word);
    }
}

/// Normalize the casing of a brand name.
///
/// Words of at most three characters or containing a digit are upper-cased.
/// Longer words get a capital first letter and lower-case rest, except that
/// once a run of three lower-case letters has been seen the remaining
/// characters keep their casing ("BlackBerry" stays "BlackBerry").
///
/// ```rust
/// use useragent_engine::normalize::brand;
///
/// assert_eq!(brand("samsung"), "Samsung");
/// assert_eq!(brand("htc"), "HTC");
/// assert_eq!(brand("sony ERICSSON"), "Sony Ericsson");
/// ```
pub fn brand(brand: &str) -> String {
    if brand.chars().count() <= 3 {
        return brand.to_uppercase();
    }

    let mut result = String::with_capacity(brand.len());
    let mut word = String::with_capacity(brand.len());
    let mut word_length = 0;
    let mut has_digits = false;
    let mut lowercase_run = 0;
    let mut keep_casing = false;

    for c in brand.chars() {
        if is_token_separator(c) {
            flush_word(&mut result, &word, word_length, has_digits);
            word.clear();
            word_length = 0;
            has_digits = false;
            lowercase_run = 0;
            keep_casing = false;
            result.push(c);
            continue;
        }

        if c.is_numeric() {
            has_digits = true;
        }

        if word_length == 0 {
            word.extend(c.to_uppercase());
        } else if c.is_lowercase() {
            lowercase_run += 1;
            if lowercase_run >= 3 {
                keep_casing = true;
            }
            word.push(c);
        } else {
            lowercase_run = 0;
            if keep_casing {
                word.push(c);
            } else {
                word.extend(c.to_lowercase());
            }
        }
        word_length += 1;
    }
    flush_word(&mut result, &word, word_length, has_digits);
    result
}

/// Replace every occurrence of `search` with `replace` (no patterns).
pub fn replace_string(input: &str, search: &str, replace: &str) -> String {
    if search.is_empty() {
        return input.to_string();
    }
    input.replace(search, replace)
}

/// Undo the usual obfuscations of email addresses found in User-Agents.
///
/// ```rust
/// use useragent_engine::normalize::email;
///
/// assert_eq!(email("bot at example dot com"), "bot@example.com");
/// ```
pub fn email(email: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("[at]", "@"),
        ("\\@", "@"),
        ("[dot]", "."),
        ("\\.", "."),
        (" at ", "@"),
        (" dot ", "."),
        (" ", ""),
    ];
    REPLACEMENTS
        .iter()
        .fold(email.to_string(), |cleaned, (search, replace)| {
            replace_string(&cleaned, search, replace)
        })
}

fn dash_cleanup() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [("- +", "-"), (" +-", "-"), (" +", " "), ("( -)+", " ")]
            .into_iter()
            .filter_map(|(pattern, replace)| Regex::new(pattern).ok().map(|r| (r, replace)))
            .collect()
    })
}

/// Combine a device brand and a device name into one normalized name.
///
/// A name that already starts with the brand keeps it once (a brand glued
/// to the model gets a space); otherwise the brand is prepended.
///
/// ```rust
/// use useragent_engine::normalize::cleanup_device_brand_name;
///
/// assert_eq!(cleanup_device_brand_name("Samsung", "samsung_GT-I9300"), "Samsung GT-I9300");
/// assert_eq!(cleanup_device_brand_name("Nokia", "Lumia 920"), "Nokia Lumia 920");
/// ```
pub fn cleanup_device_brand_name(device_brand: &str, device_name: &str) -> String {
    let mut name = device_name.replace('_', " ");
    for (pattern, replace) in dash_cleanup() {
        name = pattern.replace_all(&name, *replace).into_owned();
    }
    let name = name.trim();

    let starts_with_brand = !device_brand.is_empty()
        && name
            .get(..device_brand.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(device_brand));

    let combined = if starts_with_brand {
        let rest = &name[device_brand.len()..];
        if rest.is_empty() || rest.starts_with(' ') {
            format!("{device_brand}{rest}")
        } else {
            format!("{device_brand} {rest}")
        }
    } else if name.is_empty() {
        device_brand.to_string()
    } else {
        format!("{device_brand} {name}")
    };

    brand(&combined)
}
