//! Word and version splitting of node values.
//!
//! Both the `[first-last]` word-range steps of a walk list and the fake-child
//! events of the flattener cut a value into separator-delimited words and
//! return a contiguous run of them. Two strategies exist:
//!
//! - [`Splitter::split_range`] scans the text directly and stops as soon as the
//!   requested words are found.
//! - [`Splitter::create_split_list`] + [`Splitter::split_range_with_list`]
//!   compute every word boundary once and slice any number of ranges from it.
//!
//! Both always return the same substring; the list-based variant only pays
//! off once more than [`SPLIT_LIST_BREAK_EVEN`] ranges are needed for a value.

use std::fmt;

/// Number of requested ranges above which a shared split list is faster
/// than splitting each range directly.
pub const SPLIT_LIST_BREAK_EVEN: usize = 4;

/// An inclusive 1-based range of words.
///
/// A negative `last` counts from the end: `-1` is the last word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordRange {
    pub first: i32,
    pub last: i32,
}

impl WordRange {
    pub const fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }

    pub const fn single(word: i32) -> Self {
        Self::new(word, word)
    }

    /// The first word can always be extracted from a non-empty value.
    pub fn can_fail(&self) -> bool {
        !(self.first == 1 && self.last == 1)
    }

    /// Rendering used inside walk-list step descriptions: `[2:3]`.
    pub fn step_label(&self) -> String {
        format!("[{}:{}]", self.first, self.last)
    }

    fn resolve(&self, word_count: usize) -> Option<(usize, usize)> {
        if self.first < 1 {
            return None;
        }
        let count = word_count as i64;
        let last = if self.last < 0 {
            count + i64::from(self.last) + 1
        } else {
            i64::from(self.last)
        };
        let first = i64::from(self.first);
        if last < first || last > count || first > count {
            return None;
        }
        Some((first as usize, last as usize))
    }
}

/// Rendering used in flattened paths: `name[2-3]`.
impl fmt::Display for WordRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.first, self.last)
    }
}

/// Byte offsets `(start, end)` of the successive words of a text.
pub type SplitList = Vec<(usize, usize)>;

pub trait Splitter {
    fn is_separator(&self, c: char) -> bool;

    /// A character after which nothing more of the text is considered.
    fn is_end_of_string_separator(&self, c: char) -> bool;

    fn create_split_list(&self, text: &str) -> SplitList {
        scan_split_list(self, text)
    }

    fn split_range_with_list<'a>(
        &self,
        text: &'a str,
        split_list: &[(usize, usize)],
        range: WordRange,
    ) -> Option<&'a str> {
        let (first, last) = range.resolve(split_list.len())?;
        let start = split_list[first - 1].0;
        let end = split_list[last - 1].1;
        text.get(start..end)
    }

    fn split_range<'a>(&self, text: &'a str, range: WordRange) -> Option<&'a str> {
        if range.last < 0 {
            // Counting from the end needs the total number of words.
            let split_list = self.create_split_list(text);
            return self.split_range_with_list(text, &split_list, range);
        }
        if range.first < 1 || range.last < range.first {
            return None;
        }
        let first = range.first as usize;
        let last = range.last as usize;

        let mut word = 0;
        let mut in_word = false;
        let mut start = None;
        let mut end = text.len();
        for (offset, c) in text.char_indices() {
            if self.is_end_of_string_separator(c) {
                end = offset;
                break;
            }
            if self.is_separator(c) {
                if in_word {
                    in_word = false;
                    if word == last {
                        return start.and_then(|s| text.get(s..offset));
                    }
                }
            } else if !in_word {
                in_word = true;
                word += 1;
                if word == first {
                    start = Some(offset);
                }
            }
        }
        if in_word && word == last {
            return start.and_then(|s| text.get(s..end));
        }
        None
    }
}

fn scan_split_list<S: Splitter + ?Sized>(splitter: &S, text: &str) -> SplitList {
    let mut list = Vec::with_capacity(8);
    let mut start = None;
    let mut end = text.len();
    for (offset, c) in text.char_indices() {
        if splitter.is_end_of_string_separator(c) {
            end = offset;
            break;
        }
        if splitter.is_separator(c) {
            if let Some(word_start) = start.take() {
                list.push((word_start, offset));
            }
        } else if start.is_none() {
            start = Some(offset);
        }
    }
    if let Some(word_start) = start {
        list.push((word_start, end));
    }
    list
}

/// Splits free text into words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordSplitter;

const WORD_SEPARATORS: &[char] = &[
    ' ', '.', ':', ';', '=', '/', '\\', '+', '-', '_', '<', '>', '~', '(', ')', ',',
];

impl Splitter for WordSplitter {
    fn is_separator(&self, c: char) -> bool {
        WORD_SEPARATORS.contains(&c)
    }

    fn is_end_of_string_separator(&self, _c: char) -> bool {
        false
    }
}

/// Splits version numbers into their components.
///
/// Email addresses and web addresses are never split: they behave as a
/// single word.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionSplitter;

impl VersionSplitter {
    fn looks_like_email_or_web_address(text: &str) -> bool {
        text.starts_with("www.")
            || text.starts_with("http")
            || (text.contains('@') && text.contains('.'))
    }
}

impl Splitter for VersionSplitter {
    fn is_separator(&self, c: char) -> bool {
        matches!(c, '.' | '_' | '-')
    }

    fn is_end_of_string_separator(&self, c: char) -> bool {
        matches!(c, '/' | ' ')
    }

    fn create_split_list(&self, text: &str) -> SplitList {
        if Self::looks_like_email_or_web_address(text) {
            return vec![(0, text.len())];
        }
        scan_split_list(self, text)
    }

    // Versions are short, so the split list is always built.
    fn split_range<'a>(&self, text: &'a str, range: WordRange) -> Option<&'a str> {
        let split_list = self.create_split_list(text);
        self.split_range_with_list(text, &split_list, range)
    }
}

pub static WORD_SPLITTER: WordSplitter = WordSplitter;
pub static VERSION_SPLITTER: VersionSplitter = VersionSplitter;
