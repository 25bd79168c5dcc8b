//! Caption parsing for archive posts.
//!
//! Curators tag every file with a caption of the form
//!
//! ```text
//! Level: 2
//! Term: first
//! Type: practical      (optional)
//! Course: Organic Chemistry
//! Title: Lab sheet 3
//! ```
//!
//! Labels are case-insensitive and may share a line.  Level and term accept
//! digits or ordinal words.

use regex::Regex;

const CAPTION_PATTERN: &str = r"(?is)level:\s*(?P<level>[1-4]|first|second|third|fourth)\b.*?term:\s*(?P<term>[12]|first|second)\b(?:.*?type:\s*(?P<category>[\w-]+))?.*?course:\s*(?P<course>.+?)\s*title:\s*(?P<title>.+?)\s*$";

/// Structured fields extracted from a caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionFields {
    pub level: u8,
    pub term: u8,
    pub category: Option<String>,
    pub course: String,
    pub title: String,
}

/// Precompiled caption matcher.  Build once at startup and share.
#[derive(Debug, Clone)]
pub struct CaptionParser {
    pattern: Regex,
}

impl CaptionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(CAPTION_PATTERN)?,
        })
    }

    /// Extract fields from `text`, or `None` when it is not a catalog caption.
    pub fn parse(&self, text: &str) -> Option<CaptionFields> {
        let caps = self.pattern.captures(text)?;
        let level = ordinal(&caps["level"])?;
        let term = ordinal(&caps["term"])?;
        let course = collapse_ws(&caps["course"]);
        let title = collapse_ws(&caps["title"]);
        if course.is_empty() || title.is_empty() {
            return None;
        }
        Some(CaptionFields {
            level,
            term,
            category: caps.name("category").map(|m| m.as_str().to_lowercase()),
            course,
            title,
        })
    }
}

fn ordinal(raw: &str) -> Option<u8> {
    match raw.to_lowercase().as_str() {
        "1" | "first" => Some(1),
        "2" | "second" => Some(2),
        "3" | "third" => Some(3),
        "4" | "fourth" => Some(4),
        _ => None,
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
