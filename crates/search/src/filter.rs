//! Free-text wildcard filter.
//!
//! Whitespace-separated tokens are joined with `*`, so `"foo bar"` becomes
//! the wildcard `foo*bar`: both tokens must appear, in that order, with
//! anything in between. `*` and `?` typed by the user keep their wildcard
//! meaning; everything else is literal. Matching is unanchored.

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct WildcardFilter {
    pattern: String,
    re: Regex,
}

impl WildcardFilter {
    /// Case-sensitive filter for `query`; `None` when the query is blank.
    pub fn parse(query: &str) -> Result<Option<Self>, regex::Error> {
        Self::parse_with(query, true)
    }

    pub fn parse_with(query: &str, case_sensitive: bool) -> Result<Option<Self>, regex::Error> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(None);
        }
        let pattern = tokens.join("*");
        let re = RegexBuilder::new(&wildcard_to_regex(&pattern)).case_insensitive(!case_sensitive).build()?;
        Ok(Some(Self { pattern, re }))
    }

    /// The joined wildcard pattern, e.g. `foo*bar`.
    pub fn pattern(&self) -> &str { &self.pattern }

    pub fn is_match(&self, text: &str) -> bool { self.re.is_match(text) }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out
}
