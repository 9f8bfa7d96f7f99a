//! Alphanumeric ("natural") ordering: digit runs compare by value.

use std::cmp::Ordering;

use wrangler_core::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Runs<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run<'a>;

    fn next(&mut self) -> Option<Run<'a>> {
        let first = *self.rest.as_bytes().first()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .bytes()
            .position(|b| b.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        // ascii digits are single bytes, so `end` is always a char boundary
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits { Run::Digits(head) } else { Run::Text(head) })
    }
}

fn runs(s: &str) -> Runs<'_> { Runs { rest: s } }

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars().flat_map(char::to_lowercase).cmp(b.chars().flat_map(char::to_lowercase))
}

/// Compare two strings splitting them into digit and non-digit runs.
///
/// Digit runs compare numerically (any length, no overflow), text runs
/// case-insensitively, and a digit run sorts before a text run. Strings that
/// tie on every run fall back to plain byte order so the result is total.
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut ra = runs(a);
    let mut rb = runs(b);
    loop {
        let ord = match (ra.next(), rb.next()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Run::Digits(x)), Some(Run::Digits(y))) => cmp_digits(x, y),
            (Some(Run::Text(x)), Some(Run::Text(y))) => cmp_text(x, y),
            (Some(Run::Digits(_)), Some(Run::Text(_))) => Ordering::Less,
            (Some(Run::Text(_)), Some(Run::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.cmp(b)
}

/// Order two cell values: numbers numerically, ratios by fraction, text alphanumerically.
/// Empty cells sort first; mismatched kinds compare by their text.
pub fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    use CellValue::*;
    match (a, b) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, _) => Ordering::Less,
        (_, Empty) => Ordering::Greater,
        (Int(x), Int(y)) => x.cmp(y),
        (Float(x), Float(y)) => x.total_cmp(y),
        (Int(x), Float(y)) => (*x as f64).total_cmp(y),
        (Float(x), Int(y)) => x.total_cmp(&(*y as f64)),
        (Text(x), Text(y)) => compare(x, y),
        _ => match (a.fraction(), b.fraction()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => compare(&a.to_text(), &b.to_text()),
        },
    }
}
