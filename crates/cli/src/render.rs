//! Plain-text tables for human output.

use wrangler_core::CellValue;
use wrangler_panels::progress::text_bar;

pub const BAR_CELLS: usize = 20;

/// Display text; progress cells get a bar in front of the percentage.
pub fn cell_text(v: &CellValue) -> String {
    match v {
        CellValue::Progress(t) => format!("[{}] {}", text_bar(t, BAR_CELLS), v.to_text()),
        _ => v.to_text(),
    }
}

/// Left-aligned columns, two spaces apart, upper-case headers.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, c) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(c.chars().count());
        }
    }
    let line = |cells: &mut dyn Iterator<Item = String>| -> String {
        let mut out = String::new();
        for (i, c) in cells.enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            let pad = widths.get(i).copied().unwrap_or(0).saturating_sub(c.chars().count());
            out.push_str(&c);
            out.extend(std::iter::repeat(' ').take(pad));
        }
        out.trim_end().to_string()
    };
    let mut out = line(&mut headers.iter().map(|h| h.to_uppercase()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(&mut row.iter().cloned()));
        out.push('\n');
    }
    out
}
