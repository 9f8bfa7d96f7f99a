//! Task progress bar: segment geometry for painters and a text rendition.

use serde::{Deserialize, Serialize};
use wrangler_core::palette::{task_state_color, Rgb, PEN};
use wrangler_core::{TaskState, TaskStateTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

pub const MARGINS: Margins = Margins { left: 5, top: 2, right: 10, bottom: 4 };

/// Corner radius of each segment.
pub const SEGMENT_RADIUS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub state: TaskState,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Rgb,
    pub outline: Rgb,
}

/// One segment per non-zero state, left to right in counted order.
/// Widths are proportional to the state's share of the total.
pub fn segments(totals: &TaskStateTotals, width: u32, height: u32) -> Vec<Segment> {
    let total = totals.total();
    if total == 0 {
        return Vec::new();
    }
    let usable_w = width.saturating_sub(MARGINS.left + MARGINS.right) as f64;
    let usable_h = height.saturating_sub(MARGINS.top + MARGINS.bottom) as f64;
    let mut x = MARGINS.left as f64;
    let mut out = Vec::with_capacity(TaskState::COUNTED.len());
    for (state, count) in TaskState::COUNTED.iter().zip(totals.counts()) {
        if count == 0 {
            continue;
        }
        let w = usable_w * count as f64 / total as f64;
        out.push(Segment { state: *state, x, y: MARGINS.top as f64, width: w, height: usable_h, fill: task_state_color(*state), outline: PEN });
        x += w;
    }
    out
}

fn glyph(state: TaskState) -> char {
    match state {
        TaskState::Waiting => '.',
        TaskState::Running => '>',
        TaskState::Dead => 'x',
        TaskState::Eaten => '-',
        TaskState::Depend => '~',
        TaskState::Succeeded => '#',
        TaskState::Initialize => ' ',
    }
}

/// `cells` characters wide. Boundaries are rounded from the running sum so
/// the bar always fills exactly; an empty job gives a blank bar.
pub fn text_bar(totals: &TaskStateTotals, cells: usize) -> String {
    let total = totals.total() as u64;
    if total == 0 {
        return " ".repeat(cells);
    }
    let mut out = String::with_capacity(cells);
    let mut acc = 0u64;
    let mut drawn = 0usize;
    for (state, count) in TaskState::COUNTED.iter().zip(totals.counts()) {
        acc += count as u64;
        let end = ((acc * cells as u64 + total / 2) / total) as usize;
        for _ in drawn..end {
            out.push(glyph(*state));
        }
        drawn = drawn.max(end);
    }
    out
}
