//! Static column tables for clusters, layers and jobs.
//!
//! This module provides:
//! - `CellValue`, the typed value behind every table cell
//! - `Column<T>`, a label + width + pure accessor, resolved at compile time
//! - `Tabular`, the per-object capability a read-model needs to render rows
//! - `SourceModel`, the row/column surface a proxy view reads from

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::palette::{self, Rgb};
use crate::{Cluster, DomainObject, Job, Layer, ObjectId, TaskState, TaskStateTotals};

/// What a cell is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Display,
    /// Value the proxy orders by.
    Sort,
    ToolTip,
    Background,
}

/// Typed cell contents. Accessors never fail; missing data is `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    /// `num` out of `den`, rendered as a percentage.
    Ratio { num: u64, den: u64 },
    Progress(TaskStateTotals),
    Color(Rgb),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self { CellValue::Text(s.into()) }

    pub fn int(v: impl Into<i64>) -> Self { CellValue::Int(v.into()) }

    pub fn is_empty(&self) -> bool { matches!(self, CellValue::Empty) }

    /// Fraction in [0, 1] for ratio-like values.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            CellValue::Ratio { num, den } => Some(if *den == 0 { 0.0 } else { *num as f64 / *den as f64 }),
            CellValue::Progress(t) => {
                let total = t.total();
                Some(if total == 0 { 0.0 } else { t.done() as f64 / total as f64 })
            }
            _ => None,
        }
    }

    /// Plain-text rendering used by table views and the CLI.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Int(v) => v.to_string(),
            CellValue::Float(v) => format!("{:.1}", v),
            CellValue::Ratio { num, den } => format_percentage(*num, *den),
            CellValue::Progress(t) => format_percentage(t.done() as u64, t.total() as u64),
            CellValue::Color(c) => c.hex(),
        }
    }
}

/// `num / den` as a one-decimal percentage; a zero denominator reads as 0%.
pub fn format_percentage(num: u64, den: u64) -> String {
    if den == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", num as f64 * 100.0 / den as f64)
}

/// One display column: header label, default width and a pure accessor.
pub struct Column<T> {
    pub label: &'static str,
    pub width: f32,
    pub value: fn(&T) -> CellValue,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self { Self { label: self.label, width: self.width, value: self.value } }
}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column").field("label", &self.label).field("width", &self.width).finish()
    }
}

/// Capability set a domain object needs to appear in a table.
///
/// Column order is display order and never changes at runtime. Role
/// dispatch is fixed here; types only add tooltips and highlights.
pub trait Tabular: DomainObject + Sized + 'static {
    fn columns() -> &'static [Column<Self>];

    fn tooltip(&self, _col: usize) -> Option<String> { None }

    fn background(&self, _col: usize) -> Option<Rgb> { None }

    fn cell(&self, col: usize, role: Role) -> CellValue {
        let Some(column) = Self::columns().get(col) else { return CellValue::Empty };
        match role {
            Role::Display | Role::Sort => (column.value)(self),
            Role::ToolTip => self.tooltip(col).map(CellValue::Text).unwrap_or_default(),
            Role::Background => self.background(col).map(CellValue::Color).unwrap_or_default(),
        }
    }

    fn headers() -> Vec<&'static str> {
        Self::columns().iter().map(|c| c.label).collect()
    }
}

/// Read surface of a row-oriented model, as consumed by proxy views.
pub trait SourceModel {
    fn row_count(&self) -> usize;
    fn column_count(&self) -> usize;
    fn row_id(&self, row: usize) -> Option<ObjectId>;
    fn cell(&self, row: usize, col: usize, role: Role) -> CellValue;
}

impl<T: Tabular> SourceModel for [T] {
    fn row_count(&self) -> usize { self.len() }
    fn column_count(&self) -> usize { T::columns().len() }
    fn row_id(&self, row: usize) -> Option<ObjectId> { self.get(row).map(|o| o.id()) }
    fn cell(&self, row: usize, col: usize, role: Role) -> CellValue {
        self.get(row).map(|o| o.cell(col, role)).unwrap_or_default()
    }
}

impl<T: Tabular> SourceModel for Vec<T> {
    fn row_count(&self) -> usize { self.len() }
    fn column_count(&self) -> usize { T::columns().len() }
    fn row_id(&self, row: usize) -> Option<ObjectId> { self.as_slice().row_id(row) }
    fn cell(&self, row: usize, col: usize, role: Role) -> CellValue { self.as_slice().cell(row, col, role) }
}

// ---------------- Clusters ----------------

pub const CLUSTER_NAME: usize = 0;
pub const CLUSTER_USAGE: usize = 1;
pub const CLUSTER_NODES: usize = 2;
pub const CLUSTER_LOCKED: usize = 3;
pub const CLUSTER_REPAIR: usize = 4;
pub const CLUSTER_DOWN: usize = 5;
pub const CLUSTER_CORES: usize = 6;

static CLUSTER_COLUMNS: [Column<Cluster>; 8] = [
    Column { label: "Name", width: 250.0, value: |c| CellValue::text(&c.name) },
    Column { label: "Usage", width: 90.0, value: |c| CellValue::Ratio { num: c.total.run_cores as u64, den: c.total.cores as u64 } },
    Column { label: "Nodes", width: 70.0, value: |c| CellValue::int(c.total.nodes) },
    Column { label: "Locked", width: 70.0, value: |c| CellValue::int(c.total.locked_nodes) },
    Column { label: "Repair", width: 70.0, value: |c| CellValue::int(c.total.repair_nodes) },
    Column { label: "Down", width: 70.0, value: |c| CellValue::int(c.total.down_nodes) },
    Column { label: "Cores", width: 70.0, value: |c| CellValue::int(c.total.cores) },
    Column { label: "Tags", width: 150.0, value: |c| CellValue::text(c.tags.join(",")) },
];

impl Tabular for Cluster {
    fn columns() -> &'static [Column<Self>] { &CLUSTER_COLUMNS }

    fn tooltip(&self, col: usize) -> Option<String> {
        let t = &self.total;
        let cores = || {
            vec![
                format!("Total Cores: {}", t.cores),
                format!("Running Cores: {}", t.run_cores),
                format!("Idle Cores: {}", t.idle_cores),
            ]
        };
        match col {
            CLUSTER_USAGE => {
                let mut lines = cores();
                lines.push(format!("Usage: {}", format_percentage(t.run_cores as u64, t.cores as u64)));
                Some(lines.join("\n"))
            }
            CLUSTER_CORES => {
                let mut lines = cores();
                lines.push(format!("Up Cores: {}", t.up_cores));
                lines.push(format!("Down Cores: {}", t.down_cores));
                lines.push(format!("Repair Cores: {}", t.repair_cores));
                lines.push(format!("Locked Cores: {}", t.locked_cores));
                Some(lines.join("\n"))
            }
            CLUSTER_NODES => Some(
                [
                    format!("Total Nodes: {}", t.nodes),
                    format!("Up Nodes: {}", t.up_nodes),
                    format!("Down Nodes: {}", t.down_nodes),
                    format!("Repair Nodes: {}", t.repair_nodes),
                    format!("Locked Nodes: {}", t.locked_nodes),
                ]
                .join("\n"),
            ),
            _ => None,
        }
    }

    fn background(&self, col: usize) -> Option<Rgb> {
        if self.is_locked {
            return Some(palette::BLUE);
        }
        match col {
            CLUSTER_LOCKED if self.total.locked_nodes > 0 => Some(palette::BLUE),
            CLUSTER_REPAIR if self.total.repair_nodes > 0 => Some(palette::ORANGE),
            CLUSTER_DOWN if self.total.down_nodes > 0 => Some(palette::RED),
            _ => None,
        }
    }
}

// ---------------- Layers ----------------

pub const LAYER_NAME: usize = 0;
pub const LAYER_DEAD: usize = 7;
pub const LAYER_PROGRESS: usize = 10;

const MS_PER_HOUR: f64 = 3_600_000.0;

static LAYER_COLUMNS: [Column<Layer>; 11] = [
    Column { label: "Name", width: 220.0, value: |l| CellValue::text(&l.name) },
    Column {
        label: "Range",
        width: 90.0,
        value: |l| match l.range.as_deref() {
            Some(r) if !r.is_empty() => CellValue::text(format!("{} ({})", r, l.chunk)),
            _ => CellValue::text("-"),
        },
    },
    Column { label: "Service", width: 90.0, value: |l| CellValue::text(&l.service) },
    Column { label: "Tags", width: 90.0, value: |l| CellValue::text(l.tags.join(", ")) },
    Column { label: "Total", width: 60.0, value: |l| CellValue::int(l.totals.total()) },
    Column { label: "Pend", width: 60.0, value: |l| CellValue::int(l.totals.pending()) },
    Column { label: "Run", width: 60.0, value: |l| CellValue::int(l.totals.running) },
    Column { label: "Dead", width: 60.0, value: |l| CellValue::int(l.totals.dead) },
    Column { label: "Cores", width: 60.0, value: |l| CellValue::int(l.run_cores) },
    Column { label: "AvgTime", width: 65.0, value: |l| CellValue::Float(l.stats.avg_clock_time as f64 / MS_PER_HOUR) },
    Column { label: "Progress", width: 120.0, value: |l| CellValue::Progress(l.totals) },
];

impl Tabular for Layer {
    fn columns() -> &'static [Column<Self>] { &LAYER_COLUMNS }

    fn tooltip(&self, col: usize) -> Option<String> {
        if col >= LAYER_PROGRESS {
            return None;
        }
        Some(self.cell(col, Role::Display).to_text())
    }

    fn background(&self, col: usize) -> Option<Rgb> {
        (col == LAYER_DEAD && self.totals.dead > 0).then(|| palette::task_state_color(TaskState::Dead))
    }
}

// ---------------- Jobs ----------------

pub const JOB_NAME: usize = 0;
pub const JOB_STATE: usize = 1;
pub const JOB_DEAD: usize = 4;

static JOB_COLUMNS: [Column<Job>; 8] = [
    Column { label: "Name", width: 300.0, value: |j| CellValue::text(&j.name) },
    Column { label: "State", width: 80.0, value: |j| CellValue::text(j.state.label()) },
    Column { label: "Run", width: 60.0, value: |j| CellValue::int(j.totals.running) },
    Column { label: "Pend", width: 60.0, value: |j| CellValue::int(j.totals.pending()) },
    Column { label: "Dead", width: 60.0, value: |j| CellValue::int(j.totals.dead) },
    Column { label: "Total", width: 60.0, value: |j| CellValue::int(j.totals.total()) },
    Column { label: "Cores", width: 60.0, value: |j| CellValue::int(j.run_cores) },
    Column { label: "Progress", width: 120.0, value: |j| CellValue::Progress(j.totals) },
];

impl Tabular for Job {
    fn columns() -> &'static [Column<Self>] { &JOB_COLUMNS }

    fn tooltip(&self, col: usize) -> Option<String> {
        match col {
            JOB_NAME => Some(format!("{} ({}, {})", self.name, self.project, self.username)),
            JOB_STATE if self.paused => Some(format!("{} (paused)", self.state.label())),
            _ => None,
        }
    }

    fn background(&self, col: usize) -> Option<Rgb> {
        match col {
            JOB_STATE => Some(if self.has_errors() { palette::RED } else { palette::job_state_color(self.state) }),
            JOB_DEAD if self.totals.dead > 0 => Some(palette::task_state_color(TaskState::Dead)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterTotals;

    fn cluster(locked: bool, total: ClusterTotals) -> Cluster {
        Cluster { name: "render".into(), is_locked: locked, total, ..Default::default() }
    }

    #[test]
    fn column_tables_have_fixed_headers() {
        assert_eq!(Cluster::headers(), vec!["Name", "Usage", "Nodes", "Locked", "Repair", "Down", "Cores", "Tags"]);
        assert_eq!(Layer::headers().len(), 11);
        assert_eq!(Layer::headers()[LAYER_PROGRESS], "Progress");
        assert_eq!(Job::headers()[JOB_STATE], "State");
    }

    #[test]
    fn layer_range_and_avg_time() {
        let mut l = Layer { name: "beauty".into(), range: Some("1-100".into()), chunk: 5, ..Default::default() };
        l.stats.avg_clock_time = 5_400_000;
        assert_eq!(l.cell(1, Role::Display).to_text(), "1-100 (5)");
        assert_eq!(l.cell(9, Role::Display).to_text(), "1.5");
        l.range = None;
        assert_eq!(l.cell(1, Role::Display).to_text(), "-");
    }

    #[test]
    fn out_of_range_column_is_empty() {
        let l = Layer::default();
        assert!(l.cell(42, Role::Display).is_empty());
        assert!(l.cell(LAYER_PROGRESS, Role::ToolTip).is_empty());
    }

    #[test]
    fn cluster_highlights() {
        let t = ClusterTotals { down_nodes: 2, repair_nodes: 1, ..Default::default() };
        let c = cluster(false, t);
        assert_eq!(c.cell(CLUSTER_DOWN, Role::Background), CellValue::Color(palette::RED));
        assert_eq!(c.cell(CLUSTER_REPAIR, Role::Background), CellValue::Color(palette::ORANGE));
        assert!(c.cell(CLUSTER_LOCKED, Role::Background).is_empty());

        let locked = cluster(true, ClusterTotals::default());
        assert_eq!(locked.cell(CLUSTER_NAME, Role::Background), CellValue::Color(palette::BLUE));
    }

    #[test]
    fn cluster_usage_renders_percentage() {
        let c = cluster(false, ClusterTotals { cores: 200, run_cores: 50, idle_cores: 150, ..Default::default() });
        assert_eq!(c.cell(CLUSTER_USAGE, Role::Display).to_text(), "25.0%");
        let tip = c.cell(CLUSTER_USAGE, Role::ToolTip).to_text();
        assert!(tip.contains("Idle Cores: 150"));
        assert!(tip.ends_with("Usage: 25.0%"));
        assert_eq!(cluster(false, ClusterTotals::default()).cell(CLUSTER_USAGE, Role::Display).to_text(), "0.0%");
    }

    #[test]
    fn slice_is_a_source_model() {
        let rows = vec![
            Layer { name: "a".into(), ..Default::default() },
            Layer { name: "b".into(), ..Default::default() },
        ];
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.column_count(), 11);
        assert_eq!(SourceModel::cell(&rows, 1, 0, Role::Display).to_text(), "b");
        assert!(SourceModel::cell(&rows, 5, 0, Role::Display).is_empty());
    }
}
