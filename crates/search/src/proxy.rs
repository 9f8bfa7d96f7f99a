use metrics::gauge;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wrangler_core::{CellValue, ObjectId, Role, SourceModel};

use crate::alnum::compare_cells;
use crate::filter::WildcardFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sorted, filtered view over a `SourceModel`.
///
/// The proxy only stores a row mapping (proxy row -> source row). Source rows
/// are never touched, and selections are resolved back to object ids through
/// the source, so they survive re-sorting and refreshes.
#[derive(Debug, Clone)]
pub struct SortFilterProxy {
    sort: Option<(usize, SortOrder)>,
    sort_role: Role,
    filter: Option<WildcardFilter>,
    filter_column: usize,
    mapping: Vec<usize>,
    dirty: bool,
}

impl Default for SortFilterProxy {
    fn default() -> Self { Self::new() }
}

impl SortFilterProxy {
    pub fn new() -> Self {
        Self { sort: None, sort_role: Role::Sort, filter: None, filter_column: 0, mapping: Vec::new(), dirty: true }
    }

    /// Role whose values order the rows (`Sort` by default).
    pub fn with_sort_role(mut self, role: Role) -> Self {
        self.sort_role = role;
        self.dirty = true;
        self
    }

    /// Column whose display text the filter is matched against (name by default).
    pub fn with_filter_column(mut self, col: usize) -> Self {
        self.filter_column = col;
        self.dirty = true;
        self
    }

    pub fn sort_state(&self) -> Option<(usize, SortOrder)> { self.sort }
    pub fn filter(&self) -> Option<&WildcardFilter> { self.filter.as_ref() }
    pub fn is_dirty(&self) -> bool { self.dirty }

    pub fn sort_by_column(&mut self, col: usize, order: SortOrder) {
        self.sort = Some((col, order));
        self.dirty = true;
    }

    /// Back to source order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.dirty = true;
    }

    /// Header click: same column flips direction, another column starts ascending.
    pub fn toggle_sort(&mut self, col: usize) {
        let order = match self.sort {
            Some((c, SortOrder::Ascending)) if c == col => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        self.sort_by_column(col, order);
    }

    /// Replace the free-text filter; blank text clears it.
    pub fn set_filter_text(&mut self, text: &str) -> Result<(), regex::Error> {
        self.filter = WildcardFilter::parse(text.trim())?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_filter(&mut self, filter: Option<WildcardFilter>) {
        self.filter = filter;
        self.dirty = true;
    }

    /// Recompute the mapping if sort or filter changed since the last pass.
    pub fn apply_if_needed<M: SourceModel + ?Sized>(&mut self, model: &M) {
        if self.dirty {
            self.invalidate(model);
        }
    }

    /// Recompute the mapping from the current source rows.
    pub fn invalidate<M: SourceModel + ?Sized>(&mut self, model: &M) {
        let n = model.row_count();
        let mut rows: Vec<usize> = match &self.filter {
            None => (0..n).collect(),
            Some(f) => (0..n)
                .filter(|r| f.is_match(&model.cell(*r, self.filter_column, Role::Display).to_text()))
                .collect(),
        };
        if let Some((col, order)) = self.sort {
            let mut keyed: Vec<(usize, CellValue)> = rows.iter().map(|r| (*r, model.cell(*r, col, self.sort_role))).collect();
            // stable: ties keep source order in both directions
            keyed.sort_by(|(_, a), (_, b)| {
                let ord = compare_cells(a, b);
                if order == SortOrder::Descending { ord.reverse() } else { ord }
            });
            rows = keyed.into_iter().map(|(r, _)| r).collect();
        }
        debug!(source_rows = n, proxy_rows = rows.len(), sort = ?self.sort, filter = ?self.filter.as_ref().map(|f| f.pattern()), "proxy invalidated");
        gauge!("proxy_rows", rows.len() as f64);
        self.mapping = rows;
        self.dirty = false;
    }

    pub fn row_count(&self) -> usize { self.mapping.len() }

    pub fn map_to_source(&self, proxy_row: usize) -> Option<usize> { self.mapping.get(proxy_row).copied() }

    pub fn map_from_source(&self, source_row: usize) -> Option<usize> {
        self.mapping.iter().position(|r| *r == source_row)
    }

    /// Source rows in display order.
    pub fn source_rows(&self) -> &[usize] { &self.mapping }

    pub fn id_at<M: SourceModel + ?Sized>(&self, model: &M, proxy_row: usize) -> Option<ObjectId> {
        self.map_to_source(proxy_row).and_then(|r| model.row_id(r))
    }

    /// Object ids for a set of selected proxy rows; stale rows are skipped.
    pub fn ids<M: SourceModel + ?Sized>(&self, model: &M, proxy_rows: &[usize]) -> Vec<ObjectId> {
        proxy_rows.iter().filter_map(|r| self.id_at(model, *r)).collect()
    }

    pub fn cell<M: SourceModel + ?Sized>(&self, model: &M, proxy_row: usize, col: usize, role: Role) -> CellValue {
        self.map_to_source(proxy_row).map(|r| model.cell(r, col, role)).unwrap_or_default()
    }

    /// Display text of every visible row, in order.
    pub fn display_rows<M: SourceModel + ?Sized>(&self, model: &M) -> Vec<Vec<String>> {
        let cols = model.column_count();
        self.mapping
            .iter()
            .map(|r| (0..cols).map(|c| model.cell(*r, c, Role::Display).to_text()).collect())
            .collect()
    }
}

/// Sort a column of strings the way the proxy would.
pub fn sort_alnum(items: &mut [String]) {
    items.sort_by(|a, b| crate::alnum::compare(a, b));
}
