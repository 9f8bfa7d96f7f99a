//! Wrangler store: polling read-models with diff-merge refresh.
//!
//! A `TableModel` holds the last fetched snapshot as an ordered row list and
//! an id index. Each refresh merges the next snapshot into it in place:
//! known ids keep their row, new ids append, and (per source) missing ids
//! are dropped. Views learn about changes through a single epoch bump per
//! merge.

#![forbid(unsafe_code)]

use std::time::Instant;

use metrics::{counter, gauge, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};
use wrangler_client::ClientResult;
use wrangler_core::{CellValue, DomainObject, ObjectId, Role, SourceModel, Tabular};

mod source;

pub use source::{ClusterSource, JobSource, LayerSource, Source};

/// What one merge did to the row list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub updated: usize,
    pub added: usize,
    pub removed: usize,
    /// Refresh was a no-op because the model needs a scope and has none.
    pub skipped: bool,
}

/// Ordered rows for one source, indexed by object id.
pub struct TableModel<S: Source> {
    source: S,
    rows: Vec<S::Item>,
    index: FxHashMap<ObjectId, usize>,
    remove_missing: bool,
    scope: Option<ObjectId>,
    epoch: u64,
    epoch_tx: watch::Sender<u64>,
}

impl<S: Source> TableModel<S> {
    pub fn new(source: S) -> Self {
        let (epoch_tx, _rx) = watch::channel(0u64);
        Self {
            source,
            rows: Vec::new(),
            index: FxHashMap::default(),
            remove_missing: S::REMOVE_MISSING,
            scope: None,
            epoch: 0,
            epoch_tx,
        }
    }

    /// Override the source's pruning policy.
    pub fn with_remove_missing(mut self, on: bool) -> Self {
        self.remove_missing = on;
        self
    }

    pub fn source(&self) -> &S { &self.source }
    pub fn remove_missing(&self) -> bool { self.remove_missing }
    pub fn scope(&self) -> Option<ObjectId> { self.scope }
    pub fn epoch(&self) -> u64 { self.epoch }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn rows(&self) -> &[S::Item] { &self.rows }
    pub fn row(&self, pos: usize) -> Option<&S::Item> { self.rows.get(pos) }
    pub fn position(&self, id: ObjectId) -> Option<usize> { self.index.get(&id).copied() }
    pub fn get(&self, id: ObjectId) -> Option<&S::Item> { self.position(id).and_then(|p| self.rows.get(p)) }
    pub fn headers(&self) -> Vec<&'static str> { S::Item::headers() }

    /// Subscribe to change notifications; the value is the model epoch.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.epoch_tx.subscribe() }

    /// Cell value for `role`; out-of-range rows or columns yield `Empty`.
    pub fn cell(&self, row: usize, col: usize, role: Role) -> CellValue {
        self.rows.get(row).map(|o| o.cell(col, role)).unwrap_or_default()
    }

    /// Switch scope and reload all rows from scratch.
    ///
    /// Rows from the old scope are dropped before the fetch, so a failed
    /// fetch leaves the model empty under the new scope and the next
    /// `refresh` fills it.
    pub fn set_scope(&mut self, scope: Option<ObjectId>) -> ClientResult<()> {
        info!(model = S::NAME, scope = ?scope, "scope changed");
        self.scope = scope;
        if !self.rows.is_empty() {
            self.rows.clear();
            self.index.clear();
            self.notify();
        }
        let items = self.source.fetch(scope)?;
        self.reset(items);
        Ok(())
    }

    /// Fetch and merge. Scoped models without a scope return immediately.
    /// A failed fetch leaves the rows untouched.
    pub fn refresh(&mut self) -> ClientResult<MergeStats> {
        if self.source.scoped() && self.scope.is_none() {
            debug!(model = S::NAME, "refresh skipped: no scope");
            return Ok(MergeStats { skipped: true, ..Default::default() });
        }
        let started = Instant::now();
        let snapshot = self.source.fetch(self.scope)?;
        let stats = self.merge(snapshot);
        counter!("model_refresh_total", 1u64, "model" => S::NAME);
        histogram!("model_refresh_ms", started.elapsed().as_secs_f64() * 1_000.0, "model" => S::NAME);
        Ok(stats)
    }

    /// Merge a snapshot into the current rows without reordering them.
    pub fn merge(&mut self, snapshot: Vec<S::Item>) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut seen: FxHashSet<ObjectId> = FxHashSet::default();
        for obj in snapshot {
            let id = obj.id();
            seen.insert(id);
            match self.index.get(&id) {
                Some(&pos) => {
                    self.rows[pos] = obj;
                    stats.updated += 1;
                }
                None => {
                    self.index.insert(id, self.rows.len());
                    self.rows.push(obj);
                    stats.added += 1;
                }
            }
        }
        if self.remove_missing && self.rows.len() > seen.len() {
            let before = self.rows.len();
            self.rows.retain(|r| seen.contains(&r.id()));
            stats.removed = before - self.rows.len();
            self.reindex();
        }
        debug!(model = S::NAME, updated = stats.updated, added = stats.added, removed = stats.removed, rows = self.rows.len(), "snapshot merged");
        counter!("model_rows_added_total", stats.added as u64, "model" => S::NAME);
        counter!("model_rows_removed_total", stats.removed as u64, "model" => S::NAME);
        self.notify();
        stats
    }

    /// Replace all rows with `items` (first occurrence of an id wins its position).
    pub fn reset(&mut self, items: Vec<S::Item>) {
        self.rows.clear();
        self.index.clear();
        for obj in items {
            let id = obj.id();
            match self.index.get(&id) {
                Some(&pos) => self.rows[pos] = obj,
                None => {
                    self.index.insert(id, self.rows.len());
                    self.rows.push(obj);
                }
            }
        }
        self.notify();
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, r) in self.rows.iter().enumerate() {
            self.index.insert(r.id(), pos);
        }
    }

    fn notify(&mut self) {
        self.epoch = self.epoch.saturating_add(1);
        gauge!("model_rows", self.rows.len() as f64, "model" => S::NAME);
        self.epoch_tx.send_replace(self.epoch);
    }
}

impl<S: Source> SourceModel for TableModel<S> {
    fn row_count(&self) -> usize { self.rows.len() }
    fn column_count(&self) -> usize { S::Item::columns().len() }
    fn row_id(&self, row: usize) -> Option<ObjectId> { self.rows.get(row).map(|r| r.id()) }
    fn cell(&self, row: usize, col: usize, role: Role) -> CellValue { TableModel::cell(self, row, col, role) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrangler_client::ClientResult;
    use wrangler_core::Cluster;

    struct Fixed;

    impl Source for Fixed {
        type Item = Cluster;
        const NAME: &'static str = "fixed";
        fn fetch(&self, _scope: Option<ObjectId>) -> ClientResult<Vec<Cluster>> { Ok(Vec::new()) }
    }

    fn c(n: u8, name: &str) -> Cluster {
        Cluster { id: ObjectId::from_bytes([n; 16]), name: name.to_string(), ..Default::default() }
    }

    #[test]
    fn merge_notifies_once_per_snapshot() {
        let mut m = TableModel::new(Fixed);
        let rx = m.subscribe();
        m.merge(vec![c(1, "a"), c(2, "b"), c(3, "c")]);
        assert_eq!(*rx.borrow(), 1);
        m.merge(vec![c(1, "a")]);
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(m.epoch(), 2);
    }

    #[test]
    fn duplicate_ids_in_snapshot_collapse() {
        let mut m = TableModel::new(Fixed);
        let stats = m.merge(vec![c(1, "a"), c(1, "a2")]);
        assert_eq!(m.len(), 1);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(m.rows()[0].name, "a2");
    }

    #[test]
    fn cell_out_of_range_is_empty() {
        let mut m = TableModel::new(Fixed);
        m.merge(vec![c(1, "a")]);
        assert_eq!(m.cell(0, 0, Role::Display).to_text(), "a");
        assert!(m.cell(3, 0, Role::Display).is_empty());
    }
}
