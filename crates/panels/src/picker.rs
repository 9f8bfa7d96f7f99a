//! Job selection picker: running jobs by name, filterable, sorted.

use std::rc::Rc;

use tracing::debug;
use wrangler_client::{ClientResult, FarmClient, JobFilter};
use wrangler_core::{CellValue, Job, ObjectId, Role, SourceModel};
use wrangler_search::{SortFilterProxy, SortOrder};

/// Plain list of names as a one-column source.
struct NameList(Vec<String>);

impl SourceModel for NameList {
    fn row_count(&self) -> usize { self.0.len() }
    fn column_count(&self) -> usize { 1 }
    fn row_id(&self, _row: usize) -> Option<ObjectId> { None }
    fn cell(&self, row: usize, col: usize, _role: Role) -> CellValue {
        match (col, self.0.get(row)) {
            (0, Some(n)) => CellValue::text(n.as_str()),
            _ => CellValue::Empty,
        }
    }
}

pub struct JobPicker {
    client: Rc<dyn FarmClient>,
    names: NameList,
    proxy: SortFilterProxy,
}

impl JobPicker {
    /// Loads the user's running jobs.
    pub fn open(client: Rc<dyn FarmClient>) -> ClientResult<Self> {
        let jobs = client.get_jobs(&JobFilter::running())?;
        let names = NameList(jobs.into_iter().map(|j| j.name).collect());
        let mut proxy = SortFilterProxy::new().with_sort_role(Role::Display);
        proxy.sort_by_column(0, SortOrder::Ascending);
        proxy.invalidate(&names);
        Ok(Self { client, names, proxy })
    }

    pub fn set_filter_text(&mut self, text: &str) -> Result<(), regex::Error> {
        self.proxy.set_filter_text(text)?;
        self.proxy.apply_if_needed(&self.names);
        Ok(())
    }

    /// Names currently listed, in display order.
    pub fn visible(&self) -> Vec<&str> {
        self.proxy.source_rows().iter().filter_map(|r| self.names.0.get(*r).map(String::as_str)).collect()
    }

    /// Resolve selected rows to jobs. No selection, no call.
    pub fn resolve(&self, proxy_rows: &[usize]) -> ClientResult<Vec<Job>> {
        let names: Vec<String> = proxy_rows
            .iter()
            .filter_map(|r| self.proxy.map_to_source(*r))
            .filter_map(|r| self.names.0.get(r).cloned())
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = names.len(), "resolving picked jobs");
        self.client.get_jobs(&JobFilter::running().with_names(names))
    }
}
