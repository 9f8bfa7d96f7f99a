//! Panel controllers: a read-model, its proxy view and a refresh cadence.

use std::rc::Rc;
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::{debug, info, warn};
use wrangler_client::{ClientResult, FarmClient, JobFilter};
use wrangler_core::{CellValue, DomainObject, ObjectId, Role};
use wrangler_search::{SortFilterProxy, SortOrder};
use wrangler_store::{ClusterSource, JobSource, LayerSource, MergeStats, Source, TableModel};

use crate::config::Config;
use crate::events::{EventBus, Subscription, Topic};

pub type ClusterPanel = Panel<ClusterSource>;
pub type LayerPanel = Panel<LayerSource>;
pub type JobPanel = Panel<JobSource>;

pub struct Panel<S: Source> {
    model: TableModel<S>,
    proxy: SortFilterProxy,
    interval: Duration,
    last_refresh: Option<Instant>,
    bus: Rc<EventBus>,
    topic: fn(&EventBus) -> &Topic<ObjectId>,
    follow: Option<Subscription<ObjectId>>,
}

impl<S: Source> Panel<S> {
    /// `topic` picks the bus topic that row activation publishes to.
    pub fn new(
        model: TableModel<S>,
        proxy: SortFilterProxy,
        interval: Duration,
        bus: Rc<EventBus>,
        topic: fn(&EventBus) -> &Topic<ObjectId>,
    ) -> Self {
        Self { model, proxy, interval, last_refresh: None, bus, topic, follow: None }
    }

    /// Re-scope the model whenever `sub` delivers a new id.
    pub fn following(mut self, sub: Subscription<ObjectId>) -> Self {
        self.follow = Some(sub);
        self
    }

    pub fn name(&self) -> &'static str { S::NAME }
    pub fn model(&self) -> &TableModel<S> { &self.model }
    pub fn proxy(&self) -> &SortFilterProxy { &self.proxy }
    pub fn proxy_mut(&mut self) -> &mut SortFilterProxy { &mut self.proxy }
    pub fn interval(&self) -> Duration { self.interval }
    pub fn headers(&self) -> Vec<&'static str> { self.model.headers() }
    pub fn row_count(&self) -> usize { self.proxy.row_count() }

    /// Poll hook: follows the subscribed topic, then refreshes once the
    /// interval has elapsed. Returns whether anything was reloaded.
    pub fn tick(&mut self, now: Instant) -> ClientResult<bool> {
        let mut changed = false;
        if let Some(scope) = self.follow.as_mut().and_then(|s| s.take_changed()) {
            self.set_scope(Some(scope))?;
            self.last_refresh = Some(now);
            changed = true;
        }
        let due = self.last_refresh.map_or(true, |t| now.saturating_duration_since(t) >= self.interval);
        if due {
            self.last_refresh = Some(now);
            let stats = self.refresh()?;
            changed |= !stats.skipped;
        }
        Ok(changed)
    }

    /// Fetch, merge, then re-run the proxy once.
    pub fn refresh(&mut self) -> ClientResult<MergeStats> {
        let stats = match self.model.refresh() {
            Ok(s) => s,
            Err(e) => {
                warn!(panel = S::NAME, error = %e, "refresh failed");
                counter!("panel_refresh_errors_total", 1u64, "panel" => S::NAME);
                return Err(e);
            }
        };
        if !stats.skipped {
            self.proxy.invalidate(&self.model);
        }
        Ok(stats)
    }

    /// New scope: sort is cleared and rows are reloaded from scratch.
    pub fn set_scope(&mut self, scope: Option<ObjectId>) -> ClientResult<()> {
        self.proxy.clear_sort();
        let res = self.model.set_scope(scope);
        self.proxy.invalidate(&self.model);
        if let Err(e) = &res {
            warn!(panel = S::NAME, error = %e, "scope switch failed");
            counter!("panel_refresh_errors_total", 1u64, "panel" => S::NAME);
        }
        res
    }

    pub fn set_filter_text(&mut self, text: &str) -> Result<(), regex::Error> {
        self.proxy.set_filter_text(text)?;
        self.proxy.apply_if_needed(&self.model);
        Ok(())
    }

    pub fn sort_by_column(&mut self, col: usize, order: SortOrder) {
        self.proxy.sort_by_column(col, order);
        self.proxy.apply_if_needed(&self.model);
    }

    /// Header click.
    pub fn toggle_sort(&mut self, col: usize) {
        self.proxy.toggle_sort(col);
        self.proxy.apply_if_needed(&self.model);
    }

    pub fn cell(&self, proxy_row: usize, col: usize, role: Role) -> CellValue {
        self.proxy.cell(&self.model, proxy_row, col, role)
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> { self.proxy.display_rows(&self.model) }

    /// Objects behind the selected view rows, looked up by id.
    pub fn selected(&self, proxy_rows: &[usize]) -> Vec<&S::Item> {
        self.proxy.ids(&self.model, proxy_rows).into_iter().filter_map(|id| self.model.get(id)).collect()
    }

    /// Single click: the row's name, for the clipboard.
    pub fn activate(&self, proxy_row: usize) -> Option<String> {
        let id = self.proxy.id_at(&self.model, proxy_row)?;
        self.model.get(id).map(|o| o.name().to_string())
    }

    /// Double click: publish the row's id on the panel's topic.
    pub fn double_activate(&self, proxy_row: usize) -> Option<ObjectId> {
        let id = self.proxy.id_at(&self.model, proxy_row)?;
        (self.topic)(&self.bus).publish(id);
        debug!(panel = S::NAME, id = %id, "row activated");
        Some(id)
    }
}

/// Clusters: whole list every 10s by default, sorted on display values.
pub fn cluster_panel(client: Rc<dyn FarmClient>, bus: Rc<EventBus>, cfg: &Config) -> ClusterPanel {
    let model = TableModel::new(ClusterSource::new(client));
    let proxy = SortFilterProxy::new().with_sort_role(Role::Display);
    info!(interval_secs = cfg.clusters_refresh.as_secs(), "cluster panel created");
    Panel::new(model, proxy, cfg.clusters_refresh, bus, |b| &b.cluster_of_interest)
}

/// Layers of the job of interest; switches job when the topic changes.
pub fn layer_panel(client: Rc<dyn FarmClient>, bus: Rc<EventBus>, cfg: &Config) -> LayerPanel {
    let model = TableModel::new(LayerSource::new(client));
    let sub = bus.job_of_interest.subscribe();
    info!(interval_secs = cfg.layers_refresh.as_secs(), "layer panel created");
    Panel::new(model, SortFilterProxy::new(), cfg.layers_refresh, bus, |b| &b.layer_of_interest).following(sub)
}

pub fn job_panel(client: Rc<dyn FarmClient>, bus: Rc<EventBus>, cfg: &Config, filter: JobFilter) -> JobPanel {
    let model = TableModel::new(JobSource::new(client, filter));
    info!(interval_secs = cfg.jobs_refresh.as_secs(), "job panel created");
    Panel::new(model, SortFilterProxy::new(), cfg.jobs_refresh, bus, |b| &b.job_of_interest)
}
