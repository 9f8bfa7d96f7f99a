//! Snapshot fetchers: one per farm collection.

use std::rc::Rc;

use wrangler_client::{ClientResult, FarmClient, JobFilter};
use wrangler_core::{Cluster, Job, Layer, ObjectId, Tabular};

/// Fetches the current list of one kind of object for a scope.
pub trait Source {
    type Item: Tabular + Clone;

    /// Short name used in logs and metric labels.
    const NAME: &'static str;

    /// Whether rows missing from a snapshot are dropped. Layers keep them:
    /// the farm leaves recently finished entries out of incremental snapshots.
    const REMOVE_MISSING: bool = true;

    /// Whether a fetch needs a scope. Unscoped fetches ignore it.
    fn scoped(&self) -> bool { false }

    fn fetch(&self, scope: Option<ObjectId>) -> ClientResult<Vec<Self::Item>>;
}

pub struct ClusterSource {
    client: Rc<dyn FarmClient>,
}

impl ClusterSource {
    pub fn new(client: Rc<dyn FarmClient>) -> Self { Self { client } }
}

impl Source for ClusterSource {
    type Item = Cluster;
    const NAME: &'static str = "clusters";

    fn fetch(&self, _scope: Option<ObjectId>) -> ClientResult<Vec<Cluster>> {
        self.client.get_clusters()
    }
}

/// Layers of one job; the scope is the job id.
pub struct LayerSource {
    client: Rc<dyn FarmClient>,
}

impl LayerSource {
    pub fn new(client: Rc<dyn FarmClient>) -> Self { Self { client } }
}

impl Source for LayerSource {
    type Item = Layer;
    const NAME: &'static str = "layers";
    const REMOVE_MISSING: bool = false;

    fn scoped(&self) -> bool { true }

    fn fetch(&self, scope: Option<ObjectId>) -> ClientResult<Vec<Layer>> {
        match scope {
            Some(job) => self.client.get_layers(job),
            None => Ok(Vec::new()),
        }
    }
}

pub struct JobSource {
    client: Rc<dyn FarmClient>,
    filter: JobFilter,
}

impl JobSource {
    pub fn new(client: Rc<dyn FarmClient>, filter: JobFilter) -> Self { Self { client, filter } }

    pub fn filter(&self) -> &JobFilter { &self.filter }
}

impl Source for JobSource {
    type Item = Job;
    const NAME: &'static str = "jobs";

    fn fetch(&self, _scope: Option<ObjectId>) -> ClientResult<Vec<Job>> {
        self.client.get_jobs(&self.filter)
    }
}
