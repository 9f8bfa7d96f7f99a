//! Wrangler client: the render-farm API surface the console consumes.
//!
//! The farm service itself (scheduling, task lifecycle, cluster accounting)
//! lives elsewhere; this crate only names the calls the console makes and
//! ships an in-memory farm for the CLI and tests.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use wrangler_core::{Cluster, Job, JobState, Layer, ObjectId, ObjectKind, Task, TaskState};

mod memory;

pub use memory::{Call, FarmFixture, MemoryFarm};

/// Errors returned by farm calls.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("not_found: {kind:?} {id}")]
    NotFound { kind: ObjectKind, id: ObjectId },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("fixture: {0}")]
    Fixture(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Job query. Empty `states`/`names` match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobFilter {
    /// Restrict to jobs matching the user's saved filters.
    pub matching_only: bool,
    pub states: Vec<JobState>,
    pub names: Vec<String>,
}

impl JobFilter {
    pub fn running() -> Self {
        Self { matching_only: true, states: vec![JobState::Running], names: Vec::new() }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        (self.states.is_empty() || self.states.contains(&job.state))
            && (self.names.is_empty() || self.names.iter().any(|n| n == &job.name))
    }
}

/// Blocking calls into the farm. Every call runs on the caller's thread.
pub trait FarmClient {
    fn get_clusters(&self) -> ClientResult<Vec<Cluster>>;
    fn get_layers(&self, job: ObjectId) -> ClientResult<Vec<Layer>>;
    fn get_jobs(&self, filter: &JobFilter) -> ClientResult<Vec<Job>>;
    /// Tasks of a job; an empty `states` slice returns all of them.
    fn get_tasks(&self, job: ObjectId, states: &[TaskState]) -> ClientResult<Vec<Task>>;

    fn pause_job(&self, job: ObjectId, paused: bool) -> ClientResult<()>;
    fn kill_job(&self, job: ObjectId, reason: &str) -> ClientResult<()>;

    fn lock_cluster(&self, cluster: ObjectId, locked: bool) -> ClientResult<()>;
    fn set_cluster_name(&self, cluster: ObjectId, name: &str) -> ClientResult<()>;
    fn set_cluster_tags(&self, cluster: ObjectId, tags: &[String]) -> ClientResult<()>;
    fn set_default_cluster(&self, cluster: ObjectId) -> ClientResult<()>;

    fn eat_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()>;
    fn retry_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()>;
    fn kill_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()>;

    /// Remove every dependency the given layers wait on.
    fn drop_depends(&self, layers: &[ObjectId]) -> ClientResult<()>;
}
