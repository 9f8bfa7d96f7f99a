//! In-memory farm: fixture-backed `FarmClient` with a call log.

use std::cell::RefCell;
use std::path::Path;

use anyhow::Context;
use metrics::counter;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wrangler_core::{Cluster, DomainObject, Job, JobState, Layer, ObjectId, ObjectKind, Task, TaskState, TaskStateTotals};

use crate::{ClientError, ClientResult, FarmClient, JobFilter};

/// Serialized farm contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmFixture {
    pub clusters: Vec<Cluster>,
    pub jobs: Vec<Job>,
    pub layers: Vec<Layer>,
    pub tasks: Vec<Task>,
}

/// One recorded farm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    GetClusters,
    GetLayers(ObjectId),
    GetJobs(JobFilter),
    GetTasks { job: ObjectId, states: Vec<TaskState> },
    PauseJob { job: ObjectId, paused: bool },
    KillJob { job: ObjectId, reason: String },
    LockCluster { cluster: ObjectId, locked: bool },
    SetClusterName { cluster: ObjectId, name: String },
    SetClusterTags { cluster: ObjectId, tags: Vec<String> },
    SetDefaultCluster(ObjectId),
    EatTasks(Vec<ObjectId>),
    RetryTasks(Vec<ObjectId>),
    KillTasks(Vec<ObjectId>),
    DropDepends(Vec<ObjectId>),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Call::GetClusters => "get_clusters",
            Call::GetLayers(_) => "get_layers",
            Call::GetJobs(_) => "get_jobs",
            Call::GetTasks { .. } => "get_tasks",
            Call::PauseJob { .. } => "pause_job",
            Call::KillJob { .. } => "kill_job",
            Call::LockCluster { .. } => "lock_cluster",
            Call::SetClusterName { .. } => "set_cluster_name",
            Call::SetClusterTags { .. } => "set_cluster_tags",
            Call::SetDefaultCluster(_) => "set_default_cluster",
            Call::EatTasks(_) => "eat_tasks",
            Call::RetryTasks(_) => "retry_tasks",
            Call::KillTasks(_) => "kill_tasks",
            Call::DropDepends(_) => "drop_depends",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::GetClusters | Call::GetLayers(_) | Call::GetJobs(_) | Call::GetTasks { .. })
    }
}

/// Single-threaded farm double. Interior mutability stands in for the remote side.
#[derive(Debug, Default)]
pub struct MemoryFarm {
    state: RefCell<FarmFixture>,
    calls: RefCell<Vec<Call>>,
    failures: RefCell<FxHashMap<&'static str, ClientError>>,
}

impl MemoryFarm {
    pub fn new(fixture: FarmFixture) -> Self {
        let farm = Self { state: RefCell::new(fixture), ..Default::default() };
        farm.recount();
        farm
    }

    pub fn from_json(text: &str) -> ClientResult<Self> {
        let fixture: FarmFixture = serde_json::from_str(text).map_err(|e| ClientError::Fixture(e.to_string()))?;
        Ok(Self::new(fixture))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading farm fixture {}", path.display()))?;
        let farm = Self::from_json(&text).with_context(|| format!("parsing farm fixture {}", path.display()))?;
        {
            let s = farm.state.borrow();
            info!(path = %path.display(), clusters = s.clusters.len(), jobs = s.jobs.len(), layers = s.layers.len(), tasks = s.tasks.len(), "farm fixture loaded");
        }
        Ok(farm)
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> { self.calls.borrow().clone() }

    pub fn mutations(&self) -> Vec<Call> { self.calls.borrow().iter().filter(|c| c.is_mutation()).cloned().collect() }

    pub fn clear_calls(&self) { self.calls.borrow_mut().clear(); }

    /// Make every later call of `op` (see [`Call::op`]) fail with `err`.
    pub fn fail_on(&self, op: &'static str, err: ClientError) { self.failures.borrow_mut().insert(op, err); }

    pub fn heal(&self) { self.failures.borrow_mut().clear(); }

    pub fn snapshot(&self) -> FarmFixture { self.state.borrow().clone() }

    /// Mutate the farm directly, bypassing the call log (simulates server-side progress).
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FarmFixture) -> R) -> R {
        let r = f(&mut self.state.borrow_mut());
        self.recount();
        r
    }

    fn record(&self, call: Call) -> ClientResult<()> {
        let op = call.op();
        debug!(op, "farm call");
        counter!("farm_calls_total", 1u64, "op" => op);
        self.calls.borrow_mut().push(call);
        match self.failures.borrow().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Layers and jobs backed by tasks take their totals from those tasks.
    fn recount(&self) {
        let mut s = self.state.borrow_mut();
        let mut by_layer: FxHashMap<ObjectId, Vec<TaskState>> = FxHashMap::default();
        let mut by_job: FxHashMap<ObjectId, Vec<TaskState>> = FxHashMap::default();
        for t in s.tasks.iter() {
            by_layer.entry(t.layer_id).or_default().push(t.state);
            by_job.entry(t.job_id).or_default().push(t.state);
        }
        for l in s.layers.iter_mut() {
            if let Some(states) = by_layer.get(&l.id) {
                l.totals = TaskStateTotals::tally(states.iter().copied());
            }
        }
        for j in s.jobs.iter_mut() {
            if let Some(states) = by_job.get(&j.id) {
                j.totals = TaskStateTotals::tally(states.iter().copied());
            }
        }
    }

    fn with_cluster(&self, id: ObjectId, f: impl FnOnce(&mut Cluster)) -> ClientResult<()> {
        let mut s = self.state.borrow_mut();
        let c = s.clusters.iter_mut().find(|c| c.id == id).ok_or(ClientError::NotFound { kind: ObjectKind::Cluster, id })?;
        f(c);
        Ok(())
    }

    fn with_job(&self, id: ObjectId, f: impl FnOnce(&mut Job)) -> ClientResult<()> {
        let mut s = self.state.borrow_mut();
        let j = s.jobs.iter_mut().find(|j| j.id == id).ok_or(ClientError::NotFound { kind: ObjectKind::Job, id })?;
        f(j);
        Ok(())
    }

    fn set_task_states(&self, tasks: &[ObjectId], f: impl Fn(TaskState) -> TaskState) -> ClientResult<()> {
        {
            let mut s = self.state.borrow_mut();
            if let Some(missing) = tasks.iter().find(|id| !s.tasks.iter().any(|t| t.id == **id)) {
                return Err(ClientError::NotFound { kind: ObjectKind::Task, id: *missing });
            }
            for t in s.tasks.iter_mut().filter(|t| tasks.contains(&t.id)) {
                t.state = f(t.state);
            }
        }
        self.recount();
        Ok(())
    }
}

impl FarmClient for MemoryFarm {
    fn get_clusters(&self) -> ClientResult<Vec<Cluster>> {
        self.record(Call::GetClusters)?;
        Ok(self.state.borrow().clusters.clone())
    }

    fn get_layers(&self, job: ObjectId) -> ClientResult<Vec<Layer>> {
        self.record(Call::GetLayers(job))?;
        Ok(self.state.borrow().layers.iter().filter(|l| l.job_id == job).cloned().collect())
    }

    fn get_jobs(&self, filter: &JobFilter) -> ClientResult<Vec<Job>> {
        self.record(Call::GetJobs(filter.clone()))?;
        Ok(self.state.borrow().jobs.iter().filter(|j| filter.matches(j)).cloned().collect())
    }

    fn get_tasks(&self, job: ObjectId, states: &[TaskState]) -> ClientResult<Vec<Task>> {
        self.record(Call::GetTasks { job, states: states.to_vec() })?;
        let s = self.state.borrow();
        if !s.jobs.iter().any(|j| j.id() == job) {
            return Err(ClientError::NotFound { kind: ObjectKind::Job, id: job });
        }
        Ok(s.tasks
            .iter()
            .filter(|t| t.job_id == job && (states.is_empty() || states.contains(&t.state)))
            .cloned()
            .collect())
    }

    fn pause_job(&self, job: ObjectId, paused: bool) -> ClientResult<()> {
        self.record(Call::PauseJob { job, paused })?;
        self.with_job(job, |j| j.paused = paused)
    }

    fn kill_job(&self, job: ObjectId, reason: &str) -> ClientResult<()> {
        self.record(Call::KillJob { job, reason: reason.to_string() })?;
        self.with_job(job, |j| j.state = JobState::Finished)
    }

    fn lock_cluster(&self, cluster: ObjectId, locked: bool) -> ClientResult<()> {
        self.record(Call::LockCluster { cluster, locked })?;
        self.with_cluster(cluster, |c| c.is_locked = locked)
    }

    fn set_cluster_name(&self, cluster: ObjectId, name: &str) -> ClientResult<()> {
        self.record(Call::SetClusterName { cluster, name: name.to_string() })?;
        if name.trim().is_empty() {
            return Err(ClientError::Rejected("cluster name must not be empty".into()));
        }
        let taken = self.state.borrow().clusters.iter().any(|c| c.id != cluster && c.name == name);
        if taken {
            return Err(ClientError::Rejected(format!("cluster name already in use: {}", name)));
        }
        self.with_cluster(cluster, |c| c.name = name.to_string())
    }

    fn set_cluster_tags(&self, cluster: ObjectId, tags: &[String]) -> ClientResult<()> {
        self.record(Call::SetClusterTags { cluster, tags: tags.to_vec() })?;
        self.with_cluster(cluster, |c| c.tags = tags.iter().cloned().collect())
    }

    fn set_default_cluster(&self, cluster: ObjectId) -> ClientResult<()> {
        self.record(Call::SetDefaultCluster(cluster))?;
        self.with_cluster(cluster, |_| {})?;
        for c in self.state.borrow_mut().clusters.iter_mut() {
            c.is_default = c.id == cluster;
        }
        Ok(())
    }

    fn eat_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()> {
        self.record(Call::EatTasks(tasks.to_vec()))?;
        self.set_task_states(tasks, |_| TaskState::Eaten)
    }

    fn retry_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()> {
        self.record(Call::RetryTasks(tasks.to_vec()))?;
        self.set_task_states(tasks, |_| TaskState::Waiting)
    }

    fn kill_tasks(&self, tasks: &[ObjectId]) -> ClientResult<()> {
        self.record(Call::KillTasks(tasks.to_vec()))?;
        // killed tasks go back to the queue; anything not running is left alone
        self.set_task_states(tasks, |s| if s == TaskState::Running { TaskState::Waiting } else { s })
    }

    fn drop_depends(&self, layers: &[ObjectId]) -> ClientResult<()> {
        self.record(Call::DropDepends(layers.to_vec()))?;
        {
            let mut s = self.state.borrow_mut();
            if let Some(missing) = layers.iter().find(|id| !s.layers.iter().any(|l| l.id == **id)) {
                return Err(ClientError::NotFound { kind: ObjectKind::Layer, id: *missing });
            }
            for t in s.tasks.iter_mut().filter(|t| layers.contains(&t.layer_id) && t.state == TaskState::Depend) {
                t.state = TaskState::Waiting;
            }
        }
        self.recount();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId { uuid::Uuid::from_bytes([n; 16]) }

    fn farm() -> MemoryFarm {
        let job = Job { id: id(1), name: "shot_010".into(), state: JobState::Running, ..Default::default() };
        let layer = Layer { id: id(2), job_id: id(1), name: "beauty".into(), ..Default::default() };
        let tasks = vec![
            Task { id: id(10), job_id: id(1), layer_id: id(2), state: TaskState::Dead, ..Default::default() },
            Task { id: id(11), job_id: id(1), layer_id: id(2), state: TaskState::Running, ..Default::default() },
            Task { id: id(12), job_id: id(1), layer_id: id(2), state: TaskState::Succeeded, ..Default::default() },
        ];
        MemoryFarm::new(FarmFixture { jobs: vec![job], layers: vec![layer], tasks, ..Default::default() })
    }

    #[test]
    fn totals_follow_tasks() {
        let f = farm();
        let layers = f.get_layers(id(1)).expect("layers");
        assert_eq!(layers[0].totals.dead, 1);
        assert_eq!(layers[0].totals.total(), 3);

        f.eat_tasks(&[id(10)]).expect("eat");
        let jobs = f.get_jobs(&JobFilter::default()).expect("jobs");
        assert_eq!(jobs[0].totals.dead, 0);
        assert_eq!(jobs[0].totals.eaten, 1);
        assert_eq!(jobs[0].totals.total(), 3);
    }

    #[test]
    fn get_tasks_filters_by_state() {
        let f = farm();
        let dead = f.get_tasks(id(1), &[TaskState::Dead]).expect("tasks");
        assert_eq!(dead.len(), 1);
        assert_eq!(f.get_tasks(id(1), &[]).expect("tasks").len(), 3);
        assert!(matches!(f.get_tasks(id(9), &[]), Err(ClientError::NotFound { .. })));
    }

    #[test]
    fn drop_depends_releases_waiting_tasks() {
        let f = farm();
        f.with_state(|s| s.tasks[2].state = TaskState::Depend);
        f.drop_depends(&[id(2)]).expect("drop");
        let tasks = f.get_tasks(id(1), &[]).expect("tasks");
        assert_eq!(tasks[2].state, TaskState::Waiting);
        assert_eq!(tasks[0].state, TaskState::Dead);
        assert!(matches!(f.drop_depends(&[id(9)]), Err(ClientError::NotFound { kind: ObjectKind::Layer, .. })));
        assert_eq!(f.mutations().len(), 2);
    }

    #[test]
    fn injected_failures_are_recorded_then_returned() {
        let f = farm();
        f.fail_on("get_jobs", ClientError::Unavailable("down".into()));
        assert_eq!(f.get_jobs(&JobFilter::default()), Err(ClientError::Unavailable("down".into())));
        assert_eq!(f.calls().len(), 1);
        f.heal();
        assert!(f.get_jobs(&JobFilter::default()).is_ok());
    }

    #[test]
    fn fixture_parses_partial_objects() {
        let f = MemoryFarm::from_json(r#"{ "clusters": [ { "name": "a" } ] }"#).expect("fixture");
        assert_eq!(f.get_clusters().expect("clusters")[0].name, "a");
        assert!(matches!(MemoryFarm::from_json("{"), Err(ClientError::Fixture(_))));
    }
}
