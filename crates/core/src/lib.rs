//! Wrangler core types: read-only snapshots of render-farm objects.
//!
//! Everything here is plain data as delivered by the remote farm service.
//! Objects are never mutated locally; the read-model replaces them wholesale
//! on each refresh.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod columns;
pub mod palette;

pub use columns::{CellValue, Column, Role, SourceModel, Tabular};

/// Stable identifier of any farm object.
pub type ObjectId = uuid::Uuid;

/// Tag lists are short; most objects carry one or two.
pub type Tags = SmallVec<[String; 4]>;

/// Failure to parse a state name given on the command line or in a fixture.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown {what} state: {value}")]
pub struct StateParseError {
    pub what: &'static str,
    pub value: String,
}

/// Task state as reported by the farm. Discriminants match the wire values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Initialize = 0,
    Waiting = 1,
    Running = 2,
    Dead = 3,
    Eaten = 4,
    Depend = 5,
    Succeeded = 6,
}

impl TaskState {
    /// The closed set counted by [`TaskStateTotals`], in display order.
    pub const COUNTED: [TaskState; 6] = [
        TaskState::Waiting,
        TaskState::Running,
        TaskState::Dead,
        TaskState::Eaten,
        TaskState::Depend,
        TaskState::Succeeded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Initialize => "initialize",
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Dead => "dead",
            TaskState::Eaten => "eaten",
            TaskState::Depend => "depend",
            TaskState::Succeeded => "succeeded",
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initialize" => Ok(TaskState::Initialize),
            "waiting" => Ok(TaskState::Waiting),
            "running" => Ok(TaskState::Running),
            "dead" => Ok(TaskState::Dead),
            "eaten" => Ok(TaskState::Eaten),
            "depend" => Ok(TaskState::Depend),
            "succeeded" => Ok(TaskState::Succeeded),
            _ => Err(StateParseError { what: "task", value: s.to_string() }),
        }
    }
}

/// Job state. Users only ever see running and finished jobs; initialize is transient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Initialize = 0,
    Running = 1,
    Finished = 2,
}

impl JobState {
    pub fn label(self) -> &'static str {
        match self {
            JobState::Initialize => "Initialize",
            JobState::Running => "Running",
            JobState::Finished => "Finished",
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initialize" => Ok(JobState::Initialize),
            "running" => Ok(JobState::Running),
            "finished" => Ok(JobState::Finished),
            _ => Err(StateParseError { what: "job", value: s.to_string() }),
        }
    }
}

/// Per-state task counts. The total is always derived, so `total() == sum(states)` holds by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TaskStateTotals {
    pub waiting: u32,
    pub running: u32,
    pub dead: u32,
    pub eaten: u32,
    pub depend: u32,
    pub succeeded: u32,
}

impl TaskStateTotals {
    /// Counts in the order of [`TaskState::COUNTED`].
    pub fn counts(&self) -> [u32; 6] {
        [self.waiting, self.running, self.dead, self.eaten, self.depend, self.succeeded]
    }

    pub fn total(&self) -> u32 {
        self.counts().iter().fold(0u32, |acc, v| acc.saturating_add(*v))
    }

    pub fn get(&self, state: TaskState) -> u32 {
        match state {
            TaskState::Waiting => self.waiting,
            TaskState::Running => self.running,
            TaskState::Dead => self.dead,
            TaskState::Eaten => self.eaten,
            TaskState::Depend => self.depend,
            TaskState::Succeeded => self.succeeded,
            TaskState::Initialize => 0,
        }
    }

    /// Increment the counter for `state`; initialize is not counted.
    pub fn bump(&mut self, state: TaskState) {
        let slot = match state {
            TaskState::Waiting => &mut self.waiting,
            TaskState::Running => &mut self.running,
            TaskState::Dead => &mut self.dead,
            TaskState::Eaten => &mut self.eaten,
            TaskState::Depend => &mut self.depend,
            TaskState::Succeeded => &mut self.succeeded,
            TaskState::Initialize => return,
        };
        *slot = slot.saturating_add(1);
    }

    /// Tallies a sequence of task states.
    pub fn tally<I: IntoIterator<Item = TaskState>>(states: I) -> Self {
        let mut t = Self::default();
        for s in states {
            t.bump(s);
        }
        t
    }

    /// Tasks still to be picked up: waiting plus depend.
    pub fn pending(&self) -> u32 {
        self.waiting.saturating_add(self.depend)
    }

    /// Tasks that will not run again: succeeded plus eaten.
    pub fn done(&self) -> u32 {
        self.succeeded.saturating_add(self.eaten)
    }
}

/// Aggregate core and node counters for a cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ClusterTotals {
    pub cores: u32,
    pub run_cores: u32,
    pub idle_cores: u32,
    pub up_cores: u32,
    pub down_cores: u32,
    pub repair_cores: u32,
    pub locked_cores: u32,
    pub nodes: u32,
    pub up_nodes: u32,
    pub down_nodes: u32,
    pub repair_nodes: u32,
    pub locked_nodes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Cluster {
    pub id: ObjectId,
    pub name: String,
    pub tags: Tags,
    pub is_locked: bool,
    pub is_default: bool,
    pub total: ClusterTotals,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LayerStats {
    /// Average task wall-clock time in milliseconds.
    pub avg_clock_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Layer {
    pub id: ObjectId,
    pub job_id: ObjectId,
    pub name: String,
    /// Frame range expression, absent for single-task layers.
    pub range: Option<String>,
    pub chunk: u32,
    pub service: String,
    pub tags: Tags,
    pub totals: TaskStateTotals,
    pub run_cores: u32,
    pub stats: LayerStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Job {
    pub id: ObjectId,
    pub name: String,
    pub project: String,
    pub username: String,
    pub state: JobState,
    pub paused: bool,
    pub totals: TaskStateTotals,
    pub run_cores: u32,
    pub max_cores: u32,
}

impl Job {
    pub fn has_errors(&self) -> bool {
        self.totals.dead > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Task {
    pub id: ObjectId,
    pub job_id: ObjectId,
    pub layer_id: ObjectId,
    pub name: String,
    pub number: u32,
    pub state: TaskState,
}

/// Which farm collection an object came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Cluster,
    Layer,
    Job,
    Task,
}

/// Capability shared by everything a panel can show: a stable id and a display name.
pub trait DomainObject {
    const KIND: ObjectKind;
    fn id(&self) -> ObjectId;
    fn name(&self) -> &str;
}

impl DomainObject for Cluster {
    const KIND: ObjectKind = ObjectKind::Cluster;
    fn id(&self) -> ObjectId { self.id }
    fn name(&self) -> &str { &self.name }
}

impl DomainObject for Layer {
    const KIND: ObjectKind = ObjectKind::Layer;
    fn id(&self) -> ObjectId { self.id }
    fn name(&self) -> &str { &self.name }
}

impl DomainObject for Job {
    const KIND: ObjectKind = ObjectKind::Job;
    fn id(&self) -> ObjectId { self.id }
    fn name(&self) -> &str { &self.name }
}

impl DomainObject for Task {
    const KIND: ObjectKind = ObjectKind::Task;
    fn id(&self) -> ObjectId { self.id }
    fn name(&self) -> &str { &self.name }
}

pub mod prelude {
    pub use super::{
        Cluster, ClusterTotals, DomainObject, Job, JobState, Layer, LayerStats, ObjectId, ObjectKind, Tags, Task,
        TaskState, TaskStateTotals,
    };
    pub use super::columns::{CellValue, Column, Role, SourceModel, Tabular};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_are_derived_from_states() {
        let t = TaskStateTotals { waiting: 2, running: 1, dead: 3, eaten: 0, depend: 4, succeeded: 10 };
        assert_eq!(t.total(), 20);
        assert_eq!(t.total(), t.counts().iter().sum::<u32>());
        assert_eq!(t.pending(), 6);
        assert_eq!(t.done(), 10);
    }

    #[test]
    fn tally_ignores_initialize() {
        let t = TaskStateTotals::tally([TaskState::Dead, TaskState::Dead, TaskState::Initialize, TaskState::Succeeded]);
        assert_eq!(t.dead, 2);
        assert_eq!(t.succeeded, 1);
        assert_eq!(t.total(), 3);
    }

    #[test]
    fn partial_objects_deserialize_with_defaults() {
        let l: Layer = serde_json::from_value(serde_json::json!({ "name": "comp" })).expect("layer");
        assert_eq!(l.name, "comp");
        assert_eq!(l.totals.total(), 0);
        assert!(l.range.is_none());

        // an incoming "total" is ignored; the sum is authoritative
        let t: TaskStateTotals = serde_json::from_value(serde_json::json!({ "dead": 1, "total": 99 })).expect("totals");
        assert_eq!(t.total(), 1);
    }

    #[test]
    fn states_parse_case_insensitively() {
        assert_eq!("DEAD".parse::<TaskState>(), Ok(TaskState::Dead));
        assert_eq!("running".parse::<JobState>(), Ok(JobState::Running));
        assert!("zombie".parse::<TaskState>().is_err());
    }
}
