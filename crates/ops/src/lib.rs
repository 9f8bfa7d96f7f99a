//! Wrangler ops: user actions on selected farm objects.
//!
//! Every action runs in three steps so the logic is testable without a UI:
//! `prepare` resolves targets against the farm, `decide` is a pure function
//! of the plan and the user's answer, and `execute` issues the remote calls.
//! `Dispatcher` strings them together with a `Confirm` adapter.

#![forbid(unsafe_code)]

use std::rc::Rc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wrangler_client::{ClientResult, FarmClient};
use wrangler_core::{Job, Layer, ObjectId, TaskState};

mod cluster;
mod confirm;
mod layer;

pub use cluster::{apply_cluster_edit, save_cluster_edit, set_clusters_locked, ClusterEdit, EditError, EditStep};
pub use confirm::{AssumeNo, AssumeYes, Confirm, Notify};
pub use layer::{
    decide_drop_depends, drop_depends, layer_menu, prepare_drop_depends, DropDependsPlan, LayerAction, LayerMenuEntry,
    ADD_DEPENDS_MAX,
};

/// Reason recorded on the farm when a job is killed from the console.
pub const DEFAULT_KILL_REASON: &str = "wrangler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobAction {
    Pause,
    Unpause,
    Kill,
    KillTasks,
    EatDeadTasks,
    RetryDeadTasks,
}

impl JobAction {
    pub const ALL: [JobAction; 6] = [
        JobAction::Pause,
        JobAction::Unpause,
        JobAction::Kill,
        JobAction::KillTasks,
        JobAction::EatDeadTasks,
        JobAction::RetryDeadTasks,
    ];

    /// Pause or un-pause, decided by the first job in the selection.
    pub fn toggle_pause(jobs: &[Job]) -> Option<JobAction> {
        jobs.first().map(|j| if j.paused { JobAction::Unpause } else { JobAction::Pause })
    }

    pub fn is_task_action(self) -> bool {
        matches!(self, JobAction::KillTasks | JobAction::EatDeadTasks | JobAction::RetryDeadTasks)
    }

    /// Task states the action targets; empty means every task.
    pub fn task_states(self) -> &'static [TaskState] {
        match self {
            JobAction::EatDeadTasks | JobAction::RetryDeadTasks => &[TaskState::Dead],
            _ => &[],
        }
    }

    /// Farm operation name, as shown in confirmation prompts.
    pub fn op(self) -> &'static str {
        match self {
            JobAction::Pause | JobAction::Unpause => "pause",
            JobAction::Kill => "kill",
            JobAction::KillTasks => "kill_tasks",
            JobAction::EatDeadTasks => "eat_tasks",
            JobAction::RetryDeadTasks => "retry_tasks",
        }
    }

    pub fn label(self, jobs: usize) -> String {
        match self {
            JobAction::Pause => "Pause".to_string(),
            JobAction::Unpause => "Un-Pause".to_string(),
            JobAction::Kill => if jobs > 1 { "Kill Jobs".to_string() } else { "Kill Job".to_string() },
            JobAction::KillTasks => "Kill Tasks".to_string(),
            JobAction::EatDeadTasks => "Eat Dead Tasks".to_string(),
            JobAction::RetryDeadTasks => "Retry Dead Tasks".to_string(),
        }
    }
}

impl std::str::FromStr for JobAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(JobAction::Pause),
            "unpause" | "un-pause" => Ok(JobAction::Unpause),
            "kill" => Ok(JobAction::Kill),
            "kill-tasks" => Ok(JobAction::KillTasks),
            "eat-dead" | "eat-dead-tasks" => Ok(JobAction::EatDeadTasks),
            "retry-dead" | "retry-dead-tasks" => Ok(JobAction::RetryDeadTasks),
            other => Err(format!("unknown job action: {}", other)),
        }
    }
}

/// One context-menu line; `action: None` is a separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub action: Option<JobAction>,
}

/// Context menu for a job selection. Empty selection, empty menu.
pub fn job_menu(jobs: &[Job]) -> Vec<MenuEntry> {
    let Some(pause) = JobAction::toggle_pause(jobs) else { return Vec::new() };
    let entry = |a: JobAction| MenuEntry { label: a.label(jobs.len()), action: Some(a) };
    vec![
        entry(pause),
        entry(JobAction::Kill),
        MenuEntry { label: String::new(), action: None },
        entry(JobAction::KillTasks),
        entry(JobAction::EatDeadTasks),
        entry(JobAction::RetryDeadTasks),
    ]
}

/// Resolved targets of an action, before the user is asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub action: JobAction,
    pub jobs: Vec<ObjectId>,
    pub tasks: Vec<ObjectId>,
    /// Question to put to the user; `None` runs without asking.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Nothing to act on (empty selection or no matching tasks).
    Nothing,
    Ready(Plan),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<P = Plan> {
    Execute(P),
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    NothingToDo,
    Cancelled,
    Executed { calls: usize },
}

/// Resolve the action's targets. Task actions query the farm for the tasks of
/// every selected job; an empty result means there is nothing to do.
pub fn prepare(client: &dyn FarmClient, action: JobAction, jobs: &[Job]) -> ClientResult<Prepared> {
    if jobs.is_empty() {
        return Ok(Prepared::Nothing);
    }
    let job_ids: Vec<ObjectId> = jobs.iter().map(|j| j.id).collect();
    let mut tasks = Vec::new();
    let prompt = match action {
        JobAction::Pause | JobAction::Unpause => None,
        JobAction::Kill => Some(format!("Kill {} job(s) ?", jobs.len())),
        JobAction::KillTasks | JobAction::EatDeadTasks | JobAction::RetryDeadTasks => {
            for j in jobs {
                tasks.extend(client.get_tasks(j.id, action.task_states())?.into_iter().map(|t| t.id));
            }
            if tasks.is_empty() {
                debug!(action = action.op(), jobs = jobs.len(), "no tasks to act on");
                return Ok(Prepared::Nothing);
            }
            Some(format!("Run '{}' on {} jobs  ({} tasks) ?", action.op(), jobs.len(), tasks.len()))
        }
    };
    Ok(Prepared::Ready(Plan { action, jobs: job_ids, tasks, prompt }))
}

/// Pure: a plan that needs confirmation runs only when confirmed.
pub fn decide(plan: Plan, confirmed: bool) -> Decision {
    if plan.prompt.is_none() || confirmed {
        Decision::Execute(plan)
    } else {
        Decision::Abort
    }
}

/// Issue the remote calls for a plan. Returns the number of calls made.
pub fn execute(client: &dyn FarmClient, plan: &Plan, kill_reason: &str) -> ClientResult<usize> {
    let mut calls = 0usize;
    match plan.action {
        JobAction::Pause | JobAction::Unpause => {
            let paused = plan.action == JobAction::Pause;
            for j in plan.jobs.iter() {
                client.pause_job(*j, paused)?;
                calls += 1;
            }
        }
        JobAction::Kill => {
            for j in plan.jobs.iter() {
                client.kill_job(*j, kill_reason)?;
                calls += 1;
            }
        }
        JobAction::KillTasks => {
            client.kill_tasks(&plan.tasks)?;
            calls += 1;
        }
        JobAction::EatDeadTasks => {
            client.eat_tasks(&plan.tasks)?;
            calls += 1;
        }
        JobAction::RetryDeadTasks => {
            client.retry_tasks(&plan.tasks)?;
            calls += 1;
        }
    }
    counter!("ops_remote_calls_total", calls as u64, "action" => plan.action.op());
    Ok(calls)
}

/// Runs job actions end to end. Holds no result state between calls.
pub struct Dispatcher {
    client: Rc<dyn FarmClient>,
    kill_reason: String,
}

impl Dispatcher {
    pub fn new(client: Rc<dyn FarmClient>) -> Self {
        Self { client, kill_reason: DEFAULT_KILL_REASON.to_string() }
    }

    pub fn with_kill_reason(mut self, reason: impl Into<String>) -> Self {
        self.kill_reason = reason.into();
        self
    }

    pub fn client(&self) -> &Rc<dyn FarmClient> { &self.client }

    /// Prepare, ask, execute. `on_done` (usually a panel refresh) runs only
    /// after the remote calls succeeded.
    pub fn dispatch(
        &self,
        action: JobAction,
        jobs: &[Job],
        confirm: &mut dyn Confirm,
        on_done: impl FnOnce(),
    ) -> ClientResult<Outcome> {
        counter!("ops_dispatch_total", 1u64, "action" => action.op());
        let plan = match prepare(self.client.as_ref(), action, jobs)? {
            Prepared::Nothing => return Ok(Outcome::NothingToDo),
            Prepared::Ready(plan) => plan,
        };
        let confirmed = match plan.prompt.as_deref() {
            Some(prompt) => confirm.confirm(prompt),
            None => true,
        };
        let plan = match decide(plan, confirmed) {
            Decision::Execute(plan) => plan,
            Decision::Abort => {
                info!(action = action.op(), "action cancelled by user");
                return Ok(Outcome::Cancelled);
            }
        };
        let calls = match execute(self.client.as_ref(), &plan, &self.kill_reason) {
            Ok(n) => n,
            Err(e) => {
                warn!(action = action.op(), error = %e, "action failed");
                return Err(e);
            }
        };
        info!(action = action.op(), jobs = plan.jobs.len(), tasks = plan.tasks.len(), calls, "action executed");
        on_done();
        Ok(Outcome::Executed { calls })
    }

    /// Drop the dependencies of the selected layers after confirmation.
    pub fn drop_depends(
        &self,
        layers: &[Layer],
        confirm: &mut dyn Confirm,
        on_done: impl FnOnce(),
    ) -> ClientResult<Outcome> {
        layer::drop_depends(self.client.as_ref(), layers, confirm, on_done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(paused: bool) -> Job {
        Job { id: ObjectId::from_bytes([1; 16]), name: "j".into(), paused, ..Default::default() }
    }

    #[test]
    fn menu_follows_first_job_pause_state() {
        let menu = job_menu(&[job(true), job(false)]);
        let labels: Vec<&str> = menu.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Un-Pause", "Kill Jobs", "", "Kill Tasks", "Eat Dead Tasks", "Retry Dead Tasks"]);
        assert_eq!(menu[2].action, None);
        assert_eq!(job_menu(&[job(false)])[0].action, Some(JobAction::Pause));
        assert_eq!(job_menu(&[job(false)])[1].label, "Kill Job");
        assert!(job_menu(&[]).is_empty());
    }

    #[test]
    fn decide_is_pure() {
        let plan = Plan { action: JobAction::Kill, jobs: vec![], tasks: vec![], prompt: Some("Kill 1 job(s) ?".into()) };
        assert_eq!(decide(plan.clone(), false), Decision::Abort);
        assert_eq!(decide(plan.clone(), true), Decision::Execute(plan));

        let pause = Plan { action: JobAction::Pause, jobs: vec![], tasks: vec![], prompt: None };
        assert_eq!(decide(pause.clone(), false), Decision::Execute(pause));
    }

    #[test]
    fn actions_parse_from_cli_names() {
        assert_eq!("eat-dead".parse::<JobAction>(), Ok(JobAction::EatDeadTasks));
        assert_eq!("kill-tasks".parse::<JobAction>(), Ok(JobAction::KillTasks));
        assert!("explode".parse::<JobAction>().is_err());
        assert_eq!(JobAction::RetryDeadTasks.task_states(), &[TaskState::Dead]);
        assert!(JobAction::KillTasks.task_states().is_empty());
    }
}
