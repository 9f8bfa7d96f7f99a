use serde::Serialize;
use wrangler_core::palette::{job_state_color, Rgb, RED};
use wrangler_core::Job;

/// Job state pill: red while the job has dead tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub fill: Rgb,
    pub outline: Rgb,
}

pub fn job_badge(job: &Job) -> Badge {
    let fill = if job.has_errors() { RED } else { job_state_color(job.state) };
    Badge { label: job.state.label(), fill, outline: fill.darker() }
}
