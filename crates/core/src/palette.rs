//! Console colors for states and highlights.

use serde::{Deserialize, Serialize};

use crate::{JobState, TaskState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Half-brightness variant (the toolkit default "darker" factor).
    pub const fn darker(self) -> Rgb {
        Rgb(self.0 / 2, self.1 / 2, self.2 / 2)
    }

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

pub const BLUE: Rgb = Rgb(38, 98, 117);
pub const PURPLE: Rgb = Rgb(175, 38, 193);
pub const RED: Rgb = Rgb(152, 21, 0);
pub const ORANGE: Rgb = Rgb(243, 115, 33);
pub const GREEN: Rgb = Rgb(76, 115, 0);
pub const YELLOW: Rgb = Rgb(195, 174, 45);
pub const GRAY: Rgb = Rgb(66, 66, 66);
pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);

/// Outline used around progress segments.
pub const PEN: Rgb = Rgb(33, 33, 33);

pub fn task_state_color(state: TaskState) -> Rgb {
    match state {
        TaskState::Initialize => GRAY,
        TaskState::Waiting => BLUE,
        TaskState::Running => YELLOW,
        TaskState::Dead => RED,
        TaskState::Eaten => RED.darker(),
        TaskState::Depend => PURPLE,
        TaskState::Succeeded => GREEN,
    }
}

pub fn job_state_color(state: JobState) -> Rgb {
    match state {
        JobState::Initialize => GRAY,
        JobState::Running => YELLOW,
        JobState::Finished => GREEN,
    }
}
