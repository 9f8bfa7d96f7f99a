//! Layer actions: the layer panel's context menu and dropping dependencies.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wrangler_client::{ClientResult, FarmClient};
use wrangler_core::{Layer, ObjectId};

use crate::{Confirm, Decision, Outcome};

/// Most layers "Add Dependencies" accepts: one layer, or a pair to link.
pub const ADD_DEPENDS_MAX: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerAction {
    /// Opens the dependency editor; the host owns that dialog.
    AddDepends,
    DropDepends,
}

impl LayerAction {
    pub fn label(self) -> &'static str {
        match self {
            LayerAction::AddDepends => "Add Dependencies",
            LayerAction::DropDepends => "Drop Depends",
        }
    }

    pub fn op(self) -> &'static str {
        match self {
            LayerAction::AddDepends => "add_depends",
            LayerAction::DropDepends => "drop_depends",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMenuEntry {
    pub label: String,
    pub action: LayerAction,
}

/// Context menu for a layer selection. Empty selection, empty menu.
pub fn layer_menu(layers: &[Layer]) -> Vec<LayerMenuEntry> {
    if layers.is_empty() {
        return Vec::new();
    }
    let entry = |a: LayerAction| LayerMenuEntry { label: a.label().to_string(), action: a };
    let mut menu = Vec::with_capacity(2);
    if layers.len() <= ADD_DEPENDS_MAX {
        menu.push(entry(LayerAction::AddDepends));
    }
    menu.push(entry(LayerAction::DropDepends));
    menu
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropDependsPlan {
    pub layers: Vec<ObjectId>,
    pub prompt: String,
}

/// `None` for an empty selection. Dropping depends always asks first.
pub fn prepare_drop_depends(layers: &[Layer]) -> Option<DropDependsPlan> {
    if layers.is_empty() {
        return None;
    }
    Some(DropDependsPlan {
        layers: layers.iter().map(|l| l.id).collect(),
        prompt: format!("Drop depends on {} layer(s) ?", layers.len()),
    })
}

pub fn decide_drop_depends(plan: DropDependsPlan, confirmed: bool) -> Decision<DropDependsPlan> {
    if confirmed {
        Decision::Execute(plan)
    } else {
        Decision::Abort
    }
}

/// Prepare, ask, call the farm once for the whole selection. `on_done` runs
/// only after the call succeeded.
pub fn drop_depends(
    client: &dyn FarmClient,
    layers: &[Layer],
    confirm: &mut dyn Confirm,
    on_done: impl FnOnce(),
) -> ClientResult<Outcome> {
    let op = LayerAction::DropDepends.op();
    counter!("ops_dispatch_total", 1u64, "action" => op);
    let Some(plan) = prepare_drop_depends(layers) else { return Ok(Outcome::NothingToDo) };
    let confirmed = confirm.confirm(&plan.prompt);
    let plan = match decide_drop_depends(plan, confirmed) {
        Decision::Execute(plan) => plan,
        Decision::Abort => {
            info!(action = op, "action cancelled by user");
            return Ok(Outcome::Cancelled);
        }
    };
    if let Err(e) = client.drop_depends(&plan.layers) {
        warn!(action = op, error = %e, "action failed");
        return Err(e);
    }
    counter!("ops_remote_calls_total", 1u64, "action" => op);
    info!(action = op, layers = plan.layers.len(), "action executed");
    on_done();
    Ok(Outcome::Executed { calls: 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers(n: u8) -> Vec<Layer> {
        (1..=n).map(|i| Layer { id: ObjectId::from_bytes([i; 16]), name: format!("l{}", i), ..Default::default() }).collect()
    }

    #[test]
    fn add_depends_only_for_one_or_two_layers() {
        assert!(layer_menu(&[]).is_empty());
        let actions = |n| layer_menu(&layers(n)).into_iter().map(|e| e.action).collect::<Vec<_>>();
        assert_eq!(actions(1), vec![LayerAction::AddDepends, LayerAction::DropDepends]);
        assert_eq!(actions(2), vec![LayerAction::AddDepends, LayerAction::DropDepends]);
        assert_eq!(actions(3), vec![LayerAction::DropDepends]);
        assert_eq!(layer_menu(&layers(1))[0].label, "Add Dependencies");
    }

    #[test]
    fn drop_depends_always_asks() {
        assert_eq!(prepare_drop_depends(&[]), None);
        let plan = prepare_drop_depends(&layers(3)).expect("plan");
        assert_eq!(plan.prompt, "Drop depends on 3 layer(s) ?");
        assert_eq!(decide_drop_depends(plan.clone(), false), Decision::Abort);
        assert_eq!(decide_drop_depends(plan.clone(), true), Decision::Execute(plan));
    }
}
