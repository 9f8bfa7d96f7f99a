//! Cluster lock/unlock and the property edit.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wrangler_client::{ClientError, FarmClient};
use wrangler_core::{Cluster, ObjectId};

use crate::confirm::Notify;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("invalid cluster edit: {0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] ClientError),
}

/// Editable cluster properties, seeded from the current cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEdit {
    pub name: String,
    pub tags: Vec<String>,
    pub locked: bool,
    pub default: bool,
}

/// One remote call the edit needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditStep {
    Name(String),
    Tags(Vec<String>),
    Lock(bool),
    MakeDefault,
}

impl ClusterEdit {
    pub fn from_cluster(c: &Cluster) -> Self {
        Self { name: c.name.clone(), tags: c.tags.iter().cloned().collect(), locked: c.is_locked, default: c.is_default }
    }

    /// Trims the name and tags; drops blank and repeated tags.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for t in self.tags.iter().map(|t| t.trim()) {
            if !t.is_empty() && !tags.iter().any(|x| x == t) {
                tags.push(t.to_string());
            }
        }
        self.tags = tags;
        self
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if self.name.trim().is_empty() {
            return Err(EditError::Validation("name must not be empty".into()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(EditError::Validation(format!("name must not contain whitespace: {:?}", self.name)));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(EditError::Validation("tags must not be blank".into()));
        }
        Ok(())
    }

    /// Calls needed to move `current` to this edit, in apply order.
    /// A default cluster cannot be un-defaulted; unchecking it is a no-op.
    pub fn changes(&self, current: &Cluster) -> Vec<EditStep> {
        let mut steps = Vec::new();
        if self.name != current.name {
            steps.push(EditStep::Name(self.name.clone()));
        }
        if !self.tags.iter().eq(current.tags.iter()) {
            steps.push(EditStep::Tags(self.tags.clone()));
        }
        if self.locked != current.is_locked {
            steps.push(EditStep::Lock(self.locked));
        }
        if self.default && !current.is_default {
            steps.push(EditStep::MakeDefault);
        }
        steps
    }
}

/// Validate and apply an edit. Only changed fields are sent; the first
/// failing call stops the rest. Returns the number of calls made.
pub fn save_cluster_edit(client: &dyn FarmClient, current: &Cluster, edit: &ClusterEdit) -> Result<usize, EditError> {
    edit.validate()?;
    let steps = edit.changes(current);
    for step in steps.iter() {
        match step {
            EditStep::Name(name) => client.set_cluster_name(current.id, name)?,
            EditStep::Tags(tags) => client.set_cluster_tags(current.id, tags)?,
            EditStep::Lock(locked) => client.lock_cluster(current.id, *locked)?,
            EditStep::MakeDefault => client.set_default_cluster(current.id)?,
        }
        counter!("ops_remote_calls_total", 1u64, "action" => "cluster_edit");
    }
    info!(cluster = %current.name, calls = steps.len(), "cluster saved");
    Ok(steps.len())
}

/// Dialog boundary: any error becomes an `Error Saving Cluster` notification.
/// `on_saved` runs only when the save went through.
pub fn apply_cluster_edit(
    client: &dyn FarmClient,
    current: &Cluster,
    edit: &ClusterEdit,
    notify: &mut dyn Notify,
    on_saved: impl FnOnce(),
) -> Result<usize, EditError> {
    counter!("ops_dispatch_total", 1u64, "action" => "cluster_edit");
    match save_cluster_edit(client, current, edit) {
        Ok(n) => {
            on_saved();
            Ok(n)
        }
        Err(e) => {
            warn!(cluster = %current.name, error = %e, "cluster save failed");
            notify.notify("Error Saving Cluster", &e.to_string());
            Err(e)
        }
    }
}

/// Lock or unlock each cluster in turn. Stops at the first failure, but
/// `refresh` runs either way so the panel shows what actually changed.
pub fn set_clusters_locked(
    client: &dyn FarmClient,
    clusters: &[ObjectId],
    locked: bool,
    refresh: impl FnOnce(),
) -> Result<usize, ClientError> {
    let action = if locked { "lock_clusters" } else { "unlock_clusters" };
    counter!("ops_dispatch_total", 1u64, "action" => action);
    let mut done = 0usize;
    let mut result = Ok(());
    for id in clusters {
        if let Err(e) = client.lock_cluster(*id, locked) {
            warn!(cluster = %id, locked, error = %e, "cluster lock failed");
            result = Err(e);
            break;
        }
        done += 1;
    }
    counter!("ops_remote_calls_total", done as u64, "action" => action);
    refresh();
    result.map(|_| done)
}
