//! Wrangler panels: the toolkit-free half of the console's panels.
//!
//! A panel couples a polling read-model with its sort/filter view and a
//! refresh interval. Panels talk to each other only through the typed
//! topics on [`EventBus`].

#![forbid(unsafe_code)]

pub mod badge;
pub mod config;
pub mod events;
mod panel;
mod picker;
pub mod progress;

pub use badge::{job_badge, Badge};
pub use config::Config;
pub use events::{EventBus, Subscription, Topic};
pub use panel::{cluster_panel, job_panel, layer_panel, ClusterPanel, JobPanel, LayerPanel, Panel};
pub use picker::JobPicker;
