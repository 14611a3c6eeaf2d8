//! mmd-runtime
//!
//! The dashboard runtime: a single tokio task that owns the reconciliation
//! engine and is the only writer of dashboard state.
//!
//! Everything else talks to it through channels:
//! - [`DashboardHandle`] sends operator commands (select mode, submit,
//!   clear, ...) and awaits replies;
//! - the push transport sends [`mmd_push::PushSignal`]s;
//! - pollers and in-flight backend calls send their results back in.
//!
//! Handlers run to completion on the runtime task, so no locks are needed
//! around the registry, and notifications reach the [`RenderSink`] only after
//! the mutation they describe has been applied.
//!
//! [`RenderSink`]: mmd_schemas::RenderSink

mod error;
mod generator;
mod handle;
mod runtime;

pub use error::DashboardError;
pub use generator::{PlayerGenerator, PlayerProfile, RandomGenerator};
pub use handle::{DashboardHandle, DashboardSnapshot};
pub use runtime::{spawn_dashboard, RuntimeDeps};
