//! mmd-schemas
//!
//! Shared data shapes for the matchmaking dashboard:
//! - `wire`: REST request/response bodies of the matchmaking backend.
//! - `push`: push-channel frames and the typed events decoded from them.
//! - `render`: the notification vocabulary consumed by a [`RenderSink`].
//!
//! No IO and no business logic live here.

pub mod push;
pub mod render;
pub mod wire;

pub use push::*;
pub use render::*;
pub use wire::*;
