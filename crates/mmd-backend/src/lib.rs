//! mmd-backend
//!
//! Client side of the matchmaking backend's REST surface.
//!
//! - [`BackendApi`] is the seam every caller goes through; [`HttpBackend`]
//!   is the reqwest implementation, test code substitutes fakes.
//! - [`catalog`] loads the game-mode catalog once, racing the request against
//!   a timeout and substituting a fallback catalog on any failure.

pub mod catalog;
mod client;
mod error;

pub use catalog::{load_catalog, CatalogLoad, CatalogSource, GameModeCatalog};
pub use client::{BackendApi, HttpBackend};
pub use error::BackendError;
