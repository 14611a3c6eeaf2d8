//! Game-mode catalog loading.
//!
//! One request, raced against a timeout. Any failure (timeout, transport,
//! non-2xx, undecodable body, empty catalog) is recovered locally by
//! substituting the fallback catalog, so the dashboard always ends up with at
//! least one selectable mode. There is no automatic retry.
//!
//! When the timeout wins the race the request future is dropped: a late
//! response can never replace the fallback.

use std::time::Duration;

use mmd_schemas::{GameMode, Notification};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{BackendApi, BackendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Backend,
    Fallback,
}

/// The active set of game modes. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameModeCatalog {
    modes: Vec<GameMode>,
    source: CatalogSource,
}

impl GameModeCatalog {
    pub fn from_backend(modes: Vec<GameMode>) -> Self {
        Self {
            modes,
            source: CatalogSource::Backend,
        }
    }

    /// Fallback catalog; an empty list is replaced by the built-in modes.
    pub fn fallback(modes: Vec<GameMode>) -> Self {
        let modes = if modes.is_empty() {
            mmd_config::default_fallback_modes()
        } else {
            modes
        };
        Self {
            modes,
            source: CatalogSource::Fallback,
        }
    }

    pub fn modes(&self) -> &[GameMode] {
        &self.modes
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == CatalogSource::Fallback
    }

    /// First mode in catalog order.
    pub fn default_mode(&self) -> Option<&GameMode> {
        self.modes.first()
    }

    pub fn get(&self, key: &str) -> Option<&GameMode> {
        self.modes.iter().find(|m| m.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

/// Outcome of [`load_catalog`]: the catalog plus the log lines describing
/// which path was taken.
#[derive(Debug, Clone)]
pub struct CatalogLoad {
    pub catalog: GameModeCatalog,
    pub notifications: Vec<Notification>,
}

pub async fn load_catalog(
    api: &dyn BackendApi,
    timeout: Duration,
    fallback: Vec<GameMode>,
) -> CatalogLoad {
    let mut notifications = vec![Notification::log_info("> LOADING BACKEND DATA...")];

    let result = match tokio::time::timeout(timeout, api.list_game_modes()).await {
        Ok(Ok(modes)) if modes.is_empty() => {
            Err(BackendError::Decode("backend returned no game modes".to_string()))
        }
        Ok(res) => res,
        Err(_elapsed) => Err(BackendError::Timeout(timeout)),
    };

    let catalog = match result {
        Ok(modes) => {
            info!(count = modes.len(), "game modes loaded from backend");
            notifications.push(Notification::log_info(format!(
                "> LOADED {} GAME MODES FROM BACKEND",
                modes.len()
            )));
            GameModeCatalog::from_backend(modes)
        }
        Err(err) => {
            warn!(error = %err, "game mode load failed; using fallback");
            notifications.push(Notification::log_error(format!(
                "[X] ERROR: Failed to load backend data - {err}"
            )));
            notifications.push(Notification::log_info("> USING FALLBACK GAME MODES"));
            GameModeCatalog::fallback(fallback)
        }
    };

    CatalogLoad {
        catalog,
        notifications,
    }
}
