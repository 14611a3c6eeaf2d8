use std::time::Duration;

use anyhow::{bail, Result};
use mmd_schemas::{GameMode, Region};
use serde::{Deserialize, Serialize};

/// Typed dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub timing: TimingConfig,
    pub simulation: SimulationConfig,
    /// Catalog used when the backend cannot provide one. Never empty after
    /// validation: an empty list falls back to the built-in modes.
    pub fallback_modes: Vec<GameMode>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            timing: TimingConfig::default(),
            simulation: SimulationConfig::default(),
            fallback_modes: default_fallback_modes(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend.api_base.trim().is_empty() {
            bail!("CONFIG_INVALID backend.api_base must not be empty");
        }
        if self.backend.push_url.trim().is_empty() {
            bail!("CONFIG_INVALID backend.push_url must not be empty");
        }
        if self.timing.catalog_timeout_ms == 0
            || self.timing.request_timeout_ms == 0
            || self.timing.status_poll_ms == 0
            || self.timing.pool_poll_ms == 0
        {
            bail!("CONFIG_INVALID timing values must be > 0");
        }
        let sim = &self.simulation;
        if sim.skill_min > sim.skill_max {
            bail!(
                "CONFIG_INVALID simulation.skill_min ({}) > simulation.skill_max ({})",
                sim.skill_min,
                sim.skill_max
            );
        }
        if sim.slots == 0 {
            bail!("CONFIG_INVALID simulation.slots must be >= 1");
        }
        if sim.regions.is_empty() {
            bail!("CONFIG_INVALID simulation.regions must not be empty");
        }
        if sim.player_names.iter().all(|n| n.trim().is_empty()) {
            bail!("CONFIG_INVALID simulation.player_names must contain a name");
        }
        if self.fallback_modes.iter().any(|m| m.key.trim().is_empty()) {
            bail!("CONFIG_INVALID fallback_modes entries need a key");
        }
        Ok(())
    }

    /// Fallback catalog, substituting the built-in modes for an empty list.
    pub fn effective_fallback_modes(&self) -> Vec<GameMode> {
        if self.fallback_modes.is_empty() {
            default_fallback_modes()
        } else {
            self.fallback_modes.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// REST base, e.g. `http://localhost:8000/api/v2`.
    pub api_base: String,
    /// Push channel URL, e.g. `ws://localhost:8000/ws`.
    pub push_url: String,
    /// Identity presented on the push channel.
    pub client_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/api/v2".to_string(),
            push_url: "ws://localhost:8000/ws".to_string(),
            client_id: "dashboard".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub catalog_timeout_ms: u64,
    /// Upper bound on any other single backend request (enqueue, polls).
    pub request_timeout_ms: u64,
    pub status_poll_ms: u64,
    pub pool_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            catalog_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            status_poll_ms: 2_000,
            pool_poll_ms: 3_000,
        }
    }
}

impl TimingConfig {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn pool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pool_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub skill_min: i64,
    pub skill_max: i64,
    /// Number of submission slots (1..=slots).
    pub slots: u32,
    pub regions: Vec<Region>,
    pub player_names: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            skill_min: 45,
            skill_max: 130,
            slots: 4,
            regions: Region::ALL.to_vec(),
            player_names: [
                "ALPHA_01", "BETA_02", "GAMMA_03", "DELTA_04", "EPSILON_05", "ZETA_06",
                "THETA_07", "IOTA_08", "KAPPA_09", "LAMBDA_10", "MU_11", "NU_12", "XI_13",
                "OMICRON_14", "PI_15", "RHO_16", "SIGMA_17", "TAU_18",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

pub fn default_fallback_modes() -> Vec<GameMode> {
    vec![
        GameMode::new("1v1_duel", "A classic 1v1 fight to the finish."),
        GameMode::new("2v2_clash", "A team-based 2v2 Clash."),
        GameMode::new("3v3_arena", "A team-based 3v3 battle."),
    ]
}
