use mmd_config::SimulationConfig;
use mmd_schemas::Region;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// One simulated player, before it is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub player_name: String,
    pub skill: i64,
    pub region: Region,
}

/// Source of simulated players for submission.
pub trait PlayerGenerator: Send {
    fn next_profile(&mut self) -> PlayerProfile;
}

/// Uniform draws over the configured names, skill range and regions.
#[derive(Debug)]
pub struct RandomGenerator {
    names: Vec<String>,
    regions: Vec<Region>,
    skill_min: i64,
    skill_max: i64,
    rng: StdRng,
}

impl RandomGenerator {
    pub fn from_config(sim: &SimulationConfig) -> Self {
        Self::with_rng(sim, StdRng::from_entropy())
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(sim: &SimulationConfig, seed: u64) -> Self {
        Self::with_rng(sim, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sim: &SimulationConfig, rng: StdRng) -> Self {
        let names = sim
            .player_names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .collect();
        let (skill_min, skill_max) = if sim.skill_min <= sim.skill_max {
            (sim.skill_min, sim.skill_max)
        } else {
            (sim.skill_max, sim.skill_min)
        };
        Self {
            names,
            regions: sim.regions.clone(),
            skill_min,
            skill_max,
            rng,
        }
    }
}

impl PlayerGenerator for RandomGenerator {
    fn next_profile(&mut self) -> PlayerProfile {
        let player_name = self
            .names
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "PLAYER".to_string());
        let skill = self.rng.gen_range(self.skill_min..=self.skill_max);
        let region = self
            .regions
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Region::UsEast);
        PlayerProfile {
            player_name,
            skill,
            region,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_within_configuration() {
        let sim = SimulationConfig::default();
        let mut g = RandomGenerator::seeded(&sim, 7);
        for _ in 0..500 {
            let p = g.next_profile();
            assert!((45..=130).contains(&p.skill));
            assert!(sim.player_names.contains(&p.player_name));
            assert!(sim.regions.contains(&p.region));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let sim = SimulationConfig::default();
        let mut a = RandomGenerator::seeded(&sim, 42);
        let mut b = RandomGenerator::seeded(&sim, 42);
        for _ in 0..20 {
            assert_eq!(a.next_profile(), b.next_profile());
        }
    }

    #[test]
    fn single_value_ranges() {
        let sim = SimulationConfig {
            skill_min: 99,
            skill_max: 99,
            regions: vec![Region::AsiaSe],
            player_names: vec!["  ".to_string(), "ONLY".to_string()],
            ..SimulationConfig::default()
        };
        let p = RandomGenerator::seeded(&sim, 1).next_profile();
        assert_eq!(
            p,
            PlayerProfile {
                player_name: "ONLY".to_string(),
                skill: 99,
                region: Region::AsiaSe
            }
        );
    }
}
