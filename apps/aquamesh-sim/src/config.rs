//! TOML configuration for the simulator binary, following the teacher's
//! `forwarder::config` split: a loosely-typed `RawConfig` deserialized
//! straight off disk, validated once into a `SimConfig` the rest of the
//! program works with. `aquamesh::CoreConfig` itself is still built
//! programmatically (spec.md §6) — this file only configures the demo's
//! simulated topology and cadence.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawConfig {
    tank_count: Option<u8>,
    nodes_per_tank: Option<u8>,
    tick_interval_ms: Option<u64>,
    run_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tank_count: u8,
    pub nodes_per_tank: u8,
    pub tick_interval_ms: u64,
    pub run_seconds: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            tank_count: 2,
            nodes_per_tank: 3,
            tick_interval_ms: 250,
            run_seconds: 30,
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        raw.validate()
    }
}

impl RawConfig {
    fn validate(self) -> Result<SimConfig> {
        let defaults = SimConfig::default();
        let tank_count = self.tank_count.unwrap_or(defaults.tank_count);
        if tank_count == 0 {
            bail!("tank_count must be at least 1");
        }
        let nodes_per_tank = self.nodes_per_tank.unwrap_or(defaults.nodes_per_tank);
        if nodes_per_tank == 0 {
            bail!("nodes_per_tank must be at least 1");
        }
        Ok(SimConfig {
            tank_count,
            nodes_per_tank,
            tick_interval_ms: self.tick_interval_ms.unwrap_or(defaults.tick_interval_ms),
            run_seconds: self.run_seconds.unwrap_or(defaults.run_seconds),
        })
    }
}
