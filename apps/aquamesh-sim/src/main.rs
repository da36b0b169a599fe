//! Demo binary: one hub and a handful of simulated nodes exchanging
//! `aquamesh` frames over an in-process ether, logged through `tracing`.
//!
//! Mirrors the teacher's `forwarder` binary shape — `clap` for the CLI,
//! a TOML file for topology/cadence, `tracing_subscriber` for structured
//! logs — adapted to a self-contained simulation instead of a network
//! service.

mod config;
mod radio_inproc;

use anyhow::Result;
use aquamesh::{Core, NodeTick, Role};
use aquamesh_wire::{NodeKind, PeerId};
use clap::Parser;
use config::SimConfig;
use radio_inproc::{Ether, InProcRadio};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "aquamesh-sim", about = "Simulate an aquamesh hub and nodes in one process")]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults if absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

struct SimNode {
    peer: PeerId,
    tank_id: u8,
    core: Core<InProcRadio>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let sim_config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    info!(?sim_config, "starting aquamesh simulation");

    let ether = Ether::new();
    let hub_peer = PeerId([0xAA, 0, 0, 0, 0, 1]);
    let mut hub = Core::new(
        Role::Hub,
        InProcRadio::new(ether.clone(), hub_peer),
        aquamesh::config::CoreConfig::default(),
        0,
    )?;
    hub.callbacks_mut().set_on_unmapped_discovered(|(peer, kind)| {
        info!(%peer, ?kind, "hub saw a new, unprovisioned node");
    });
    hub.callbacks_mut().set_on_peer_online(|peer| info!(%peer, "node online"));
    hub.callbacks_mut().set_on_peer_offline(|peer| warn!(%peer, "node went offline"));
    hub.callbacks_mut().set_on_status(|ev| {
        info!(from = %ev.from, command_id = ev.command_id, status_code = ev.status_code, "status received");
    });

    let mut nodes = Vec::new();
    let mut next_mac = 2u8;
    for tank_id in 1..=sim_config.tank_count {
        for _ in 0..sim_config.nodes_per_tank {
            let peer = PeerId([0xAA, 0, 0, 0, 0, next_mac]);
            next_mac += 1;
            let mut core = Core::new(
                Role::Node {
                    tank_id: 0,
                    node_kind: NodeKind::Sensor,
                    firmware_version: 1,
                    capabilities: 0,
                },
                InProcRadio::new(ether.clone(), peer),
                aquamesh::config::CoreConfig::default(),
                0,
            )?;
            core.callbacks_mut().set_on_command(move |ev| {
                info!(command_id = ev.command_id, bytes = ev.payload.len(), "node received command");
            });
            nodes.push(SimNode { peer, tank_id, core });
        }
    }
    info!(node_count = nodes.len(), "simulated nodes created");

    let ticks = sim_config.run_seconds * 1000 / sim_config.tick_interval_ms;
    let mut now_ms: u64 = 0;
    for _ in 0..ticks {
        now_ms += sim_config.tick_interval_ms;

        for node in &mut nodes {
            for (from, bytes) in ether.drain(node.peer) {
                node.core.on_receive(from, &bytes);
            }
            match node.core.tick_node(now_ms, 95, (now_ms / 60_000) as u16) {
                Ok(NodeTick::FailSafe) => warn!(peer = %node.peer, "node tripped its supervisory fail-safe"),
                Ok(_) => {}
                Err(_) => unreachable!("node-role core always accepts tick_node"),
            }
        }

        for (from, bytes) in ether.drain(hub_peer) {
            hub.on_receive(from, &bytes);
        }
        hub.tick(now_ms);

        for unmapped in hub.unmapped().unwrap_or_default() {
            if let Some(node) = nodes.iter().find(|n| n.peer == unmapped.peer) {
                let mut device_name = [0u8; 16];
                let label = format!("tank-{}", node.tank_id);
                let n = label.len().min(device_name.len());
                device_name[..n].copy_from_slice(&label.as_bytes()[..n]);
                hub.provision(node.peer, device_name, node.tank_id, now_ms).ok();
                info!(peer = %node.peer, tank_id = node.tank_id, "hub auto-provisioned node");
            }
        }

        tokio::time::sleep(Duration::from_millis(sim_config.tick_interval_ms)).await;
    }

    let stats = hub.statistics();
    info!(?stats, "simulation complete");
    Ok(())
}
