//! JSON generator-event input.
//!
//! A thin stand-in for the external HepMC/LHEF readers: a JSON array of
//! events, each with its particle list, mapped onto the framework's
//! in-memory event source.

use anyhow::{Context, Result};
use fd_core::{EventHeader, FourVector};
use fd_pipeline::{MemoryEventSource, ParticleSeed, SeedEvent};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct JsonParticle {
    pid: i32,
    status: i32,
    #[serde(default = "minus_one")]
    m1: i32,
    #[serde(default = "minus_one")]
    m2: i32,
    #[serde(default = "minus_one")]
    d1: i32,
    #[serde(default = "minus_one")]
    d2: i32,
    #[serde(default)]
    charge: i32,
    #[serde(default)]
    spin: i32,
    #[serde(default)]
    mass: f64,
    px: f64,
    py: f64,
    pz: f64,
    e: f64,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    z: f64,
    #[serde(default)]
    t: f64,
    #[serde(default)]
    is_pu: i32,
}

fn minus_one() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
struct JsonEvent {
    #[serde(default)]
    number: i64,
    particles: Vec<JsonParticle>,
    #[serde(default)]
    lhe_particles: Vec<JsonParticle>,
}

fn seed(p: &JsonParticle) -> ParticleSeed {
    ParticleSeed {
        pid: p.pid,
        status: p.status,
        m1: p.m1,
        m2: p.m2,
        d1: p.d1,
        d2: p.d2,
        charge: p.charge,
        spin: p.spin,
        mass: p.mass,
        momentum: FourVector::new(p.px, p.py, p.pz, p.e),
        position: FourVector::new(p.x, p.y, p.z, p.t),
        is_pu: p.is_pu,
    }
}

/// Load a JSON event file into an in-memory source.
pub fn load_events(path: &Path) -> Result<MemoryEventSource> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading event file {}", path.display()))?;
    let events: Vec<JsonEvent> = serde_json::from_str(&text)
        .with_context(|| format!("parsing event file {}", path.display()))?;

    let seeds = events
        .into_iter()
        .map(|ev| SeedEvent {
            header: EventHeader { number: ev.number, ..EventHeader::default() },
            particles: ev.particles.iter().map(seed).collect(),
            lhe_particles: ev.lhe_particles.iter().map(seed).collect(),
        })
        .collect();
    Ok(MemoryEventSource::new(seeds))
}
