//! Pile-up overlay.
//!
//! Merges minimum-bias particles from an external sample (behind the
//! [`PileUpSource`] trait) into the event: the number of extra vertices is
//! Poisson distributed, each vertex is displaced along the beam line, and
//! every overlaid particle is flagged `is_pu`.

use fd_core::{Error, FourVector, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

/// Plain-data description of one pile-up particle.
#[derive(Debug, Clone, Default)]
pub struct PileUpParticle {
    /// PDG code.
    pub pid: i32,
    /// Electric charge in units of e.
    pub charge: i32,
    /// Generator mass.
    pub mass: f64,
    /// Four-momentum.
    pub momentum: FourVector,
    /// Production vertex before the beam-line displacement.
    pub position: FourVector,
}

/// External minimum-bias sample reader: one call per pile-up vertex.
pub trait PileUpSource {
    /// Particles of the next sampled interaction.
    fn next_vertex(&mut self) -> Result<Vec<PileUpParticle>>;
}

/// [`PileUpSource`] cycling over a fixed list of interactions.
#[derive(Debug, Default)]
pub struct CyclicPileUpSource {
    vertices: Vec<Vec<PileUpParticle>>,
    cursor: usize,
}

impl CyclicPileUpSource {
    /// Wrap a list of pre-sampled interactions.
    pub fn new(vertices: Vec<Vec<PileUpParticle>>) -> Self {
        Self { vertices, cursor: 0 }
    }
}

impl PileUpSource for CyclicPileUpSource {
    fn next_vertex(&mut self) -> Result<Vec<PileUpParticle>> {
        if self.vertices.is_empty() {
            return Ok(Vec::new());
        }
        let v = self.vertices[self.cursor % self.vertices.len()].clone();
        self.cursor += 1;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy)]
struct PileUpArrays {
    input: ArrayId,
    output: ArrayId,
    npu: ArrayId,
}

/// The pile-up merger module.
pub struct PileUpMerger {
    mean_pileup: f64,
    z_vertex_spread: f64,
    source: Box<dyn PileUpSource>,
    arrays: Option<PileUpArrays>,
}

impl PileUpMerger {
    /// Merger reading minimum-bias interactions from `source`.
    pub fn new(source: Box<dyn PileUpSource>) -> Self {
        Self { mean_pileup: 0.0, z_vertex_spread: 0.0, source, arrays: None }
    }
}

impl Module for PileUpMerger {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();

        self.mean_pileup = cfg.get_double("MeanPileUp", 10.0)?;
        self.z_vertex_spread = cfg.get_double("ZVertexSpread", 0.053)?;

        let input =
            ctx.import_array(&cfg.get_string("InputArray", "Reader/stableParticles")?)?;
        let output = ctx.export_array(&cfg.get_string("OutputArray", "stableParticles")?)?;
        let npu = ctx.export_array(&cfg.get_string("NPUOutputArray", "npu")?)?;
        self.arrays = Some(PileUpArrays { input, output, npu });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("pile-up merger processed before init".into()))?;

        // Hard-scatter particles pass through unchanged.
        let ids = ctx.event.arrays.get(arrays.input).to_vec();
        for id in ids {
            ctx.event.arrays.push(arrays.output, id);
        }

        let n_vertices = if self.mean_pileup > 0.0 {
            let poisson = Poisson::new(self.mean_pileup)
                .map_err(|e| Error::Numeric(format!("MeanPileUp: {e}")))?;
            poisson.sample(ctx.rng) as usize
        } else {
            0
        };

        for _ in 0..n_vertices {
            let dz = ctx.rng.gen_range(-self.z_vertex_spread..=self.z_vertex_spread);
            let particles = self.source.next_vertex().map_err(|e| {
                Error::External(format!("pile-up sample read failed: {e}"))
            })?;
            for p in particles {
                let id = ctx.event.factory.new_candidate();
                let c = ctx.event.factory.get_mut(id);
                c.pid = p.pid;
                c.status = 1;
                c.m1 = -1;
                c.m2 = -1;
                c.d1 = -1;
                c.d2 = -1;
                c.charge = p.charge;
                c.mass = p.mass;
                c.momentum = p.momentum;
                c.position =
                    FourVector::new(p.position.x(), p.position.y(), p.position.z() + dz,
                        p.position.t());
                c.is_pu = 1;
                ctx.event.arrays.push(arrays.output, id);
            }
        }

        // The true vertex count rides along as a scalar record.
        let npu_id = ctx.event.factory.new_candidate();
        ctx.event.factory.get_mut(npu_id).momentum =
            FourVector::from_pt_eta_phi_e(n_vertices as f64, 0.0, 0.0, n_vertices as f64);
        ctx.event.arrays.push(arrays.npu, npu_id);
        Ok(())
    }
}
