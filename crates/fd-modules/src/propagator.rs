//! Particle propagation to the calorimeter surface.
//!
//! Stable particles are transported from their production vertex to a
//! cylinder (radius, half-length): neutrals on a straight line, charged
//! particles on an exact helix in the solenoid field. The surface position
//! (with flight time) is what the calorimeter bins on.
//!
//! Units: momenta and energies in GeV, lengths in metres, times in metres
//! of light travel, field in tesla.

use fd_core::{Error, FourVector, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use std::f64::consts::PI;

/// GeV to metres conversion for the gyroradius, pt / (0.3 q B).
const GYRO_CONST: f64 = 0.299792458;

#[derive(Debug, Clone, Copy)]
struct PropagatorArrays {
    input: ArrayId,
    particles: ArrayId,
    tracks: ArrayId,
}

/// The particle propagator module.
#[derive(Default)]
pub struct ParticlePropagator {
    radius: f64,
    half_length: f64,
    bz: f64,
    arrays: Option<PropagatorArrays>,
}

impl ParticlePropagator {
    /// Create an unconfigured propagator.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transverse path length to the barrel for a straight line, if it crosses.
fn straight_barrel_arc(x: f64, y: f64, ux: f64, uy: f64, radius: f64) -> Option<f64> {
    let b = x * ux + y * uy;
    let c = radius * radius - x * x - y * y;
    if c < 0.0 {
        return None;
    }
    let s = -b + (b * b + c).sqrt();
    if s.is_finite() && s >= 0.0 { Some(s) } else { None }
}

/// Wrap an angle difference into [0, 2 pi).
fn wrap_positive(mut a: f64) -> f64 {
    while a < 0.0 {
        a += 2.0 * PI;
    }
    while a >= 2.0 * PI {
        a -= 2.0 * PI;
    }
    a
}

impl Module for ParticlePropagator {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        self.radius = cfg.get_double("Radius", 1.0)?;
        self.half_length = cfg.get_double("HalfLength", 3.0)?;
        self.bz = cfg.get_double("Bz", 0.0)?;
        if self.radius <= 0.0 || self.half_length <= 0.0 {
            return Err(Error::config(&module, "Radius", "cylinder dimensions must be positive"));
        }

        let input =
            ctx.import_array(&cfg.get_string("InputArray", "Reader/stableParticles")?)?;
        let particles = ctx.export_array(&cfg.get_string("OutputArray", "particles")?)?;
        let tracks = ctx.export_array(&cfg.get_string("TrackOutputArray", "tracks")?)?;
        self.arrays = Some(PropagatorArrays { input, particles, tracks });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("propagator processed before init".into()))?;

        let input_ids = ctx.event.arrays.get(arrays.input).to_vec();
        for id in input_ids {
            let c = ctx.event.factory.get(id);
            let p4 = c.momentum;
            let pt = p4.pt();
            if pt < 1.0e-9 {
                continue;
            }
            let (x, y, z, t) = (c.position.x(), c.position.y(), c.position.z(), c.position.t());
            if x * x + y * y > self.radius * self.radius || z.abs() > self.half_length {
                continue;
            }
            let charge = if c.charge != 0 { c.charge } else { ctx.pdg.charge(c.pid) };

            let surface = if charge == 0 || self.bz == 0.0 {
                self.propagate_straight(x, y, z, t, &p4)
            } else {
                self.propagate_helix(x, y, z, t, &p4, charge)
            };
            let Some(surface) = surface else { continue };

            let out = ctx.event.factory.clone_candidate(id);
            {
                let cand = ctx.event.factory.get_mut(out);
                cand.position = surface;
            }
            // Keep the generated particle reachable through the composition.
            ctx.event.factory.add_candidate(out, id);

            ctx.event.arrays.push(arrays.particles, out);
            if charge != 0 {
                ctx.event.arrays.push(arrays.tracks, out);
            }
        }
        Ok(())
    }
}

impl ParticlePropagator {
    fn propagate_straight(
        &self,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        p4: &FourVector,
    ) -> Option<FourVector> {
        let pt = p4.pt();
        let (ux, uy) = (p4.px / pt, p4.py / pt);
        let mut arc = straight_barrel_arc(x, y, ux, uy, self.radius)?;

        // Endcap crossing wins when it comes first.
        let z_at_barrel = z + arc * p4.pz / pt;
        if z_at_barrel.abs() > self.half_length {
            if p4.pz == 0.0 {
                return None;
            }
            arc = (self.half_length.copysign(p4.pz) - z) * pt / p4.pz;
        }

        let time = t + arc * p4.e / pt;
        Some(FourVector::new(x + arc * ux, y + arc * uy, z + arc * p4.pz / pt, time))
    }

    fn propagate_helix(
        &self,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
        p4: &FourVector,
        charge: i32,
    ) -> Option<FourVector> {
        let pt = p4.pt();
        let gyro_radius = pt / (GYRO_CONST * charge.abs() as f64 * self.bz.abs());
        // Positive charge in a +z field turns clockwise in the xy plane.
        let turn = if (charge as f64) * self.bz > 0.0 { -1.0 } else { 1.0 };

        let (ux, uy) = (p4.px / pt, p4.py / pt);
        // Centre of gyration sits 90 degrees from the velocity.
        let xc = x - turn * gyro_radius * uy;
        let yc = y + turn * gyro_radius * ux;
        let d = (xc * xc + yc * yc).sqrt();

        let theta0 = (y - yc).atan2(x - xc);

        // First barrel crossing along the rotation direction, if any.
        let barrel_arc = if d + gyro_radius >= self.radius
            && (d - gyro_radius).abs() <= self.radius
            && d > 0.0
        {
            let a = (self.radius * self.radius - gyro_radius * gyro_radius + d * d) / (2.0 * d);
            let h2 = self.radius * self.radius - a * a;
            if h2 >= 0.0 {
                let h = h2.sqrt();
                let (cx, cy) = (xc / d, yc / d);
                let candidates = [
                    (a * cx - h * cy, a * cy + h * cx),
                    (a * cx + h * cy, a * cy - h * cx),
                ];
                let mut best: Option<f64> = None;
                for (px, py) in candidates {
                    let theta = (py - yc).atan2(px - xc);
                    let delta = wrap_positive(turn * (theta - theta0));
                    let arc = gyro_radius * delta;
                    if best.map_or(true, |b| arc < b) {
                        best = Some(arc);
                    }
                }
                best
            } else {
                None
            }
        } else {
            None
        };

        // Endcap crossing.
        let endcap_arc = if p4.pz != 0.0 {
            let arc = (self.half_length.copysign(p4.pz) - z) * pt / p4.pz;
            if arc >= 0.0 { Some(arc) } else { None }
        } else {
            None
        };

        let arc = match (barrel_arc, endcap_arc) {
            (Some(b), Some(e)) => b.min(e),
            (Some(b), None) => b,
            (None, Some(e)) => e,
            (None, None) => return None,
        };

        let theta = theta0 + turn * arc / gyro_radius;
        let xf = xc + gyro_radius * theta.cos();
        let yf = yc + gyro_radius * theta.sin();
        let zf = z + arc * p4.pz / pt;
        let time = t + arc * p4.e / pt;
        Some(FourVector::new(xf, yf, zf, time))
    }
}
