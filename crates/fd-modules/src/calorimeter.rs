//! Calorimeter: tower filling, resolution smearing, photon preselection and
//! energy-flow emission.
//!
//! The segmentation is a piecewise-irregular eta/phi grid: a sorted vector of
//! distinct eta edges and, per eta bin, a sorted vector of phi edges. Edges
//! are inclusive-lower / exclusive-upper; a value on an edge belongs to the
//! upper bin and a value on the last edge is outside.

use fd_core::{CandidateId, Error, Formula, FourVector, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::HashMap;

/// Time entries below this default ECAL energy are not recorded.
const DEFAULT_TIMING_E_MIN: f64 = 4.0;

/// Sentinel tower time when no entry passed the timing threshold.
const NO_TIME: f64 = 999_999.0;

#[derive(Debug, Clone, Copy)]
struct CaloArrays {
    particles: ArrayId,
    tracks: ArrayId,
    towers: ArrayId,
    photons: ArrayId,
    eflow_tracks: ArrayId,
    eflow_towers: ArrayId,
}

/// The calorimeter module.
#[derive(Default)]
pub struct Calorimeter {
    eta_bins: Vec<f64>,
    phi_bins: Vec<Vec<f64>>,
    fractions: HashMap<i32, (f64, f64)>,
    ecal_resolution: Option<Formula>,
    hcal_resolution: Option<Formula>,
    timing_e_min: f64,
    arrays: Option<CaloArrays>,
}

impl Calorimeter {
    /// Create an unconfigured calorimeter.
    pub fn new() -> Self {
        Self::default()
    }

    fn fractions_for(&self, pid: i32) -> (f64, f64) {
        let pdg = pid.abs();
        self.fractions
            .get(&pdg)
            .or_else(|| self.fractions.get(&0))
            .copied()
            .unwrap_or((0.0, 1.0))
    }
}

/// Bisect `x` into lower-inclusive bins. Bin k covers
/// [edges[k-1], edges[k]); anything below the first or at/above the last
/// edge is outside.
fn find_bin(edges: &[f64], x: f64) -> Option<usize> {
    let idx = edges.partition_point(|e| *e <= x);
    if idx == 0 || idx == edges.len() {
        None
    } else {
        Some(idx)
    }
}

/// Log-normal smearing of a positive mean with absolute width `sigma`.
/// Non-positive means collapse to 0 (numeric-error recovery).
fn log_normal(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
    if mean > 0.0 {
        let b = (1.0 + (sigma * sigma) / (mean * mean)).ln().sqrt();
        let a = mean.ln() - 0.5 * b * b;
        let gauss: f64 = StandardNormal.sample(rng);
        (a + b * gauss).exp()
    } else {
        0.0
    }
}

const TRACK_FLAG: u64 = 1;
const EM_FLAG: u64 = 2;

fn pack_hit(eta_bin: usize, phi_bin: usize, flags: u64, number: usize) -> u64 {
    ((eta_bin as u64) << 48) | ((phi_bin as u64) << 32) | (flags << 24) | (number as u64)
}

impl Module for Calorimeter {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        // Segmentation: the parameter list alternates eta-edge sets and
        // phi-edge sets; identical eta edges from different pairs merge.
        let param = cfg.get_param("EtaPhiBins");
        for i in 0..param.size() / 2 {
            let etas = param.at(2 * i)?.doubles()?;
            let phis = param.at(2 * i + 1)?.doubles()?;
            for &eta in &etas {
                let pos = match self.eta_bins.binary_search_by(|e| e.total_cmp(&eta)) {
                    Ok(pos) => pos,
                    Err(pos) => {
                        self.eta_bins.insert(pos, eta);
                        self.phi_bins.insert(pos, Vec::new());
                        pos
                    }
                };
                for &phi in &phis {
                    if let Err(q) = self.phi_bins[pos].binary_search_by(|e| e.total_cmp(&phi)) {
                        self.phi_bins[pos].insert(q, phi);
                    }
                }
            }
        }
        if self.eta_bins.len() < 2 {
            return Err(Error::config(
                &module,
                "EtaPhiBins",
                "segmentation needs at least two eta edges",
            ));
        }
        for phis in &self.phi_bins {
            if phis.len() < 2 {
                return Err(Error::config(
                    &module,
                    "EtaPhiBins",
                    "every eta edge needs at least two phi edges",
                ));
            }
        }

        // Per-PID energy fractions, PID 0 as fallback.
        self.fractions.insert(0, (0.0, 1.0));
        let param = cfg.get_param("EnergyFraction");
        for i in 0..param.size() / 2 {
            let pid = param.at(2 * i)?.as_int()? as i32;
            let pair = param.at(2 * i + 1)?;
            self.fractions.insert(pid, (pair.at(0)?.as_double()?, pair.at(1)?.as_double()?));
        }

        let compile = |key: &str, text: String| -> Result<Formula> {
            Formula::compile(&text, &["eta", "energy"])
                .map_err(|e| Error::config(&module, key, e.to_string()))
        };
        self.ecal_resolution =
            Some(compile("ECalResolutionFormula", cfg.get_string("ECalResolutionFormula", "0")?)?);
        self.hcal_resolution =
            Some(compile("HCalResolutionFormula", cfg.get_string("HCalResolutionFormula", "0")?)?);

        self.timing_e_min = cfg.get_double("TimingEMin", DEFAULT_TIMING_E_MIN)?;

        let particles = ctx.import_array(&cfg.get_string(
            "ParticleInputArray",
            "ParticlePropagator/particles",
        )?)?;
        let tracks =
            ctx.import_array(&cfg.get_string("TrackInputArray", "ParticlePropagator/tracks")?)?;
        let towers = ctx.export_array(&cfg.get_string("TowerOutputArray", "towers")?)?;
        let photons = ctx.export_array(&cfg.get_string("PhotonOutputArray", "photons")?)?;
        let eflow_tracks =
            ctx.export_array(&cfg.get_string("EFlowTrackOutputArray", "eflowTracks")?)?;
        let eflow_towers =
            ctx.export_array(&cfg.get_string("EFlowTowerOutputArray", "eflowTowers")?)?;
        self.arrays =
            Some(CaloArrays { particles, tracks, towers, photons, eflow_tracks, eflow_towers });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("calorimeter processed before init".into()))?;

        let track_ids = ctx.event.arrays.get(arrays.tracks).to_vec();
        let particle_ids = ctx.event.arrays.get(arrays.particles).to_vec();

        let mut hits: Vec<u64> = Vec::with_capacity(track_ids.len() + particle_ids.len());
        let mut track_fracs = Vec::with_capacity(track_ids.len());
        let mut particle_fracs = Vec::with_capacity(particle_ids.len());

        for (number, &id) in track_ids.iter().enumerate() {
            let track = ctx.event.factory.get(id);
            track_fracs.push(self.fractions_for(track.pid));

            let Some(eta_bin) = find_bin(&self.eta_bins, track.position.eta()) else { continue };
            let Some(phi_bin) = find_bin(&self.phi_bins[eta_bin], track.position.phi()) else {
                continue;
            };
            hits.push(pack_hit(eta_bin, phi_bin, TRACK_FLAG, number));
        }

        for (number, &id) in particle_ids.iter().enumerate() {
            let particle = ctx.event.factory.get(id);
            let fracs = self.fractions_for(particle.pid);
            particle_fracs.push(fracs);
            if fracs.0 < 1.0e-9 && fracs.1 < 1.0e-9 {
                continue;
            }

            let Some(eta_bin) = find_bin(&self.eta_bins, particle.position.eta()) else {
                continue;
            };
            let Some(phi_bin) = find_bin(&self.phi_bins[eta_bin], particle.position.phi()) else {
                continue;
            };
            let pdg = particle.pid.abs();
            let flags = if pdg == 11 || pdg == 22 { EM_FLAG } else { 0 };
            hits.push(pack_hit(eta_bin, phi_bin, flags, number));
        }

        // Ascending order groups all hits of a tower; within a tower the
        // flag bits separate tracks from e/gamma particles.
        hits.sort_unstable();

        let mut start = 0;
        while start < hits.len() {
            let key = hits[start] >> 32;
            let mut end = start;
            while end < hits.len() && (hits[end] >> 32) == key {
                end += 1;
            }
            self.fill_tower(ctx, &arrays, &hits[start..end], &track_ids, &particle_ids,
                &track_fracs, &particle_fracs)?;
            start = end;
        }
        Ok(())
    }
}

impl Calorimeter {
    #[allow(clippy::too_many_arguments)]
    fn fill_tower(
        &self,
        ctx: &mut ProcessContext<'_>,
        arrays: &CaloArrays,
        tower_hits: &[u64],
        track_ids: &[CandidateId],
        particle_ids: &[CandidateId],
        track_fracs: &[(f64, f64)],
        particle_fracs: &[(f64, f64)],
    ) -> Result<()> {
        let eta_bin = ((tower_hits[0] >> 48) & 0xFFFF) as usize;
        let phi_bin = ((tower_hits[0] >> 32) & 0xFFFF) as usize;
        let phi_edges = &self.phi_bins[eta_bin];

        let eta = 0.5 * (self.eta_bins[eta_bin - 1] + self.eta_bins[eta_bin]);
        let phi = 0.5 * (phi_edges[phi_bin - 1] + phi_edges[phi_bin]);
        let edges = [
            self.eta_bins[eta_bin - 1],
            self.eta_bins[eta_bin],
            phi_edges[phi_bin - 1],
            phi_edges[phi_bin],
        ];

        let mut ecal_sum = 0.0;
        let mut hcal_sum = 0.0;
        let mut track_ecal = 0.0;
        let mut track_hcal = 0.0;
        let mut track_hits = 0usize;
        let mut photon_hits = 0usize;
        let mut tower_tracks: Vec<CandidateId> = Vec::new();
        let mut members: Vec<CandidateId> = Vec::new();
        let mut times: Vec<(f32, f32)> = Vec::new();
        let mut tower_pid = 0i32;

        for &hit in tower_hits {
            let flags = (hit >> 24) & 0xFF;
            let number = (hit & 0x00FF_FFFF) as usize;

            if flags & TRACK_FLAG != 0 {
                track_hits += 1;
                let id = track_ids[number];
                let energy = ctx.event.factory.get(id).momentum.e;
                track_ecal += energy * track_fracs[number].0;
                track_hcal += energy * track_fracs[number].1;
                tower_tracks.push(id);
                continue;
            }

            if flags & EM_FLAG != 0 {
                photon_hits += 1;
            }
            let id = particle_ids[number];
            let particle = ctx.event.factory.get(id);
            let ecal_energy = particle.momentum.e * particle_fracs[number].0;
            hcal_sum += particle.momentum.e * particle_fracs[number].1;
            ecal_sum += ecal_energy;
            if ecal_energy > self.timing_e_min {
                times.push((ecal_energy as f32, particle.position.t() as f32));
            }
            tower_pid = particle.pid.abs();
            members.push(id);
        }

        // Resolution smearing: sigma from the compiled formulas, log-normal
        // around the accumulated sums.
        let ecal_sigma = self
            .ecal_resolution
            .as_ref()
            .map(|f| f.eval_or_zero(&[eta, ecal_sum]))
            .unwrap_or(0.0);
        let hcal_sigma = self
            .hcal_resolution
            .as_ref()
            .map(|f| f.eval_or_zero(&[eta, hcal_sum]))
            .unwrap_or(0.0);
        let ecal_energy = log_normal(ctx.rng, ecal_sum, ecal_sigma);
        let hcal_energy = log_normal(ctx.rng, hcal_sum, hcal_sigma);
        let energy = ecal_energy + hcal_energy;

        let mut sum_weighted_t = 0.0f64;
        let mut sum_weights = 0.0f64;
        for &(e, t) in &times {
            let w = (e as f64).sqrt();
            sum_weighted_t += w * t as f64;
            sum_weights += w;
        }
        let time = if sum_weights > 0.0 { sum_weighted_t / sum_weights } else { NO_TIME };

        let tower_id = ctx.event.factory.new_candidate();
        {
            let tower = ctx.event.factory.get_mut(tower_id);
            tower.momentum = FourVector::from_pt_eta_phi_e(energy / eta.cosh(), eta, phi, energy);
            tower.position = FourVector::from_pt_eta_phi_e(1.0, eta, phi, time);
            tower.eem = ecal_energy;
            tower.ehad = hcal_energy;
            tower.edges = edges;
            tower.n_times = times.len() as i32;
            tower.ecal_e_t = times;
            tower.pid = tower_pid;
        }
        for &member in &members {
            ctx.event.factory.add_candidate(tower_id, member);
        }

        if energy > 0.0 {
            if photon_hits > 0 && track_hits == 0 {
                ctx.event.arrays.push(arrays.photons, tower_id);
            }
            ctx.event.arrays.push(arrays.towers, tower_id);
        }

        for &track in &tower_tracks {
            ctx.event.arrays.push(arrays.eflow_tracks, track);
        }

        // Energy-flow tower: whatever the matched tracks do not account for.
        let ecal_residual = (ecal_energy - track_ecal).max(0.0);
        let hcal_residual = (hcal_energy - track_hcal).max(0.0);
        let residual = ecal_residual + hcal_residual;
        if residual > 0.0 {
            let eflow_id = ctx.event.factory.clone_candidate(tower_id);
            let eflow = ctx.event.factory.get_mut(eflow_id);
            eflow.momentum =
                FourVector::from_pt_eta_phi_e(residual / eta.cosh(), eta, phi, residual);
            eflow.eem = ecal_residual;
            eflow.ehad = hcal_residual;
            ctx.event.arrays.push(arrays.eflow_towers, eflow_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_find_bin_lower_inclusive() {
        let edges = [-1.0, 0.0, 1.0, 2.0];
        assert_eq!(find_bin(&edges, -0.5), Some(1));
        // A value on an edge belongs to the upper bin.
        assert_eq!(find_bin(&edges, 0.0), Some(2));
        assert_eq!(find_bin(&edges, 1.0), Some(3));
        // The last edge is outside.
        assert_eq!(find_bin(&edges, 2.0), None);
        assert_eq!(find_bin(&edges, -1.5), None);
        assert_eq!(find_bin(&edges, 2.5), None);
        // The first edge opens the first bin.
        assert_eq!(find_bin(&edges, -1.0), Some(1));
    }

    #[test]
    fn test_log_normal_zero_mean_returns_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(log_normal(&mut rng, 0.0, 1.0), 0.0);
        assert_eq!(log_normal(&mut rng, -5.0, 1.0), 0.0);
    }

    #[test]
    fn test_log_normal_zero_sigma_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let v = log_normal(&mut rng, 50.0, 0.0);
        assert!((v - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_log_normal_mean_on_log_scale() {
        // exp(a + b N) has median exp(a); check the draw distribution is
        // centred there within a loose statistical tolerance.
        let mut rng = StdRng::seed_from_u64(11);
        let mean = 100.0;
        let sigma = 10.0;
        let n = 4000;
        let avg_log: f64 =
            (0..n).map(|_| log_normal(&mut rng, mean, sigma).ln()).sum::<f64>() / n as f64;
        let b2 = (1.0 + (sigma * sigma) / (mean * mean)).ln();
        let expected = mean.ln() - 0.5 * b2;
        assert!((avg_log - expected).abs() < 0.01, "{avg_log} vs {expected}");
    }

    #[test]
    fn test_hit_packing_sort_groups_towers() {
        let a = pack_hit(2, 3, 0, 7);
        let b = pack_hit(2, 3, TRACK_FLAG, 1);
        let c = pack_hit(1, 9, EM_FLAG, 0);
        let mut hits = vec![a, b, c];
        hits.sort_unstable();
        assert_eq!(hits[0] >> 32, ((1 << 16) | 9) as u64);
        assert_eq!(hits[1] >> 32, hits[2] >> 32);
        // Within a tower, plain particles sort before tracks before e/gamma.
        assert_eq!((hits[1] >> 24) & 0xFF, 0);
        assert_eq!((hits[2] >> 24) & 0xFF, TRACK_FLAG);
    }
}
