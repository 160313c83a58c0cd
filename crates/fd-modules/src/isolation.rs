//! Isolation sums for leptons and photons.
//!
//! For every candidate the module accumulates the energy-flow activity in a
//! cone around it, split into charged-hadron, neutral, charged-pile-up and
//! all-particle components, and derives the dBeta- and rho-corrected
//! isolation variables plus a track-only variant.

use fd_core::{Error, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy)]
struct IsolationArrays {
    candidates: ArrayId,
    isolation: ArrayId,
    tracks: ArrayId,
    rho: Option<ArrayId>,
    output: ArrayId,
}

/// The isolation module.
#[derive(Default)]
pub struct Isolation {
    delta_r_max: f64,
    pt_min: f64,
    pt_ratio_max: f64,
    arrays: Option<IsolationArrays>,
}

impl Isolation {
    /// Create an unconfigured isolation module.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Isolation {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();

        self.delta_r_max = cfg.get_double("DeltaRMax", 0.5)?;
        self.pt_min = cfg.get_double("PTMin", 0.5)?;
        self.pt_ratio_max = cfg.get_double("PTRatioMax", f64::MAX)?;

        let candidates =
            ctx.import_array(&cfg.get_string("CandidateInputArray", "Calorimeter/photons")?)?;
        let isolation = ctx.import_array(&cfg.get_string(
            "IsolationInputArray",
            "Calorimeter/eflowTowers",
        )?)?;
        let tracks =
            ctx.import_array(&cfg.get_string("TrackInputArray", "Calorimeter/eflowTracks")?)?;
        let rho_path = cfg.get_string("RhoInputArray", "")?;
        let rho = if rho_path.is_empty() { None } else { Some(ctx.import_array(&rho_path)?) };
        let output = ctx.export_array(&cfg.get_string("OutputArray", "candidates")?)?;
        self.arrays = Some(IsolationArrays { candidates, isolation, tracks, rho, output });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("isolation processed before init".into()))?;

        let candidate_ids = ctx.event.arrays.get(arrays.candidates).to_vec();
        let isolation_ids = ctx.event.arrays.get(arrays.isolation).to_vec();
        let track_ids = ctx.event.arrays.get(arrays.tracks).to_vec();

        // Rho for the pile-up correction: first density whose eta range
        // covers the candidate.
        let rho_entries: Vec<([f64; 4], f64)> = match arrays.rho {
            Some(rho_array) => ctx
                .event
                .arrays
                .get(rho_array)
                .iter()
                .map(|&id| {
                    let c = ctx.event.factory.get(id);
                    (c.edges, c.momentum.pt())
                })
                .collect(),
            None => Vec::new(),
        };

        for &cand_id in &candidate_ids {
            let cand = ctx.event.factory.get(cand_id);
            let cand_p4 = cand.momentum;
            let cand_pt = cand_p4.pt();

            let mut charged_hadron = 0.0;
            let mut neutral = 0.0;
            let mut charged_pu = 0.0;
            let mut all_particle = 0.0;
            for &iso_id in &isolation_ids {
                if iso_id == cand_id || ctx.event.factory.overlaps(cand_id, iso_id) {
                    continue;
                }
                let iso = ctx.event.factory.get(iso_id);
                let pt = iso.momentum.pt();
                if pt < self.pt_min || cand_p4.delta_r(&iso.momentum) > self.delta_r_max {
                    continue;
                }
                all_particle += pt;
                if iso.charge != 0 {
                    if iso.is_pu != 0 || iso.is_reco_pu != 0 {
                        charged_pu += pt;
                    } else {
                        charged_hadron += pt;
                    }
                } else {
                    neutral += pt;
                }
            }

            let mut track_sum = 0.0;
            for &track_id in &track_ids {
                if track_id == cand_id || ctx.event.factory.overlaps(cand_id, track_id) {
                    continue;
                }
                let track = ctx.event.factory.get(track_id);
                let pt = track.momentum.pt();
                if pt < self.pt_min || cand_p4.delta_r(&track.momentum) > self.delta_r_max {
                    continue;
                }
                track_sum += pt;
            }

            let rho = rho_entries
                .iter()
                .find(|(edges, _)| {
                    let abs_eta = cand_p4.eta().abs();
                    abs_eta >= edges[0] && abs_eta < edges[1]
                })
                .map(|(_, rho)| *rho)
                .unwrap_or(0.0);

            let dbeta = if cand_pt > 0.0 {
                (charged_hadron + (neutral - 0.5 * charged_pu).max(0.0)) / cand_pt
            } else {
                0.0
            };
            let cone_area = PI * self.delta_r_max * self.delta_r_max;
            let rho_corr = if cand_pt > 0.0 {
                (charged_hadron + (neutral - rho * cone_area).max(0.0)) / cand_pt
            } else {
                0.0
            };
            let track_iso = if cand_pt > 0.0 { track_sum / cand_pt } else { 0.0 };

            {
                let cand = ctx.event.factory.get_mut(cand_id);
                cand.charged_hadron_energy = charged_hadron;
                cand.neutral_energy = neutral;
                cand.charged_pu_energy = charged_pu;
                cand.all_particle_energy = all_particle;
                cand.isolation_var_dbeta = dbeta;
                cand.isolation_var_rho_corr = rho_corr;
                cand.track_isolation_var = track_iso;
            }

            if dbeta <= self.pt_ratio_max {
                ctx.event.arrays.push(arrays.output, cand_id);
            }
        }
        Ok(())
    }
}
