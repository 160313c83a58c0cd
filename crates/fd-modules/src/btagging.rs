//! Jet flavour assignment and b-tagging.
//!
//! Seven flavour definitions per jet (algorithmic, default, physics, two
//! nearest-parton variants, heaviest, highest-pT), then one efficiency draw
//! per jet shared across the variants so the tag decisions stay correlated.

use fd_core::{Candidate, CandidateId, Error, Formula, FourVector, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use rand::Rng;
use std::collections::HashMap;

/// Cone used to collect physics-definition contaminants.
const CONTAMINATION_CONE: f64 = 0.7;

/// Matching distance for "this post-shower parton is an LHE parton".
const LHE_MATCH_DELTA_R: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct BTagArrays {
    partons: ArrayId,
    lhe_partons: ArrayId,
    all_particles: ArrayId,
    jets: ArrayId,
}

/// Momentum and ancestry of one filtered parton.
#[derive(Debug, Clone, Copy)]
struct PartonInfo {
    p4: FourVector,
    pid: i32,
    charge: i32,
    m1: i32,
    d1: i32,
    d2: i32,
}

impl PartonInfo {
    fn of(c: &Candidate) -> Self {
        Self { p4: c.momentum, pid: c.pid, charge: c.charge, m1: c.m1, d1: c.d1, d2: c.d2 }
    }
}

/// The b-tagging module.
#[derive(Default)]
pub struct BTagging {
    bit_number: u32,
    delta_r: f64,
    pt_min: f64,
    eta_max: f64,
    efficiencies: HashMap<i64, Formula>,
    arrays: Option<BTagArrays>,
}

impl BTagging {
    /// Create an unconfigured b-tagger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classification: quark (PID 1-5) or gluon within the pT/eta window.
    /// Post-shower partons only need a non-terminal status; LHE partons
    /// must be status 1.
    fn accepts(&self, c: &Candidate, lhe: bool) -> bool {
        let pdg = c.pid.abs();
        if !(1..=5).contains(&pdg) && pdg != 21 {
            return false;
        }
        if c.momentum.pt() <= self.pt_min || c.momentum.eta().abs() > self.eta_max {
            return false;
        }
        if lhe { c.status == 1 } else { c.status != -1 }
    }

    fn efficiency(&self, flavour: u32, pt: f64, eta: f64) -> f64 {
        self.efficiencies
            .get(&(flavour as i64))
            .or_else(|| self.efficiencies.get(&0))
            .map(|f| f.eval_or_zero(&[pt, eta]))
            .unwrap_or(0.0)
    }
}

fn is_parton_pid(pdg: i32) -> bool {
    (1..=5).contains(&pdg) || pdg == 21
}

impl Module for BTagging {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        self.bit_number = cfg.get_int("BitNumber", 0)? as u32;
        self.delta_r = cfg.get_double("DeltaR", 0.5)?;
        self.pt_min = cfg.get_double("PartonPTMin", 0.0)?;
        self.eta_max = cfg.get_double("PartonEtaMax", 2.5)?;

        let param = cfg.get_param("EfficiencyFormula");
        for i in 0..param.size() / 2 {
            let flavour = param.at(2 * i)?.as_int()?;
            let text = param.at(2 * i + 1)?.as_string()?;
            let formula = Formula::compile(&text, &["pt", "eta"])
                .map_err(|e| Error::config(&module, "EfficiencyFormula", e.to_string()))?;
            self.efficiencies.insert(flavour, formula);
        }
        if !self.efficiencies.contains_key(&0) {
            let zero = Formula::compile("0.0", &["pt", "eta"])
                .map_err(|e| Error::config(&module, "EfficiencyFormula", e.to_string()))?;
            self.efficiencies.insert(0, zero);
        }

        // The LHE and post-shower arrays are filtered separately and never
        // aliased.
        let partons = ctx.import_array(&cfg.get_string("PartonInputArray", "Reader/partons")?)?;
        let lhe_partons =
            ctx.import_array(&cfg.get_string("LHEPartonInputArray", "Reader/LHEParticles")?)?;
        let jets = ctx.import_array(&cfg.get_string("JetInputArray", "JetFinder/jets")?)?;
        let all_particles =
            ctx.import_array(&cfg.get_string("ParticleInputArray", "Reader/allParticles")?)?;
        self.arrays = Some(BTagArrays { partons, lhe_partons, all_particles, jets });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("b-tagger processed before init".into()))?;

        let factory = &ctx.event.factory;
        let partons: Vec<PartonInfo> = ctx
            .event
            .arrays
            .get(arrays.partons)
            .iter()
            .map(|&id| factory.get(id))
            .filter(|c| self.accepts(c, false))
            .map(PartonInfo::of)
            .collect();
        let lhe_partons: Vec<PartonInfo> = ctx
            .event
            .arrays
            .get(arrays.lhe_partons)
            .iter()
            .map(|&id| factory.get(id))
            .filter(|c| self.accepts(c, true))
            .map(PartonInfo::of)
            .collect();
        let all_particles: Vec<CandidateId> =
            ctx.event.arrays.get(arrays.all_particles).to_vec();
        let jets = ctx.event.arrays.get(arrays.jets).to_vec();

        for jet_id in jets {
            let jet_p4 = ctx.event.factory.get(jet_id).momentum;

            let (algo, default, heaviest, highest_pt, nearest2) =
                self.algo_flavour(ctx, &jet_p4, &partons, &lhe_partons, &all_particles);
            let (physics, nearest3) =
                self.physics_flavour(ctx, &jet_p4, &partons, &lhe_partons, &all_particles);

            // One draw per jet, shared across the variants.
            let r: f64 = ctx.rng.gen();
            let (pt, eta) = (jet_p4.pt(), jet_p4.eta());
            let bit = 1u32 << self.bit_number;

            let jet = ctx.event.factory.get_mut(jet_id);
            jet.flavour.algo = algo;
            jet.flavour.default = default;
            jet.flavour.physics = physics;
            jet.flavour.nearest2 = nearest2;
            jet.flavour.nearest3 = nearest3;
            jet.flavour.heaviest = heaviest;
            jet.flavour.highest_pt = highest_pt;

            if r <= self.efficiency(algo, pt, eta) {
                jet.btag.algo |= bit;
            }
            if r <= self.efficiency(default, pt, eta) {
                jet.btag.default |= bit;
            }
            if r <= self.efficiency(physics, pt, eta) {
                jet.btag.physics |= bit;
            }
            if r <= self.efficiency(nearest2, pt, eta) {
                jet.btag.nearest2 |= bit;
            }
            if r <= self.efficiency(nearest3, pt, eta) {
                jet.btag.nearest3 |= bit;
            }
            if r <= self.efficiency(heaviest, pt, eta) {
                jet.btag.heaviest |= bit;
            }
            if r <= self.efficiency(highest_pt, pt, eta) {
                jet.btag.highest_pt |= bit;
            }
        }
        Ok(())
    }
}

impl BTagging {
    /// Algorithmic flavour walk. Returns
    /// (algo, default, heaviest, highestPt, nearest2).
    fn algo_flavour(
        &self,
        ctx: &ProcessContext<'_>,
        jet: &FourVector,
        partons: &[PartonInfo],
        lhe_partons: &[PartonInfo],
        all_particles: &[CandidateId],
    ) -> (u32, u32, u32, u32, u32) {
        // Secondary default: max PID in cone with gluon mapped to 0, then
        // back to 21; no match maps to 0.
        let mut pdg_code_max = -1i64;
        for p in partons {
            let code = if p.pid.abs() == 21 { 0 } else { p.pid.abs() as i64 };
            if jet.delta_r(&p.p4) <= self.delta_r && code > pdg_code_max {
                pdg_code_max = code;
            }
        }
        let default = match pdg_code_max {
            0 => 21,
            -1 => 0,
            m => m as u32,
        };

        let mut nearest = 0u32;
        let mut min_dr = f64::MAX;
        let mut highest_pt = 0u32;
        let mut max_pt = 0.0f64;
        let mut has_b = false;
        let mut has_c = false;

        for p in partons {
            // A parton that coincides with an LHE parton would be counted
            // twice; skip it here.
            let doubles_lhe = lhe_partons.iter().any(|l| {
                p.p4.delta_r(&l.p4) < LHE_MATCH_DELTA_R
                    && l.pid == p.pid
                    && l.charge == p.charge
            });
            if doubles_lhe {
                continue;
            }

            // Non-terminal partons (daughters are partons again) are skipped.
            let mut n_parton_daughters = 0;
            for d in [p.d1, p.d2] {
                if d < 0 {
                    continue;
                }
                if let Some(&daughter) = all_particles.get(d as usize) {
                    if is_parton_pid(ctx.event.factory.get(daughter).pid.abs()) {
                        n_parton_daughters += 1;
                    }
                }
            }
            if n_parton_daughters > 0 {
                continue;
            }

            let dr = jet.delta_r(&p.p4);
            if dr > self.delta_r {
                continue;
            }
            if dr < min_dr {
                min_dr = dr;
                nearest = p.pid.unsigned_abs();
            }
            match p.pid.abs() {
                5 => has_b = true,
                4 => has_c = true,
                _ => {}
            }
            if p.p4.pt() > max_pt {
                max_pt = p.p4.pt();
                highest_pt = p.pid.unsigned_abs();
            }
        }

        let heaviest = if has_b {
            5
        } else if has_c {
            4
        } else {
            0
        };
        let algo = if heaviest != 0 { heaviest } else { highest_pt };
        (algo, default, heaviest, highest_pt, nearest)
    }

    /// Physics flavour from matrix-element partons. Returns
    /// (physics, nearest3).
    fn physics_flavour(
        &self,
        ctx: &ProcessContext<'_>,
        jet: &FourVector,
        partons: &[PartonInfo],
        lhe_partons: &[PartonInfo],
        all_particles: &[CandidateId],
    ) -> (u32, u32) {
        let mut nearest = 0u32;
        let mut min_dr = f64::MAX;
        let mut in_cone: Option<PartonInfo> = None;
        let mut n_in_cone = 0usize;

        for l in lhe_partons {
            let dist = jet.delta_r(&l.p4);
            if dist < min_dr {
                min_dr = dist;
                nearest = l.pid.unsigned_abs();
            }
            if dist <= self.delta_r {
                in_cone = Some(*l);
                n_in_cone += 1;
            }
        }

        // Unambiguous only with exactly one matrix-element parton in cone.
        let (initial, mut physics) = match (n_in_cone, in_cone) {
            (1, Some(l)) => (l, l.pid.unsigned_abs()),
            _ => return (0, nearest),
        };

        // Heavy decaying partons near the jet contaminate the assignment
        // unless they descend from the initial parton itself.
        for p in partons {
            if p.d1 == -1 && p.d2 == -1 {
                continue;
            }
            let pdg = p.pid.abs();
            if pdg < 4 || pdg == 21 {
                continue;
            }
            if jet.delta_r(&p.p4) >= CONTAMINATION_CONE {
                continue;
            }
            if p.m1 >= 0 {
                if let Some(&mother) = all_particles.get(p.m1 as usize) {
                    let mother_p4 = ctx.event.factory.get(mother).momentum;
                    if mother_p4.delta_r(&initial.p4) < LHE_MATCH_DELTA_R {
                        continue;
                    }
                }
            }
            if pdg as u32 != initial.pid.unsigned_abs() {
                physics = 0;
                break;
            }
        }
        (physics, nearest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_windows() {
        let tagger = BTagging {
            pt_min: 10.0,
            eta_max: 2.5,
            delta_r: 0.5,
            ..BTagging::default()
        };
        let mut c = Candidate {
            pid: 5,
            status: 2,
            momentum: FourVector::from_pt_eta_phi_m(50.0, 1.0, 0.0, 4.2),
            ..Candidate::default()
        };
        assert!(tagger.accepts(&c, false));
        // LHE filtering requires status 1.
        assert!(!tagger.accepts(&c, true));
        c.status = 1;
        assert!(tagger.accepts(&c, true));
        // Out of window.
        c.momentum = FourVector::from_pt_eta_phi_m(5.0, 1.0, 0.0, 4.2);
        assert!(!tagger.accepts(&c, false));
        c.momentum = FourVector::from_pt_eta_phi_m(50.0, 3.0, 0.0, 4.2);
        assert!(!tagger.accepts(&c, false));
        // Not a parton.
        c.momentum = FourVector::from_pt_eta_phi_m(50.0, 1.0, 0.0, 4.2);
        c.pid = 11;
        assert!(!tagger.accepts(&c, false));
        c.pid = 21;
        assert!(tagger.accepts(&c, false));
    }
}
