//! Tau tagging: match jets to generator tau leptons and apply per-species
//! efficiency formulas, in the same mould as the b-tagger.

use fd_core::{Error, Formula, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use rand::Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct TauArrays {
    particles: ArrayId,
    jets: ArrayId,
}

/// The tau-tagging module.
#[derive(Default)]
pub struct TauTagging {
    bit_number: u32,
    delta_r: f64,
    pt_min: f64,
    eta_max: f64,
    efficiencies: HashMap<i64, Formula>,
    arrays: Option<TauArrays>,
}

impl TauTagging {
    /// Create an unconfigured tau tagger.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for TauTagging {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        self.bit_number = cfg.get_int("BitNumber", 0)? as u32;
        self.delta_r = cfg.get_double("DeltaR", 0.5)?;
        self.pt_min = cfg.get_double("TauPTMin", 1.0)?;
        self.eta_max = cfg.get_double("TauEtaMax", 2.5)?;

        let param = cfg.get_param("EfficiencyFormula");
        for i in 0..param.size() / 2 {
            let pdg = param.at(2 * i)?.as_int()?;
            let text = param.at(2 * i + 1)?.as_string()?;
            let formula = Formula::compile(&text, &["pt", "eta"])
                .map_err(|e| Error::config(&module, "EfficiencyFormula", e.to_string()))?;
            self.efficiencies.insert(pdg, formula);
        }
        if !self.efficiencies.contains_key(&0) {
            let zero = Formula::compile("0.0", &["pt", "eta"])
                .map_err(|e| Error::config(&module, "EfficiencyFormula", e.to_string()))?;
            self.efficiencies.insert(0, zero);
        }

        let particles =
            ctx.import_array(&cfg.get_string("ParticleInputArray", "Reader/allParticles")?)?;
        let jets = ctx.import_array(&cfg.get_string("JetInputArray", "JetFinder/jets")?)?;
        self.arrays = Some(TauArrays { particles, jets });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("tau tagger processed before init".into()))?;

        // Generator taus inside the acceptance window.
        let taus: Vec<fd_core::FourVector> = ctx
            .event
            .arrays
            .get(arrays.particles)
            .iter()
            .map(|&id| ctx.event.factory.get(id))
            .filter(|c| {
                c.pid.abs() == 15
                    && c.momentum.pt() > self.pt_min
                    && c.momentum.eta().abs() < self.eta_max
            })
            .map(|c| c.momentum)
            .collect();

        let jets = ctx.event.arrays.get(arrays.jets).to_vec();
        for jet_id in jets {
            let jet_p4 = ctx.event.factory.get(jet_id).momentum;
            let matched = taus.iter().any(|tau| jet_p4.delta_r(tau) <= self.delta_r);
            let key = if matched { 15 } else { 0 };
            let eff = self
                .efficiencies
                .get(&key)
                .or_else(|| self.efficiencies.get(&0))
                .map(|f| f.eval_or_zero(&[jet_p4.pt(), jet_p4.eta()]))
                .unwrap_or(0.0);

            let r: f64 = ctx.rng.gen();
            if r <= eff {
                ctx.event.factory.get_mut(jet_id).tau_tag |= 1 << self.bit_number;
            }
        }
        Ok(())
    }
}
