//! Momentum merger: vector and scalar sums over any set of input arrays,
//! feeding the missing-ET and scalar-HT branches.

use fd_core::{Error, FourVector, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};

#[derive(Debug, Clone)]
struct MergerArrays {
    inputs: Vec<ArrayId>,
    merged: ArrayId,
    momentum: ArrayId,
    energy: ArrayId,
}

/// The merger module.
#[derive(Default)]
pub struct Merger {
    arrays: Option<MergerArrays>,
}

impl Merger {
    /// Create an unconfigured merger.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Merger {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        let param = cfg.get_param("InputArray");
        if param.size() == 0 {
            return Err(Error::config(&module, "InputArray", "at least one input is required"));
        }
        let mut inputs = Vec::with_capacity(param.size());
        for i in 0..param.size() {
            inputs.push(ctx.import_array(&param.at(i)?.as_string()?)?);
        }

        let merged = ctx.export_array(&cfg.get_string("OutputArray", "candidates")?)?;
        let momentum = ctx.export_array(&cfg.get_string("MomentumOutputArray", "momentum")?)?;
        let energy = ctx.export_array(&cfg.get_string("EnergyOutputArray", "energy")?)?;
        self.arrays = Some(MergerArrays { inputs, merged, momentum, energy });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .clone()
            .ok_or_else(|| Error::External("merger processed before init".into()))?;

        let mut momentum_sum = FourVector::default();
        let mut scalar_ht = 0.0f64;
        for &input in &arrays.inputs {
            let ids = ctx.event.arrays.get(input).to_vec();
            for id in ids {
                let p4 = ctx.event.factory.get(id).momentum;
                momentum_sum += p4;
                scalar_ht += p4.pt();
                ctx.event.arrays.push(arrays.merged, id);
            }
        }

        // The missing-ET branch reads this candidate's momentum; MET is the
        // pT of the negative vector sum.
        let momentum_id = ctx.event.factory.new_candidate();
        ctx.event.factory.get_mut(momentum_id).momentum = momentum_sum;
        ctx.event.arrays.push(arrays.momentum, momentum_id);

        let energy_id = ctx.event.factory.new_candidate();
        ctx.event.factory.get_mut(energy_id).momentum =
            FourVector::from_pt_eta_phi_e(scalar_ht, 0.0, 0.0, scalar_ht);
        ctx.event.arrays.push(arrays.energy, energy_id);
        Ok(())
    }
}
