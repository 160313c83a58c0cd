//! Jet finding through the clustering capability interface, with optional
//! area/rho evaluation and large-radius substructure.

use fd_cluster::{
    nsubjettiness, prune, soft_drop, trim, AreaDefinition, ClusterEngine, GhostSpec,
    GroomOutcome, JetAlgorithm, JetDefinition, NativeClusterEngine, PseudoJet,
};
use fd_core::{CandidateId, Error, FourVector, Groomed, Result, Subjet};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};

/// Jets below this pT carry no substructure observables.
const SUBSTRUCTURE_PT_MIN: f64 = 200.0;
const TRIM_RADIUS: f64 = 0.2;
const TRIM_PT_FRACTION: f64 = 0.05;
const NSUB_BETA: f64 = 1.0;
const NSUB_R0: f64 = 0.8;
const PRUNE_Z_CUT: f64 = 0.1;
const PRUNE_R_FACTOR: f64 = 0.5;
const SOFT_DROP_Z_CUT: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct JetArrays {
    input: ArrayId,
    jets: ArrayId,
    rho: ArrayId,
}

/// The jet finder module.
pub struct JetFinder {
    engine: Box<dyn ClusterEngine>,
    definition: JetDefinition,
    area: AreaDefinition,
    jet_pt_min: f64,
    keep_pileup: bool,
    compute_rho: bool,
    rho_ranges: Vec<(f64, f64)>,
    arrays: Option<JetArrays>,
}

impl Default for JetFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl JetFinder {
    /// Jet finder over the built-in clustering engine.
    pub fn new() -> Self {
        Self::with_engine(Box::new(NativeClusterEngine))
    }

    /// Jet finder over a caller-supplied clustering engine.
    pub fn with_engine(engine: Box<dyn ClusterEngine>) -> Self {
        Self {
            engine,
            definition: JetDefinition { algorithm: JetAlgorithm::AntiKt, r: 0.5 },
            area: AreaDefinition::None,
            jet_pt_min: 10.0,
            keep_pileup: true,
            compute_rho: false,
            rho_ranges: Vec::new(),
            arrays: None,
        }
    }
}

fn groomed_record(outcome: &GroomOutcome) -> Groomed {
    Groomed {
        n_subjets: outcome.subjets.len() as i32,
        mass: outcome.p4.mass(),
        pt: outcome.p4.pt(),
        eta: if outcome.p4.pt2() > 0.0 { outcome.p4.eta() } else { 0.0 },
        phi: if outcome.p4.pt2() > 0.0 { outcome.p4.phi() } else { 0.0 },
        subjets: outcome
            .subjets
            .iter()
            .take(3)
            .map(|s| Subjet { mass: s.mass(), pt: s.pt(), eta: s.eta(), phi: s.phi() })
            .collect(),
    }
}

impl Module for JetFinder {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        let algorithm = JetAlgorithm::from_id(cfg.get_int("JetAlgorithm", 6)?)
            .map_err(|e| Error::config(&module, "JetAlgorithm", e.to_string()))?;
        self.definition =
            JetDefinition { algorithm, r: cfg.get_double("ParameterR", 0.5)? };
        self.jet_pt_min = cfg.get_double("JetPTMin", 10.0)?;
        self.keep_pileup = cfg.get_bool("KeepPileUp", true)?;
        self.compute_rho = cfg.get_bool("ComputeRho", false)?;

        let ghosts = GhostSpec {
            eta_max: cfg.get_double("GhostEtaMax", 5.0)?,
            repeat: cfg.get_int("Repeat", 1)? as usize,
            area: cfg.get_double("GhostArea", 0.01)?,
            grid_scatter: cfg.get_double("GridScatter", 1.0)?,
            pt_scatter: cfg.get_double("PtScatter", 0.1)?,
            mean_ghost_pt: cfg.get_double("MeanGhostPt", 1.0e-100)?,
        };
        self.area = AreaDefinition::from_id(
            cfg.get_int("AreaAlgorithm", 0)?,
            ghosts,
            cfg.get_double("EffectiveRfact", 1.0)?,
        )
        .map_err(|e| Error::config(&module, "AreaAlgorithm", e.to_string()))?;

        let param = cfg.get_param("RhoEtaRange");
        for i in 0..param.size() / 2 {
            self.rho_ranges
                .push((param.at(2 * i)?.as_double()?, param.at(2 * i + 1)?.as_double()?));
        }

        self.engine
            .validate(&self.definition, &self.area)
            .map_err(|e| Error::config(&module, "JetAlgorithm", e.to_string()))?;

        let input =
            ctx.import_array(&cfg.get_string("InputArray", "Calorimeter/towers")?)?;
        let jets = ctx.export_array(&cfg.get_string("OutputArray", "jets")?)?;
        let rho = ctx.export_array(&cfg.get_string("RhoOutputArray", "rho")?)?;
        self.arrays = Some(JetArrays { input, jets, rho });
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let arrays = self
            .arrays
            .ok_or_else(|| Error::External("jet finder processed before init".into()))?;

        // Project the inputs; user indices point into the kept-id list so
        // constituents resolve even when pile-up objects are dropped.
        let input_ids = ctx.event.arrays.get(arrays.input).to_vec();
        let mut kept: Vec<CandidateId> = Vec::with_capacity(input_ids.len());
        let mut inputs: Vec<PseudoJet> = Vec::with_capacity(input_ids.len());
        for &id in &input_ids {
            let c = ctx.event.factory.get(id);
            if !self.keep_pileup && c.is_pu > 0 {
                continue;
            }
            inputs.push(PseudoJet::from_four_vector(c.momentum, kept.len() as i64));
            kept.push(id);
        }

        let clustering = self.engine.cluster(&inputs, &self.definition, &self.area, ctx.rng)?;

        if self.compute_rho && self.area.is_enabled() {
            for &(rap_min, rap_max) in &self.rho_ranges {
                let rho = clustering.median_rho(rap_min, rap_max);
                let id = ctx.event.factory.new_candidate();
                let c = ctx.event.factory.get_mut(id);
                c.momentum = FourVector::from_pt_eta_phi_e(rho, 0.0, 0.0, rho);
                c.edges[0] = rap_min;
                c.edges[1] = rap_max;
                ctx.event.arrays.push(arrays.rho, id);
            }
        }

        for jet in clustering.inclusive_jets(self.jet_pt_min) {
            if jet.is_pure_ghost() {
                continue;
            }
            let jet_p4 = jet.p4.four_vector();
            let jet_id = ctx.event.factory.new_candidate();

            let mut deta_max = 0.0f64;
            let mut dphi_max = 0.0f64;
            for constituent in &jet.constituents {
                let member = kept[constituent.user_index as usize];
                let p = ctx.event.factory.get(member).momentum;
                deta_max = deta_max.max((jet_p4.eta() - p.eta()).abs());
                dphi_max = dphi_max.max(jet_p4.delta_phi(&p).abs());
                ctx.event.factory.get_mut(member).is_constituent = 1;
                ctx.event.factory.add_candidate(jet_id, member);
            }

            let c = ctx.event.factory.get_mut(jet_id);
            c.momentum = jet_p4;
            if self.area.is_enabled() {
                c.area = jet.area_4vector;
            }
            c.delta_eta = deta_max;
            c.delta_phi = dphi_max;

            if jet.p4.pt() > SUBSTRUCTURE_PT_MIN {
                let parts = &jet.constituents;

                let trimmed = trim(parts, jet.p4.pt(), TRIM_RADIUS, TRIM_PT_FRACTION);
                let trimmed_mass = trimmed.p4.mass().max(0.0);
                let largest_subjet_mass =
                    trimmed.subjets.iter().map(|s| s.mass()).fold(0.0, f64::max);
                let mass_drop =
                    if trimmed_mass != 0.0 { largest_subjet_mass / trimmed_mass } else { 1.0 };

                c.trimmed = groomed_record(&trimmed);
                c.trimmed.mass = trimmed_mass;
                c.mass_drop = mass_drop;

                c.tau1 = nsubjettiness(1, parts, NSUB_BETA, NSUB_R0);
                c.tau2 = nsubjettiness(2, parts, NSUB_BETA, NSUB_R0);
                c.tau3 = nsubjettiness(3, parts, NSUB_BETA, NSUB_R0);

                if mass_drop < 0.4 && trimmed_mass > 60.0 && trimmed_mass < 120.0 {
                    c.w_tag = 1;
                }
                if trimmed.subjets.len() >= 3 && trimmed_mass > 140.0 && trimmed_mass < 230.0 {
                    c.top_tag = 1;
                }
                if mass_drop < 0.4 && trimmed_mass > 100.0 && trimmed_mass < 140.0 {
                    c.h_tag = 1;
                }

                c.pruned = groomed_record(&prune(parts, &jet.p4, PRUNE_Z_CUT, PRUNE_R_FACTOR));
                c.soft_drop = groomed_record(&soft_drop(parts, SOFT_DROP_Z_CUT));
            }

            ctx.event.arrays.push(arrays.jets, jet_id);
        }
        Ok(())
    }
}
