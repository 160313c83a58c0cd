//! The universal per-event object.
//!
//! A [`Candidate`] is a flat record: one type carries generator particles,
//! tracks, calorimeter towers, energy-flow objects and jets, with the
//! attribute groups a given producer fills. Composition (jet constituents,
//! tower hits) is a list of arena indices into the owning factory.

use crate::math::FourVector;

/// Index of a [`Candidate`] inside its per-event factory.
///
/// Ids are minted only by the factory and are invalidated by the event
/// boundary `clear`; they must never be held across events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateId(pub(crate) u32);

impl CandidateId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One jet-flavour (or b-tag bitmask) value per assignment variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantSet {
    /// Algorithmic definition (heaviest with highest-pT fallback).
    pub algo: u32,
    /// Max-PID-in-cone definition with the gluon remap.
    pub default: u32,
    /// Physics definition from matrix-element partons.
    pub physics: u32,
    /// Nearest post-shower parton.
    pub nearest2: u32,
    /// Nearest matrix-element parton.
    pub nearest3: u32,
    /// b if present, else c.
    pub heaviest: u32,
    /// Highest-pT parton in cone.
    pub highest_pt: u32,
}

/// Kinematics of one groomed subjet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Subjet {
    /// Subjet mass.
    pub mass: f64,
    /// Subjet transverse momentum.
    pub pt: f64,
    /// Subjet pseudorapidity.
    pub eta: f64,
    /// Subjet azimuth.
    pub phi: f64,
}

/// Result of one grooming pass (trimming, pruning or soft drop).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Groomed {
    /// Number of surviving subjets.
    pub n_subjets: i32,
    /// Groomed jet mass.
    pub mass: f64,
    /// Groomed jet transverse momentum.
    pub pt: f64,
    /// Groomed jet pseudorapidity.
    pub eta: f64,
    /// Groomed jet azimuth.
    pub phi: f64,
    /// Up to three leading surviving subjets, by descending pT.
    pub subjets: Vec<Subjet>,
}

/// Pile-up-jet-ID observables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PileUpJetId {
    /// Charged pT fraction from the hard vertex.
    pub beta: f64,
    /// Charged pT fraction from pile-up vertices.
    pub beta_star: f64,
    /// pT-weighted mean squared dR of constituents to the jet axis.
    pub mean_sq_delta_r: f64,
    /// pT dispersion.
    pub pt_d: f64,
    /// Charged constituent multiplicity.
    pub n_charged: i32,
    /// Neutral constituent multiplicity.
    pub n_neutrals: i32,
    /// Fractional pT in dR annuli of width 0.1 around the axis.
    pub frac_pt: [f64; 5],
}

/// Universal event object. See the module documentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Four-momentum.
    pub momentum: FourVector,
    /// Production vertex or surface position (x, y, z, t).
    pub position: FourVector,
    /// Four-vector jet area.
    pub area: FourVector,

    /// PDG particle code.
    pub pid: i32,
    /// Generator status code.
    pub status: i32,
    /// First mother index into allParticles, -1 if absent.
    pub m1: i32,
    /// Second mother index, -1 if absent.
    pub m2: i32,
    /// First daughter index, -1 if absent.
    pub d1: i32,
    /// Last daughter index, -1 if absent.
    pub d2: i32,
    /// Electric charge in units of e.
    pub charge: i32,
    /// Spin projection, generator convention.
    pub spin: i32,
    /// Generator mass.
    pub mass: f64,

    /// Whether the object comes from a pile-up interaction.
    pub is_pu: i32,
    /// Pile-up decision of the charged-hadron subtractor.
    pub is_reco_pu: i32,
    /// Whether the object entered a jet as a constituent.
    pub is_constituent: i32,
    /// Electron/muon candidate flag.
    pub is_em_cand: i32,
    /// Fake-object flag.
    pub is_fake_object: i32,

    /// dBeta-corrected isolation variable.
    pub isolation_var_dbeta: f64,
    /// rho-corrected isolation variable.
    pub isolation_var_rho_corr: f64,
    /// Track-only isolation variable.
    pub track_isolation_var: f64,
    /// Charged-hadron energy in the isolation cone.
    pub charged_hadron_energy: f64,
    /// Neutral energy in the isolation cone.
    pub neutral_energy: f64,
    /// Charged pile-up energy in the isolation cone.
    pub charged_pu_energy: f64,
    /// All-particle energy in the isolation cone.
    pub all_particle_energy: f64,

    /// Electromagnetic calorimeter deposit.
    pub eem: f64,
    /// Hadronic calorimeter deposit.
    pub ehad: f64,
    /// Tower edges: eta low, eta high, phi low, phi high.
    pub edges: [f64; 4],
    /// Per-tower (ECAL energy, time) entries above the timing threshold.
    pub ecal_e_t: Vec<(f32, f32)>,
    /// Number of timing entries.
    pub n_times: i32,

    /// b-tag bitmasks, one per flavour variant.
    pub btag: VariantSet,
    /// Assigned jet flavour, one per variant.
    pub flavour: VariantSet,
    /// tau-tag bitmask.
    pub tau_tag: u32,

    /// 1-subjettiness.
    pub tau1: f64,
    /// 2-subjettiness.
    pub tau2: f64,
    /// 3-subjettiness.
    pub tau3: f64,
    /// Largest-subjet mass over trimmed mass (1 when trimmed mass is 0).
    pub mass_drop: f64,
    /// Trimming result.
    pub trimmed: Groomed,
    /// Pruning result.
    pub pruned: Groomed,
    /// Soft-drop result.
    pub soft_drop: Groomed,
    /// W-tag decision.
    pub w_tag: u32,
    /// Top-tag decision.
    pub top_tag: u32,
    /// H-tag decision.
    pub h_tag: u32,

    /// Pile-up-jet-ID observables.
    pub pileup_id: PileUpJetId,

    /// Max |eta distance| of any constituent from the jet axis.
    pub delta_eta: f64,
    /// Max |phi distance| of any constituent from the jet axis.
    pub delta_phi: f64,

    /// Composition: children inside the same factory.
    pub children: Vec<CandidateId>,
}

impl Candidate {
    /// Reset every attribute to its default. Used by pool recycling only.
    pub fn clear(&mut self) {
        *self = Candidate::default();
    }
}
