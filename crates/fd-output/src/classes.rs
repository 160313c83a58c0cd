//! Branch record classes.
//!
//! One struct per entity class written to the output tree. Schemas are
//! stable: floating-point fields are 32-bit, index fields are signed 32-bit
//! with a -1 sentinel.

use fd_core::{Candidate, EventHeader, GeneratorEvent, Groomed};
use serde::{Deserialize, Serialize};

/// Event branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event number.
    pub number: i64,
    /// Seconds spent reading.
    pub read_time: f32,
    /// Seconds spent processing.
    pub proc_time: f32,
    /// Generator record (LHEF or HepMC), when the reader attached one.
    pub generator: Option<GeneratorEvent>,
}

impl EventRecord {
    /// Build from the run-loop header.
    pub fn from_header(header: &EventHeader) -> Self {
        Self {
            number: header.number,
            read_time: header.read_time as f32,
            proc_time: header.proc_time as f32,
            generator: header.generator.clone(),
        }
    }
}

/// Generator-particle branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenParticleRecord {
    /// PDG code.
    pub pid: i32,
    /// Generator status.
    pub status: i32,
    /// Pile-up flag.
    pub is_pu: i32,
    /// Mother/daughter indices, -1 sentinel.
    pub m1: i32,
    /// Second mother.
    pub m2: i32,
    /// First daughter.
    pub d1: i32,
    /// Last daughter.
    pub d2: i32,
    /// Charge in units of e.
    pub charge: i32,
    /// Mass.
    pub mass: f32,
    /// Energy.
    pub e: f32,
    /// Momentum components.
    pub px: f32,
    /// Momentum components.
    pub py: f32,
    /// Momentum components.
    pub pz: f32,
    /// Transverse momentum.
    pub pt: f32,
    /// Pseudorapidity.
    pub eta: f32,
    /// Azimuth.
    pub phi: f32,
    /// Rapidity.
    pub rapidity: f32,
    /// Vertex position.
    pub x: f32,
    /// Vertex position.
    pub y: f32,
    /// Vertex position.
    pub z: f32,
    /// Vertex time.
    pub t: f32,
}

/// Track branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// PDG code.
    pub pid: i32,
    /// Charge in units of e.
    pub charge: i32,
    /// Transverse momentum.
    pub pt: f32,
    /// Momentum pseudorapidity.
    pub eta: f32,
    /// Momentum azimuth.
    pub phi: f32,
    /// Pseudorapidity at the detector surface.
    pub eta_outer: f32,
    /// Azimuth at the detector surface.
    pub phi_outer: f32,
    /// Surface position.
    pub x_outer: f32,
    /// Surface position.
    pub y_outer: f32,
    /// Surface position.
    pub z_outer: f32,
    /// Surface crossing time.
    pub t_outer: f32,
}

/// Calorimeter-tower branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TowerRecord {
    /// Transverse energy.
    pub et: f32,
    /// Tower-centre pseudorapidity.
    pub eta: f32,
    /// Tower-centre azimuth.
    pub phi: f32,
    /// Total energy.
    pub e: f32,
    /// Electromagnetic component.
    pub eem: f32,
    /// Hadronic component.
    pub ehad: f32,
    /// Tower edges: eta low/high, phi low/high.
    pub edges: [f32; 4],
    /// Energy-weighted ECAL time.
    pub t_outer: f32,
    /// Number of timing entries.
    pub n_times: i32,
}

/// Photon branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotonRecord {
    /// Transverse momentum.
    pub pt: f32,
    /// Pseudorapidity.
    pub eta: f32,
    /// Azimuth.
    pub phi: f32,
    /// Energy.
    pub e: f32,
    /// Hadronic over electromagnetic energy ratio.
    pub ehad_over_eem: f32,
    /// dBeta-corrected isolation.
    pub isolation_var_dbeta: f32,
    /// rho-corrected isolation.
    pub isolation_var_rho_corr: f32,
    /// Track-only isolation.
    pub track_isolation_var: f32,
    /// Charged-hadron cone energy.
    pub charged_hadron_energy: f32,
    /// Neutral cone energy.
    pub neutral_energy: f32,
    /// Charged pile-up cone energy.
    pub charged_pu_energy: f32,
    /// All-particle cone energy.
    pub all_particle_energy: f32,
    /// ECAL time.
    pub t_outer: f32,
}

/// Groomed-jet subrecord: one grooming pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroomedRecord {
    /// Number of surviving subjets.
    pub n_subjets: i32,
    /// Groomed mass.
    pub mass: f32,
    /// Groomed pT.
    pub pt: f32,
    /// Groomed pseudorapidity.
    pub eta: f32,
    /// Groomed azimuth.
    pub phi: f32,
    /// Leading-subjet masses.
    pub sub_mass: [f32; 3],
    /// Leading-subjet pTs.
    pub sub_pt: [f32; 3],
    /// Leading-subjet pseudorapidities.
    pub sub_eta: [f32; 3],
    /// Leading-subjet azimuths.
    pub sub_phi: [f32; 3],
}

impl GroomedRecord {
    fn from_groomed(g: &Groomed) -> Self {
        let mut out = Self {
            n_subjets: g.n_subjets,
            mass: g.mass as f32,
            pt: g.pt as f32,
            eta: g.eta as f32,
            phi: g.phi as f32,
            ..Self::default()
        };
        for (i, s) in g.subjets.iter().take(3).enumerate() {
            out.sub_mass[i] = s.mass as f32;
            out.sub_pt[i] = s.pt as f32;
            out.sub_eta[i] = s.eta as f32;
            out.sub_phi[i] = s.phi as f32;
        }
        out
    }
}

/// Jet branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JetRecord {
    /// Transverse momentum.
    pub pt: f32,
    /// Pseudorapidity.
    pub eta: f32,
    /// Azimuth.
    pub phi: f32,
    /// Invariant mass.
    pub mass: f32,
    /// Max constituent eta distance from the axis.
    pub delta_eta: f32,
    /// Max constituent phi distance from the axis.
    pub delta_phi: f32,
    /// Number of constituents.
    pub n_constituents: i32,
    /// b-tag bitmask, algorithmic variant.
    pub btag_algo: u32,
    /// b-tag bitmask, default variant.
    pub btag_default: u32,
    /// b-tag bitmask, physics variant.
    pub btag_physics: u32,
    /// b-tag bitmask, nearest post-shower parton.
    pub btag_nearest2: u32,
    /// b-tag bitmask, nearest matrix-element parton.
    pub btag_nearest3: u32,
    /// b-tag bitmask, heaviest.
    pub btag_heaviest: u32,
    /// b-tag bitmask, highest pT.
    pub btag_highest_pt: u32,
    /// Flavour, algorithmic variant.
    pub flavour_algo: u32,
    /// Flavour, default variant.
    pub flavour_default: u32,
    /// Flavour, physics variant.
    pub flavour_physics: u32,
    /// Flavour, nearest post-shower parton.
    pub flavour_nearest2: u32,
    /// Flavour, nearest matrix-element parton.
    pub flavour_nearest3: u32,
    /// Flavour, heaviest.
    pub flavour_heaviest: u32,
    /// Flavour, highest pT.
    pub flavour_highest_pt: u32,
    /// tau-tag bitmask.
    pub tau_tag: u32,
    /// 1-subjettiness.
    pub tau1: f32,
    /// 2-subjettiness.
    pub tau2: f32,
    /// 3-subjettiness.
    pub tau3: f32,
    /// Largest-subjet mass over trimmed mass.
    pub mass_drop: f32,
    /// W-tag decision.
    pub w_tag: u32,
    /// Top-tag decision.
    pub top_tag: u32,
    /// H-tag decision.
    pub h_tag: u32,
    /// Trimming result.
    pub trimmed: GroomedRecord,
    /// Pruning result.
    pub pruned: GroomedRecord,
    /// Soft-drop result.
    pub soft_drop: GroomedRecord,
    /// Jet-area four-vector (px, py, pz, e).
    pub area: [f32; 4],
}

/// Rho branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhoRecord {
    /// Median energy density.
    pub rho: f32,
    /// Pseudorapidity range edges.
    pub edges: [f32; 2],
}

/// Missing-ET branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingEtRecord {
    /// Missing transverse energy.
    pub met: f32,
    /// Azimuth of the missing momentum.
    pub phi: f32,
}

/// Scalar-HT branch entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarHtRecord {
    /// Scalar sum of transverse momenta.
    pub ht: f32,
}

/// Entity class of one configured branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchClass {
    /// Generator particles.
    GenParticle,
    /// Tracks.
    Track,
    /// Calorimeter towers.
    Tower,
    /// Photons.
    Photon,
    /// Jets.
    Jet,
    /// Energy densities.
    Rho,
    /// Missing transverse energy.
    MissingEt,
    /// Scalar HT.
    ScalarHt,
}

impl BranchClass {
    /// Parse a class name from the configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "GenParticle" => BranchClass::GenParticle,
            "Track" => BranchClass::Track,
            "Tower" => BranchClass::Tower,
            "Photon" => BranchClass::Photon,
            "Jet" => BranchClass::Jet,
            "Rho" => BranchClass::Rho,
            "MissingET" => BranchClass::MissingEt,
            "ScalarHT" => BranchClass::ScalarHt,
            _ => return None,
        })
    }
}

/// Per-branch payload of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchData {
    /// Generator particles.
    GenParticle(Vec<GenParticleRecord>),
    /// Tracks.
    Track(Vec<TrackRecord>),
    /// Calorimeter towers.
    Tower(Vec<TowerRecord>),
    /// Photons.
    Photon(Vec<PhotonRecord>),
    /// Jets.
    Jet(Vec<JetRecord>),
    /// Energy densities.
    Rho(Vec<RhoRecord>),
    /// Missing transverse energy.
    MissingEt(Vec<MissingEtRecord>),
    /// Scalar HT.
    ScalarHt(Vec<ScalarHtRecord>),
}

/// Convert one candidate into a generator-particle record.
pub fn gen_particle_record(c: &Candidate) -> GenParticleRecord {
    GenParticleRecord {
        pid: c.pid,
        status: c.status,
        is_pu: c.is_pu,
        m1: c.m1,
        m2: c.m2,
        d1: c.d1,
        d2: c.d2,
        charge: c.charge,
        mass: c.mass as f32,
        e: c.momentum.e as f32,
        px: c.momentum.px as f32,
        py: c.momentum.py as f32,
        pz: c.momentum.pz as f32,
        pt: c.momentum.pt() as f32,
        eta: c.momentum.eta() as f32,
        phi: c.momentum.phi() as f32,
        rapidity: c.momentum.rapidity() as f32,
        x: c.position.x() as f32,
        y: c.position.y() as f32,
        z: c.position.z() as f32,
        t: c.position.t() as f32,
    }
}

/// Convert one candidate into a track record.
pub fn track_record(c: &Candidate) -> TrackRecord {
    TrackRecord {
        pid: c.pid,
        charge: c.charge,
        pt: c.momentum.pt() as f32,
        eta: c.momentum.eta() as f32,
        phi: c.momentum.phi() as f32,
        eta_outer: c.position.eta() as f32,
        phi_outer: c.position.phi() as f32,
        x_outer: c.position.x() as f32,
        y_outer: c.position.y() as f32,
        z_outer: c.position.z() as f32,
        t_outer: c.position.t() as f32,
    }
}

/// Convert one candidate into a tower record.
pub fn tower_record(c: &Candidate) -> TowerRecord {
    TowerRecord {
        et: c.momentum.pt() as f32,
        eta: c.momentum.eta() as f32,
        phi: c.momentum.phi() as f32,
        e: c.momentum.e as f32,
        eem: c.eem as f32,
        ehad: c.ehad as f32,
        edges: c.edges.map(|e| e as f32),
        t_outer: c.position.t() as f32,
        n_times: c.n_times,
    }
}

/// Convert one candidate into a photon record.
pub fn photon_record(c: &Candidate) -> PhotonRecord {
    PhotonRecord {
        pt: c.momentum.pt() as f32,
        eta: c.momentum.eta() as f32,
        phi: c.momentum.phi() as f32,
        e: c.momentum.e as f32,
        ehad_over_eem: if c.eem > 0.0 { (c.ehad / c.eem) as f32 } else { 0.0 },
        isolation_var_dbeta: c.isolation_var_dbeta as f32,
        isolation_var_rho_corr: c.isolation_var_rho_corr as f32,
        track_isolation_var: c.track_isolation_var as f32,
        charged_hadron_energy: c.charged_hadron_energy as f32,
        neutral_energy: c.neutral_energy as f32,
        charged_pu_energy: c.charged_pu_energy as f32,
        all_particle_energy: c.all_particle_energy as f32,
        t_outer: c.position.t() as f32,
    }
}

/// Convert one candidate into a jet record.
pub fn jet_record(c: &Candidate) -> JetRecord {
    JetRecord {
        pt: c.momentum.pt() as f32,
        eta: c.momentum.eta() as f32,
        phi: c.momentum.phi() as f32,
        mass: c.momentum.mass() as f32,
        delta_eta: c.delta_eta as f32,
        delta_phi: c.delta_phi as f32,
        n_constituents: c.children.len() as i32,
        btag_algo: c.btag.algo,
        btag_default: c.btag.default,
        btag_physics: c.btag.physics,
        btag_nearest2: c.btag.nearest2,
        btag_nearest3: c.btag.nearest3,
        btag_heaviest: c.btag.heaviest,
        btag_highest_pt: c.btag.highest_pt,
        flavour_algo: c.flavour.algo,
        flavour_default: c.flavour.default,
        flavour_physics: c.flavour.physics,
        flavour_nearest2: c.flavour.nearest2,
        flavour_nearest3: c.flavour.nearest3,
        flavour_heaviest: c.flavour.heaviest,
        flavour_highest_pt: c.flavour.highest_pt,
        tau_tag: c.tau_tag,
        tau1: c.tau1 as f32,
        tau2: c.tau2 as f32,
        tau3: c.tau3 as f32,
        mass_drop: c.mass_drop as f32,
        w_tag: c.w_tag,
        top_tag: c.top_tag,
        h_tag: c.h_tag,
        trimmed: GroomedRecord::from_groomed(&c.trimmed),
        pruned: GroomedRecord::from_groomed(&c.pruned),
        soft_drop: GroomedRecord::from_groomed(&c.soft_drop),
        area: [
            c.area.px as f32,
            c.area.py as f32,
            c.area.pz as f32,
            c.area.e as f32,
        ],
    }
}

/// Convert one candidate into a rho record.
pub fn rho_record(c: &Candidate) -> RhoRecord {
    RhoRecord {
        rho: c.momentum.pt() as f32,
        edges: [c.edges[0] as f32, c.edges[1] as f32],
    }
}

/// Convert one momentum-sum candidate into a missing-ET record.
pub fn missing_et_record(c: &Candidate) -> MissingEtRecord {
    let neg = -c.momentum;
    MissingEtRecord { met: c.momentum.pt() as f32, phi: neg.phi() as f32 }
}

/// Convert one scalar-sum candidate into a scalar-HT record.
pub fn scalar_ht_record(c: &Candidate) -> ScalarHtRecord {
    ScalarHtRecord { ht: c.momentum.pt() as f32 }
}
