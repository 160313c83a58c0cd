//! Generalised-kt sequential recombination with optional ghost areas.
//!
//! The engine behind the jet finder is a capability interface so any
//! equivalent clustering implementation can be substituted; the
//! [`NativeClusterEngine`] provides the three recombination algorithms with
//! an N^2 nearest-neighbour scheme and explicit-ghost active areas.

use crate::pseudojet::PseudoJet;
use fd_core::{Error, FourVector, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::f64::consts::PI;

/// Jet algorithm, by the configuration ids of the legacy cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JetAlgorithm {
    /// CDF JetClu cone (id 1, plugin-only).
    JetClu,
    /// CDF midpoint cone (id 2, plugin-only).
    MidPoint,
    /// Seedless infrared-safe cone (id 3, plugin-only).
    SisCone,
    /// Inclusive kt (id 4).
    Kt,
    /// Cambridge/Aachen (id 5).
    CambridgeAachen,
    /// Anti-kt (id 6, the default).
    AntiKt,
}

impl JetAlgorithm {
    /// Decode a configuration id.
    pub fn from_id(id: i64) -> Result<Self> {
        Ok(match id {
            1 => JetAlgorithm::JetClu,
            2 => JetAlgorithm::MidPoint,
            3 => JetAlgorithm::SisCone,
            4 => JetAlgorithm::Kt,
            5 => JetAlgorithm::CambridgeAachen,
            6 => JetAlgorithm::AntiKt,
            _ => return Err(Error::External(format!("unknown jet algorithm id {id}"))),
        })
    }

    /// Exponent p of the generalised-kt measure, `None` for cone plugins.
    pub fn power(self) -> Option<f64> {
        match self {
            JetAlgorithm::Kt => Some(1.0),
            JetAlgorithm::CambridgeAachen => Some(0.0),
            JetAlgorithm::AntiKt => Some(-1.0),
            _ => None,
        }
    }
}

/// Algorithm plus radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JetDefinition {
    /// Clustering algorithm.
    pub algorithm: JetAlgorithm,
    /// Radius parameter R.
    pub r: f64,
}

/// Ghost placement parameters for area evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostSpec {
    /// Ghosts cover |rapidity| up to this value.
    pub eta_max: f64,
    /// Number of ghost ensembles. Only the first is clustered.
    pub repeat: usize,
    /// Area per ghost.
    pub area: f64,
    /// Fractional positional scatter within a grid cell.
    pub grid_scatter: f64,
    /// Fractional pT scatter.
    pub pt_scatter: f64,
    /// Mean ghost pT.
    pub mean_ghost_pt: f64,
}

impl Default for GhostSpec {
    fn default() -> Self {
        Self {
            eta_max: 5.0,
            repeat: 1,
            area: 0.01,
            grid_scatter: 1.0,
            pt_scatter: 0.1,
            mean_ghost_pt: 1.0e-100,
        }
    }
}

/// Area evaluation strategy, by the configuration ids of the legacy cards.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaDefinition {
    /// No area evaluation (id 0).
    None,
    /// Active area with explicit ghosts (id 1).
    ActiveExplicitGhosts(GhostSpec),
    /// One-ghost passive area (id 2).
    OneGhostPassive(GhostSpec),
    /// Passive area (id 3).
    Passive(GhostSpec),
    /// Voronoi area (id 4, not provided by the native engine).
    Voronoi {
        /// Effective radius scale factor.
        effective_r_fact: f64,
    },
    /// Active area (id 5).
    Active(GhostSpec),
}

impl AreaDefinition {
    /// Decode a configuration id.
    pub fn from_id(id: i64, ghosts: GhostSpec, effective_r_fact: f64) -> Result<Self> {
        Ok(match id {
            0 => AreaDefinition::None,
            1 => AreaDefinition::ActiveExplicitGhosts(ghosts),
            2 => AreaDefinition::OneGhostPassive(ghosts),
            3 => AreaDefinition::Passive(ghosts),
            4 => AreaDefinition::Voronoi { effective_r_fact },
            5 => AreaDefinition::Active(ghosts),
            _ => return Err(Error::External(format!("unknown area definition id {id}"))),
        })
    }

    /// Ghost parameters, if this definition is ghost-based.
    pub fn ghost_spec(&self) -> Option<&GhostSpec> {
        match self {
            AreaDefinition::ActiveExplicitGhosts(g)
            | AreaDefinition::OneGhostPassive(g)
            | AreaDefinition::Passive(g)
            | AreaDefinition::Active(g) => Some(g),
            _ => None,
        }
    }

    /// Whether jets carry areas under this definition.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AreaDefinition::None)
    }
}

/// One clustered jet with constituents and area information.
#[derive(Debug, Clone)]
pub struct ClusteredJet {
    /// Jet four-momentum.
    pub p4: PseudoJet,
    /// Real constituents (ghosts excluded), in clustering order.
    pub constituents: Vec<PseudoJet>,
    /// Number of absorbed ghosts.
    pub n_ghosts: usize,
    /// Scalar area.
    pub area: f64,
    /// Four-vector area.
    pub area_4vector: FourVector,
}

impl ClusteredJet {
    /// Whether the jet contains no real constituent.
    pub fn is_pure_ghost(&self) -> bool {
        self.constituents.is_empty()
    }
}

/// Result of clustering one input list.
#[derive(Debug, Clone, Default)]
pub struct Clustering {
    /// Every inclusive jet, pure-ghost jets included, unsorted.
    pub jets: Vec<ClusteredJet>,
}

impl Clustering {
    /// Jets with pT at least `pt_min`, sorted by descending pT.
    pub fn inclusive_jets(&self, pt_min: f64) -> Vec<&ClusteredJet> {
        let mut out: Vec<&ClusteredJet> =
            self.jets.iter().filter(|j| j.p4.pt() >= pt_min).collect();
        out.sort_by(|a, b| b.p4.pt2().total_cmp(&a.p4.pt2()));
        out
    }

    /// Median pT density per unit area over jets with |rapidity| inside
    /// the given range. Pure-ghost jets participate, pulling the median
    /// towards the ambient background. Returns 0 without area information.
    pub fn median_rho(&self, rap_min: f64, rap_max: f64) -> f64 {
        let mut ratios: Vec<f64> = self
            .jets
            .iter()
            .filter(|j| {
                let y = j.p4.rap().abs();
                j.area > 0.0 && y >= rap_min && y <= rap_max
            })
            .map(|j| j.p4.pt() / j.area)
            .collect();
        if ratios.is_empty() {
            return 0.0;
        }
        ratios.sort_by(f64::total_cmp);
        let n = ratios.len();
        if n % 2 == 1 { ratios[n / 2] } else { 0.5 * (ratios[n / 2 - 1] + ratios[n / 2]) }
    }
}

/// Capability interface of the clustering collaborator:
/// inputs + definition + area strategy in, jets with areas out.
pub trait ClusterEngine {
    /// Check at init time that this engine supports the configuration.
    fn validate(&self, def: &JetDefinition, area: &AreaDefinition) -> Result<()>;

    /// Cluster one event's inputs.
    fn cluster(
        &self,
        inputs: &[PseudoJet],
        def: &JetDefinition,
        area: &AreaDefinition,
        rng: &mut StdRng,
    ) -> Result<Clustering>;
}

/// Built-in N^2 generalised-kt implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeClusterEngine;

impl ClusterEngine for NativeClusterEngine {
    fn validate(&self, def: &JetDefinition, area: &AreaDefinition) -> Result<()> {
        if def.algorithm.power().is_none() {
            return Err(Error::External(format!(
                "{:?} is a cone plugin; the native engine only provides kt, Cambridge/Aachen and anti-kt",
                def.algorithm
            )));
        }
        if !def.r.is_finite() || def.r <= 0.0 {
            return Err(Error::External(format!("invalid radius {}", def.r)));
        }
        if matches!(area, AreaDefinition::Voronoi { .. }) {
            return Err(Error::External(
                "Voronoi areas are not provided by the native engine".into(),
            ));
        }
        Ok(())
    }

    fn cluster(
        &self,
        inputs: &[PseudoJet],
        def: &JetDefinition,
        area: &AreaDefinition,
        rng: &mut StdRng,
    ) -> Result<Clustering> {
        self.validate(def, area)?;
        let Some(p) = def.algorithm.power() else {
            return Err(Error::External("cone plugins have no recombination power".into()));
        };

        let mut protos: Vec<Proto> = inputs.iter().map(|j| Proto::particle(*j, p)).collect();
        if let Some(spec) = area.ghost_spec() {
            let (ghosts, cell_area) = make_ghosts(spec, rng);
            protos.extend(ghosts.into_iter().map(|g| Proto::ghost(g, p, cell_area)));
        }

        let jets = cluster_protos(protos, def.r * def.r, p);
        Ok(Clustering {
            jets: jets
                .into_iter()
                .map(|proto| ClusteredJet {
                    p4: proto.p4,
                    constituents: proto.constituents,
                    n_ghosts: proto.n_ghosts,
                    area: proto.area,
                    area_4vector: proto.area_4vector,
                })
                .collect(),
        })
    }
}

// ── Internal clustering machinery ──────────────────────────────

#[derive(Debug, Clone)]
struct Proto {
    p4: PseudoJet,
    rap: f64,
    phi: f64,
    /// pt^2p, the beam distance of the generalised-kt measure.
    di_beam: f64,
    constituents: Vec<PseudoJet>,
    n_ghosts: usize,
    area: f64,
    area_4vector: FourVector,
}

impl Proto {
    fn particle(p4: PseudoJet, p: f64) -> Self {
        Self {
            rap: p4.rap(),
            phi: p4.phi(),
            di_beam: p4.pt2().powf(p),
            constituents: vec![p4],
            n_ghosts: 0,
            area: 0.0,
            area_4vector: FourVector::default(),
            p4,
        }
    }

    fn ghost(p4: PseudoJet, p: f64, cell_area: f64) -> Self {
        let pt = p4.pt();
        let scale = if pt > 0.0 { cell_area / pt } else { 0.0 };
        Self {
            rap: p4.rap(),
            phi: p4.phi(),
            di_beam: p4.pt2().powf(p),
            constituents: Vec::new(),
            n_ghosts: 1,
            area: cell_area,
            area_4vector: FourVector::new(
                p4.px * scale,
                p4.py * scale,
                p4.pz * scale,
                p4.e * scale,
            ),
            p4,
        }
    }

    fn merge(a: &Proto, b: &Proto, p: f64) -> Self {
        let p4 = a.p4.combined_with(&b.p4);
        let mut constituents = a.constituents.clone();
        constituents.extend_from_slice(&b.constituents);
        Self {
            rap: p4.rap(),
            phi: p4.phi(),
            di_beam: p4.pt2().powf(p),
            constituents,
            n_ghosts: a.n_ghosts + b.n_ghosts,
            area: a.area + b.area,
            area_4vector: a.area_4vector + b.area_4vector,
            p4,
        }
    }
}

fn pair_distance(a: &Proto, b: &Proto, r2: f64) -> f64 {
    let dy = a.rap - b.rap;
    let dphi = fd_core::wrap_phi(a.phi - b.phi);
    let dr2 = dy * dy + dphi * dphi;
    a.di_beam.min(b.di_beam) * dr2 / r2
}

/// Run the recombination to completion; every proto ends up in a jet.
fn cluster_protos(mut protos: Vec<Proto>, r2: f64, p: f64) -> Vec<Proto> {
    let n = protos.len();
    let mut alive: Vec<bool> = vec![true; n];
    let mut nn_dist: Vec<f64> = vec![f64::INFINITY; n];
    let mut nn_who: Vec<usize> = vec![usize::MAX; n];

    let recompute_nn = |i: usize,
                        protos: &[Proto],
                        alive: &[bool],
                        nn_dist: &mut [f64],
                        nn_who: &mut [usize]| {
        nn_dist[i] = f64::INFINITY;
        nn_who[i] = usize::MAX;
        for j in 0..protos.len() {
            if j == i || !alive[j] {
                continue;
            }
            let d = pair_distance(&protos[i], &protos[j], r2);
            if d < nn_dist[i] {
                nn_dist[i] = d;
                nn_who[i] = j;
            }
        }
    };

    for i in 0..n {
        recompute_nn(i, &protos, &alive, &mut nn_dist, &mut nn_who);
    }

    let mut jets = Vec::new();
    let mut remaining = n;
    while remaining > 0 {
        // Global minimum over beam and pair distances.
        let mut best = f64::INFINITY;
        let mut bi = usize::MAX;
        let mut is_beam = true;
        for i in 0..n {
            if !alive[i] {
                continue;
            }
            if protos[i].di_beam < best {
                best = protos[i].di_beam;
                bi = i;
                is_beam = true;
            }
            if nn_dist[i] < best {
                best = nn_dist[i];
                bi = i;
                is_beam = false;
            }
        }

        if is_beam {
            alive[bi] = false;
            remaining -= 1;
            jets.push(protos[bi].clone());
            for k in 0..n {
                if alive[k] && nn_who[k] == bi {
                    recompute_nn(k, &protos, &alive, &mut nn_dist, &mut nn_who);
                }
            }
        } else {
            let bj = nn_who[bi];
            let merged = Proto::merge(&protos[bi], &protos[bj], p);
            protos[bi] = merged;
            alive[bj] = false;
            remaining -= 1;
            recompute_nn(bi, &protos, &alive, &mut nn_dist, &mut nn_who);
            for k in 0..n {
                if !alive[k] || k == bi {
                    continue;
                }
                if nn_who[k] == bi || nn_who[k] == bj {
                    recompute_nn(k, &protos, &alive, &mut nn_dist, &mut nn_who);
                } else {
                    let d = pair_distance(&protos[k], &protos[bi], r2);
                    if d < nn_dist[k] {
                        nn_dist[k] = d;
                        nn_who[k] = bi;
                    }
                }
            }
        }
    }

    jets
}

/// Lay one ghost ensemble over |rap| < eta_max; returns (ghosts, cell area).
fn make_ghosts(spec: &GhostSpec, rng: &mut StdRng) -> (Vec<PseudoJet>, f64) {
    let cell = spec.area.sqrt();
    let n_rap = ((2.0 * spec.eta_max / cell).ceil() as usize).max(1);
    let n_phi = ((2.0 * PI / cell).ceil() as usize).max(1);
    let drap = 2.0 * spec.eta_max / n_rap as f64;
    let dphi = 2.0 * PI / n_phi as f64;
    let cell_area = drap * dphi;

    let mut ghosts = Vec::with_capacity(n_rap * n_phi);
    for iy in 0..n_rap {
        for ip in 0..n_phi {
            let scatter_y: f64 = rng.gen_range(-0.5..0.5) * spec.grid_scatter;
            let scatter_phi: f64 = rng.gen_range(-0.5..0.5) * spec.grid_scatter;
            let rap = -spec.eta_max + (iy as f64 + 0.5 + scatter_y) * drap;
            let phi = (ip as f64 + 0.5 + scatter_phi) * dphi;
            let pt_jitter: f64 = rng.gen_range(-1.0..1.0) * spec.pt_scatter;
            let pt = spec.mean_ghost_pt * (1.0 + pt_jitter);
            // Massless, so rapidity equals pseudorapidity.
            ghosts.push(PseudoJet::from_four_vector(
                fd_core::FourVector::from_pt_eta_phi_m(pt, rap, phi, 0.0),
                -1,
            ));
        }
    }
    (ghosts, cell_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fd_core::FourVector;
    use rand::SeedableRng;

    fn pj(pt: f64, eta: f64, phi: f64) -> PseudoJet {
        PseudoJet::from_four_vector(FourVector::from_pt_eta_phi_m(pt, eta, phi, 0.0), 0)
    }

    fn antikt() -> JetDefinition {
        JetDefinition { algorithm: JetAlgorithm::AntiKt, r: 0.5 }
    }

    #[test]
    fn test_two_collinear_particles_merge() {
        let engine = NativeClusterEngine;
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = [pj(50.0, 0.0, 0.0), pj(30.0, 0.1, 0.05)];
        let clustering =
            engine.cluster(&inputs, &antikt(), &AreaDefinition::None, &mut rng).unwrap();
        let jets = clustering.inclusive_jets(1.0);
        assert_eq!(jets.len(), 1);
        assert_eq!(jets[0].constituents.len(), 2);
        assert_relative_eq!(jets[0].p4.pt(), 79.9, epsilon = 0.2);
    }

    #[test]
    fn test_back_to_back_stay_separate() {
        let engine = NativeClusterEngine;
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = [pj(200.0, 0.5, 0.3), pj(200.0, -0.5, 0.3 - PI)];
        let clustering =
            engine.cluster(&inputs, &antikt(), &AreaDefinition::None, &mut rng).unwrap();
        let jets = clustering.inclusive_jets(10.0);
        assert_eq!(jets.len(), 2);
        assert!(jets.iter().all(|j| j.constituents.len() == 1));
    }

    #[test]
    fn test_pt_ordering_of_inclusive_jets() {
        let engine = NativeClusterEngine;
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = [pj(30.0, 1.5, 1.0), pj(90.0, -1.0, -2.0), pj(60.0, 0.0, 2.8)];
        let clustering =
            engine.cluster(&inputs, &antikt(), &AreaDefinition::None, &mut rng).unwrap();
        let jets = clustering.inclusive_jets(0.0);
        let pts: Vec<f64> = jets.iter().map(|j| j.p4.pt()).collect();
        assert!(pts.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_ghost_area_of_isolated_jet() {
        let engine = NativeClusterEngine;
        let mut rng = StdRng::seed_from_u64(7);
        let spec = GhostSpec { area: 0.05, ..GhostSpec::default() };
        let inputs = [pj(120.0, 0.0, 1.0)];
        let clustering = engine
            .cluster(&inputs, &antikt(), &AreaDefinition::Active(spec), &mut rng)
            .unwrap();
        let jets = clustering.inclusive_jets(10.0);
        assert_eq!(jets.len(), 1);
        // An isolated anti-kt jet is a circle of radius R.
        let expected = PI * 0.5 * 0.5;
        assert_relative_eq!(jets[0].area, expected, epsilon = 0.25 * expected);
        // The area 4-vector points along the jet.
        assert_relative_eq!(jets[0].area_4vector.phi(), 1.0, epsilon = 0.2);
    }

    #[test]
    fn test_median_rho_vanishes_without_background() {
        let engine = NativeClusterEngine;
        let mut rng = StdRng::seed_from_u64(7);
        let spec = GhostSpec { area: 0.05, ..GhostSpec::default() };
        let inputs = [pj(120.0, 0.0, 1.0)];
        let clustering = engine
            .cluster(&inputs, &antikt(), &AreaDefinition::Active(spec), &mut rng)
            .unwrap();
        // Almost every jet in range is pure ghost, so the median is ~0.
        assert!(clustering.median_rho(0.0, 4.0) < 1e-50);
    }

    #[test]
    fn test_cone_plugins_are_rejected() {
        let engine = NativeClusterEngine;
        let def = JetDefinition { algorithm: JetAlgorithm::SisCone, r: 0.5 };
        assert!(engine.validate(&def, &AreaDefinition::None).is_err());
    }
}
