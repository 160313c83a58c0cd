//! End-to-end pipeline scenarios: propagation, calorimetry, jets, tagging,
//! isolation and the writer, wired exactly as a run configuration would.

use approx::assert_relative_eq;
use fd_core::{EventHeader, FourVector, Result};
use fd_modules::{BTagging, Calorimeter, Isolation, JetFinder, Merger, ParticlePropagator};
use fd_output::{BranchData, MemorySink, SharedEntries, TreeEntry, TreeWriter};
use fd_pipeline::{
    ArrayId, Config, InitContext, MemoryEventSource, Module, ParticleSeed, Pipeline,
    ProcessContext, SeedEvent,
};
use serde_json::json;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

fn eta_edges() -> Vec<f64> {
    (0..=20).map(|i| -2.5 + 0.25 * i as f64).collect()
}

fn phi_edges() -> Vec<f64> {
    (0..=16).map(|i| -PI + PI / 8.0 * i as f64).collect()
}

fn base_config(seed: u64) -> serde_json::Value {
    json!({
        "Run": { "RandomSeed": seed },
        "ParticlePropagator": { "Radius": 1.0, "HalfLength": 3.0, "Bz": 0.0 },
        "Calorimeter": {
            "EtaPhiBins": [eta_edges(), phi_edges()],
            "EnergyFraction": [
                22, [1.0, 0.0],
                11, [1.0, 0.0],
                12, [0.0, 0.0],
                13, [0.0, 0.0],
                14, [0.0, 0.0],
                16, [0.0, 0.0]
            ],
            "ECalResolutionFormula": "0",
            "HCalResolutionFormula": "0",
            "TimingEMin": 4.0
        },
        "JetFinder": { "JetAlgorithm": 6, "ParameterR": 0.5, "JetPTMin": 5.0 },
        "BTagging": {
            "BitNumber": 0,
            "DeltaR": 0.5,
            "EfficiencyFormula": [0, "0.0", 5, "0.7*(pt > 10.0)"]
        },
        "Isolation": {
            "CandidateInputArray": "Calorimeter/photons",
            "IsolationInputArray": "Calorimeter/eflowTracks",
            "TrackInputArray": "Calorimeter/eflowTracks",
            "DeltaRMax": 0.5,
            "PTMin": 0.5
        },
        "Merger": {
            "InputArray": ["Calorimeter/eflowTracks", "Calorimeter/eflowTowers"]
        },
        "TreeWriter": {
            "Branch": [
                ["Reader/allParticles", "Particle", "GenParticle"],
                ["Calorimeter/towers", "Tower", "Tower"],
                ["Calorimeter/photons", "Photon", "Photon"],
                ["Calorimeter/eflowTowers", "EFlowTower", "Tower"],
                ["Calorimeter/eflowTracks", "EFlowTrack", "Track"],
                ["JetFinder/jets", "Jet", "Jet"],
                ["Merger/momentum", "MissingET", "MissingET"],
                ["Merger/energy", "ScalarHT", "ScalarHT"]
            ]
        }
    })
}

fn stable(pid: i32, charge: i32, pt: f64, eta: f64, phi: f64) -> ParticleSeed {
    ParticleSeed {
        pid,
        status: 1,
        m1: -1,
        m2: -1,
        d1: -1,
        d2: -1,
        charge,
        momentum: FourVector::from_pt_eta_phi_e(pt, eta, phi, pt * eta.cosh()),
        ..ParticleSeed::default()
    }
}

fn parton(pid: i32, status: i32, pt: f64, eta: f64, phi: f64) -> ParticleSeed {
    ParticleSeed { status, ..stable(pid, 0, pt, eta, phi) }
}

fn event(number: i64, particles: Vec<ParticleSeed>, lhe: Vec<ParticleSeed>) -> SeedEvent {
    SeedEvent {
        header: EventHeader { number, ..EventHeader::default() },
        particles,
        lhe_particles: lhe,
    }
}

/// Pipeline with the standard module chain plus an in-memory writer.
fn build_pipeline(config: serde_json::Value, probe: Option<Box<dyn Module>>) -> (Pipeline, SharedEntries) {
    let mut pipeline = Pipeline::new(Config::from_value(config).unwrap()).unwrap();
    pipeline.add_module("ParticlePropagator", Box::new(ParticlePropagator::new()));
    pipeline.add_module("Calorimeter", Box::new(Calorimeter::new()));
    pipeline.add_module("JetFinder", Box::new(JetFinder::new()));
    pipeline.add_module("BTagging", Box::new(BTagging::new()));
    pipeline.add_module("Isolation", Box::new(Isolation::new()));
    pipeline.add_module("Merger", Box::new(Merger::new()));
    if let Some(probe) = probe {
        pipeline.add_module("Probe", probe);
    }
    let sink = MemorySink::new();
    let entries = sink.handle();
    pipeline.add_module("TreeWriter", Box::new(TreeWriter::new(Box::new(sink))));
    (pipeline, entries)
}

fn run_one(config: serde_json::Value, events: Vec<SeedEvent>) -> Vec<TreeEntry> {
    let (mut pipeline, entries) = build_pipeline(config, None);
    let mut source = MemoryEventSource::new(events);
    let summary = pipeline.run(&mut source).unwrap();
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    let out = entries.lock().unwrap().clone();
    out
}

fn towers(entry: &TreeEntry, name: &str) -> Vec<fd_output::TowerRecord> {
    match entry.branch(name) {
        Some(BranchData::Tower(t)) => t.clone(),
        other => panic!("expected Tower branch '{name}', got {other:?}"),
    }
}

fn jets(entry: &TreeEntry) -> Vec<fd_output::JetRecord> {
    match entry.branch("Jet") {
        Some(BranchData::Jet(j)) => j.clone(),
        other => panic!("expected Jet branch, got {other:?}"),
    }
}

fn photons(entry: &TreeEntry) -> Vec<fd_output::PhotonRecord> {
    match entry.branch("Photon") {
        Some(BranchData::Photon(p)) => p.clone(),
        other => panic!("expected Photon branch, got {other:?}"),
    }
}

#[test]
fn test_single_photon_event() {
    // One stable photon, E = 100 GeV, at (eta, phi) = (0.3, 0.0).
    let photon_pt = 100.0 / 0.3f64.cosh();
    let entries = run_one(
        base_config(11),
        vec![event(1, vec![stable(22, 0, photon_pt, 0.3, 0.0)], vec![])],
    );
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];

    // One tower carrying the full electromagnetic energy (resolution off).
    let towers = towers(entry, "Tower");
    assert_eq!(towers.len(), 1);
    assert_relative_eq!(towers[0].eem, 100.0, epsilon = 1e-3);
    assert_relative_eq!(towers[0].ehad, 0.0);
    assert_relative_eq!(towers[0].e, 100.0, epsilon = 1e-3);

    // Preselected as a photon: e/gamma hits and no track in the tower.
    assert_eq!(photons(entry).len(), 1);

    // No track to subtract, so the full tower flows into eflowTowers.
    let eflow = match entry.branch("EFlowTower") {
        Some(BranchData::Tower(t)) => t.clone(),
        other => panic!("expected EFlowTower branch, got {other:?}"),
    };
    assert_eq!(eflow.len(), 1);
    assert_relative_eq!(eflow[0].eem, 100.0, epsilon = 1e-3);

    // One jet near 100 / cosh(0.3); the tower centre shifts it slightly.
    let jets = jets(entry);
    assert_eq!(jets.len(), 1);
    assert_relative_eq!(jets[0].pt as f64, photon_pt, epsilon = 0.05 * photon_pt);

    // The scalar sum over energy flow matches the tower pT.
    match entry.branch("ScalarHT") {
        Some(BranchData::ScalarHt(ht)) => {
            assert_eq!(ht.len(), 1);
            assert_relative_eq!(ht[0].ht, towers[0].et, epsilon = 1e-3);
        }
        other => panic!("expected ScalarHT branch, got {other:?}"),
    }
}

/// Checks jet-momentum closure and the DeltaEta/DeltaPhi definition from
/// inside the pipeline, where compositions are visible.
struct JetClosureProbe {
    jets: Option<ArrayId>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl Module for JetClosureProbe {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        self.jets = Some(ctx.import_array("JetFinder/jets")?);
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let jets = ctx.event.arrays.get(self.jets.expect("init ran")).to_vec();
        let mut failures = self.failures.lock().expect("probe lock");
        for jet_id in jets {
            let jet = ctx.event.factory.get(jet_id);
            let mut sum = FourVector::default();
            let mut deta_max = 0.0f64;
            let mut dphi_max = 0.0f64;
            for &child in &jet.children {
                let p = ctx.event.factory.get(child).momentum;
                sum += p;
                deta_max = deta_max.max((jet.momentum.eta() - p.eta()).abs());
                dphi_max = dphi_max.max(jet.momentum.delta_phi(&p).abs());
            }
            let rel = (sum.e - jet.momentum.e).abs() / jet.momentum.e.max(1e-12);
            if rel > 1e-6 {
                failures.push(format!("constituent sum off by {rel}"));
            }
            if (deta_max - jet.delta_eta).abs() > 1e-9 || (dphi_max - jet.delta_phi).abs() > 1e-9
            {
                failures.push("DeltaEta/DeltaPhi mismatch".into());
            }
        }
        Ok(())
    }
}

#[test]
fn test_back_to_back_jets_with_flavour() {
    // Two stable u quarks, pt 200, eta +-0.5, phi differing by pi, plus
    // post-shower partons and slightly displaced matrix-element partons.
    let particles = vec![
        stable(2, 0, 200.0, 0.5, 0.3),
        stable(2, 0, 200.0, -0.5, 0.3 - PI),
        parton(2, 2, 200.0, 0.5, 0.3),
        parton(2, 2, 200.0, -0.5, 0.3 - PI),
    ];
    // Offset so the post-shower partons do not count as LHE duplicates.
    let lhe = vec![parton(2, 1, 200.0, 0.5, 0.31), parton(2, 1, 200.0, -0.5, 0.31 - PI)];

    let failures = Arc::new(Mutex::new(Vec::new()));
    let probe = JetClosureProbe { jets: None, failures: Arc::clone(&failures) };
    let (mut pipeline, entries) = build_pipeline(base_config(5), Some(Box::new(probe)));
    let mut source = MemoryEventSource::new(vec![event(1, particles, lhe)]);
    let summary = pipeline.run(&mut source).unwrap();
    assert_eq!(summary.processed, 1);
    let closure_failures = failures.lock().unwrap();
    assert!(closure_failures.is_empty(), "{closure_failures:?}");
    drop(closure_failures);

    let entries = entries.lock().unwrap();
    let jet_records = jets(&entries[0]);
    assert_eq!(jet_records.len(), 2);
    for jet in &jet_records {
        // One post-smearing tower each.
        assert_eq!(jet.n_constituents, 1);
        assert_eq!(jet.flavour_algo, 2);
        assert_eq!(jet.flavour_physics, 2);
        assert_eq!(jet.flavour_highest_pt, 2);
        // Flavour values stay in the physical set.
        for f in [jet.flavour_default, jet.flavour_nearest2, jet.flavour_nearest3] {
            assert!(f == 0 || f == 21 || (1..=5).contains(&f), "flavour {f}");
        }
    }
}

#[test]
fn test_pileup_isolation_around_photon() {
    // Scenario 1 plus twenty soft charged pions in the isolation cone but
    // outside the photon's tower.
    let photon_pt = 100.0 / 0.3f64.cosh();
    let mut particles = vec![stable(22, 0, photon_pt, 0.3, 0.0)];
    for i in 0..20 {
        particles.push(stable(211, 1, 2.0, 0.05 + 1e-4 * i as f64, 0.1));
    }
    let entries = run_one(base_config(23), vec![event(1, particles, vec![])]);
    let entry = &entries[0];

    // The photon tower has no track hit, so it survives preselection.
    let photon_records = photons(entry);
    assert_eq!(photon_records.len(), 1);
    let photon = &photon_records[0];

    // Twenty tracks, pt 2 each, all inside DeltaR 0.5 of the photon.
    assert!(photon.charged_hadron_energy > 39.0, "{}", photon.charged_hadron_energy);
    assert!(photon.isolation_var_dbeta > 0.0);
    assert!(photon.track_isolation_var > 0.0);
    assert_relative_eq!(
        photon.isolation_var_dbeta,
        photon.charged_hadron_energy / photon.pt,
        epsilon = 1e-5
    );

    // Track-subtracted pion towers leave no energy-flow excess.
    let eflow = towers(entry, "EFlowTower");
    assert_eq!(eflow.len(), 1, "only the photon tower should remain: {eflow:?}");
}

#[test]
fn test_btag_determinism_with_shared_draw() {
    // A b quark at eta ~ 0, pt 150, with the hadronic activity to match.
    let particles = vec![
        stable(211, 1, 50.0, 0.125, PI / 16.0),
        stable(211, 1, 50.0, 0.125, PI / 16.0),
        stable(211, -1, 50.0, 0.125, PI / 16.0),
        parton(5, 2, 150.0, 0.125, PI / 16.0),
    ];

    let first = run_one(base_config(77), vec![event(1, particles.clone(), vec![])]);
    let second = run_one(base_config(77), vec![event(1, particles, vec![])]);
    // Same seed, same input: bit-identical output.
    assert_eq!(first, second);

    let jet_records = jets(&first[0]);
    assert_eq!(jet_records.len(), 1);
    let jet = &jet_records[0];
    assert_eq!(jet.flavour_heaviest, 5);
    assert_eq!(jet.flavour_algo, 5);
    assert_eq!(jet.flavour_default, 5);

    // One shared uniform draw per jet: variants with the same flavour and
    // formula decide identically.
    assert_eq!(jet.btag_heaviest, jet.btag_algo);
    assert_eq!(jet.btag_heaviest, jet.btag_default);
    assert_eq!(jet.btag_heaviest & !1u32, 0, "only bit 0 may be touched");
    // No matrix-element partons: the physics flavour stays 0, key-0
    // formula is 0.0, so the bit stays clear.
    assert_eq!(jet.flavour_physics, 0);
    assert_eq!(jet.btag_physics, 0);
}

#[test]
fn test_particle_on_last_eta_edge_is_dropped() {
    // Bin directly on the reader positions and pin the last eta edge to the
    // exact pseudorapidity the calorimeter will compute for the particle.
    let position = FourVector::from_pt_eta_phi_e(1.0, 2.5, 0.1, 0.0);
    let mut edges = eta_edges();
    *edges.last_mut().unwrap() = position.eta();

    let mut config = base_config(3);
    config["Calorimeter"]["EtaPhiBins"] = json!([edges, phi_edges()]);
    config["Calorimeter"]["ParticleInputArray"] = json!("Reader/stableParticles");
    config["Calorimeter"]["TrackInputArray"] = json!("Reader/partons");

    let mut photon = stable(22, 0, 50.0, 2.5, 0.1);
    photon.position = position;

    let entries = run_one(config, vec![event(1, vec![photon], vec![])]);
    let entry = &entries[0];
    assert_eq!(towers(entry, "Tower").len(), 0);
    assert_eq!(jets(entry).len(), 0);
}

#[test]
fn test_substructure_gate_at_200() {
    // Two towers in adjacent eta bins at the same phi; bin-centre particles
    // keep the tower pts exact.
    let below = vec![
        stable(22, 0, 99.4, 0.125, PI / 16.0),
        stable(22, 0, 99.6, 0.375, PI / 16.0),
    ];
    let above = vec![
        stable(22, 0, 100.4, 0.125, PI / 16.0),
        stable(22, 0, 100.8, 0.375, PI / 16.0),
    ];

    let entries = run_one(base_config(9), vec![event(1, below, vec![])]);
    let jet_records = jets(&entries[0]);
    assert_eq!(jet_records.len(), 1);
    let jet = &jet_records[0];
    assert!(jet.pt < 200.0);
    // Below the gate: substructure stays at its sentinel zeros.
    assert_eq!(jet.trimmed.n_subjets, 0);
    assert_eq!(jet.trimmed.mass, 0.0);
    assert_eq!(jet.tau1, 0.0);
    assert_eq!(jet.tau2, 0.0);
    assert_eq!(jet.mass_drop, 0.0);
    assert_eq!(jet.w_tag, 0);

    let entries = run_one(base_config(9), vec![event(1, above, vec![])]);
    let jet_records = jets(&entries[0]);
    assert_eq!(jet_records.len(), 1);
    let jet = &jet_records[0];
    assert!(jet.pt > 200.0);
    // Above the gate: trimming and N-subjettiness are populated.
    assert_eq!(jet.trimmed.n_subjets, 2);
    assert!(jet.trimmed.mass > 0.0);
    assert!(jet.tau1 > 0.0);
    // Both subjets are single massless towers, so the largest subjet mass
    // and with it the mass drop are zero.
    assert_eq!(jet.mass_drop, 0.0);
    // A two-prong jet of ~25 GeV trimmed mass is no W candidate.
    assert_eq!(jet.w_tag, 0);
}
