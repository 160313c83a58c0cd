//! Write-then-read round-trips through the JSON-lines sink.

use fd_core::GeneratorEvent;
use fd_output::{
    BranchData, EventRecord, GenParticleRecord, JetRecord, JsonLinesSink, MissingEtRecord,
    RhoRecord, ScalarHtRecord, TowerRecord, TreeEntry, TreeSink,
};

fn sample_entry() -> TreeEntry {
    // Values chosen to be awkward in decimal: f32 round-tripping must still
    // be bit-exact.
    let particle = GenParticleRecord {
        pid: -5,
        status: 2,
        m1: 3,
        m2: -1,
        d1: 7,
        d2: 8,
        charge: -1,
        mass: 4.18,
        e: 1.0 / 3.0,
        px: 0.1,
        py: -0.2,
        pz: 1e-7,
        pt: 0.223_606_8,
        eta: -2.973_153,
        phi: std::f32::consts::PI,
        rapidity: -2.95,
        t: 999_999.0,
        ..GenParticleRecord::default()
    };
    let tower = TowerRecord {
        et: 93.170_42,
        eta: 0.375,
        phi: 0.196_349_54,
        e: 100.0,
        eem: 100.0,
        ehad: 0.0,
        edges: [0.25, 0.5, 0.0, 0.392_699_08],
        t_outer: 999_999.0,
        n_times: 1,
    };
    let jet = JetRecord {
        pt: 201.2,
        eta: 0.25,
        phi: 0.196_35,
        mass: 25.2,
        btag_heaviest: 1,
        flavour_heaviest: 5,
        tau1: 0.062_17,
        ..JetRecord::default()
    };
    TreeEntry {
        event: EventRecord {
            number: 42,
            read_time: 0.001,
            proc_time: 0.017,
            generator: Some(GeneratorEvent::Lhef {
                process_id: 661,
                weight: 1.25e-3,
                scale_pdf: 91.2,
                alpha_qed: 0.0078125,
                alpha_qcd: 0.118,
            }),
        },
        branches: vec![
            ("Particle".into(), BranchData::GenParticle(vec![particle])),
            ("Tower".into(), BranchData::Tower(vec![tower])),
            ("Jet".into(), BranchData::Jet(vec![jet])),
            ("Rho".into(), BranchData::Rho(vec![RhoRecord { rho: 1.5e-9, edges: [0.0, 2.5] }])),
            (
                "MissingET".into(),
                BranchData::MissingEt(vec![MissingEtRecord { met: 12.7, phi: -3.1 }]),
            ),
            ("ScalarHT".into(), BranchData::ScalarHt(vec![ScalarHtRecord { ht: 215.0 }])),
        ],
    }
}

#[test]
fn test_json_lines_roundtrip_is_bit_exact() {
    let path = std::env::temp_dir().join(format!("fd-roundtrip-{}.jsonl", std::process::id()));
    let entries = vec![sample_entry(), TreeEntry { event: EventRecord::default(), branches: vec![] }];

    let mut sink = JsonLinesSink::create(&path).unwrap();
    for entry in &entries {
        sink.fill(entry).unwrap();
    }
    sink.finish().unwrap();

    let back = JsonLinesSink::read_entries(&path).unwrap();
    std::fs::remove_file(&path).ok();

    // Integer fields identical, float fields to full f32 precision.
    assert_eq!(back, entries);
}

#[test]
fn test_branch_lookup_by_name() {
    let entry = sample_entry();
    assert!(matches!(entry.branch("Tower"), Some(BranchData::Tower(t)) if t.len() == 1));
    assert!(entry.branch("Nope").is_none());
}
