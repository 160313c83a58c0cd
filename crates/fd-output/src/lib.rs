//! # fd-output
//!
//! The output surface of FastDet: per-class branch records (32-bit floats,
//! signed 32-bit indices with -1 sentinel), the [`TreeWriter`] module that
//! appends one entry per branch per event, and the [`TreeSink`] persistence
//! interface with in-memory and JSON-lines implementations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classes;
pub mod writer;

pub use classes::{
    gen_particle_record, jet_record, missing_et_record, photon_record, rho_record,
    scalar_ht_record, tower_record, track_record, BranchClass, BranchData, EventRecord,
    GenParticleRecord, GroomedRecord, JetRecord, MissingEtRecord, PhotonRecord, RhoRecord,
    ScalarHtRecord, TowerRecord, TrackRecord,
};
pub use writer::{JsonLinesSink, MemorySink, SharedEntries, TreeEntry, TreeSink, TreeWriter};
