//! # fd-cluster
//!
//! Jet clustering for FastDet:
//! - The [`ClusterEngine`] capability interface the jet finder consumes,
//!   with the built-in [`NativeClusterEngine`] (kt, Cambridge/Aachen,
//!   anti-kt; explicit-ghost areas; jet-median rho).
//! - Substructure tools: trimming, pruning, soft drop and N-subjettiness.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod pseudojet;
pub mod substructure;

pub use cluster::{
    AreaDefinition, ClusterEngine, ClusteredJet, Clustering, GhostSpec, JetAlgorithm,
    JetDefinition, NativeClusterEngine,
};
pub use pseudojet::PseudoJet;
pub use substructure::{ca_cluster, nsubjettiness, prune, soft_drop, trim, GroomOutcome};
