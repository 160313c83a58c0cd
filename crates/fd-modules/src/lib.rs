//! # fd-modules
//!
//! The physics modules of the FastDet reconstruction pipeline, all built on
//! the `fd-pipeline` framework and communicating through named arrays:
//! propagation, pile-up overlay, calorimetry, jet finding, flavour tagging,
//! isolation and the momentum merger feeding missing-ET / scalar-HT.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod btagging;
pub mod calorimeter;
pub mod isolation;
pub mod jetfinder;
pub mod merger;
pub mod pileup;
pub mod propagator;
pub mod tautagging;

pub use btagging::BTagging;
pub use calorimeter::Calorimeter;
pub use isolation::Isolation;
pub use jetfinder::JetFinder;
pub use merger::Merger;
pub use pileup::{CyclicPileUpSource, PileUpMerger, PileUpParticle, PileUpSource};
pub use propagator::ParticlePropagator;
pub use tautagging::TauTagging;
