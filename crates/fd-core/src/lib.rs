//! # fd-core
//!
//! Core types for the FastDet detector-response simulation:
//! - The flat [`Candidate`] record and the per-event [`CandidateFactory`]
//!   arena that owns every candidate of an event.
//! - [`FourVector`] kinematics shared by momenta and positions.
//! - The [`Formula`] engine used for resolutions and efficiencies.
//! - The read-only [`PdgTable`] particle-property table.
//! - Event header entities attached by readers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod error;
pub mod event;
pub mod factory;
pub mod formula;
pub mod math;
pub mod pdg;

pub use candidate::{Candidate, CandidateId, Groomed, PileUpJetId, Subjet, VariantSet};
pub use error::{Error, Result};
pub use event::{EventHeader, GeneratorEvent};
pub use factory::CandidateFactory;
pub use formula::Formula;
pub use math::{wrap_phi, FourVector};
pub use pdg::{PdgEntry, PdgTable};
