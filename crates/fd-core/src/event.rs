//! Event header entities.
//!
//! Attached by the reader, carried through the run loop, and written to the
//! event branch. They do not participate in the module graph.

use serde::{Deserialize, Serialize};

/// Generator-level event information, by reader flavour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneratorEvent {
    /// Les Houches event file record.
    Lhef {
        /// Subprocess code.
        process_id: i32,
        /// Event weight.
        weight: f64,
        /// PDF evaluation scale in GeV.
        scale_pdf: f64,
        /// QED coupling used in the event.
        alpha_qed: f64,
        /// QCD coupling used in the event.
        alpha_qcd: f64,
    },
    /// HepMC record.
    HepMc {
        /// Signal process id.
        process_id: i32,
        /// Number of multi-parton interactions.
        mpi: i32,
        /// Event weight.
        weight: f64,
        /// Energy scale.
        scale: f64,
        /// QED coupling.
        alpha_qed: f64,
        /// QCD coupling.
        alpha_qcd: f64,
        /// Flavour codes of the incoming partons.
        id1: i32,
        /// Flavour codes of the incoming partons.
        id2: i32,
        /// Beam momentum fractions.
        x1: f64,
        /// Beam momentum fractions.
        x2: f64,
        /// Q scale used for the PDFs, GeV.
        scale_pdf: f64,
        /// PDF value for the first parton.
        pdf1: f64,
        /// PDF value for the second parton.
        pdf2: f64,
    },
}

/// Per-event header: number, timing, and the optional generator record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Event number.
    pub number: i64,
    /// Wall-clock seconds spent reading the event.
    pub read_time: f64,
    /// Wall-clock seconds spent processing the event.
    pub proc_time: f64,
    /// Generator information, if the reader provides one.
    pub generator: Option<GeneratorEvent>,
}
