//! The module abstraction and its execution contexts.

use crate::arrays::{ArrayId, ArrayRegistry, ArrayStore};
use crate::config::{Config, ModuleConfig};
use fd_core::{CandidateFactory, EventHeader, PdgTable, Result};
use rand::rngs::StdRng;

/// Everything a module touches while processing one event.
///
/// The factory and the array store are separate fields so a module can walk
/// one array while allocating candidates or filling another.
#[derive(Debug, Default)]
pub struct EventData {
    /// Arena owning every candidate of the current event.
    pub factory: CandidateFactory,
    /// Contents of the named arrays.
    pub arrays: ArrayStore,
    /// Header attached by the reader.
    pub header: EventHeader,
}

impl EventData {
    /// Reset to an empty event. Idempotent.
    pub fn clear(&mut self) {
        self.factory.clear();
        self.arrays.clear_all();
        self.header = EventHeader::default();
    }
}

/// Init-time context: configuration lookup and array declaration.
pub struct InitContext<'a> {
    pub(crate) module: &'a str,
    pub(crate) config: &'a Config,
    pub(crate) registry: &'a mut ArrayRegistry,
}

impl<'a> InitContext<'a> {
    /// This module's configuration block.
    pub fn config(&self) -> ModuleConfig<'a> {
        self.config.module(self.module)
    }

    /// Borrow the named array exported by an upstream module.
    pub fn import_array(&mut self, path: &str) -> Result<ArrayId> {
        self.registry.import(self.module, path)
    }

    /// Claim ownership of a fresh output array. The public path is
    /// `<module>/<name>`, which is what downstream imports must use.
    pub fn export_array(&mut self, name: &str) -> Result<ArrayId> {
        let path = format!("{}/{}", self.module, name);
        self.registry.export(self.module, &path)
    }

    /// Instance name of this module.
    pub fn module_name(&self) -> &'a str {
        self.module
    }
}

/// Per-event context: event data plus the shared run resources.
pub struct ProcessContext<'a> {
    /// The current event.
    pub event: &'a mut EventData,
    /// The process-wide random number generator. Modules draw sequentially
    /// in declaration order, which makes runs reproducible from the seed.
    pub rng: &'a mut StdRng,
    /// Read-only particle-property table.
    pub pdg: &'a PdgTable,
}

/// A processing stage in the pipeline.
///
/// Modules communicate solely through named arrays: no module calls another.
/// `init` runs once per module in declaration order, `process` once per
/// event in the same order, and `finish` once in reverse order.
pub trait Module {
    /// Read configuration, import inputs, export outputs. Errors abort the run.
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()>;

    /// Process one event. Errors abort the event, not the run.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()>;

    /// Run-end hook, e.g. for summaries. Infallible.
    fn finish(&mut self) {}
}
