//! The tree writer module and its sinks.
//!
//! One branch per exported array; every processed event appends one entry
//! per branch. The persistence format itself lives behind [`TreeSink`]: the
//! in-memory sink backs tests and round-trips, the JSON-lines sink backs the
//! command-line driver.

use crate::classes::{
    gen_particle_record, jet_record, missing_et_record, photon_record, rho_record,
    scalar_ht_record, tower_record, track_record, BranchClass, BranchData, EventRecord,
};
use fd_core::{Error, Result};
use fd_pipeline::{ArrayId, InitContext, Module, ProcessContext};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One event's worth of output: the event record plus every branch payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Event branch.
    pub event: EventRecord,
    /// Named branch payloads in configuration order.
    pub branches: Vec<(String, BranchData)>,
}

impl TreeEntry {
    /// Payload of a named branch.
    pub fn branch(&self, name: &str) -> Option<&BranchData> {
        self.branches.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }
}

/// Persistence behind the tree writer.
pub trait TreeSink {
    /// Append one event entry.
    fn fill(&mut self, entry: &TreeEntry) -> Result<()>;

    /// Flush at end of run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared handle onto the entries collected by a [`MemorySink`].
pub type SharedEntries = Arc<Mutex<Vec<TreeEntry>>>;

/// In-memory sink for tests and round-trip checks.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: SharedEntries,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that stays readable after the pipeline takes the sink.
    pub fn handle(&self) -> SharedEntries {
        Arc::clone(&self.entries)
    }
}

impl TreeSink for MemorySink {
    fn fill(&mut self, entry: &TreeEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::External("memory sink poisoned".into()))?
            .push(entry.clone());
        Ok(())
    }
}

/// One JSON document per event, newline separated.
#[derive(Debug)]
pub struct JsonLinesSink {
    out: BufWriter<std::fs::File>,
}

impl JsonLinesSink {
    /// Create or truncate the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { out: BufWriter::new(std::fs::File::create(path)?) })
    }

    /// Read every entry back from a JSON-lines file.
    pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<TreeEntry>> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

impl TreeSink for JsonLinesSink {
    fn fill(&mut self, entry: &TreeEntry) -> Result<()> {
        serde_json::to_writer(&mut self.out, entry)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

struct BranchSpec {
    array: ArrayId,
    name: String,
    class: BranchClass,
}

/// The tree-writer module. Configure with a `Branch` parameter list of
/// (array path, branch name, class) triples.
pub struct TreeWriter {
    sink: Box<dyn TreeSink>,
    branches: Vec<BranchSpec>,
}

impl TreeWriter {
    /// Writer over the given sink.
    pub fn new(sink: Box<dyn TreeSink>) -> Self {
        Self { sink, branches: Vec::new() }
    }
}

impl Module for TreeWriter {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
        let cfg = ctx.config();
        let module = ctx.module_name().to_string();

        let param = cfg.get_param("Branch");
        for i in 0..param.size() {
            let triple = param.at(i)?;
            let array_path = triple.at(0)?.as_string()?;
            let name = triple.at(1)?.as_string()?;
            let class_name = triple.at(2)?.as_string()?;
            let class = BranchClass::from_name(&class_name).ok_or_else(|| {
                Error::config(&module, "Branch", format!("unknown class '{class_name}'"))
            })?;
            let array = ctx.import_array(&array_path)?;
            self.branches.push(BranchSpec { array, name, class });
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let mut entry = TreeEntry {
            event: EventRecord::from_header(&ctx.event.header),
            branches: Vec::with_capacity(self.branches.len()),
        };

        for spec in &self.branches {
            let candidates: Vec<&fd_core::Candidate> = ctx
                .event
                .arrays
                .get(spec.array)
                .iter()
                .map(|&id| ctx.event.factory.get(id))
                .collect();
            let data = match spec.class {
                BranchClass::GenParticle => BranchData::GenParticle(
                    candidates.iter().map(|c| gen_particle_record(c)).collect(),
                ),
                BranchClass::Track => {
                    BranchData::Track(candidates.iter().map(|c| track_record(c)).collect())
                }
                BranchClass::Tower => {
                    BranchData::Tower(candidates.iter().map(|c| tower_record(c)).collect())
                }
                BranchClass::Photon => {
                    BranchData::Photon(candidates.iter().map(|c| photon_record(c)).collect())
                }
                BranchClass::Jet => {
                    BranchData::Jet(candidates.iter().map(|c| jet_record(c)).collect())
                }
                BranchClass::Rho => {
                    BranchData::Rho(candidates.iter().map(|c| rho_record(c)).collect())
                }
                BranchClass::MissingEt => BranchData::MissingEt(
                    candidates.iter().map(|c| missing_et_record(c)).collect(),
                ),
                BranchClass::ScalarHt => BranchData::ScalarHt(
                    candidates.iter().map(|c| scalar_ht_record(c)).collect(),
                ),
            };
            entry.branches.push((spec.name.clone(), data));
        }

        self.sink.fill(&entry)
    }

    fn finish(&mut self) {
        if let Err(e) = self.sink.finish() {
            warn!(error = %e, "tree sink flush failed");
        }
    }
}
