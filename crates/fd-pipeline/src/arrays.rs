//! Named candidate arrays.
//!
//! The process-wide registry maps `Module/array` paths to dense ids; the
//! per-event store holds the candidate id sequences behind those ids.
//! Export claims a path once for the whole run; import resolves a path that
//! some earlier module (or the reader) has already exported.

use fd_core::{CandidateId, Error, Result};
use std::collections::HashMap;

/// Dense handle of a named array, valid for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(pub(crate) usize);

/// Run-long directory of named arrays.
#[derive(Debug, Default)]
pub struct ArrayRegistry {
    ids: HashMap<String, ArrayId>,
    names: Vec<String>,
    owners: Vec<String>,
}

impl ArrayRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim ownership of a fresh array. Exporting an already-claimed path
    /// is a configuration error.
    pub fn export(&mut self, module: &str, path: &str) -> Result<ArrayId> {
        if let Some(id) = self.ids.get(path) {
            return Err(Error::config(
                module,
                path,
                format!("array already exported by module '{}'", self.owners[id.0]),
            ));
        }
        let id = ArrayId(self.names.len());
        self.ids.insert(path.to_string(), id);
        self.names.push(path.to_string());
        self.owners.push(module.to_string());
        Ok(id)
    }

    /// Resolve a previously exported path. Repeated imports are fine.
    pub fn import(&self, module: &str, path: &str) -> Result<ArrayId> {
        self.ids
            .get(path)
            .copied()
            .ok_or_else(|| Error::Resolve { module: module.to_string(), array: path.to_string() })
    }

    /// Number of registered arrays.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no array has been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Path of an array id.
    pub fn name(&self, id: ArrayId) -> &str {
        &self.names[id.0]
    }
}

/// Per-event contents of every registered array.
#[derive(Debug, Default)]
pub struct ArrayStore {
    arrays: Vec<Vec<CandidateId>>,
}

impl ArrayStore {
    /// Size the store for `n` registered arrays.
    pub fn resize(&mut self, n: usize) {
        self.arrays.resize_with(n, Vec::new);
    }

    /// Borrow an array's contents in producer insertion order.
    pub fn get(&self, id: ArrayId) -> &[CandidateId] {
        &self.arrays[id.0]
    }

    /// Append one candidate to an array.
    pub fn push(&mut self, id: ArrayId, candidate: CandidateId) {
        self.arrays[id.0].push(candidate);
    }

    /// Replace an array's contents.
    pub fn set(&mut self, id: ArrayId, candidates: Vec<CandidateId>) {
        self.arrays[id.0] = candidates;
    }

    /// Clear every array. Called at the event boundary.
    pub fn clear_all(&mut self) {
        for a in &mut self.arrays {
            a.clear();
        }
    }
}
