//! # fd-pipeline
//!
//! The module execution framework of FastDet:
//! - Hierarchical [`Config`] blocks with typed, defaulted lookups and ragged
//!   parameter lists.
//! - The [`ArrayRegistry`] directory of named candidate arrays connecting
//!   producers to consumers.
//! - The [`Module`] lifecycle (init / process / finish) and the [`Pipeline`]
//!   event loop with its error policy and run counters.
//! - The [`EventSource`] reader interface.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arrays;
pub mod config;
pub mod module;
pub mod pipeline;
pub mod source;

pub use arrays::{ArrayId, ArrayRegistry, ArrayStore};
pub use config::{Config, ModuleConfig, ParamList};
pub use module::{EventData, InitContext, Module, ProcessContext};
pub use pipeline::{Pipeline, ReaderArrays, RunSummary};
pub use source::{EventSource, MemoryEventSource, ParticleSeed, SeedEvent, SourceEvent};
