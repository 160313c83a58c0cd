//! Pipeline assembly and the event loop.

use crate::arrays::{ArrayId, ArrayRegistry};
use crate::config::Config;
use crate::module::{EventData, InitContext, Module, ProcessContext};
use crate::source::{EventSource, SourceEvent};
use fd_core::{Error, PdgTable, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Array ids of the reader-owned inputs.
#[derive(Debug, Clone, Copy)]
pub struct ReaderArrays {
    /// `Reader/allParticles`
    pub all_particles: ArrayId,
    /// `Reader/stableParticles`
    pub stable_particles: ArrayId,
    /// `Reader/partons`
    pub partons: ArrayId,
    /// `Reader/LHEParticles`
    pub lhe_particles: ArrayId,
}

/// Run statistics reported at finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events fully processed.
    pub processed: u64,
    /// Events aborted by a module error.
    pub failed: u64,
    /// Events skipped before processing (malformed input, reader faults).
    pub skipped: u64,
}

/// Ordered collection of modules plus the shared run resources.
///
/// Modules are executed in declaration order; the order in which
/// [`Pipeline::add_module`] is called is the execution order per event.
pub struct Pipeline {
    config: Config,
    modules: Vec<(String, Box<dyn Module>)>,
    registry: ArrayRegistry,
    reader: Option<ReaderArrays>,
    rng: StdRng,
    pdg: PdgTable,
    stop: Arc<AtomicBool>,
    initialized: bool,
}

impl Pipeline {
    /// Build an empty pipeline. The random seed is read from the `Run`
    /// block (`RandomSeed`, default 0) and determines the whole stochastic
    /// trajectory of the run.
    pub fn new(config: Config) -> Result<Self> {
        let seed = config.module("Run").get_int("RandomSeed", 0)? as u64;
        Ok(Self {
            config,
            modules: Vec::new(),
            registry: ArrayRegistry::new(),
            reader: None,
            rng: StdRng::seed_from_u64(seed),
            pdg: PdgTable::standard(),
            stop: Arc::new(AtomicBool::new(false)),
            initialized: false,
        })
    }

    /// Override the configured random seed (CLI flag).
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Append a module. Declaration order is execution order.
    pub fn add_module(&mut self, name: impl Into<String>, module: Box<dyn Module>) {
        self.modules.push((name.into(), module));
    }

    /// Cooperative cancellation flag: set it from a signal handler and the
    /// loop stops after the current event.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Reader-owned array ids; available after [`Pipeline::init`].
    pub fn reader_arrays(&self) -> Option<ReaderArrays> {
        self.reader
    }

    /// Resolve an array path, e.g. for inspection in tests.
    pub fn find_array(&self, path: &str) -> Result<ArrayId> {
        self.registry.import("Pipeline", path)
    }

    /// Register the reader arrays and run every module's init in
    /// declaration order. Fatal on the first error.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let reader = ReaderArrays {
            all_particles: self.registry.export("Reader", "Reader/allParticles")?,
            stable_particles: self.registry.export("Reader", "Reader/stableParticles")?,
            partons: self.registry.export("Reader", "Reader/partons")?,
            lhe_particles: self.registry.export("Reader", "Reader/LHEParticles")?,
        };
        self.reader = Some(reader);

        for (name, module) in &mut self.modules {
            debug!(module = %name, "init");
            let mut ctx =
                InitContext { module: name, config: &self.config, registry: &mut self.registry };
            module.init(&mut ctx)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Drive the full run: init, the per-event loop, finish in reverse
    /// order, and the summary.
    pub fn run(&mut self, source: &mut dyn EventSource) -> Result<RunSummary> {
        self.init()?;
        let reader = self
            .reader
            .ok_or_else(|| Error::External("pipeline initialisation left no reader arrays".into()))?;

        let mut event = EventData::default();
        event.arrays.resize(self.registry.len());

        let mut summary = RunSummary::default();
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested, ending run after current event");
                break;
            }

            event.clear();
            let source_event = match source.next_event(&mut event.factory) {
                Ok(Some(ev)) => ev,
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "reader fault, skipping event");
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Err(e) = validate_input(&event, &source_event) {
                warn!(error = %e, "skipping malformed event");
                summary.skipped += 1;
                continue;
            }

            event.header = source_event.header;
            event.arrays.set(reader.all_particles, source_event.all_particles);
            event.arrays.set(reader.stable_particles, source_event.stable_particles);
            event.arrays.set(reader.partons, source_event.partons);
            event.arrays.set(reader.lhe_particles, source_event.lhe_particles);

            let mut aborted = false;
            for (name, module) in &mut self.modules {
                let mut ctx =
                    ProcessContext { event: &mut event, rng: &mut self.rng, pdg: &self.pdg };
                match module.process(&mut ctx) {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(module = %name, error = %e, "event aborted");
                        summary.failed += 1;
                        aborted = true;
                        break;
                    }
                }
            }
            if !aborted {
                summary.processed += 1;
            }
            if (summary.processed + summary.failed + summary.skipped) % 1000 == 0 {
                info!(processed = summary.processed, "event loop progress");
            }
        }

        for (name, module) in self.modules.iter_mut().rev() {
            debug!(module = %name, "finish");
            module.finish();
        }
        info!(
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            "run complete"
        );
        Ok(summary)
    }
}

/// Reject events with non-finite kinematics or mother/daughter indices
/// outside the allParticles range.
fn validate_input(event: &EventData, source_event: &SourceEvent) -> Result<()> {
    let n = source_event.all_particles.len() as i32;
    for (slot, &id) in source_event.all_particles.iter().enumerate() {
        let c = event.factory.get(id);
        if !c.momentum.is_finite() || !c.position.is_finite() {
            return Err(Error::Input(format!("non-finite kinematics at particle {slot}")));
        }
        for idx in [c.m1, c.m2, c.d1, c.d2] {
            if idx < -1 || idx >= n {
                return Err(Error::Input(format!(
                    "particle {slot} references index {idx} outside [-1, {n})"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryEventSource, ParticleSeed, SeedEvent};
    use fd_core::FourVector;

    struct Counter {
        input: Option<ArrayId>,
        output: Option<ArrayId>,
        seen: usize,
        fail_on: Option<usize>,
        events: usize,
    }

    impl Counter {
        fn new(fail_on: Option<usize>) -> Self {
            Self { input: None, output: None, seen: 0, fail_on, events: 0 }
        }
    }

    impl Module for Counter {
        fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<()> {
            self.input = Some(ctx.import_array("Reader/stableParticles")?);
            self.output = Some(ctx.export_array("selected")?);
            Ok(())
        }

        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
            self.events += 1;
            if self.fail_on == Some(self.events) {
                return Err(Error::Numeric("induced failure".into()));
            }
            assert!(
                ctx.event.factory.len() >= ctx.event.arrays.get(self.input.unwrap()).len(),
                "array entries must live in the pool"
            );
            let ids = ctx.event.arrays.get(self.input.unwrap()).to_vec();
            self.seen += ids.len();
            for id in ids {
                ctx.event.arrays.push(self.output.unwrap(), id);
            }
            Ok(())
        }
    }

    fn one_particle_event(number: i64) -> SeedEvent {
        SeedEvent {
            header: fd_core::EventHeader { number, ..Default::default() },
            particles: vec![ParticleSeed {
                pid: 22,
                status: 1,
                m1: -1,
                m2: -1,
                d1: -1,
                d2: -1,
                momentum: FourVector::from_pt_eta_phi_e(10.0, 0.1, 0.2, 10.1),
                ..Default::default()
            }],
            lhe_particles: vec![],
        }
    }

    #[test]
    fn test_run_processes_events_in_order() {
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.add_module("Counter", Box::new(Counter::new(None)));
        let mut source =
            MemoryEventSource::new(vec![one_particle_event(1), one_particle_event(2)]);
        let summary = pipeline.run(&mut source).unwrap();
        assert_eq!(summary, RunSummary { processed: 2, failed: 0, skipped: 0 });
    }

    #[test]
    fn test_process_error_aborts_event_not_run() {
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.add_module("Counter", Box::new(Counter::new(Some(1))));
        let mut source =
            MemoryEventSource::new(vec![one_particle_event(1), one_particle_event(2)]);
        let summary = pipeline.run(&mut source).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_malformed_event_is_skipped() {
        let mut bad = one_particle_event(1);
        bad.particles[0].momentum.e = f64::NAN;
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.add_module("Counter", Box::new(Counter::new(None)));
        let mut source = MemoryEventSource::new(vec![bad, one_particle_event(2)]);
        let summary = pipeline.run(&mut source).unwrap();
        assert_eq!(summary, RunSummary { processed: 1, failed: 0, skipped: 1 });
    }

    #[test]
    fn test_bad_mother_index_is_skipped() {
        let mut bad = one_particle_event(1);
        bad.particles[0].m1 = 5;
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.add_module("Counter", Box::new(Counter::new(None)));
        let mut source = MemoryEventSource::new(vec![bad]);
        let summary = pipeline.run(&mut source).unwrap();
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let mut pipeline = Pipeline::new(Config::default()).unwrap();
        pipeline.add_module("Counter", Box::new(Counter::new(None)));
        pipeline.stop_flag().store(true, Ordering::Relaxed);
        let mut source = MemoryEventSource::new(vec![one_particle_event(1)]);
        let summary = pipeline.run(&mut source).unwrap();
        assert_eq!(summary.processed, 0);
    }
}
