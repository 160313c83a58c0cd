//! Reader interface.
//!
//! Concrete event readers (HepMC, LHEF, ...) are external collaborators; the
//! framework only requires something that can fill the four reader-owned
//! arrays from a candidate factory. [`MemoryEventSource`] adapts in-memory
//! particle lists to that interface for drivers and tests.

use fd_core::{CandidateFactory, CandidateId, EventHeader, FourVector, Result};

/// Candidate ids of one event as handed over by the reader.
#[derive(Debug, Default)]
pub struct SourceEvent {
    /// Event header.
    pub header: EventHeader,
    /// All generator particles, in generator order.
    pub all_particles: Vec<CandidateId>,
    /// Stable (status 1) subset of `all_particles`.
    pub stable_particles: Vec<CandidateId>,
    /// Hard-process partons.
    pub partons: Vec<CandidateId>,
    /// Matrix-element particles, when the reader provides them.
    pub lhe_particles: Vec<CandidateId>,
}

/// Supplier of generator events.
pub trait EventSource {
    /// Allocate the next event's candidates from `factory` and return the
    /// populated arrays, or `None` when the input is exhausted.
    fn next_event(&mut self, factory: &mut CandidateFactory) -> Result<Option<SourceEvent>>;
}

/// Plain-data description of one generator particle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleSeed {
    /// PDG code.
    pub pid: i32,
    /// Generator status.
    pub status: i32,
    /// Mother/daughter indices into the event's particle list, -1 if absent.
    pub m1: i32,
    /// Second mother index.
    pub m2: i32,
    /// First daughter index.
    pub d1: i32,
    /// Last daughter index.
    pub d2: i32,
    /// Electric charge in units of e.
    pub charge: i32,
    /// Spin projection.
    pub spin: i32,
    /// Generator mass.
    pub mass: f64,
    /// Four-momentum.
    pub momentum: FourVector,
    /// Production vertex (x, y, z, t).
    pub position: FourVector,
    /// Pile-up origin flag.
    pub is_pu: i32,
}

/// One in-memory event.
#[derive(Debug, Clone, Default)]
pub struct SeedEvent {
    /// Header attached to the event.
    pub header: EventHeader,
    /// Generator particles in generator order.
    pub particles: Vec<ParticleSeed>,
    /// Matrix-element particles, if any.
    pub lhe_particles: Vec<ParticleSeed>,
}

/// [`EventSource`] over a vector of [`SeedEvent`]s.
#[derive(Debug, Default)]
pub struct MemoryEventSource {
    events: std::vec::IntoIter<SeedEvent>,
}

impl MemoryEventSource {
    /// Wrap a list of events.
    pub fn new(events: Vec<SeedEvent>) -> Self {
        Self { events: events.into_iter() }
    }
}

fn is_parton(pid: i32) -> bool {
    let pdg = pid.abs();
    (1..=5).contains(&pdg) || pdg == 21
}

fn seed_candidate(factory: &mut CandidateFactory, seed: &ParticleSeed) -> CandidateId {
    let id = factory.new_candidate();
    let c = factory.get_mut(id);
    c.pid = seed.pid;
    c.status = seed.status;
    c.m1 = seed.m1;
    c.m2 = seed.m2;
    c.d1 = seed.d1;
    c.d2 = seed.d2;
    c.charge = seed.charge;
    c.spin = seed.spin;
    c.mass = seed.mass;
    c.momentum = seed.momentum;
    c.position = seed.position;
    c.is_pu = seed.is_pu;
    id
}

impl EventSource for MemoryEventSource {
    fn next_event(&mut self, factory: &mut CandidateFactory) -> Result<Option<SourceEvent>> {
        let Some(seed) = self.events.next() else {
            return Ok(None);
        };

        let mut out = SourceEvent { header: seed.header.clone(), ..Default::default() };
        for particle in &seed.particles {
            let id = seed_candidate(factory, particle);
            out.all_particles.push(id);
            if particle.status == 1 {
                out.stable_particles.push(id);
            } else if is_parton(particle.pid) {
                out.partons.push(id);
            }
        }
        for particle in &seed.lhe_particles {
            out.lhe_particles.push(seed_candidate(factory, particle));
        }
        Ok(Some(out))
    }
}
