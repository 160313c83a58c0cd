//! Per-event candidate pool.

use crate::candidate::{Candidate, CandidateId};

/// Arena owning every [`Candidate`] of the current event.
///
/// All ids handed out by the factory stay valid until [`CandidateFactory::clear`],
/// which the run loop calls at each event boundary. External holders keep ids,
/// never references.
#[derive(Debug, Default)]
pub struct CandidateFactory {
    pool: Vec<Candidate>,
}

impl CandidateFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-initialised candidate. Never fails.
    pub fn new_candidate(&mut self) -> CandidateId {
        let id = CandidateId(self.pool.len() as u32);
        self.pool.push(Candidate::default());
        id
    }

    /// Borrow a candidate.
    pub fn get(&self, id: CandidateId) -> &Candidate {
        &self.pool[id.index()]
    }

    /// Mutably borrow a candidate.
    pub fn get_mut(&mut self, id: CandidateId) -> &mut Candidate {
        &mut self.pool[id.index()]
    }

    /// Append `child` to the composition of `parent`.
    ///
    /// No uniqueness is enforced; the same child may appear repeatedly.
    pub fn add_candidate(&mut self, parent: CandidateId, child: CandidateId) {
        self.pool[parent.index()].children.push(child);
    }

    /// Shallow copy: attribute values of `id` with an empty composition.
    pub fn clone_candidate(&mut self, id: CandidateId) -> CandidateId {
        let mut copy = self.pool[id.index()].clone();
        copy.children.clear();
        let new_id = CandidateId(self.pool.len() as u32);
        self.pool.push(copy);
        new_id
    }

    /// Whether either candidate appears in the other's composition, or the
    /// two compositions share an entry. Used for lepton/jet cross-cleaning.
    pub fn overlaps(&self, a: CandidateId, b: CandidateId) -> bool {
        let ca = &self.pool[a.index()].children;
        let cb = &self.pool[b.index()].children;
        if ca.contains(&b) || cb.contains(&a) {
            return true;
        }
        ca.iter().any(|id| cb.contains(id))
    }

    /// Number of live candidates.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Release every candidate. Idempotent; invalidates all outstanding ids.
    pub fn clear(&mut self) {
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FourVector;

    #[test]
    fn test_new_candidate_is_zeroed() {
        let mut factory = CandidateFactory::new();
        let id = factory.new_candidate();
        assert_eq!(*factory.get(id), Candidate::default());
    }

    #[test]
    fn test_clone_copies_attributes_with_empty_composition() {
        let mut factory = CandidateFactory::new();
        let child = factory.new_candidate();
        let id = factory.new_candidate();
        {
            let c = factory.get_mut(id);
            c.momentum = FourVector::from_pt_eta_phi_m(25.0, -0.7, 1.2, 4.0);
            c.pid = 5;
            c.eem = 12.5;
        }
        factory.add_candidate(id, child);

        let copy = factory.clone_candidate(id);
        let (orig, cloned) = (factory.get(id), factory.get(copy));
        assert!(cloned.children.is_empty());
        assert_eq!(cloned.momentum, orig.momentum);
        assert_eq!(cloned.pid, orig.pid);
        assert_eq!(cloned.eem, orig.eem);
    }

    #[test]
    fn test_overlaps_by_membership_and_shared_entry() {
        let mut factory = CandidateFactory::new();
        let shared = factory.new_candidate();
        let jet = factory.new_candidate();
        let lepton = factory.new_candidate();
        let other = factory.new_candidate();

        factory.add_candidate(jet, shared);
        assert!(!factory.overlaps(jet, lepton));

        // Direct membership.
        assert!(factory.overlaps(jet, shared));
        assert!(factory.overlaps(shared, jet));

        // Shared composition entry.
        factory.add_candidate(lepton, shared);
        assert!(factory.overlaps(jet, lepton));
        assert!(!factory.overlaps(jet, other));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut factory = CandidateFactory::new();
        factory.new_candidate();
        factory.clear();
        assert!(factory.is_empty());
        factory.clear();
        assert!(factory.is_empty());
    }
}
