//! Massless-friendly jet four-vector with a user index.

use fd_core::{wrap_phi, FourVector};

/// Four-momentum used by the clustering engine.
///
/// `user_index` points back at the caller's input list; ghosts carry -1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PseudoJet {
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Momentum z component.
    pub pz: f64,
    /// Energy.
    pub e: f64,
    /// Caller-defined index, -1 for ghosts.
    pub user_index: i64,
}

impl PseudoJet {
    /// Build from Cartesian components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e, user_index: -1 }
    }

    /// Build from a [`FourVector`], keeping the given user index.
    pub fn from_four_vector(p: FourVector, user_index: i64) -> Self {
        Self { px: p.px, py: p.py, pz: p.pz, e: p.e, user_index }
    }

    /// Convert back to a [`FourVector`].
    pub fn four_vector(&self) -> FourVector {
        FourVector::new(self.px, self.py, self.pz, self.e)
    }

    /// A zero vector (used for empty groomed jets).
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Transverse momentum squared.
    pub fn pt2(&self) -> f64 {
        self.px * self.px + self.py * self.py
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.pt2().sqrt()
    }

    /// Rapidity; clustering distances are rapidity/azimuth based.
    pub fn rap(&self) -> f64 {
        self.four_vector().rapidity()
    }

    /// Pseudorapidity.
    pub fn eta(&self) -> f64 {
        self.four_vector().eta()
    }

    /// Azimuthal angle in (-pi, pi].
    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 { 0.0 } else { self.py.atan2(self.px) }
    }

    /// Invariant mass, clamped to 0 for space-like vectors.
    pub fn mass(&self) -> f64 {
        self.four_vector().mass()
    }

    /// Squared rapidity-azimuth distance to `other`.
    pub fn delta_r2(&self, other: &PseudoJet) -> f64 {
        let dy = self.rap() - other.rap();
        let dphi = wrap_phi(self.phi() - other.phi());
        dy * dy + dphi * dphi
    }

    /// Rapidity-azimuth distance to `other`.
    pub fn delta_r(&self, other: &PseudoJet) -> f64 {
        self.delta_r2(other).sqrt()
    }

    /// E-scheme recombination.
    pub fn combined_with(&self, other: &PseudoJet) -> PseudoJet {
        PseudoJet {
            px: self.px + other.px,
            py: self.py + other.py,
            pz: self.pz + other.pz,
            e: self.e + other.e,
            user_index: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_massless_rapidity_equals_eta() {
        let p = PseudoJet::from_four_vector(
            FourVector::from_pt_eta_phi_m(40.0, 1.1, 0.4, 0.0),
            7,
        );
        assert_relative_eq!(p.rap(), p.eta(), epsilon = 1e-9);
        assert_eq!(p.user_index, 7);
    }

    #[test]
    fn test_combination_is_additive() {
        let a = PseudoJet::new(1.0, 2.0, 3.0, 4.0);
        let b = PseudoJet::new(0.5, -1.0, 0.0, 2.0);
        let c = a.combined_with(&b);
        assert_eq!((c.px, c.py, c.pz, c.e), (1.5, 1.0, 3.0, 6.0));
    }
}
