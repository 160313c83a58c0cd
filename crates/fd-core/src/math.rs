//! Four-vector kinematics.
//!
//! One type serves both momenta (px, py, pz, e) and space-time positions
//! (x, y, z, t); the position accessors are aliases over the same components.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub};

/// Relativistic four-vector in natural units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourVector {
    /// x component (px for momenta).
    pub px: f64,
    /// y component.
    pub py: f64,
    /// z component.
    pub pz: f64,
    /// Time-like component (energy for momenta).
    pub e: f64,
}

impl FourVector {
    /// Build from Cartesian components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and energy.
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self { px: pt * phi.cos(), py: pt * phi.sin(), pz: pt * eta.sinh(), e }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let e = (px * px + py * py + pz * pz + m * m).sqrt();
        Self { px, py, pz, e }
    }

    /// Transverse momentum squared.
    pub fn pt2(&self) -> f64 {
        self.px * self.px + self.py * self.py
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.pt2().sqrt()
    }

    /// Magnitude of the three-vector.
    pub fn p(&self) -> f64 {
        (self.pt2() + self.pz * self.pz).sqrt()
    }

    /// Pseudorapidity. Returns a large signed value on the beam axis.
    pub fn eta(&self) -> f64 {
        let p = self.p();
        if p - self.pz.abs() < 1e-12 {
            return if self.pz >= 0.0 { 1e10 } else { -1e10 };
        }
        0.5 * ((p + self.pz) / (p - self.pz)).ln()
    }

    /// Azimuthal angle in (-pi, pi].
    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 { 0.0 } else { self.py.atan2(self.px) }
    }

    /// Rapidity. Falls back to pseudorapidity when |e| <= |pz|.
    pub fn rapidity(&self) -> f64 {
        if self.e.abs() <= self.pz.abs() {
            return self.eta();
        }
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }

    /// Invariant mass squared (may be negative for space-like vectors).
    pub fn m2(&self) -> f64 {
        self.e * self.e - self.pt2() - self.pz * self.pz
    }

    /// Invariant mass, clamped to 0 for space-like vectors.
    pub fn mass(&self) -> f64 {
        let m2 = self.m2();
        if m2 > 0.0 { m2.sqrt() } else { 0.0 }
    }

    /// Signed azimuthal distance to `other`, wrapped into (-pi, pi].
    pub fn delta_phi(&self, other: &FourVector) -> f64 {
        wrap_phi(self.phi() - other.phi())
    }

    /// Angular distance sqrt(d_eta^2 + d_phi^2) to `other`.
    pub fn delta_r(&self, other: &FourVector) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = self.delta_phi(other);
        (deta * deta + dphi * dphi).sqrt()
    }

    /// Whether all four components are finite.
    pub fn is_finite(&self) -> bool {
        self.px.is_finite() && self.py.is_finite() && self.pz.is_finite() && self.e.is_finite()
    }

    /// Position alias for the x component.
    pub fn x(&self) -> f64 {
        self.px
    }

    /// Position alias for the y component.
    pub fn y(&self) -> f64 {
        self.py
    }

    /// Position alias for the z component.
    pub fn z(&self) -> f64 {
        self.pz
    }

    /// Position alias for the time component.
    pub fn t(&self) -> f64 {
        self.e
    }
}

impl Add for FourVector {
    type Output = FourVector;

    fn add(self, rhs: FourVector) -> FourVector {
        FourVector::new(self.px + rhs.px, self.py + rhs.py, self.pz + rhs.pz, self.e + rhs.e)
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: FourVector) {
        self.px += rhs.px;
        self.py += rhs.py;
        self.pz += rhs.pz;
        self.e += rhs.e;
    }
}

impl Sub for FourVector {
    type Output = FourVector;

    fn sub(self, rhs: FourVector) -> FourVector {
        FourVector::new(self.px - rhs.px, self.py - rhs.py, self.pz - rhs.pz, self.e - rhs.e)
    }
}

impl Neg for FourVector {
    type Output = FourVector;

    fn neg(self) -> FourVector {
        FourVector::new(-self.px, -self.py, -self.pz, -self.e)
    }
}

/// Wrap an azimuthal difference into (-pi, pi].
pub fn wrap_phi(mut dphi: f64) -> f64 {
    use std::f64::consts::PI;
    while dphi > PI {
        dphi -= 2.0 * PI;
    }
    while dphi <= -PI {
        dphi += 2.0 * PI;
    }
    dphi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_pt_eta_phi_roundtrip() {
        let v = FourVector::from_pt_eta_phi_m(50.0, 1.3, -2.1, 0.5);
        assert_relative_eq!(v.pt(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(v.eta(), 1.3, epsilon = 1e-9);
        assert_relative_eq!(v.phi(), -2.1, epsilon = 1e-9);
        assert_relative_eq!(v.mass(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_mass_closure() {
        let v = FourVector::from_pt_eta_phi_e(100.0, 0.3, 0.0, 100.0 * (0.3f64).cosh());
        // Massless within floating-point rounding.
        assert!(v.m2().abs() / (v.e * v.e) < 1e-4);
    }

    #[test]
    fn test_delta_phi_wraparound() {
        let a = FourVector::from_pt_eta_phi_m(10.0, 0.0, PI - 0.1, 0.0);
        let b = FourVector::from_pt_eta_phi_m(10.0, 0.0, -PI + 0.1, 0.0);
        assert_relative_eq!(a.delta_phi(&b).abs(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_beam_axis_eta_is_large() {
        let v = FourVector::new(0.0, 0.0, 10.0, 10.0);
        assert!(v.eta() > 1e9);
    }
}
