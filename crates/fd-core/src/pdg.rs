//! Read-only particle-property table.
//!
//! Replaces a process-global database singleton: the table is built once at
//! startup and passed through the module context for the whole run.

use std::collections::HashMap;

/// Static properties of one particle species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdgEntry {
    /// Electric charge in units of e.
    pub charge: i32,
    /// Mass in GeV.
    pub mass: f64,
}

/// PDG-code keyed particle-property table.
#[derive(Debug, Clone)]
pub struct PdgTable {
    entries: HashMap<i32, PdgEntry>,
}

impl PdgTable {
    /// Table of the species the detector modules care about.
    ///
    /// Masses in GeV. Antiparticles are resolved by sign at lookup.
    pub fn standard() -> Self {
        let mut entries = HashMap::new();
        let mut put = |pid: i32, charge: i32, mass: f64| {
            entries.insert(pid, PdgEntry { charge, mass });
        };
        // Quarks carry thirds of e; stored charge is 3*Q to stay integral.
        put(1, -1, 0.0047);
        put(2, 2, 0.0022);
        put(3, -1, 0.095);
        put(4, 2, 1.27);
        put(5, -1, 4.18);
        put(6, 2, 172.5);
        put(11, -3, 0.000511);
        put(12, 0, 0.0);
        put(13, -3, 0.10566);
        put(14, 0, 0.0);
        put(15, -3, 1.77686);
        put(16, 0, 0.0);
        put(21, 0, 0.0);
        put(22, 0, 0.0);
        put(23, 0, 91.1876);
        put(24, 3, 80.379);
        put(25, 0, 125.25);
        put(111, 0, 0.13498);
        put(211, 3, 0.13957);
        put(130, 0, 0.49761);
        put(310, 0, 0.49761);
        put(321, 3, 0.49368);
        put(2112, 0, 0.93957);
        put(2212, 3, 0.93827);
        Self { entries }
    }

    /// Electric charge in units of e (rounded for fractional charges),
    /// antiparticle sign applied. Unknown codes are neutral.
    pub fn charge(&self, pid: i32) -> i32 {
        let entry = match self.entries.get(&pid.abs()) {
            Some(e) => e,
            None => return 0,
        };
        let q = entry.charge / 3 + if entry.charge % 3 != 0 { entry.charge.signum() } else { 0 };
        if pid < 0 { -q } else { q }
    }

    /// Charge in thirds of e, antiparticle sign applied.
    pub fn charge_thirds(&self, pid: i32) -> i32 {
        let q = self.entries.get(&pid.abs()).map(|e| e.charge).unwrap_or(0);
        if pid < 0 { -q } else { q }
    }

    /// Mass in GeV, 0 for unknown codes.
    pub fn mass(&self, pid: i32) -> f64 {
        self.entries.get(&pid.abs()).map(|e| e.mass).unwrap_or(0.0)
    }
}

impl Default for PdgTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charges() {
        let pdg = PdgTable::standard();
        assert_eq!(pdg.charge(11), -1);
        assert_eq!(pdg.charge(-11), 1);
        assert_eq!(pdg.charge(211), 1);
        assert_eq!(pdg.charge(22), 0);
        assert_eq!(pdg.charge(9999999), 0);
        // Quark charges stay exact in thirds.
        assert_eq!(pdg.charge_thirds(2), 2);
        assert_eq!(pdg.charge_thirds(-5), 1);
    }

    #[test]
    fn test_masses() {
        let pdg = PdgTable::standard();
        assert!((pdg.mass(13) - 0.10566).abs() < 1e-9);
        assert_eq!(pdg.mass(12), 0.0);
    }
}
