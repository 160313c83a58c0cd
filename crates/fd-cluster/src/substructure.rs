//! Jet substructure: grooming and N-subjettiness.
//!
//! All routines operate on a jet's real constituents. Grooming reclusters
//! with Cambridge/Aachen; distances are rapidity/azimuth based throughout.

use crate::pseudojet::PseudoJet;

/// A Cambridge/Aachen cluster with its merge history.
#[derive(Debug, Clone)]
pub struct CaCluster {
    /// Cluster four-momentum.
    pub p4: PseudoJet,
    /// The two merged subclusters, absent for single particles.
    pub children: Option<(Box<CaCluster>, Box<CaCluster>)>,
}

/// Cambridge/Aachen reclustering at radius `r`, keeping the merge tree.
/// Returns the inclusive clusters (all pairwise distances >= r).
pub fn ca_cluster(parts: &[PseudoJet], r: f64) -> Vec<CaCluster> {
    let r2 = r * r;
    let mut active: Vec<CaCluster> =
        parts.iter().map(|p| CaCluster { p4: *p, children: None }).collect();

    while active.len() >= 2 {
        let mut best = f64::INFINITY;
        let mut pair = (0, 0);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let d = active[i].p4.delta_r2(&active[j].p4);
                if d < best {
                    best = d;
                    pair = (i, j);
                }
            }
        }
        if best >= r2 {
            break;
        }
        let (i, j) = pair;
        let b = active.swap_remove(j);
        let a = active.swap_remove(i);
        let merged = CaCluster {
            p4: a.p4.combined_with(&b.p4),
            children: Some((Box::new(a), Box::new(b))),
        };
        active.push(merged);
    }
    active
}

/// Outcome of one grooming pass.
#[derive(Debug, Clone)]
pub struct GroomOutcome {
    /// Groomed jet momentum (zero when nothing survives).
    pub p4: PseudoJet,
    /// Surviving subjets / prongs, sorted by descending pT.
    pub subjets: Vec<PseudoJet>,
}

/// Trim a jet: recluster at `r_trim`, keep subjets with
/// pT >= `pt_fraction` x the ungroomed jet pT.
pub fn trim(
    constituents: &[PseudoJet],
    jet_pt: f64,
    r_trim: f64,
    pt_fraction: f64,
) -> GroomOutcome {
    let threshold = pt_fraction * jet_pt;
    let mut subjets: Vec<PseudoJet> = ca_cluster(constituents, r_trim)
        .into_iter()
        .map(|c| c.p4)
        .filter(|p| p.pt() >= threshold)
        .collect();
    subjets.sort_by(|a, b| b.pt2().total_cmp(&a.pt2()));

    let mut p4 = PseudoJet::zero();
    for s in &subjets {
        p4 = p4.combined_with(s);
    }
    GroomOutcome { p4, subjets }
}

/// Soft drop with beta = 0 (modified mass drop): decluster the
/// Cambridge/Aachen tree from the top, dropping the softer prong until the
/// symmetry condition `z > z_cut` is met.
pub fn soft_drop(constituents: &[PseudoJet], z_cut: f64) -> GroomOutcome {
    if constituents.is_empty() {
        return GroomOutcome { p4: PseudoJet::zero(), subjets: Vec::new() };
    }
    // An effectively infinite radius folds everything into one tree.
    let mut tree = ca_cluster(constituents, 1.0e6);
    // More than one cluster only for pathological inputs; take the hardest.
    tree.sort_by(|a, b| b.p4.pt2().total_cmp(&a.p4.pt2()));
    let mut current = tree.swap_remove(0);

    loop {
        match current.children {
            None => {
                return GroomOutcome { p4: current.p4, subjets: vec![current.p4] };
            }
            Some((a, b)) => {
                let (hard, soft) = if a.p4.pt2() >= b.p4.pt2() { (a, b) } else { (b, a) };
                let z = soft.p4.pt() / (hard.p4.pt() + soft.p4.pt());
                if z > z_cut {
                    let mut subjets = vec![hard.p4, soft.p4];
                    subjets.sort_by(|x, y| y.pt2().total_cmp(&x.pt2()));
                    return GroomOutcome { p4: current.p4, subjets };
                }
                current = *hard;
            }
        }
    }
}

/// Prune a jet: Cambridge/Aachen recombination that vetoes wide-angle soft
/// merges (`dR > r_cut` and `z < z_cut`), discarding the softer branch.
/// `r_cut` is `r_cut_factor * 2 m / pT` of the ungroomed jet.
pub fn prune(
    constituents: &[PseudoJet],
    jet: &PseudoJet,
    z_cut: f64,
    r_cut_factor: f64,
) -> GroomOutcome {
    if constituents.is_empty() {
        return GroomOutcome { p4: PseudoJet::zero(), subjets: Vec::new() };
    }
    let pt = jet.pt();
    let r_cut = if pt > 0.0 { r_cut_factor * 2.0 * jet.mass() / pt } else { f64::INFINITY };
    let r_cut2 = r_cut * r_cut;

    let mut active: Vec<PseudoJet> = constituents.to_vec();
    let mut last_merge: Option<(PseudoJet, PseudoJet)> = None;

    while active.len() >= 2 {
        let mut best = f64::INFINITY;
        let mut pair = (0, 0);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let d = active[i].delta_r2(&active[j]);
                if d < best {
                    best = d;
                    pair = (i, j);
                }
            }
        }
        let (i, j) = pair;
        let b = active.swap_remove(j);
        let a = active.swap_remove(i);
        let (hard, soft) = if a.pt2() >= b.pt2() { (a, b) } else { (b, a) };
        let z = soft.pt() / (hard.pt() + soft.pt());
        if best > r_cut2 && z < z_cut {
            // Veto: drop the soft branch entirely.
            active.push(hard);
        } else {
            last_merge = Some((hard, soft));
            active.push(hard.combined_with(&soft));
        }
    }

    let p4 = active[0];
    let subjets = match last_merge {
        Some((a, b)) => {
            let mut s = vec![a, b];
            s.sort_by(|x, y| y.pt2().total_cmp(&x.pt2()));
            s
        }
        None => vec![p4],
    };
    GroomOutcome { p4, subjets }
}

/// N-subjettiness tau_N with one-pass kt axes.
///
/// Axes are seeded from exclusive-kt subjets and refined by iterated
/// nearest-axis reassignment. Returns 0 when the jet has fewer than `n`
/// constituents.
pub fn nsubjettiness(n: usize, constituents: &[PseudoJet], beta: f64, r0: f64) -> f64 {
    if n == 0 || constituents.len() < n {
        return 0.0;
    }
    let mut axes = exclusive_kt_axes(constituents, n);

    // One-pass minimisation: reassign and recompute until stable.
    let mut assignment: Vec<usize> = vec![usize::MAX; constituents.len()];
    for _ in 0..100 {
        let mut changed = false;
        for (i, p) in constituents.iter().enumerate() {
            let mut best = f64::INFINITY;
            let mut who = 0;
            for (k, axis) in axes.iter().enumerate() {
                let d = p.delta_r2(axis);
                if d < best {
                    best = d;
                    who = k;
                }
            }
            if assignment[i] != who {
                assignment[i] = who;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        let mut new_axes = vec![PseudoJet::zero(); n];
        for (i, p) in constituents.iter().enumerate() {
            new_axes[assignment[i]] = new_axes[assignment[i]].combined_with(p);
        }
        // An axis that lost all constituents keeps its previous direction.
        for (k, axis) in new_axes.iter_mut().enumerate() {
            if axis.pt2() == 0.0 {
                *axis = axes[k];
            }
        }
        axes = new_axes;
    }

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for p in constituents {
        let pt = p.pt();
        let min_dr = axes
            .iter()
            .map(|axis| p.delta_r(axis))
            .fold(f64::INFINITY, f64::min);
        numerator += pt * min_dr.powf(beta);
        denominator += pt * r0.powf(beta);
    }
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}

/// Exclusive kt: merge the smallest kt pair distance until `n` clusters remain.
fn exclusive_kt_axes(parts: &[PseudoJet], n: usize) -> Vec<PseudoJet> {
    let mut active: Vec<PseudoJet> = parts.to_vec();
    while active.len() > n {
        let mut best = f64::INFINITY;
        let mut pair = (0, 0);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let d = active[i].pt2().min(active[j].pt2()) * active[i].delta_r2(&active[j]);
                if d < best {
                    best = d;
                    pair = (i, j);
                }
            }
        }
        let (i, j) = pair;
        let b = active.swap_remove(j);
        let a = active.swap_remove(i);
        active.push(a.combined_with(&b));
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fd_core::FourVector;

    fn pj(pt: f64, eta: f64, phi: f64) -> PseudoJet {
        PseudoJet::from_four_vector(FourVector::from_pt_eta_phi_m(pt, eta, phi, 0.0), 0)
    }

    #[test]
    fn test_ca_cluster_radius_controls_merging() {
        let parts = [pj(100.0, 0.0, 0.0), pj(80.0, 0.1, 0.0), pj(60.0, 0.45, 0.0)];
        assert_eq!(ca_cluster(&parts, 0.2).len(), 2);
        assert_eq!(ca_cluster(&parts, 1.0).len(), 1);
    }

    #[test]
    fn test_trim_removes_soft_wide_subjet() {
        let core = pj(300.0, 0.0, 0.0);
        let soft = pj(3.0, 0.4, 0.0);
        let outcome = trim(&[core, soft], 303.0, 0.2, 0.05);
        assert_eq!(outcome.subjets.len(), 1);
        assert_relative_eq!(outcome.p4.pt(), 300.0, epsilon = 1e-9);

        // The same subjet above threshold survives.
        let hard = pj(100.0, 0.4, 0.0);
        let outcome = trim(&[core, hard], 400.0, 0.2, 0.05);
        assert_eq!(outcome.subjets.len(), 2);
    }

    #[test]
    fn test_soft_drop_finds_symmetric_prongs() {
        let a = pj(120.0, -0.15, 0.0);
        let b = pj(100.0, 0.15, 0.1);
        let grit = pj(1.0, 0.5, -0.4);
        let outcome = soft_drop(&[a, b, grit], 0.1);
        assert_eq!(outcome.subjets.len(), 2);
        // The soft contaminant was dropped before the symmetric split.
        let total_pt: f64 = outcome.subjets.iter().map(|s| s.pt()).sum();
        assert_relative_eq!(total_pt, 220.0, epsilon = 1.0);
    }

    #[test]
    fn test_prune_vetoes_wide_soft_merge() {
        // Massive two-prong core plus a wide soft branch.
        let a = pj(150.0, -0.1, 0.0);
        let b = pj(140.0, 0.1, 0.05);
        let wide_soft = pj(2.0, 0.9, 0.6);
        let jet = a.combined_with(&b).combined_with(&wide_soft);
        let outcome = prune(&[a, b, wide_soft], &jet, 0.1, 0.5);
        assert!(outcome.p4.pt() < jet.pt());
        assert_relative_eq!(outcome.p4.pt(), a.combined_with(&b).pt(), epsilon = 1e-6);
    }

    #[test]
    fn test_nsubjettiness_orders_by_prong_count() {
        // A genuine two-prong jet: tau2 much smaller than tau1.
        let prong1: Vec<PseudoJet> =
            (0..5).map(|i| pj(40.0, -0.2 + 0.01 * i as f64, 0.0)).collect();
        let prong2: Vec<PseudoJet> =
            (0..5).map(|i| pj(40.0, 0.2 + 0.01 * i as f64, 0.3)).collect();
        let mut parts = prong1;
        parts.extend(prong2);

        let tau1 = nsubjettiness(1, &parts, 1.0, 0.8);
        let tau2 = nsubjettiness(2, &parts, 1.0, 0.8);
        assert!(tau1 > 0.0);
        assert!(tau2 < 0.3 * tau1, "tau2 = {tau2}, tau1 = {tau1}");
    }

    #[test]
    fn test_nsubjettiness_with_too_few_constituents() {
        let parts = [pj(10.0, 0.0, 0.0)];
        assert_eq!(nsubjettiness(2, &parts, 1.0, 0.8), 0.0);
    }
}
