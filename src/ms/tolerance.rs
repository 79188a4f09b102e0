//! Relative-tolerance lookups over mass arrays sorted ascending.
//!
//! Two policies coexist and are intentionally not unified:
//!
//! * [`range_within`] lists *every* entry strictly inside `p ± p * accuracy`,
//!   comparing against the two window bounds.
//! * [`SortedPeaks::contains`] only inspects the two neighbours of the
//!   insertion point and compares `|neighbour - x| < x * accuracy`.
//!
//! Because the bounds are computed differently, the two can disagree for
//! entries sitting exactly on the window edge (see the tests below).

use std::ops::Deref;

/// Returns the sub-slice of `sorted` whose masses lie strictly inside
/// `(p - eps, p + eps)`, with `eps = p * accuracy`.
///
/// `sorted` must be non-decreasing according to `mass`.
pub fn range_within<T, F>(sorted: &[T], mass: F, p: f64, accuracy: f64) -> &[T]
where
    F: Fn(&T) -> f64,
{
    debug_assert!(sorted.windows(2).all(|w| mass(&w[0]) <= mass(&w[1])));

    let eps = p * accuracy;
    let lower = p - eps;
    let upper = p + eps;

    let left_idx = sorted.partition_point(|entry| mass(entry) <= lower);
    let right_idx = left_idx
        + sorted[left_idx..]
            .iter()
            .take_while(|entry| mass(entry) < upper)
            .count();

    &sorted[left_idx..right_idx]
}

fn neighbour_within(sorted: &[f64], x: f64, accuracy: f64) -> bool {
    let eps = x * accuracy;
    let idx = sorted.partition_point(|&v| v < x);

    let below = idx
        .checked_sub(1)
        .and_then(|i| sorted.get(i))
        .map_or(false, |v| (v - x).abs() < eps);
    let above = sorted.get(idx).map_or(false, |v| (v - x).abs() < eps);

    below || above
}

/// Peak masses sorted ascending once, at construction.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SortedPeaks(Vec<f64>);

impl SortedPeaks {
    /// Whether a peak lies within `x * accuracy` of `x` (containment policy).
    pub fn contains(&self, x: f64, accuracy: f64) -> bool {
        neighbour_within(&self.0, x, accuracy)
    }
}

impl From<Vec<f64>> for SortedPeaks {
    fn from(mut peaks: Vec<f64>) -> Self {
        peaks.sort_by(|a, b| a.total_cmp(b));
        SortedPeaks(peaks)
    }
}

impl Deref for SortedPeaks {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(sorted: &[f64], p: f64) -> Vec<f64> {
        range_within(sorted, |m| *m, p, 1e-5).to_vec()
    }

    #[test]
    fn range_bounds_are_open() {
        // p = 1000.0, eps = 0.01
        let ions = [999.98, 999.99, 999.9949, 1000.0, 1000.005, 1000.01, 1000.02];
        assert_eq!(listed(&ions, 1000.0), vec![999.9949, 1000.0, 1000.005]);
    }

    #[test]
    fn range_boundary_cases() {
        assert_eq!(listed(&[999.9949], 1000.0), vec![999.9949]);
        assert!(listed(&[999.99], 1000.0).is_empty());
        assert_eq!(listed(&[1000.005], 1000.0), vec![1000.005]);
    }

    #[test]
    fn range_keeps_duplicates() {
        let ions = [500.0, 500.0, 500.001, 600.0];
        assert_eq!(listed(&ions, 500.0), vec![500.0, 500.0, 500.001]);
    }

    #[test]
    fn range_on_empty_and_outside() {
        assert!(listed(&[], 1000.0).is_empty());
        assert!(listed(&[1.0, 2.0], 1000.0).is_empty());
        assert!(listed(&[2000.0, 3000.0], 1000.0).is_empty());
    }

    #[test]
    fn containment_inspects_neighbours() {
        let peaks = SortedPeaks::from(vec![1000.005, 300.0, 2000.0]);
        assert_eq!(&*peaks, &[300.0, 1000.005, 2000.0]);

        assert!(peaks.contains(1000.0, 1e-5));
        assert!(peaks.contains(2000.0, 1e-5));
        assert!(peaks.contains(300.002, 1e-5));
        assert!(!peaks.contains(300.01, 1e-5));
        assert!(!peaks.contains(1500.0, 1e-5));
        assert!(!peaks.contains(0.5, 1e-5));
        assert!(!peaks.contains(5000.0, 1e-5));
        assert!(!SortedPeaks::default().contains(1000.0, 1e-5));
    }

    #[test]
    fn policies_agree_away_from_the_window_edge() {
        let sorted = [100.0, 250.001, 999.9949, 1000.005, 1500.0];
        for x in [100.0005, 250.0, 1000.0, 1499.99, 1200.0, 50.0] {
            let listed_any = !range_within(&sorted, |m| *m, x, 1e-5).is_empty();
            let contained = SortedPeaks::from(sorted.to_vec()).contains(x, 1e-5);
            assert_eq!(listed_any, contained, "{}", x);
        }
    }

    #[test]
    fn policies_diverge_on_entries_exactly_eps_away() {
        // 999.99 and 1000.01 straddle 1000.0, each exactly eps = 0.01 away.
        // The range policy compares against the computed bounds and excludes
        // both; the containment policy compares |v - x| (0.00999999999999 in
        // floating point) against eps and reports a hit.
        let sorted = [999.99, 1000.01];
        assert!(range_within(&sorted, |m| *m, 1000.0, 1e-5).is_empty());
        assert!(SortedPeaks::from(sorted.to_vec()).contains(1000.0, 1e-5));
    }
}
