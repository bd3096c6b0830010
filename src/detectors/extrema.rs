//! Local extrema extraction
//!
//! A point is a peak when it equals the maximum of the closed window
//! `[i - w, i + w]`, and a trough when it equals the minimum. Only indices in
//! `[w, n - w)` are considered. A flat top or bottom whose bars qualify one
//! after another is reported once, at the first qualifying bar.

use serde::Serialize;

/// Whether an extremum is a local maximum or minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    Peak,
    Trough,
}

/// A local maximum or minimum of a price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtremaPoint {
    pub index: usize,
    pub price: f64,
    pub kind: ExtremumKind,
}

/// Peaks and troughs of one series, each ordered by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extrema {
    pub peaks: Vec<ExtremaPoint>,
    pub troughs: Vec<ExtremaPoint>,
}

impl Extrema {
    /// Peaks at or after `start`
    #[inline]
    pub fn peaks_since(&self, start: usize) -> &[ExtremaPoint] {
        since(&self.peaks, start)
    }

    /// Troughs at or after `start`
    #[inline]
    pub fn troughs_since(&self, start: usize) -> &[ExtremaPoint] {
        since(&self.troughs, start)
    }

    /// Lowest trough strictly between two indices; the earliest wins ties.
    pub fn lowest_trough_between(&self, after: usize, before: usize) -> Option<ExtremaPoint> {
        between(&self.troughs, after, before).fold(None, |best, p| match best {
            Some(b) if b.price <= p.price => Some(b),
            _ => Some(p),
        })
    }

    /// Highest peak strictly between two indices; the earliest wins ties.
    pub fn highest_peak_between(&self, after: usize, before: usize) -> Option<ExtremaPoint> {
        between(&self.peaks, after, before).fold(None, |best, p| match best {
            Some(b) if b.price >= p.price => Some(b),
            _ => Some(p),
        })
    }
}

fn since(points: &[ExtremaPoint], start: usize) -> &[ExtremaPoint] {
    &points[points.partition_point(|p| p.index < start)..]
}

fn between(
    points: &[ExtremaPoint],
    after: usize,
    before: usize,
) -> impl Iterator<Item = ExtremaPoint> + '_ {
    points
        .iter()
        .copied()
        .filter(move |p| after < p.index && p.index < before)
}

/// Scan `prices` with a centred window of radius `window`.
///
/// Returns empty lists when `prices.len() < 2 * window + 1`.
pub fn find_extrema(prices: &[f64], window: usize) -> Extrema {
    let n = prices.len();
    let mut extrema = Extrema::default();
    if n < 2 * window + 1 {
        return extrema;
    }

    let (mut prev_peak, mut prev_trough) = (false, false);
    for i in window..n - window {
        let (lo, hi) = prices[i - window..=i + window]
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
                (lo.min(p), hi.max(p))
            });
        let price = prices[i];
        // A qualifying bar right after a qualifying bar at the same price
        // extends that plateau.
        let plateau = i > 0 && prices[i - 1] == price;

        let is_peak = price == hi;
        if is_peak && !(prev_peak && plateau) {
            extrema.peaks.push(ExtremaPoint {
                index: i,
                price,
                kind: ExtremumKind::Peak,
            });
        }
        let is_trough = price == lo;
        if is_trough && !(prev_trough && plateau) {
            extrema.troughs.push(ExtremaPoint {
                index: i,
                price,
                kind: ExtremumKind::Trough,
            });
        }
        (prev_peak, prev_trough) = (is_peak, is_trough);
    }

    extrema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(points: &[ExtremaPoint]) -> Vec<usize> {
        points.iter().map(|p| p.index).collect()
    }

    #[test]
    fn test_short_input_is_empty() {
        let e = find_extrema(&[1.0, 2.0, 3.0, 2.0], 2);
        assert!(e.peaks.is_empty());
        assert!(e.troughs.is_empty());
    }

    #[test]
    fn test_single_peak_and_trough() {
        let prices = [1.0, 2.0, 5.0, 2.0, 1.0, 0.5, 1.0, 2.0];
        let e = find_extrema(&prices, 2);
        assert_eq!(indices(&e.peaks), vec![2]);
        assert_eq!(indices(&e.troughs), vec![5]);
        assert_eq!(e.peaks[0].kind, ExtremumKind::Peak);
        assert_eq!(e.troughs[0].price, 0.5);
    }

    #[test]
    fn test_edges_are_excluded() {
        // The global max sits inside the left margin.
        let prices = [9.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let e = find_extrema(&prices, 2);
        assert!(e.peaks.is_empty());
    }

    #[test]
    fn test_flat_top_reports_first_index() {
        let prices = [1.0, 2.0, 4.0, 4.0, 2.0, 1.0];
        let e = find_extrema(&prices, 1);
        assert_eq!(indices(&e.peaks), vec![2]);

        let prices = [5.0, 3.0, 1.0, 1.0, 1.0, 3.0, 5.0];
        let e = find_extrema(&prices, 1);
        assert_eq!(indices(&e.troughs), vec![2]);
    }

    #[test]
    fn test_plateau_starts_at_first_qualifying_bar() {
        // Bars 2 and 3 sit next to the 6.0, so bar 4 is the first qualifying one.
        let prices = [1.0, 6.0, 5.0, 5.0, 5.0, 5.0, 1.0, 1.0, 1.0];
        let e = find_extrema(&prices, 2);
        assert_eq!(indices(&e.peaks), vec![4]);
    }

    #[test]
    fn test_flat_series_has_single_extremum() {
        let e = find_extrema(&[7.0; 20], 3);
        assert_eq!(indices(&e.peaks), vec![3]);
        assert_eq!(indices(&e.troughs), vec![3]);
    }

    #[test]
    fn test_monotonic_has_no_extrema() {
        let prices: Vec<f64> = (0..50).map(|i| 10.0 + i as f64).collect();
        let e = find_extrema(&prices, 5);
        assert!(e.peaks.is_empty());
        assert!(e.troughs.is_empty());
    }

    #[test]
    fn test_between_prefers_earliest_on_ties() {
        let prices = [5.0, 3.0, 1.0, 3.0, 5.0, 3.0, 1.0, 3.0, 5.0];
        let e = find_extrema(&prices, 1);
        let low = e.lowest_trough_between(0, 8).unwrap();
        assert_eq!(low.index, 2);
        assert!(e.lowest_trough_between(2, 6).is_none());
        assert_eq!(e.highest_peak_between(2, 6).unwrap().index, 4);
    }

    #[test]
    fn test_since_slices_by_index() {
        let prices = [5.0, 3.0, 1.0, 3.0, 5.0, 3.0, 1.0, 3.0, 5.0];
        let e = find_extrema(&prices, 1);
        assert_eq!(indices(e.troughs_since(3)), vec![6]);
        assert_eq!(indices(e.peaks_since(0)), vec![4]);
        assert!(e.peaks_since(5).is_empty());
    }
}
