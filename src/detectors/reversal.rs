//! Reversal patterns built from runs of consecutive extrema
//!
//! Head & Shoulders, Inverse Head & Shoulders, Double Top/Bottom and
//! Triple Top/Bottom walk the recent peaks (or troughs) in index order, reject
//! runs that break their shape constraints and keep the highest-confidence
//! survivor. The Falling Wedge fits two trendlines through all recent extrema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{
    extrema::find_extrema,
    helpers::{
        amplitude_score, best_tuple, blend_confidence, check_confidence_floor, check_window_fits,
        line_slope, max_relative_deviation, mean, measured_move, recency_score,
        relative_difference, search_start, symmetry_score, REVERSAL_HEIGHT_SCALE,
    },
};
use crate::{
    params::{
        check_params, get_period, get_ratio, get_score, ParamMeta, ParameterizedDetector,
    },
    Geometry, PatternCandidate, PatternDetector, PatternKind, Period, PriceSeries, Ratio, Result,
    Signal,
};

impl_with_defaults!(
    HeadShouldersDetector,
    InverseHeadShouldersDetector,
    DoubleTopDetector,
    DoubleBottomDetector,
    TripleTopDetector,
    TripleBottomDetector,
    FallingWedgeDetector,
);

/// Shortest series the wedge detector looks at
pub const WEDGE_MIN_BARS: usize = 50;
const WEDGE_CONVERGENCE_SCALE: f64 = 2.0;
/// Resistance slope (price per bar) that scores full steepness
const WEDGE_SLOPE_SCALE: f64 = 100.0;

fn validate_extrema_config(window: Period, lookback: Period, min_confidence: u8) -> Result<()> {
    check_window_fits(window.get(), lookback.get())?;
    check_confidence_floor("min_confidence", min_confidence)
}

// ============================================================
// HEAD & SHOULDERS
// ============================================================

/// Head & Shoulders: three peaks, the middle one highest, above a neckline
/// drawn through the lowest trough on each side of the head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadShouldersDetector {
    /// Extrema window radius
    pub window: Period,
    /// Trailing bars the right shoulder must fall into
    pub lookback: Period,
    /// Max relative difference between the two shoulders
    pub shoulder_tolerance: Ratio,
    /// Min head height above the neckline, relative to the neckline
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for HeadShouldersDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            lookback: Period::new_const(120),
            shoulder_tolerance: Ratio::new_const(0.15),
            min_height: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for HeadShouldersDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::HeadShoulders
    }

    fn min_len(&self) -> usize {
        self.window.get() * 5
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let extrema = find_extrema(prices, self.window.get());
        if extrema.peaks.len() < 3 || extrema.troughs.len() < 2 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<3, _>(extrema.peaks_since(start), |&[left, head, right]| {
            if head.price <= left.price || head.price <= right.price {
                return None;
            }
            let shoulder_diff = relative_difference(left.price, right.price);
            if shoulder_diff > self.shoulder_tolerance.get() {
                return None;
            }

            let left_trough = extrema.lowest_trough_between(left.index, head.index)?;
            let right_trough = extrema.lowest_trough_between(head.index, right.index)?;
            let neckline = (left_trough.price + right_trough.price) / 2.0;

            let height = (head.price - neckline) / neckline;
            if height < self.min_height.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (symmetry_score(left.price, right.price), 0.3),
                (amplitude_score(height, REVERSAL_HEIGHT_SCALE), 0.4),
                (recency_score(right.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, head.price - neckline, Signal::Bearish),
                current_price,
                pattern_height_pct: height * 100.0,
                geometry: Geometry::HeadShoulders {
                    left_shoulder: series.landmark(left.index),
                    head: series.landmark(head.index),
                    right_shoulder: series.landmark(right.index),
                    neckline,
                    price_vs_neckline_pct: (current_price - neckline) / neckline * 100.0,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// INVERSE HEAD & SHOULDERS
// ============================================================

/// Inverse Head & Shoulders: three troughs, the middle one lowest, below a
/// neckline drawn through the highest peak on each side of the head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverseHeadShouldersDetector {
    pub window: Period,
    pub lookback: Period,
    pub shoulder_tolerance: Ratio,
    /// Min head depth below the neckline, relative to the neckline
    pub min_depth: Ratio,
    pub min_confidence: u8,
}

impl Default for InverseHeadShouldersDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            lookback: Period::new_const(120),
            shoulder_tolerance: Ratio::new_const(0.15),
            min_depth: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for InverseHeadShouldersDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::InverseHeadShoulders
    }

    fn min_len(&self) -> usize {
        self.window.get() * 5
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let extrema = find_extrema(prices, self.window.get());
        if extrema.troughs.len() < 3 || extrema.peaks.len() < 2 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<3, _>(extrema.troughs_since(start), |&[left, head, right]| {
            if head.price >= left.price || head.price >= right.price {
                return None;
            }
            let shoulder_diff = relative_difference(left.price, right.price);
            if shoulder_diff > self.shoulder_tolerance.get() {
                return None;
            }

            let left_peak = extrema.highest_peak_between(left.index, head.index)?;
            let right_peak = extrema.highest_peak_between(head.index, right.index)?;
            let neckline = (left_peak.price + right_peak.price) / 2.0;

            let depth = (neckline - head.price) / neckline;
            if depth < self.min_depth.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (symmetry_score(left.price, right.price), 0.3),
                (amplitude_score(depth, REVERSAL_HEIGHT_SCALE), 0.4),
                (recency_score(right.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, neckline - head.price, Signal::Bullish),
                current_price,
                pattern_height_pct: depth * 100.0,
                geometry: Geometry::InverseHeadShoulders {
                    left_shoulder: series.landmark(left.index),
                    head: series.landmark(head.index),
                    right_shoulder: series.landmark(right.index),
                    neckline,
                    price_vs_neckline_pct: (current_price - neckline) / neckline * 100.0,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// DOUBLE TOP
// ============================================================

/// Double Top: two near-equal peaks at least `2 * window` bars apart, with the
/// lowest trough between them as the neckline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleTopDetector {
    pub window: Period,
    pub lookback: Period,
    /// Max relative difference between the peaks
    pub peak_tolerance: Ratio,
    /// Min first-peak height above the neckline, relative to the neckline
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(15),
            lookback: Period::new_const(100),
            peak_tolerance: Ratio::new_const(0.03),
            min_height: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for DoubleTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DoubleTop
    }

    fn min_len(&self) -> usize {
        self.window.get() * 4
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let window = self.window.get();
        let extrema = find_extrema(prices, window);
        if extrema.peaks.len() < 2 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<2, _>(extrema.peaks_since(start), |&[first, second]| {
            let peak_diff = relative_difference(first.price, second.price);
            if peak_diff > self.peak_tolerance.get() {
                return None;
            }
            if second.index - first.index < window * 2 {
                return None;
            }

            let trough = extrema.lowest_trough_between(first.index, second.index)?;
            let neckline = trough.price;

            let height = (first.price - neckline) / neckline;
            if height < self.min_height.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (symmetry_score(first.price, second.price), 0.4),
                (amplitude_score(height, REVERSAL_HEIGHT_SCALE), 0.3),
                (recency_score(second.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, first.price - neckline, Signal::Bearish),
                current_price,
                pattern_height_pct: height * 100.0,
                geometry: Geometry::DoubleTop {
                    first_peak: series.landmark(first.index),
                    second_peak: series.landmark(second.index),
                    trough: series.landmark(trough.index),
                    neckline,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

/// Double Bottom: two near-equal troughs at least `2 * window` bars apart,
/// with the highest peak between them as the neckline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleBottomDetector {
    pub window: Period,
    pub lookback: Period,
    pub trough_tolerance: Ratio,
    /// Min neckline height above the first trough, relative to the trough
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(15),
            lookback: Period::new_const(100),
            trough_tolerance: Ratio::new_const(0.03),
            min_height: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for DoubleBottomDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DoubleBottom
    }

    fn min_len(&self) -> usize {
        self.window.get() * 4
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let window = self.window.get();
        let extrema = find_extrema(prices, window);
        if extrema.troughs.len() < 2 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<2, _>(extrema.troughs_since(start), |&[first, second]| {
            let trough_diff = relative_difference(first.price, second.price);
            if trough_diff > self.trough_tolerance.get() {
                return None;
            }
            if second.index - first.index < window * 2 {
                return None;
            }

            let peak = extrema.highest_peak_between(first.index, second.index)?;
            let neckline = peak.price;

            let height = (neckline - first.price) / first.price;
            if height < self.min_height.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (symmetry_score(first.price, second.price), 0.4),
                (amplitude_score(height, REVERSAL_HEIGHT_SCALE), 0.3),
                (recency_score(second.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, neckline - first.price, Signal::Bullish),
                current_price,
                pattern_height_pct: height * 100.0,
                geometry: Geometry::DoubleBottom {
                    first_trough: series.landmark(first.index),
                    second_trough: series.landmark(second.index),
                    peak: series.landmark(peak.index),
                    neckline,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// TRIPLE TOP
// ============================================================

/// Triple Top: three peaks within a band around their mean; the neckline is
/// the lower of the two intervening troughs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleTopDetector {
    pub window: Period,
    pub lookback: Period,
    /// Max deviation of any peak from the mean peak, relative to the mean
    pub peak_tolerance: Ratio,
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for TripleTopDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(12),
            lookback: Period::new_const(150),
            peak_tolerance: Ratio::new_const(0.05),
            min_height: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for TripleTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::TripleTop
    }

    fn min_len(&self) -> usize {
        self.window.get() * 6
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let extrema = find_extrema(prices, self.window.get());
        if extrema.peaks.len() < 3 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<3, _>(extrema.peaks_since(start), |&[first, second, third]| {
            let levels = [first.price, second.price, third.price];
            let avg_peak = mean(levels);
            let max_diff = max_relative_deviation(levels, avg_peak);
            if max_diff > self.peak_tolerance.get() {
                return None;
            }

            let trough1 = extrema.lowest_trough_between(first.index, second.index)?;
            let trough2 = extrema.lowest_trough_between(second.index, third.index)?;
            let neckline = trough1.price.min(trough2.price);

            let height = (avg_peak - neckline) / neckline;
            if height < self.min_height.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (1.0 - max_diff, 0.4),
                (amplitude_score(height, REVERSAL_HEIGHT_SCALE), 0.3),
                (recency_score(third.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, avg_peak - neckline, Signal::Bearish),
                current_price,
                pattern_height_pct: height * 100.0,
                geometry: Geometry::TripleTop {
                    first_peak: series.landmark(first.index),
                    second_peak: series.landmark(second.index),
                    third_peak: series.landmark(third.index),
                    neckline,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// TRIPLE BOTTOM
// ============================================================

/// Triple Bottom: three troughs within a band around their mean; the
/// neckline is the higher of the two intervening peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleBottomDetector {
    pub window: Period,
    pub lookback: Period,
    pub trough_tolerance: Ratio,
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for TripleBottomDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(12),
            lookback: Period::new_const(150),
            trough_tolerance: Ratio::new_const(0.05),
            min_height: Ratio::new_const(0.05),
            min_confidence: 0,
        }
    }
}

impl PatternDetector for TripleBottomDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::TripleBottom
    }

    fn min_len(&self) -> usize {
        self.window.get() * 6
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let extrema = find_extrema(prices, self.window.get());
        if extrema.troughs.len() < 3 {
            return None;
        }

        let start = search_start(n, self.lookback.get());
        let current_price = prices[n - 1];

        let best = best_tuple::<3, _>(extrema.troughs_since(start), |&[first, second, third]| {
            let levels = [first.price, second.price, third.price];
            let avg_trough = mean(levels);
            let max_diff = max_relative_deviation(levels, avg_trough);
            if max_diff > self.trough_tolerance.get() {
                return None;
            }

            let peak1 = extrema.highest_peak_between(first.index, second.index)?;
            let peak2 = extrema.highest_peak_between(second.index, third.index)?;
            let neckline = peak1.price.max(peak2.price);

            let height = (neckline - avg_trough) / avg_trough;
            if height < self.min_height.get() {
                return None;
            }

            let confidence = blend_confidence(&[
                (1.0 - max_diff, 0.4),
                (amplitude_score(height, REVERSAL_HEIGHT_SCALE), 0.3),
                (recency_score(third.index, start, n), 0.3),
            ]);

            Some(PatternCandidate {
                confidence,
                target_price: measured_move(neckline, neckline - avg_trough, Signal::Bullish),
                current_price,
                pattern_height_pct: height * 100.0,
                geometry: Geometry::TripleBottom {
                    first_trough: series.landmark(first.index),
                    second_trough: series.landmark(second.index),
                    third_trough: series.landmark(third.index),
                    neckline,
                },
            })
        })?;

        (best.confidence >= self.min_confidence).then_some(best)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// FALLING WEDGE
// ============================================================

/// Falling Wedge: resistance through the recent peaks and support through the
/// recent troughs both fall, support more slowly, so the channel narrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallingWedgeDetector {
    pub window: Period,
    pub lookback: Period,
    /// Min narrowing of the channel relative to its initial spread
    pub min_convergence: Ratio,
    pub min_confidence: u8,
}

impl Default for FallingWedgeDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(8),
            lookback: Period::new_const(70),
            min_convergence: Ratio::new_const(0.20),
            min_confidence: 30,
        }
    }
}

impl PatternDetector for FallingWedgeDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::FallingWedge
    }

    fn min_len(&self) -> usize {
        WEDGE_MIN_BARS
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let extrema = find_extrema(prices, self.window.get());
        let start = search_start(n, self.lookback.get());
        let peaks = extrema.peaks_since(start);
        let troughs = extrema.troughs_since(start);
        if peaks.len() < 2 || troughs.len() < 2 {
            return None;
        }

        let (first_peak, last_peak) = (peaks[0], peaks[peaks.len() - 1]);
        let (first_trough, last_trough) = (troughs[0], troughs[troughs.len() - 1]);
        let resistance_slope = line_slope(&first_peak, &last_peak);
        let support_slope = line_slope(&first_trough, &last_trough);
        if resistance_slope >= 0.0 || support_slope >= 0.0 {
            return None;
        }
        if support_slope.abs() >= resistance_slope.abs() {
            return None;
        }

        let initial_spread = first_peak.price - first_trough.price;
        let current_spread = last_peak.price - last_trough.price;
        if initial_spread <= 0.0 || current_spread >= initial_spread {
            return None;
        }
        let convergence = (initial_spread - current_spread) / initial_spread;
        if convergence < self.min_convergence.get() {
            return None;
        }

        let confidence = blend_confidence(&[
            (amplitude_score(convergence, WEDGE_CONVERGENCE_SCALE), 0.5),
            (amplitude_score(resistance_slope.abs(), WEDGE_SLOPE_SCALE), 0.5),
        ]);
        if confidence < self.min_confidence {
            return None;
        }

        let breakout_level = last_peak.price;
        Some(PatternCandidate {
            confidence,
            target_price: measured_move(breakout_level, initial_spread, Signal::Bullish),
            current_price: prices[n - 1],
            pattern_height_pct: convergence * 100.0,
            geometry: Geometry::FallingWedge {
                resistance_start: series.landmark(first_peak.index),
                resistance_current: series.landmark(last_peak.index),
                support_start: series.landmark(first_trough.index),
                support_current: series.landmark(last_trough.index),
                breakout_level,
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_config(self.window, self.lookback, self.min_confidence)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static HEAD_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 20.0, (5.0, 30.0), "Extrema window radius"),
    ParamMeta::period("lookback", 120.0, (60.0, 200.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "shoulder_tolerance",
        0.15,
        (0.05, 0.25),
        "Max relative shoulder difference",
    ),
    ParamMeta::ratio("min_height", 0.05, (0.02, 0.10), "Min head height over neckline"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static INVERSE_HEAD_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 20.0, (5.0, 30.0), "Extrema window radius"),
    ParamMeta::period("lookback", 120.0, (60.0, 200.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "shoulder_tolerance",
        0.15,
        (0.05, 0.25),
        "Max relative shoulder difference",
    ),
    ParamMeta::ratio("min_depth", 0.05, (0.02, 0.10), "Min head depth under neckline"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static DOUBLE_TOP_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 15.0, (5.0, 25.0), "Extrema window radius"),
    ParamMeta::period("lookback", 100.0, (60.0, 160.0), "Trailing bars searched"),
    ParamMeta::ratio("peak_tolerance", 0.03, (0.01, 0.06), "Max relative peak difference"),
    ParamMeta::ratio("min_height", 0.05, (0.02, 0.10), "Min peak height over neckline"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static DOUBLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 15.0, (5.0, 25.0), "Extrema window radius"),
    ParamMeta::period("lookback", 100.0, (60.0, 160.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "trough_tolerance",
        0.03,
        (0.01, 0.06),
        "Max relative trough difference",
    ),
    ParamMeta::ratio("min_height", 0.05, (0.02, 0.10), "Min neckline height over trough"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static TRIPLE_TOP_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 12.0, (6.0, 20.0), "Extrema window radius"),
    ParamMeta::period("lookback", 150.0, (90.0, 210.0), "Trailing bars searched"),
    ParamMeta::ratio("peak_tolerance", 0.05, (0.02, 0.08), "Max peak deviation from mean"),
    ParamMeta::ratio("min_height", 0.05, (0.02, 0.10), "Min mean peak over neckline"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static TRIPLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 12.0, (6.0, 20.0), "Extrema window radius"),
    ParamMeta::period("lookback", 150.0, (90.0, 210.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "trough_tolerance",
        0.05,
        (0.02, 0.08),
        "Max trough deviation from mean",
    ),
    ParamMeta::ratio("min_height", 0.05, (0.02, 0.10), "Min neckline over mean trough"),
    ParamMeta::score("min_confidence", 0.0, (0.0, 100.0), "Publish floor"),
];

static FALLING_WEDGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 8.0, (4.0, 12.0), "Extrema window radius"),
    ParamMeta::period("lookback", 70.0, (40.0, 120.0), "Trailing bars searched"),
    ParamMeta::ratio("min_convergence", 0.20, (0.10, 0.40), "Min channel narrowing"),
    ParamMeta::score("min_confidence", 30.0, (0.0, 100.0), "Publish floor"),
];

impl ParameterizedDetector for HeadShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 20)?,
            lookback: get_period(params, "lookback", 120)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.15)?,
            min_height: get_ratio(params, "min_height", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::HeadShoulders
    }
}

impl ParameterizedDetector for InverseHeadShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        INVERSE_HEAD_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 20)?,
            lookback: get_period(params, "lookback", 120)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.15)?,
            min_depth: get_ratio(params, "min_depth", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::InverseHeadShoulders
    }
}

impl ParameterizedDetector for DoubleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_TOP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 15)?,
            lookback: get_period(params, "lookback", 100)?,
            peak_tolerance: get_ratio(params, "peak_tolerance", 0.03)?,
            min_height: get_ratio(params, "min_height", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DoubleTop
    }
}

impl ParameterizedDetector for DoubleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 15)?,
            lookback: get_period(params, "lookback", 100)?,
            trough_tolerance: get_ratio(params, "trough_tolerance", 0.03)?,
            min_height: get_ratio(params, "min_height", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DoubleBottom
    }
}

impl ParameterizedDetector for TripleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIPLE_TOP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 12)?,
            lookback: get_period(params, "lookback", 150)?,
            peak_tolerance: get_ratio(params, "peak_tolerance", 0.05)?,
            min_height: get_ratio(params, "min_height", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::TripleTop
    }
}

impl ParameterizedDetector for TripleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIPLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 12)?,
            lookback: get_period(params, "lookback", 150)?,
            trough_tolerance: get_ratio(params, "trough_tolerance", 0.05)?,
            min_height: get_ratio(params, "min_height", 0.05)?,
            min_confidence: get_score(params, "min_confidence", 0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::TripleBottom
    }
}

impl ParameterizedDetector for FallingWedgeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        FALLING_WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 8)?,
            lookback: get_period(params, "lookback", 70)?,
            min_convergence: get_ratio(params, "min_convergence", 0.20)?,
            min_confidence: get_score(params, "min_confidence", 30)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::FallingWedge
    }
}

// ============================================================
// TESTS
// ============================================================
