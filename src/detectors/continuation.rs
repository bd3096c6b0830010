//! Continuation patterns
//!
//! Triangles read the recent peaks and troughs as two boundary lines. Cup and
//! Handle and Bullish Flag slice fixed trailing segments instead of using
//! extrema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{
    extrema::find_extrema,
    helpers::{
        amplitude_score, argmax, argmin, blend_confidence, check_confidence_floor,
        check_window_fits, line_slope, max_of, max_relative_deviation, mean, measured_move,
        min_of, relative_difference, search_start, FLATNESS_PENALTY, TRIANGLE_HEIGHT_SCALE,
        TRIANGLE_SLOPE_SCALE,
    },
};
use crate::{
    params::{
        check_params, get_period, get_ratio, get_score, ParamMeta, ParameterizedDetector,
    },
    Geometry, PatternCandidate, PatternDetector, PatternError, PatternKind, Period, PriceSeries,
    Ratio, Result, Signal,
};

impl_with_defaults!(
    AscendingTriangleDetector,
    DescendingTriangleDetector,
    CupAndHandleDetector,
    BullishFlagDetector,
);

/// Shortest series either triangle looks at
pub const TRIANGLE_MIN_BARS: usize = 60;
/// Shortest series the cup detector looks at
pub const CUP_MIN_BARS: usize = 80;
/// Shortest cup segment, handle included
const MIN_CUP_SEGMENT: usize = 40;
/// Leading bars of the cup the bottom may not fall into
const CUP_EDGE_BARS: usize = 10;
/// Trailing bars forming the handle
const HANDLE_BARS: usize = 15;
/// Bars sampled for each lip
const LIP_BARS: usize = 5;
const CUP_DEPTH_SCALE: f64 = 3.0;
/// Shortest series the flag detector looks at
pub const FLAG_MIN_BARS: usize = 40;
/// Bars at each end of the pole searched for its low and high
const POLE_EDGE_BARS: usize = 10;
const MIN_POLE_BARS: usize = 15;
const MIN_FLAG_BARS: usize = 8;
const POLE_GAIN_SCALE: f64 = 5.0;
/// Penalty per unit of flag range or pullback
const FLAG_TIGHTNESS_PENALTY: f64 = 10.0;

// ============================================================
// ASCENDING TRIANGLE
// ============================================================

/// Ascending Triangle: flat resistance through the recent peaks over a rising
/// support line through the recent troughs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AscendingTriangleDetector {
    pub window: Period,
    pub lookback: Period,
    /// Max deviation of any peak from the resistance level
    pub flatness_tolerance: Ratio,
    /// Min resistance height over the latest trough
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for AscendingTriangleDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(10),
            lookback: Period::new_const(80),
            flatness_tolerance: Ratio::new_const(0.02),
            min_height: Ratio::new_const(0.03),
            min_confidence: 30,
        }
    }
}

impl PatternDetector for AscendingTriangleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::AscendingTriangle
    }

    fn min_len(&self) -> usize {
        TRIANGLE_MIN_BARS
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

        let resistance = mean(peaks.iter().map(|p| p.price));
        let flatness = max_relative_deviation(peaks.iter().map(|p| p.price), resistance);
        if flatness > self.flatness_tolerance.get() {
            return None;
        }

        let (first, last) = (troughs[0], troughs[troughs.len() - 1]);
        let slope = line_slope(&first, &last);
        if slope <= 0.0 {
            return None;
        }

        let height = (resistance - last.price) / last.price;
        if height < self.min_height.get() {
            return None;
        }

        let confidence = blend_confidence(&[
            (1.0 - flatness * FLATNESS_PENALTY, 0.4),
            (amplitude_score(height, TRIANGLE_HEIGHT_SCALE), 0.3),
            (amplitude_score(slope, TRIANGLE_SLOPE_SCALE), 0.3),
        ]);
        if confidence < self.min_confidence {
            return None;
        }

        Some(PatternCandidate {
            confidence,
            target_price: measured_move(resistance, resistance - last.price, Signal::Bullish),
            current_price: prices[n - 1],
            pattern_height_pct: height * 100.0,
            geometry: Geometry::AscendingTriangle {
                resistance,
                support_start: series.landmark(first.index),
                support_current: series.landmark(last.index),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_window_fits(self.window.get(), self.lookback.get())?;
        check_confidence_floor("min_confidence", self.min_confidence)
    }
}

// ============================================================
// DESCENDING TRIANGLE
// ============================================================

/// Descending Triangle: flat support through the recent troughs under a
/// falling resistance line through the recent peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescendingTriangleDetector {
    pub window: Period,
    pub lookback: Period,
    /// Max deviation of any trough from the support level
    pub flatness_tolerance: Ratio,
    /// Min height of the latest peak over support
    pub min_height: Ratio,
    pub min_confidence: u8,
}

impl Default for DescendingTriangleDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(10),
            lookback: Period::new_const(80),
            flatness_tolerance: Ratio::new_const(0.02),
            min_height: Ratio::new_const(0.03),
            min_confidence: 30,
        }
    }
}

impl PatternDetector for DescendingTriangleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DescendingTriangle
    }

    fn min_len(&self) -> usize {
        TRIANGLE_MIN_BARS
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

        let support = mean(troughs.iter().map(|t| t.price));
        let flatness = max_relative_deviation(troughs.iter().map(|t| t.price), support);
        if flatness > self.flatness_tolerance.get() {
            return None;
        }

        let (first, last) = (peaks[0], peaks[peaks.len() - 1]);
        let slope = line_slope(&first, &last);
        if slope >= 0.0 {
            return None;
        }

        let height = (last.price - support) / support;
        if height < self.min_height.get() {
            return None;
        }

        let confidence = blend_confidence(&[
            (1.0 - flatness * FLATNESS_PENALTY, 0.4),
            (amplitude_score(height, TRIANGLE_HEIGHT_SCALE), 0.3),
            (amplitude_score(slope.abs(), TRIANGLE_SLOPE_SCALE), 0.3),
        ]);
        if confidence < self.min_confidence {
            return None;
        }

        Some(PatternCandidate {
            confidence,
            target_price: measured_move(support, last.price - support, Signal::Bearish),
            current_price: prices[n - 1],
            pattern_height_pct: height * 100.0,
            geometry: Geometry::DescendingTriangle {
                support,
                resistance_start: series.landmark(first.index),
                resistance_current: series.landmark(last.index),
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_window_fits(self.window.get(), self.lookback.get())?;
        check_confidence_floor("min_confidence", self.min_confidence)
    }
}

// ============================================================
// CUP AND HANDLE
// ============================================================

/// Cup and Handle over the trailing `lookback` closes.
///
/// The cup bottom is the lowest close of the segment; the lips are the highest
/// closes near its start and just before the handle, and the handle is the
/// final `15` bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CupAndHandleDetector {
    /// Closes forming the cup and handle
    pub lookback: Period,
    /// Max relative difference between the two lips
    pub lip_tolerance: Ratio,
    pub min_depth: Ratio,
    pub max_depth: Ratio,
    /// Max handle depth as a fraction of the cup depth
    pub max_handle_ratio: Ratio,
    /// Handle depth fraction under which the shape counts as clean
    pub clean_handle_ratio: Ratio,
    pub min_confidence: u8,
}

impl Default for CupAndHandleDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(100),
            lip_tolerance: Ratio::new_const(0.10),
            min_depth: Ratio::new_const(0.10),
            max_depth: Ratio::new_const(0.50),
            max_handle_ratio: Ratio::new_const(0.5),
            clean_handle_ratio: Ratio::new_const(0.3),
            min_confidence: 35,
        }
    }
}

impl PatternDetector for CupAndHandleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::CupAndHandle
    }

    fn min_len(&self) -> usize {
        CUP_MIN_BARS
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let offset = search_start(n, self.lookback.get());
        let cup = &prices[offset..];
        let cup_len = cup.len();
        if cup_len < MIN_CUP_SEGMENT {
            return None;
        }

        let bottom = argmin(cup)?;
        if bottom < CUP_EDGE_BARS || bottom + HANDLE_BARS > cup_len {
            return None;
        }
        let (left, right) = cup.split_at(bottom);

        let left_lip = max_of(&left[..LIP_BARS])?;
        let right_lip = max_of(&right[right.len() - HANDLE_BARS..right.len() - LIP_BARS])?;
        let lip_diff = relative_difference(left_lip, right_lip);
        if lip_diff > self.lip_tolerance.get() {
            return None;
        }

        let cup_bottom = cup[bottom];
        let depth = (left_lip - cup_bottom) / left_lip;
        if depth < self.min_depth.get() || depth > self.max_depth.get() {
            return None;
        }

        let handle_low = min_of(&cup[cup_len - HANDLE_BARS..])?;
        let handle_depth = (right_lip - handle_low) / right_lip;
        if handle_depth > depth * self.max_handle_ratio.get() {
            return None;
        }

        let shape = if handle_depth < depth * self.clean_handle_ratio.get() {
            0.7
        } else {
            0.4
        };
        let confidence = blend_confidence(&[
            (1.0 - lip_diff, 0.3),
            (amplitude_score(depth, CUP_DEPTH_SCALE), 0.4),
            (shape, 0.3),
        ]);
        if confidence < self.min_confidence {
            return None;
        }

        let resistance = left_lip.max(right_lip);
        Some(PatternCandidate {
            confidence,
            target_price: measured_move(resistance, resistance - cup_bottom, Signal::Bullish),
            current_price: prices[n - 1],
            pattern_height_pct: depth * 100.0,
            geometry: Geometry::CupAndHandle {
                cup_bottom: series.landmark(offset + bottom),
                left_lip,
                right_lip,
                handle_low,
                resistance,
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.lookback.get() < MIN_CUP_SEGMENT {
            return Err(PatternError::InvalidConfig(format!(
                "cup lookback must be at least {MIN_CUP_SEGMENT}"
            )));
        }
        if self.min_depth > self.max_depth {
            return Err(PatternError::InvalidConfig(format!(
                "cup min_depth {} exceeds max_depth {}",
                self.min_depth.get(),
                self.max_depth.get()
            )));
        }
        check_confidence_floor("min_confidence", self.min_confidence)
    }
}

// ============================================================
// BULLISH FLAG
// ============================================================

/// Bullish Flag: a steep pole followed by a tight consolidation near the
/// pole high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BullishFlagDetector {
    /// Bars before the flag searched for the pole
    pub pole_bars: Period,
    /// Trailing bars forming the flag
    pub flag_bars: Period,
    pub min_pole_gain: Ratio,
    /// Max flag range relative to the flag high
    pub max_flag_range: Ratio,
    /// Max drop of the flag low under the pole high
    pub max_pullback: Ratio,
    pub min_confidence: u8,
}

impl Default for BullishFlagDetector {
    fn default() -> Self {
        Self {
            pole_bars: Period::new_const(30),
            flag_bars: Period::new_const(15),
            min_pole_gain: Ratio::new_const(0.10),
            max_flag_range: Ratio::new_const(0.08),
            max_pullback: Ratio::new_const(0.10),
            min_confidence: 35,
        }
    }
}

impl PatternDetector for BullishFlagDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BullishFlag
    }

    fn min_len(&self) -> usize {
        FLAG_MIN_BARS
    }

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
        let prices = series.closes();
        let n = prices.len();
        if n < self.min_len() {
            return None;
        }

        let pole_end = n.checked_sub(self.flag_bars.get())?;
        let pole_start = pole_end.saturating_sub(self.pole_bars.get());
        let pole = &prices[pole_start..pole_end];
        if pole.len() < MIN_POLE_BARS {
            return None;
        }

        let low = argmin(&pole[..POLE_EDGE_BARS])?;
        let high = argmax(&pole[pole.len() - POLE_EDGE_BARS..])? + pole.len() - POLE_EDGE_BARS;
        let (pole_low, pole_high) = (pole[low], pole[high]);

        let gain = (pole_high - pole_low) / pole_low;
        if gain < self.min_pole_gain.get() {
            return None;
        }

        let flag = &prices[pole_end..];
        if flag.len() < MIN_FLAG_BARS {
            return None;
        }
        let flag_high = max_of(flag)?;
        let flag_low = min_of(flag)?;

        let range = (flag_high - flag_low) / flag_high;
        if range > self.max_flag_range.get() {
            return None;
        }
        let pullback = (pole_high - flag_low) / pole_high;
        if pullback > self.max_pullback.get() {
            return None;
        }

        let confidence = blend_confidence(&[
            (amplitude_score(gain, POLE_GAIN_SCALE), 0.4),
            (1.0 - range * FLAG_TIGHTNESS_PENALTY, 0.3),
            (1.0 - pullback * FLAG_TIGHTNESS_PENALTY, 0.3),
        ]);
        if confidence < self.min_confidence {
            return None;
        }

        Some(PatternCandidate {
            confidence,
            target_price: measured_move(pole_high, pole_high - pole_low, Signal::Bullish),
            current_price: prices[n - 1],
            pattern_height_pct: gain * 100.0,
            geometry: Geometry::BullishFlag {
                pole_low: series.landmark(pole_start + low),
                pole_high: series.landmark(pole_start + high),
                flag_high,
                flag_low,
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.pole_bars.get() < MIN_POLE_BARS {
            return Err(PatternError::InvalidConfig(format!(
                "pole_bars must be at least {MIN_POLE_BARS}"
            )));
        }
        if self.flag_bars.get() < MIN_FLAG_BARS {
            return Err(PatternError::InvalidConfig(format!(
                "flag_bars must be at least {MIN_FLAG_BARS}"
            )));
        }
        check_confidence_floor("min_confidence", self.min_confidence)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static ASCENDING_TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 10.0, (5.0, 15.0), "Extrema window radius"),
    ParamMeta::period("lookback", 80.0, (40.0, 120.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "flatness_tolerance",
        0.02,
        (0.01, 0.04),
        "Max peak deviation from resistance",
    ),
    ParamMeta::ratio("min_height", 0.03, (0.01, 0.06), "Min resistance over support"),
    ParamMeta::score("min_confidence", 30.0, (0.0, 100.0), "Publish floor"),
];

static DESCENDING_TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 10.0, (5.0, 15.0), "Extrema window radius"),
    ParamMeta::period("lookback", 80.0, (40.0, 120.0), "Trailing bars searched"),
    ParamMeta::ratio(
        "flatness_tolerance",
        0.02,
        (0.01, 0.04),
        "Max trough deviation from support",
    ),
    ParamMeta::ratio("min_height", 0.03, (0.01, 0.06), "Min resistance over support"),
    ParamMeta::score("min_confidence", 30.0, (0.0, 100.0), "Publish floor"),
];

static CUP_AND_HANDLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 100.0, (60.0, 160.0), "Closes forming cup and handle"),
    ParamMeta::ratio("lip_tolerance", 0.10, (0.05, 0.15), "Max relative lip difference"),
    ParamMeta::ratio("min_depth", 0.10, (0.05, 0.20), "Min cup depth"),
    ParamMeta::ratio("max_depth", 0.50, (0.30, 0.60), "Max cup depth"),
    ParamMeta::ratio(
        "max_handle_ratio",
        0.5,
        (0.3, 0.7),
        "Max handle depth as a share of cup depth",
    ),
    ParamMeta::ratio(
        "clean_handle_ratio",
        0.3,
        (0.1, 0.5),
        "Handle share under which the shape scores high",
    ),
    ParamMeta::score("min_confidence", 35.0, (0.0, 100.0), "Publish floor"),
];

static BULLISH_FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pole_bars", 30.0, (15.0, 45.0), "Bars searched for the pole"),
    ParamMeta::period("flag_bars", 15.0, (8.0, 25.0), "Trailing bars forming the flag"),
    ParamMeta::ratio("min_pole_gain", 0.10, (0.05, 0.20), "Min pole gain"),
    ParamMeta::ratio("max_flag_range", 0.08, (0.04, 0.12), "Max flag range"),
    ParamMeta::ratio("max_pullback", 0.10, (0.05, 0.15), "Max flag low under pole high"),
    ParamMeta::score("min_confidence", 35.0, (0.0, 100.0), "Publish floor"),
];

impl ParameterizedDetector for AscendingTriangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ASCENDING_TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 10)?,
            lookback: get_period(params, "lookback", 80)?,
            flatness_tolerance: get_ratio(params, "flatness_tolerance", 0.02)?,
            min_height: get_ratio(params, "min_height", 0.03)?,
            min_confidence: get_score(params, "min_confidence", 30)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::AscendingTriangle
    }
}

impl ParameterizedDetector for DescendingTriangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DESCENDING_TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            window: get_period(params, "window", 10)?,
            lookback: get_period(params, "lookback", 80)?,
            flatness_tolerance: get_ratio(params, "flatness_tolerance", 0.02)?,
            min_height: get_ratio(params, "min_height", 0.03)?,
            min_confidence: get_score(params, "min_confidence", 30)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DescendingTriangle
    }
}

impl ParameterizedDetector for CupAndHandleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        CUP_AND_HANDLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            lookback: get_period(params, "lookback", 100)?,
            lip_tolerance: get_ratio(params, "lip_tolerance", 0.10)?,
            min_depth: get_ratio(params, "min_depth", 0.10)?,
            max_depth: get_ratio(params, "max_depth", 0.50)?,
            max_handle_ratio: get_ratio(params, "max_handle_ratio", 0.5)?,
            clean_handle_ratio: get_ratio(params, "clean_handle_ratio", 0.3)?,
            min_confidence: get_score(params, "min_confidence", 35)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::CupAndHandle
    }
}

impl ParameterizedDetector for BullishFlagDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BULLISH_FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_params(Self::param_meta(), params)?;
        Ok(Self {
            pole_bars: get_period(params, "pole_bars", 30)?,
            flag_bars: get_period(params, "flag_bars", 15)?,
            min_pole_gain: get_ratio(params, "min_pole_gain", 0.10)?,
            max_flag_range: get_ratio(params, "max_flag_range", 0.08)?,
            max_pullback: get_ratio(params, "max_pullback", 0.10)?,
            min_confidence: get_score(params, "min_confidence", 35)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::BullishFlag
    }
}

// ============================================================
// TESTS
// ============================================================
