//! Common helpers shared across chart pattern detectors
//!
//! Confidence sub-scores, the weighted blend into a 0-100 integer, the
//! measured-move projector and the best-candidate search over consecutive
//! extrema tuples.

use super::extrema::ExtremaPoint;
use crate::{PatternCandidate, PatternError, Result, Signal};

// ============================================================
// SCORE SCALES
// ============================================================

/// Amplitude scale for head/peak height in reversal patterns
pub const REVERSAL_HEIGHT_SCALE: f64 = 5.0;
/// Amplitude scale for triangle height
pub const TRIANGLE_HEIGHT_SCALE: f64 = 10.0;
/// Penalty per unit of triangle boundary flatness
pub const FLATNESS_PENALTY: f64 = 20.0;
/// Triangle trendline slope (price per bar) that scores full convergence
pub const TRIANGLE_SLOPE_SCALE: f64 = 1000.0;

// ============================================================
// SUB-SCORES
// ============================================================

/// `|a - b| / max(a, b)`
#[inline]
pub fn relative_difference(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.max(b)
}

/// `1 - relative_difference(a, b)`; 1.0 for identical levels.
#[inline]
pub fn symmetry_score(a: f64, b: f64) -> f64 {
    1.0 - relative_difference(a, b)
}

/// `min(ratio * scale, 1)`
#[inline]
pub fn amplitude_score(ratio: f64, scale: f64) -> f64 {
    (ratio * scale).min(1.0)
}

/// Position of `index` inside the look-back, 0 at `search_start`, towards 1 at the end.
#[inline]
pub fn recency_score(index: usize, search_start: usize, len: usize) -> f64 {
    (index - search_start) as f64 / (len - search_start) as f64
}

/// Weighted sum of `(score, weight)` pairs, scaled to 0..=100, truncated and clamped.
pub fn blend_confidence(parts: &[(f64, f64)]) -> u8 {
    let raw = parts.iter().fold(0.0, |acc, (score, weight)| acc + score * weight) * 100.0;
    // `as` saturates and maps NaN to 0
    (raw as i64).clamp(0, 100) as u8
}

// ============================================================
// LEVELS & GEOMETRY
// ============================================================

/// First index of the trailing look-back window
#[inline]
pub fn search_start(len: usize, lookback: usize) -> usize {
    len.saturating_sub(lookback)
}

/// Slope between two extrema in price per bar (`+1` keeps it finite for equal indices).
#[inline]
pub fn line_slope(first: &ExtremaPoint, last: &ExtremaPoint) -> f64 {
    (last.price - first.price) / (last.index - first.index + 1) as f64
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    sum / count as f64
}

/// Largest `|v - center| / center`
pub fn max_relative_deviation(values: impl IntoIterator<Item = f64>, center: f64) -> f64 {
    values
        .into_iter()
        .map(|v| (v - center).abs() / center)
        .fold(0.0, f64::max)
}

/// Index of the first minimum
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the first maximum
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[inline]
pub fn max_of(values: &[f64]) -> Option<f64> {
    argmax(values).map(|i| values[i])
}

#[inline]
pub fn min_of(values: &[f64]) -> Option<f64> {
    argmin(values).map(|i| values[i])
}

// ============================================================
// TARGET PROJECTION
// ============================================================

/// Measured move: project `height` beyond `level` in the signal's direction.
#[inline]
pub fn measured_move(level: f64, height: f64, signal: Signal) -> f64 {
    match signal {
        Signal::Bullish => level + height,
        Signal::Bearish => level - height,
    }
}

// ============================================================
// CANDIDATE SEARCH
// ============================================================

/// Keeps the highest-confidence candidate offered so far.
///
/// Only strictly higher confidence replaces the incumbent, so ties keep the
/// earliest candidate and a zero-confidence candidate is never kept.
#[derive(Debug, Default)]
pub struct BestCandidate {
    best: Option<PatternCandidate>,
}

impl BestCandidate {
    pub fn offer(&mut self, candidate: PatternCandidate) {
        let floor = self.best.as_ref().map_or(0, |b| b.confidence);
        if candidate.confidence > floor {
            self.best = Some(candidate);
        }
    }

    pub fn into_inner(self) -> Option<PatternCandidate> {
        self.best
    }
}

/// Evaluate every run of `K` consecutive anchors in index order and return
/// the best accepted candidate. Roles are positional: `tuple[0]` is the
/// leftmost role.
pub fn best_tuple<const K: usize, F>(anchors: &[ExtremaPoint], mut evaluate: F) -> Option<PatternCandidate>
where
    F: FnMut(&[ExtremaPoint; K]) -> Option<PatternCandidate>,
{
    let mut best = BestCandidate::default();
    if K == 0 {
        return None;
    }
    for run in anchors.windows(K) {
        if let Ok(tuple) = <&[ExtremaPoint; K]>::try_from(run) {
            if let Some(candidate) = evaluate(tuple) {
                best.offer(candidate);
            }
        }
    }
    best.into_inner()
}

// ============================================================
// CONFIG CHECKS
// ============================================================

/// Publish floors are percentages.
pub fn check_confidence_floor(field: &'static str, value: u8) -> Result<()> {
    if value > 100 {
        return Err(PatternError::OutOfRange {
            field,
            value: f64::from(value),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

/// The look-back has to fit at least one full extrema window.
pub fn check_window_fits(window: usize, lookback: usize) -> Result<()> {
    if lookback < 2 * window + 1 {
        return Err(PatternError::InvalidConfig(format!(
            "lookback {lookback} cannot hold a window of radius {window}"
        )));
    }
    Ok(())
}
