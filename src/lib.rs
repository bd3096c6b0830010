//! # chartscan - classical chart pattern detection
//!
//! Detects eleven classical chart patterns (Head & Shoulders, Double Top,
//! Ascending Triangle, Cup and Handle, ...) in a series of daily closing
//! prices, scores each with a 0-100 confidence and projects a measured-move
//! target.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartscan::prelude::*;
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! let closes: Vec<f64> = (0..200)
//!     .map(|i| 100.0 + (i as f64 * 0.15).sin() * 8.0)
//!     .collect();
//! let series = PriceSeries::with_daily_dates(start, closes).unwrap();
//!
//! // Create engine with all eleven default detectors
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//!
//! for result in engine.scan_one("ACME", &series) {
//!     println!("{} ({}) confidence {}", result.pattern_name, result.signal, result.confidence());
//! }
//! ```

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;

pub mod detectors;
pub mod params;
pub mod provider;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{get_period, get_ratio, get_score, ParamMeta, ParamType, ParameterizedDetector},
        // Collaborators
        provider::{CachedSeries, CompanyDirectory, CompanyInfo, InMemoryMarket, SeriesProvider},
        // Registry
        registry,
        registry_entry,
        BuiltinDetector,
        EngineBuilder,
        EngineConfig,
        // Types
        Geometry,
        Landmark,
        PatternCandidate,
        PatternCategory,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternGroup,
        PatternKind,
        PatternResult,
        Period,
        PriceSeries,
        Ratio,
        RegistryEntry,
        Result,
        ScanReport,
        ScanSummary,
        Signal,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Contract violations. Missing data or missing geometry is never an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Series shape mismatch: {dates} dates for {closes} closes")]
    LengthMismatch { dates: usize, closes: usize },

    #[error("Invalid close at index {index}: {reason}")]
    InvalidPrice { index: usize, reason: &'static str },

    #[error("Dates not strictly increasing at index {index}")]
    NonChronological { index: usize },

    #[error("Unknown pattern type: {0}")]
    UnknownPattern(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period in index units (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// PRICE SERIES
// ============================================================

/// Chronological daily closes for one instrument.
///
/// Index position is the unit of distance for every geometric check, so
/// calendar gaps (weekends, holidays) are irrelevant once the series is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a validated series.
    ///
    /// Fails when the two columns differ in length, a close is not a finite
    /// positive number, or dates are not strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self> {
        if dates.len() != closes.len() {
            return Err(PatternError::LengthMismatch {
                dates: dates.len(),
                closes: closes.len(),
            });
        }
        for (index, close) in closes.iter().enumerate() {
            if !close.is_finite() {
                return Err(PatternError::InvalidPrice {
                    index,
                    reason: "close is NaN or infinite",
                });
            }
            if *close <= 0.0 {
                return Err(PatternError::InvalidPrice {
                    index,
                    reason: "close must be positive",
                });
            }
        }
        if let Some(index) = dates.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PatternError::NonChronological { index: index + 1 });
        }
        Ok(Self { dates, closes })
    }

    /// Build a series from `(date, close)` pairs.
    pub fn from_points(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Result<Self> {
        let (dates, closes) = points.into_iter().unzip();
        Self::new(dates, closes)
    }

    /// Assign consecutive calendar days starting at `start` to `closes`.
    pub fn with_daily_dates(start: NaiveDate, closes: Vec<f64>) -> Result<Self> {
        let dates = (0..closes.len() as u64)
            .map(|offset| start.checked_add_days(Days::new(offset)))
            .collect::<Option<Vec<_>>>()
            .ok_or(PatternError::InvalidValue("date range overflows the calendar"))?;
        Self::new(dates, closes)
    }

    #[inline]
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    #[inline]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Most recent close
    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// Last `count` points (the whole series if shorter)
    pub fn tail(&self, count: usize) -> PriceSeries {
        let start = self.len().saturating_sub(count);
        PriceSeries {
            dates: self.dates[start..].to_vec(),
            closes: self.closes[start..].to_vec(),
        }
    }

    /// Landmark for a position inside the series.
    ///
    /// Panics if `index >= len()`; detectors only pass indices they obtained
    /// from this series.
    #[inline]
    pub fn landmark(&self, index: usize) -> Landmark {
        Landmark {
            index,
            date: self.dates[index],
            price: self.closes[index],
        }
    }
}

// ============================================================
// PATTERN KINDS & SIGNALS
// ============================================================

/// Directional bias a pattern implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
}

impl Signal {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Signal::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Signal::Bearish)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Bullish => "bullish",
            Signal::Bearish => "bearish",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of pattern by what it signals about the prior trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    Reversal,
    Continuation,
}

/// The eleven supported chart patterns.
///
/// Serialized keys (`head_shoulders`, `double_top`, ...) and the mapping to
/// display name and signal are the stable external contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    HeadShoulders,
    InverseHeadShoulders,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    AscendingTriangle,
    DescendingTriangle,
    CupAndHandle,
    BullishFlag,
    FallingWedge,
}

impl PatternKind {
    /// All kinds in registry order
    pub const ALL: [PatternKind; 11] = [
        PatternKind::HeadShoulders,
        PatternKind::InverseHeadShoulders,
        PatternKind::DoubleTop,
        PatternKind::DoubleBottom,
        PatternKind::TripleTop,
        PatternKind::TripleBottom,
        PatternKind::AscendingTriangle,
        PatternKind::DescendingTriangle,
        PatternKind::CupAndHandle,
        PatternKind::BullishFlag,
        PatternKind::FallingWedge,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PatternKind::HeadShoulders => "head_shoulders",
            PatternKind::InverseHeadShoulders => "inverse_head_shoulders",
            PatternKind::DoubleTop => "double_top",
            PatternKind::DoubleBottom => "double_bottom",
            PatternKind::TripleTop => "triple_top",
            PatternKind::TripleBottom => "triple_bottom",
            PatternKind::AscendingTriangle => "ascending_triangle",
            PatternKind::DescendingTriangle => "descending_triangle",
            PatternKind::CupAndHandle => "cup_and_handle",
            PatternKind::BullishFlag => "bullish_flag",
            PatternKind::FallingWedge => "falling_wedge",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::HeadShoulders => "Head & Shoulders",
            PatternKind::InverseHeadShoulders => "Inverse Head & Shoulders",
            PatternKind::DoubleTop => "Double Top",
            PatternKind::DoubleBottom => "Double Bottom",
            PatternKind::TripleTop => "Triple Top",
            PatternKind::TripleBottom => "Triple Bottom",
            PatternKind::AscendingTriangle => "Ascending Triangle",
            PatternKind::DescendingTriangle => "Descending Triangle",
            PatternKind::CupAndHandle => "Cup and Handle",
            PatternKind::BullishFlag => "Bullish Flag",
            PatternKind::FallingWedge => "Falling Wedge",
        }
    }

    pub fn signal(self) -> Signal {
        match self {
            PatternKind::HeadShoulders
            | PatternKind::DoubleTop
            | PatternKind::TripleTop
            | PatternKind::DescendingTriangle => Signal::Bearish,
            PatternKind::InverseHeadShoulders
            | PatternKind::DoubleBottom
            | PatternKind::TripleBottom
            | PatternKind::AscendingTriangle
            | PatternKind::CupAndHandle
            | PatternKind::BullishFlag
            | PatternKind::FallingWedge => Signal::Bullish,
        }
    }

    pub fn category(self) -> PatternCategory {
        match self {
            PatternKind::AscendingTriangle
            | PatternKind::DescendingTriangle
            | PatternKind::CupAndHandle
            | PatternKind::BullishFlag => PatternCategory::Continuation,
            _ => PatternCategory::Reversal,
        }
    }

    /// Parse a pattern key; `-` is accepted in place of `_`.
    pub fn from_key(key: &str) -> Result<Self> {
        let normalized = key.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| PatternError::UnknownPattern(key.to_string()))
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PatternKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s)
    }
}

// ============================================================
// CANDIDATES & RESULTS
// ============================================================

/// A named point of a pattern (shoulder, peak, cup bottom, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
}

/// Pattern-specific landmarks and levels, one shape per pattern kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Geometry {
    HeadShoulders {
        left_shoulder: Landmark,
        head: Landmark,
        right_shoulder: Landmark,
        neckline: f64,
        price_vs_neckline_pct: f64,
    },
    InverseHeadShoulders {
        left_shoulder: Landmark,
        head: Landmark,
        right_shoulder: Landmark,
        neckline: f64,
        price_vs_neckline_pct: f64,
    },
    DoubleTop {
        first_peak: Landmark,
        second_peak: Landmark,
        trough: Landmark,
        neckline: f64,
    },
    DoubleBottom {
        first_trough: Landmark,
        second_trough: Landmark,
        peak: Landmark,
        neckline: f64,
    },
    TripleTop {
        first_peak: Landmark,
        second_peak: Landmark,
        third_peak: Landmark,
        neckline: f64,
    },
    TripleBottom {
        first_trough: Landmark,
        second_trough: Landmark,
        third_trough: Landmark,
        neckline: f64,
    },
    AscendingTriangle {
        resistance: f64,
        support_start: Landmark,
        support_current: Landmark,
    },
    DescendingTriangle {
        support: f64,
        resistance_start: Landmark,
        resistance_current: Landmark,
    },
    CupAndHandle {
        cup_bottom: Landmark,
        left_lip: f64,
        right_lip: f64,
        handle_low: f64,
        resistance: f64,
    },
    BullishFlag {
        pole_low: Landmark,
        pole_high: Landmark,
        flag_high: f64,
        flag_low: f64,
    },
    FallingWedge {
        resistance_start: Landmark,
        resistance_current: Landmark,
        support_start: Landmark,
        support_current: Landmark,
        breakout_level: f64,
    },
}

impl Geometry {
    /// Pattern kind this shape belongs to
    pub fn kind(&self) -> PatternKind {
        match self {
            Geometry::HeadShoulders { .. } => PatternKind::HeadShoulders,
            Geometry::InverseHeadShoulders { .. } => PatternKind::InverseHeadShoulders,
            Geometry::DoubleTop { .. } => PatternKind::DoubleTop,
            Geometry::DoubleBottom { .. } => PatternKind::DoubleBottom,
            Geometry::TripleTop { .. } => PatternKind::TripleTop,
            Geometry::TripleBottom { .. } => PatternKind::TripleBottom,
            Geometry::AscendingTriangle { .. } => PatternKind::AscendingTriangle,
            Geometry::DescendingTriangle { .. } => PatternKind::DescendingTriangle,
            Geometry::CupAndHandle { .. } => PatternKind::CupAndHandle,
            Geometry::BullishFlag { .. } => PatternKind::BullishFlag,
            Geometry::FallingWedge { .. } => PatternKind::FallingWedge,
        }
    }

    /// Named landmarks in chronological role order, e.g. for chart annotation.
    pub fn landmarks(&self) -> Vec<(&'static str, Landmark)> {
        match *self {
            Geometry::HeadShoulders {
                left_shoulder,
                head,
                right_shoulder,
                ..
            }
            | Geometry::InverseHeadShoulders {
                left_shoulder,
                head,
                right_shoulder,
                ..
            } => vec![
                ("left_shoulder", left_shoulder),
                ("head", head),
                ("right_shoulder", right_shoulder),
            ],
            Geometry::DoubleTop {
                first_peak,
                second_peak,
                trough,
                ..
            } => vec![
                ("first_peak", first_peak),
                ("trough", trough),
                ("second_peak", second_peak),
            ],
            Geometry::DoubleBottom {
                first_trough,
                second_trough,
                peak,
                ..
            } => vec![
                ("first_trough", first_trough),
                ("peak", peak),
                ("second_trough", second_trough),
            ],
            Geometry::TripleTop {
                first_peak,
                second_peak,
                third_peak,
                ..
            } => vec![
                ("first_peak", first_peak),
                ("second_peak", second_peak),
                ("third_peak", third_peak),
            ],
            Geometry::TripleBottom {
                first_trough,
                second_trough,
                third_trough,
                ..
            } => vec![
                ("first_trough", first_trough),
                ("second_trough", second_trough),
                ("third_trough", third_trough),
            ],
            Geometry::AscendingTriangle {
                support_start,
                support_current,
                ..
            } => vec![
                ("support_start", support_start),
                ("support_current", support_current),
            ],
            Geometry::DescendingTriangle {
                resistance_start,
                resistance_current,
                ..
            } => vec![
                ("resistance_start", resistance_start),
                ("resistance_current", resistance_current),
            ],
            Geometry::CupAndHandle { cup_bottom, .. } => vec![("cup_bottom", cup_bottom)],
            Geometry::BullishFlag {
                pole_low,
                pole_high,
                ..
            } => vec![("pole_low", pole_low), ("pole_high", pole_high)],
            Geometry::FallingWedge {
                resistance_start,
                resistance_current,
                support_start,
                support_current,
                ..
            } => vec![
                ("resistance_start", resistance_start),
                ("support_start", support_start),
                ("resistance_current", resistance_current),
                ("support_current", support_current),
            ],
        }
    }
}

/// Best accepted pattern instance for one (series, pattern kind).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternCandidate {
    /// Heuristic score 0..=100
    pub confidence: u8,
    /// Measured-move projection from the breakout level
    pub target_price: f64,
    /// Last close of the analysed series
    pub current_price: f64,
    /// Amplitude in percent: head height, cup depth, pole gain or wedge convergence
    pub pattern_height_pct: f64,
    #[serde(flatten)]
    pub geometry: Geometry,
}

impl PatternCandidate {
    #[inline]
    pub fn kind(&self) -> PatternKind {
        self.geometry.kind()
    }
}

/// Externally visible outcome of running one detector for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternResult {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub pattern_type: PatternKind,
    pub pattern_name: &'static str,
    pub signal: Signal,
    pub detected: bool,
    #[serde(flatten)]
    pub candidate: Option<PatternCandidate>,
}

impl PatternResult {
    pub fn new(
        kind: PatternKind,
        ticker: &str,
        company: &provider::CompanyInfo,
        candidate: Option<PatternCandidate>,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: company.name.clone(),
            sector: company.sector.clone(),
            pattern_type: kind,
            pattern_name: kind.name(),
            signal: kind.signal(),
            detected: candidate.is_some(),
            candidate,
        }
    }

    /// Confidence of the detected pattern, 0 when nothing was detected
    pub fn confidence(&self) -> u8 {
        self.candidate.as_ref().map_or(0, |c| c.confidence)
    }

    pub fn target_price(&self) -> Option<f64> {
        self.candidate.as_ref().map(|c| c.target_price)
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// A configured detector for one chart pattern.
///
/// `detect` is pure: the same series always yields the same answer, and
/// `None` covers short input, missing geometry and sub-threshold confidence.
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;

    /// Shortest series the detector will look at
    fn min_len(&self) -> usize;

    fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate.
/// Variant names mirror `PatternKind` variants.
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch, no vtable
        #[derive(Debug, Clone, PartialEq)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            /// Default-configured detector for `kind`
            pub fn for_kind(kind: PatternKind) -> Self {
                match kind {
                    $(PatternKind::$variant => Self::$variant(<$detector>::default())),*
                }
            }

            #[inline]
            pub fn detect(&self, series: &PriceSeries) -> Option<PatternCandidate> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, series)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_len(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_len(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Reversal
    HeadShoulders(HeadShouldersDetector),
    InverseHeadShoulders(InverseHeadShouldersDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    TripleTop(TripleTopDetector),
    TripleBottom(TripleBottomDetector),
    FallingWedge(FallingWedgeDetector),

    // Continuation
    AscendingTriangle(AscendingTriangleDetector),
    DescendingTriangle(DescendingTriangleDetector),
    CupAndHandle(CupAndHandleDetector),
    BullishFlag(BullishFlagDetector),
}

// ============================================================
// REGISTRY
// ============================================================

/// One row of the pattern registry
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub kind: PatternKind,
    pub name: &'static str,
    pub signal: Signal,
    pub detector: BuiltinDetector,
}

static REGISTRY: LazyLock<Vec<RegistryEntry>> = LazyLock::new(|| {
    PatternKind::ALL
        .into_iter()
        .map(|kind| RegistryEntry {
            kind,
            name: kind.name(),
            signal: kind.signal(),
            detector: BuiltinDetector::for_kind(kind),
        })
        .collect()
});

/// Process-wide table of the eleven default detectors, in `PatternKind::ALL` order.
pub fn registry() -> &'static [RegistryEntry] {
    &REGISTRY
}

/// Look up a registry row by key (`double_top`, `double-top`, ...)
pub fn registry_entry(key: &str) -> Result<&'static RegistryEntry> {
    let kind = PatternKind::from_key(key)?;
    registry()
        .iter()
        .find(|entry| entry.kind == kind)
        .ok_or_else(|| PatternError::UnknownPattern(key.to_string()))
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra publish floor applied on top of each detector's own floor
    pub min_confidence: Option<u8>,
    pub pattern_filter: Option<Vec<PatternKind>>,
    /// Batch scans skip tickers with fewer closes than this
    pub min_history: usize,
    /// Number of closes requested from the series provider
    pub lookback: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: None,
            pattern_filter: None,
            min_history: 60,
            lookback: 252,
        }
    }
}

/// Main pattern detection engine
#[derive(Debug, Clone)]
pub struct PatternEngine {
    detectors: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self {
            detectors: registry().iter().map(|e| e.detector.clone()).collect(),
            config: EngineConfig::default(),
        }
    }
}

impl PatternEngine {
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    /// Pattern kinds this engine will report, in registry order
    pub fn kinds(&self) -> impl Iterator<Item = PatternKind> + '_ {
        PatternKind::ALL
            .into_iter()
            .filter(|kind| self.detector(*kind).is_some() && self.kind_enabled(*kind))
    }

    pub fn detector(&self, kind: PatternKind) -> Option<&BuiltinDetector> {
        self.detectors.iter().find(|d| d.kind() == kind)
    }

    // ===========================================
    // SINGLE SERIES
    // ===========================================

    /// Run one detector against one series.
    pub fn detect(&self, kind: PatternKind, series: &PriceSeries) -> Option<PatternCandidate> {
        if !self.kind_enabled(kind) {
            return None;
        }
        let candidate = self.detector(kind)?.detect(series)?;
        if !self.passes_floor(&candidate) {
            return None;
        }
        tracing::trace!(
            pattern = kind.key(),
            confidence = candidate.confidence,
            "pattern accepted"
        );
        Some(candidate)
    }

    /// Run one detector and always produce a result record, detected or not.
    pub fn analyze(
        &self,
        kind: PatternKind,
        ticker: &str,
        company: &provider::CompanyInfo,
        series: &PriceSeries,
    ) -> PatternResult {
        PatternResult::new(kind, ticker, company, self.detect(kind, series))
    }

    /// Run every detector against one series and keep the detected results.
    pub fn scan_one(&self, ticker: &str, series: &PriceSeries) -> Vec<PatternResult> {
        self.scan_company(ticker, &provider::CompanyInfo::default(), series)
    }

    /// Like [`scan_one`](Self::scan_one) with company metadata attached.
    pub fn scan_company(
        &self,
        ticker: &str,
        company: &provider::CompanyInfo,
        series: &PriceSeries,
    ) -> Vec<PatternResult> {
        self.kinds()
            .filter_map(|kind| {
                self.detect(kind, series)
                    .map(|c| PatternResult::new(kind, ticker, company, Some(c)))
            })
            .collect()
    }

    // ===========================================
    // BATCH
    // ===========================================

    /// Scan many tickers for every enabled pattern, grouped by pattern kind.
    pub fn scan_many<S, P>(&self, tickers: &[S], provider: &P) -> ScanReport
    where
        S: AsRef<str> + Sync,
        P: provider::SeriesProvider + provider::CompanyDirectory,
    {
        let _span = tracing::debug_span!("scan_many", tickers = tickers.len()).entered();
        let (results, skipped) = self.scan_tickers(tickers, provider, None);
        let groups: Vec<PatternGroup> = self
            .kinds()
            .map(|kind| PatternGroup::collect(kind, &results))
            .collect();
        let report = ScanReport::new(groups, tickers.len(), skipped);
        tracing::debug!(
            total = report.summary.total_patterns,
            bullish = report.summary.bullish_patterns,
            bearish = report.summary.bearish_patterns,
            skipped = report.summary.tickers_skipped,
            "batch scan finished"
        );
        report
    }

    /// Scan many tickers for a single pattern kind.
    pub fn scan_pattern<S, P>(&self, kind: PatternKind, tickers: &[S], provider: &P) -> PatternGroup
    where
        S: AsRef<str> + Sync,
        P: provider::SeriesProvider + provider::CompanyDirectory,
    {
        let _span =
            tracing::debug_span!("scan_pattern", pattern = kind.key(), tickers = tickers.len())
                .entered();
        let (results, _) = self.scan_tickers(tickers, provider, Some(kind));
        PatternGroup::collect(kind, &results)
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn scan_tickers<S, P>(
        &self,
        tickers: &[S],
        provider: &P,
        only: Option<PatternKind>,
    ) -> (Vec<PatternResult>, Vec<String>)
    where
        S: AsRef<str> + Sync,
        P: provider::SeriesProvider + provider::CompanyDirectory,
    {
        // Ordered collect keeps ticker order for the stable sort downstream.
        let outcomes: Vec<TickerOutcome> = tickers
            .par_iter()
            .map(|ticker| self.scan_ticker(ticker.as_ref(), provider, only))
            .collect();

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                TickerOutcome::Scanned(found) => results.extend(found),
                TickerOutcome::Skipped(ticker) => skipped.push(ticker),
            }
        }
        (results, skipped)
    }

    fn scan_ticker<P>(&self, ticker: &str, provider: &P, only: Option<PatternKind>) -> TickerOutcome
    where
        P: provider::SeriesProvider + provider::CompanyDirectory,
    {
        let Some(series) = provider.get_series(ticker, self.config.lookback) else {
            tracing::debug!(ticker, "price history unavailable, skipping");
            return TickerOutcome::Skipped(ticker.to_string());
        };
        if series.len() < self.config.min_history {
            tracing::debug!(
                ticker,
                len = series.len(),
                need = self.config.min_history,
                "price history too short, skipping"
            );
            return TickerOutcome::Skipped(ticker.to_string());
        }

        let company = provider.company_info(ticker).unwrap_or_default();
        let found = match only {
            Some(kind) => self
                .detect(kind, &series)
                .map(|c| PatternResult::new(kind, ticker, &company, Some(c)))
                .into_iter()
                .collect(),
            None => self.scan_company(ticker, &company, &series),
        };
        TickerOutcome::Scanned(found)
    }

    fn kind_enabled(&self, kind: PatternKind) -> bool {
        self.config
            .pattern_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&kind))
    }

    fn passes_floor(&self, candidate: &PatternCandidate) -> bool {
        self.config
            .min_confidence
            .map_or(true, |min| candidate.confidence >= min)
    }

    fn validate(&self) -> Result<()> {
        for (i, d) in self.detectors.iter().enumerate() {
            d.validate_config()?;
            if self.detectors[..i].iter().any(|other| other.kind() == d.kind()) {
                return Err(PatternError::InvalidConfig(format!(
                    "more than one detector registered for {}",
                    d.kind()
                )));
            }
        }
        if let Some(min) = self.config.min_confidence {
            if min > 100 {
                return Err(PatternError::OutOfRange {
                    field: "min_confidence",
                    value: f64::from(min),
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        if self.config.lookback < self.config.min_history {
            return Err(PatternError::InvalidConfig(format!(
                "lookback {} is shorter than min_history {}",
                self.config.lookback, self.config.min_history
            )));
        }
        Ok(())
    }
}

enum TickerOutcome {
    Scanned(Vec<PatternResult>),
    Skipped(String),
}

// ============================================================
// SCAN REPORT
// ============================================================

/// All detections of one pattern kind, best first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternGroup {
    pub pattern_type: PatternKind,
    pub name: &'static str,
    pub signal: Signal,
    pub count: usize,
    pub patterns: Vec<PatternResult>,
}

impl PatternGroup {
    fn collect(kind: PatternKind, results: &[PatternResult]) -> Self {
        let mut patterns: Vec<PatternResult> = results
            .iter()
            .filter(|r| r.pattern_type == kind)
            .cloned()
            .collect();
        // Stable: equal confidence keeps ticker order.
        patterns.sort_by(|a, b| b.confidence().cmp(&a.confidence()));
        Self {
            pattern_type: kind,
            name: kind.name(),
            signal: kind.signal(),
            count: patterns.len(),
            patterns,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total_patterns: usize,
    pub bullish_patterns: usize,
    pub bearish_patterns: usize,
    pub tickers_scanned: usize,
    pub tickers_skipped: usize,
}

/// Output of [`PatternEngine::scan_many`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub pattern_types: Vec<PatternGroup>,
    pub summary: ScanSummary,
    pub skipped: Vec<String>,
}

impl ScanReport {
    fn new(pattern_types: Vec<PatternGroup>, tickers: usize, skipped: Vec<String>) -> Self {
        let count = |signal: Signal| {
            pattern_types
                .iter()
                .filter(|g| g.signal == signal)
                .map(|g| g.count)
                .sum::<usize>()
        };
        let bullish_patterns = count(Signal::Bullish);
        let bearish_patterns = count(Signal::Bearish);
        let summary = ScanSummary {
            total_patterns: bullish_patterns + bearish_patterns,
            bullish_patterns,
            bearish_patterns,
            tickers_scanned: tickers - skipped.len(),
            tickers_skipped: skipped.len(),
        };
        Self {
            pattern_types,
            summary,
            skipped,
        }
    }

    pub fn group(&self, kind: PatternKind) -> Option<&PatternGroup> {
        self.pattern_types.iter().find(|g| g.pattern_type == kind)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    detectors: Vec<BuiltinDetector>,
    config: EngineConfig,
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all eleven registry detectors with default configurations
    pub fn with_all_defaults(mut self) -> Self {
        self.detectors
            .extend(registry().iter().map(|entry| entry.detector.clone()));
        self
    }

    /// Add only reversal patterns with defaults (7)
    pub fn with_reversal_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![
            HeadShoulders,
            InverseHeadShoulders,
            DoubleTop,
            DoubleBottom,
            TripleTop,
            TripleBottom,
            FallingWedge,
        ]);
        self
    }

    /// Add only continuation patterns with defaults (4)
    pub fn with_continuation_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![
            AscendingTriangle,
            DescendingTriangle,
            CupAndHandle,
            BullishFlag,
        ]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.detectors.push(detector);
        Ok(self)
    }

    /// Replace the whole engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set minimum confidence filter
    pub fn min_confidence(mut self, confidence: u8) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.config.pattern_filter = Some(kinds.into_iter().collect());
        self
    }

    pub fn min_history(mut self, closes: usize) -> Self {
        self.config.min_history = closes;
        self
    }

    pub fn lookback(mut self, closes: usize) -> Self {
        self.config.lookback = closes;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            detectors: self.detectors,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompanyInfo, InMemoryMarket};

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n)
    }

    fn daily(closes: Vec<f64>) -> PriceSeries {
        PriceSeries::with_daily_dates(day(0), closes).unwrap()
    }

    /// Linear interpolation through `(index, price)` anchors
    fn piecewise(anchors: &[(usize, f64)]) -> Vec<f64> {
        let mut out = vec![anchors[0].1];
        for pair in anchors.windows(2) {
            let ((i0, p0), (i1, p1)) = (pair[0], pair[1]);
            for i in i0 + 1..=i1 {
                out.push(p0 + (p1 - p0) * (i - i0) as f64 / (i1 - i0) as f64);
            }
        }
        out
    }

    fn double_top_closes() -> Vec<f64> {
        piecewise(&[(0, 100.0), (30, 120.0), (60, 105.0), (90, 120.0), (110, 100.0)])
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let err = PriceSeries::new(vec![day(0), day(1)], vec![1.0]).unwrap_err();
        assert_eq!(err, PatternError::LengthMismatch { dates: 2, closes: 1 });
    }

    #[test]
    fn test_series_rejects_bad_prices() {
        let err = PriceSeries::new(vec![day(0), day(1)], vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, PatternError::InvalidPrice { index: 1, .. }));

        let err = PriceSeries::new(vec![day(0)], vec![f64::NAN]).unwrap_err();
        assert!(matches!(err, PatternError::InvalidPrice { index: 0, .. }));
    }

    #[test]
    fn test_series_rejects_unordered_dates() {
        let err = PriceSeries::new(vec![day(0), day(2), day(2)], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, PatternError::NonChronological { index: 2 });
    }

    #[test]
    fn test_series_tail() {
        let series = daily(vec![1.0, 2.0, 3.0, 4.0]);
        let tail = series.tail(2);
        assert_eq!(tail.closes(), &[3.0, 4.0]);
        assert_eq!(tail.dates()[0], day(2));
        assert_eq!(series.tail(10).len(), 4);
    }

    #[test]
    fn test_pattern_kind_keys() {
        for kind in PatternKind::ALL {
            assert_eq!(PatternKind::from_key(kind.key()).unwrap(), kind);
        }
        assert_eq!(
            "head-shoulders".parse::<PatternKind>().unwrap(),
            PatternKind::HeadShoulders
        );
        assert!(PatternKind::from_key("pennant").is_err());
    }

    #[test]
    fn test_registry_contract() {
        let reg = registry();
        assert_eq!(reg.len(), 11);
        let bearish: Vec<_> = reg
            .iter()
            .filter(|e| e.signal.is_bearish())
            .map(|e| e.kind.key())
            .collect();
        assert_eq!(
            bearish,
            ["head_shoulders", "double_top", "triple_top", "descending_triangle"]
        );
        for entry in reg {
            assert_eq!(entry.detector.kind(), entry.kind);
        }
        assert_eq!(registry_entry("cup-and-handle").unwrap().name, "Cup and Handle");
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new().with_all_defaults().build();
        assert!(engine.is_ok());
        assert_eq!(engine.unwrap().detectors().len(), 11);
    }

    #[test]
    fn test_category_defaults_cover_registry() {
        let engine = EngineBuilder::new()
            .with_reversal_defaults()
            .with_continuation_defaults()
            .build()
            .unwrap();
        let kinds: Vec<_> = engine.kinds().collect();
        assert_eq!(kinds, PatternKind::ALL.to_vec());
    }

    #[test]
    fn test_report_groups_follow_registry_order() {
        let engine = EngineBuilder::new()
            .with_continuation_defaults()
            .with_reversal_defaults()
            .build()
            .unwrap();
        let market = InMemoryMarket::new().with_series("DT", daily(double_top_closes()));
        let report = engine.scan_many(&["DT"], &market);
        let order: Vec<_> = report.pattern_types.iter().map(|g| g.pattern_type).collect();
        assert_eq!(order, PatternKind::ALL.to_vec());
    }

    #[test]
    fn test_duplicate_detector_rejected() {
        let result = EngineBuilder::new()
            .add(BuiltinDetector::for_kind(PatternKind::DoubleTop))
            .add(BuiltinDetector::for_kind(PatternKind::DoubleTop))
            .build();
        assert!(matches!(result, Err(PatternError::InvalidConfig(_))));
    }

    #[test]
    fn test_lookback_shorter_than_history_rejected() {
        let result = EngineBuilder::new()
            .with_all_defaults()
            .lookback(30)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_scan() {
        let engine = PatternEngine::default();
        let series = daily(vec![]);
        assert!(engine.scan_one("NONE", &series).is_empty());
    }

    #[test]
    fn test_double_top_through_engine() {
        let engine = PatternEngine::default();
        let series = daily(double_top_closes());
        let found = engine.scan_one("DT", &series);
        let top = found
            .iter()
            .find(|r| r.pattern_type == PatternKind::DoubleTop)
            .expect("double top detected");
        assert!(top.detected);
        assert_eq!(top.signal, Signal::Bearish);
        assert_eq!(top.ticker, "DT");
    }

    #[test]
    fn test_min_confidence_filter() {
        let engine = EngineBuilder::new()
            .add(BuiltinDetector::for_kind(PatternKind::DoubleTop))
            .min_confidence(100)
            .build()
            .unwrap();
        let series = daily(double_top_closes());
        assert!(engine.detect(PatternKind::DoubleTop, &series).is_none());
    }

    #[test]
    fn test_pattern_filter() {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .only_patterns([PatternKind::CupAndHandle])
            .build()
            .unwrap();
        let series = daily(double_top_closes());
        assert!(engine.scan_one("DT", &series).is_empty());
        assert_eq!(engine.kinds().count(), 1);
    }

    #[test]
    fn test_analyze_not_detected_record() {
        let engine = PatternEngine::default();
        let series = daily(vec![100.0; 80]);
        let company = CompanyInfo::new("Flat Corp", "Utilities");
        let result = engine.analyze(PatternKind::TripleTop, "FLAT", &company, &series);
        assert!(!result.detected);
        assert_eq!(result.confidence(), 0);
        assert_eq!(result.target_price(), None);
        assert_eq!(result.company_name, "Flat Corp");
        assert_eq!(result.pattern_name, "Triple Top");
    }

    #[test]
    fn test_scan_many_skips_missing_and_short() {
        let market = InMemoryMarket::new()
            .with_series("DT", daily(double_top_closes()))
            .with_series("SHORT", daily(vec![100.0; 20]))
            .with_company("DT", CompanyInfo::new("Double Corp", "Industrials"));
        let engine = PatternEngine::default();

        let report = engine.scan_many(&["DT", "SHORT", "MISSING"], &market);
        assert_eq!(report.skipped, vec!["SHORT".to_string(), "MISSING".to_string()]);
        assert_eq!(report.summary.tickers_scanned, 1);
        assert_eq!(report.summary.tickers_skipped, 2);
        assert_eq!(report.pattern_types.len(), 11);

        let group = report.group(PatternKind::DoubleTop).unwrap();
        assert_eq!(group.count, 1);
        assert_eq!(group.patterns[0].company_name, "Double Corp");
        assert_eq!(
            report.summary.total_patterns,
            report.summary.bullish_patterns + report.summary.bearish_patterns
        );
        assert!(report.summary.bearish_patterns >= 1);
    }

    #[test]
    fn test_scan_pattern_orders_ties_by_ticker() {
        let closes = double_top_closes();
        let market = InMemoryMarket::new()
            .with_series("BBB", daily(closes.clone()))
            .with_series("AAA", daily(closes));
        let engine = PatternEngine::default();

        let group = engine.scan_pattern(PatternKind::DoubleTop, &["BBB", "AAA"], &market);
        assert_eq!(group.count, 2);
        assert_eq!(group.patterns[0].confidence(), group.patterns[1].confidence());
        assert_eq!(group.patterns[0].ticker, "BBB");
        assert_eq!(group.patterns[1].ticker, "AAA");
    }
}
