//! Integration tests for the chartscan pattern engine.
//!
//! These tests drive the public API end to end: detectors, engine, batch
//! scans and the serialized result contract.

use chartscan::prelude::*;
use chrono::NaiveDate;
use serde_json::json;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn daily(closes: Vec<f64>) -> PriceSeries {
    PriceSeries::with_daily_dates(start(), closes).unwrap()
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

fn double_top_series() -> PriceSeries {
    daily(piecewise(&[(0, 100.0), (30, 120.0), (60, 105.0), (90, 120.0), (110, 100.0)]))
}

fn head_shoulders_series() -> PriceSeries {
    daily(piecewise(&[
        (0, 100.0),
        (10, 148.0),
        (20, 130.0),
        (30, 150.0),
        (40, 125.0),
        (50, 147.0),
        (60, 120.0),
    ]))
}

// ============================================================
// SCENARIOS
// ============================================================

#[test]
fn test_head_and_shoulders_scenario() {
    let detector = HeadShouldersDetector {
        window: Period::new(5).unwrap(),
        ..HeadShouldersDetector::with_defaults()
    };
    let engine = EngineBuilder::new()
        .add_checked(BuiltinDetector::HeadShoulders(detector))
        .unwrap()
        .build()
        .unwrap();

    let company = CompanyInfo::new("Shoulder Co", "Materials");
    let result = engine.analyze(
        PatternKind::HeadShoulders,
        "HS",
        &company,
        &head_shoulders_series(),
    );
    assert!(result.detected);
    assert_eq!(result.signal, Signal::Bearish);

    let candidate = result.candidate.as_ref().unwrap();
    let Geometry::HeadShoulders {
        left_shoulder,
        head,
        right_shoulder,
        neckline,
        price_vs_neckline_pct,
    } = candidate.geometry
    else {
        panic!("unexpected geometry {:?}", candidate.geometry);
    };
    assert_eq!(head.price, 150.0);
    assert_eq!((left_shoulder.price, right_shoulder.price), (148.0, 147.0));
    assert!((neckline - 127.5).abs() < 1e-9);
    assert!((candidate.target_price - (neckline - (head.price - neckline))).abs() < 1e-9);
    assert!((price_vs_neckline_pct - (120.0 - 127.5) / 127.5 * 100.0).abs() < 1e-9);
    assert_eq!(candidate.confidence, 89);
}

#[test]
fn test_double_top_scenario() {
    let engine = PatternEngine::default();
    let found = engine.scan_one("DT", &double_top_series());

    let top = found
        .iter()
        .find(|r| r.pattern_type == PatternKind::DoubleTop)
        .expect("double top");
    assert!(top.detected);
    assert_eq!(top.pattern_type.key(), "double_top");
    assert_eq!(top.signal.as_str(), "bearish");
    assert_eq!(top.confidence(), 85);
    assert_eq!(top.target_price(), Some(90.0));
}

#[test]
fn test_monotonic_series_has_no_reversal() {
    let closes: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.5).collect();
    let engine = PatternEngine::default();

    for result in engine.scan_one("UP", &daily(closes)) {
        assert_eq!(result.signal, Signal::Bullish, "{}", result.pattern_name);
        assert_eq!(
            result.pattern_type.category(),
            PatternCategory::Continuation,
            "{}",
            result.pattern_name
        );
    }
}

#[test]
fn test_flat_series_detects_nothing() {
    let engine = PatternEngine::default();
    let series = daily(vec![100.0; 300]);
    for entry in registry() {
        assert!(entry.detector.detect(&series).is_none(), "{}", entry.name);
    }
    assert!(engine.scan_one("FLAT", &series).is_empty());
}

#[test]
fn test_short_series_detects_nothing() {
    for entry in registry() {
        let len = entry.detector.min_len() - 1;
        let closes: Vec<f64> = (0..len).map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0).collect();
        assert!(entry.detector.detect(&daily(closes)).is_none(), "{}", entry.name);
    }
}

// ============================================================
// REGISTRY & CONFIG
// ============================================================

#[test]
fn test_registry_names_and_signals() {
    let expected = [
        ("head_shoulders", "Head & Shoulders", Signal::Bearish),
        ("inverse_head_shoulders", "Inverse Head & Shoulders", Signal::Bullish),
        ("double_top", "Double Top", Signal::Bearish),
        ("double_bottom", "Double Bottom", Signal::Bullish),
        ("triple_top", "Triple Top", Signal::Bearish),
        ("triple_bottom", "Triple Bottom", Signal::Bullish),
        ("ascending_triangle", "Ascending Triangle", Signal::Bullish),
        ("descending_triangle", "Descending Triangle", Signal::Bearish),
        ("cup_and_handle", "Cup and Handle", Signal::Bullish),
        ("bullish_flag", "Bullish Flag", Signal::Bullish),
        ("falling_wedge", "Falling Wedge", Signal::Bullish),
    ];
    for (key, name, signal) in expected {
        let entry = registry_entry(key).unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(entry.signal, signal);
    }
    assert!(matches!(
        registry_entry("rising_wedge"),
        Err(PatternError::UnknownPattern(_))
    ));
}

#[test]
fn test_engine_config_from_json() {
    let config: EngineConfig = serde_json::from_value(json!({
        "min_confidence": 50,
        "pattern_filter": ["double_top", "cup_and_handle"]
    }))
    .unwrap();
    assert_eq!(config.min_history, 60);
    assert_eq!(config.lookback, 252);

    let engine = EngineBuilder::new()
        .with_all_defaults()
        .config(config)
        .build()
        .unwrap();
    let kinds: Vec<_> = engine.kinds().collect();
    assert_eq!(kinds, vec![PatternKind::DoubleTop, PatternKind::CupAndHandle]);
}

#[test]
fn test_detector_config_from_json() {
    let detector: DoubleTopDetector =
        serde_json::from_value(json!({ "window": 10, "peak_tolerance": 0.02 })).unwrap();
    assert_eq!(detector.window.get(), 10);
    assert_eq!(detector.lookback.get(), 100);

    let bad = serde_json::from_value::<DoubleTopDetector>(json!({ "peak_tolerance": 2.0 }));
    assert!(bad.is_err());
}

#[test]
fn test_invalid_series_is_an_error() {
    let dates = vec![start(), start()];
    assert!(matches!(
        PriceSeries::new(dates, vec![1.0, 2.0]),
        Err(PatternError::NonChronological { index: 1 })
    ));
    assert!(matches!(
        PriceSeries::with_daily_dates(start(), vec![1.0, -2.0]),
        Err(PatternError::InvalidPrice { index: 1, .. })
    ));
}

// ============================================================
// RESULT CONTRACT
// ============================================================

#[test]
fn test_detected_result_json() {
    let engine = PatternEngine::default();
    let company = CompanyInfo::new("Double Corp", "Industrials");
    let result = engine.analyze(PatternKind::DoubleTop, "DBL", &company, &double_top_series());

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["ticker"], "DBL");
    assert_eq!(value["company_name"], "Double Corp");
    assert_eq!(value["sector"], "Industrials");
    assert_eq!(value["pattern_type"], "double_top");
    assert_eq!(value["pattern_name"], "Double Top");
    assert_eq!(value["signal"], "bearish");
    assert_eq!(value["detected"], true);
    assert_eq!(value["confidence"], 85);
    assert_eq!(value["neckline"], 105.0);
    assert_eq!(value["target_price"], 90.0);
    assert_eq!(value["current_price"], 100.0);
    assert_eq!(
        value["first_peak"],
        json!({ "index": 30, "date": "2024-01-31", "price": 120.0 })
    );
    assert_eq!(value["trough"]["index"], 60);
    assert_eq!(value["second_peak"]["date"], "2024-03-31");
}

#[test]
fn test_not_detected_result_json() {
    let engine = PatternEngine::default();
    let result = engine.analyze(
        PatternKind::CupAndHandle,
        "FLAT",
        &CompanyInfo::default(),
        &daily(vec![42.0; 120]),
    );
    let value = serde_json::to_value(&result).unwrap();
    let object = value.as_object().unwrap();

    assert_eq!(value["detected"], false);
    assert_eq!(value["pattern_name"], "Cup and Handle");
    assert!(!object.contains_key("confidence"));
    assert!(!object.contains_key("target_price"));
}

// ============================================================
// BATCH
// ============================================================

#[test]
fn test_scan_many_report() {
    let market = InMemoryMarket::new()
        .with_series("DT", double_top_series())
        .with_series("FLAT", daily(vec![50.0; 200]))
        .with_series("TINY", daily(vec![50.0; 30]))
        .with_company("DT", CompanyInfo::new("Double Corp", "Industrials"));
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

    let report = engine.scan_many(&["DT", "FLAT", "TINY", "GONE"], &market);
    assert_eq!(report.summary.tickers_scanned, 2);
    assert_eq!(report.summary.tickers_skipped, 2);
    assert_eq!(report.skipped, vec!["TINY", "GONE"]);

    let group = report.group(PatternKind::DoubleTop).unwrap();
    assert_eq!(group.count, 1);
    assert_eq!(group.name, "Double Top");
    assert_eq!(group.patterns[0].ticker, "DT");
    assert_eq!(group.patterns[0].sector, "Industrials");

    let grouped: usize = report.pattern_types.iter().map(|g| g.count).sum();
    assert_eq!(report.summary.total_patterns, grouped);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["pattern_types"].as_array().unwrap().len(), 11);
    assert!(value["summary"]["bearish_patterns"].as_u64().unwrap() >= 1);
}

#[test]
fn test_scan_through_cache() {
    let market = InMemoryMarket::new().with_series("DT", double_top_series());
    let cached = CachedSeries::new(market);
    let engine = PatternEngine::default();

    let first = engine.scan_pattern(PatternKind::DoubleTop, &["DT"], &cached);
    let second = engine.scan_pattern(PatternKind::DoubleTop, &["dt"], &cached);
    assert_eq!(first.count, 1);
    assert_eq!(second.count, 1);
    assert_eq!(cached.len(), 1);
}

#[test]
fn test_scan_pattern_sorted_by_confidence() {
    // Same shape with a steeper right side scores differently.
    let strong = double_top_series();
    let weak = daily(piecewise(&[
        (0, 100.0),
        (30, 120.0),
        (60, 113.0),
        (90, 117.0),
        (110, 100.0),
    ]));
    let market = InMemoryMarket::new()
        .with_series("WEAK", weak)
        .with_series("STRONG", strong);
    let engine = PatternEngine::default();

    let group = engine.scan_pattern(PatternKind::DoubleTop, &["WEAK", "STRONG"], &market);
    assert_eq!(group.count, 2);
    assert_eq!(group.patterns[0].ticker, "STRONG");
    assert!(group.patterns[0].confidence() >= group.patterns[1].confidence());
}
