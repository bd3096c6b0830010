//! Price history and company metadata collaborators
//!
//! The engine never fetches data itself. Batch scans pull closes through a
//! [`SeriesProvider`] and names through a [`CompanyDirectory`]; an absent
//! answer from either is a normal outcome, not an error.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::PriceSeries;

// ============================================================
// TRAITS
// ============================================================

/// Source of daily close history
pub trait SeriesProvider: Send + Sync {
    /// Up to `lookback` most recent closes for `ticker`, or `None` when
    /// nothing is available.
    fn get_series(&self, ticker: &str, lookback: usize) -> Option<PriceSeries>;
}

/// Source of display metadata for tickers
pub trait CompanyDirectory: Send + Sync {
    fn company_info(&self, ticker: &str) -> Option<CompanyInfo>;
}

/// Display metadata attached to results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub sector: String,
}

impl CompanyInfo {
    pub fn new(name: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sector: sector.into(),
        }
    }
}

// ============================================================
// IN-MEMORY MARKET
// ============================================================

/// Provider backed by series and metadata registered up front.
///
/// Tickers are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarket {
    series: HashMap<String, PriceSeries>,
    companies: HashMap<String, CompanyInfo>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.series.insert(ticker.to_uppercase(), series);
        self
    }

    pub fn with_company(mut self, ticker: &str, info: CompanyInfo) -> Self {
        self.companies.insert(ticker.to_uppercase(), info);
        self
    }

    /// Registered tickers with a series, sorted
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

impl SeriesProvider for InMemoryMarket {
    fn get_series(&self, ticker: &str, lookback: usize) -> Option<PriceSeries> {
        let series = self.series.get(&ticker.to_uppercase())?;
        if series.is_empty() {
            return None;
        }
        Some(series.tail(lookback))
    }
}

impl CompanyDirectory for InMemoryMarket {
    fn company_info(&self, ticker: &str) -> Option<CompanyInfo> {
        self.companies.get(&ticker.to_uppercase()).cloned()
    }
}

// ============================================================
// CACHING DECORATOR
// ============================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    series: PriceSeries,
}

/// Wraps a provider and reuses each `(ticker, lookback)` answer for `ttl`.
///
/// Only available series are cached, so a ticker that was missing is asked
/// for again on the next call.
#[derive(Debug)]
pub struct CachedSeries<P> {
    inner: P,
    ttl: Duration,
    entries: RwLock<HashMap<(String, usize), CacheEntry>>,
}

impl<P> CachedSeries<P> {
    /// Price histories are reused for four hours by default
    pub const DEFAULT_TTL: Duration = Duration::from_secs(4 * 60 * 60);

    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every cached lookback for `ticker`
    pub fn invalidate(&self, ticker: &str) {
        let key = ticker.to_uppercase();
        self.entries.write().retain(|(cached, _), _| *cached != key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries, fresh or stale
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<P: SeriesProvider> SeriesProvider for CachedSeries<P> {
    fn get_series(&self, ticker: &str, lookback: usize) -> Option<PriceSeries> {
        let key = (ticker.to_uppercase(), lookback);
        if let Some(entry) = self.entries.read().get(&key) {
            if entry.stored_at.elapsed() < self.ttl {
                tracing::trace!(ticker, lookback, "series cache hit");
                return Some(entry.series.clone());
            }
        }

        tracing::trace!(ticker, lookback, "series cache miss");
        let series = self.inner.get_series(ticker, lookback)?;
        self.entries.write().insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                series: series.clone(),
            },
        );
        Some(series)
    }
}

impl<P: CompanyDirectory> CompanyDirectory for CachedSeries<P> {
    fn company_info(&self, ticker: &str) -> Option<CompanyInfo> {
        self.inner.company_info(ticker)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn series(len: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        PriceSeries::with_daily_dates(start, (0..len).map(|i| 50.0 + i as f64).collect()).unwrap()
    }

    /// Counts how often the wrapped market is asked for a series
    struct Counting {
        market: InMemoryMarket,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new(market: InMemoryMarket) -> Self {
            Self {
                market,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SeriesProvider for Counting {
        fn get_series(&self, ticker: &str, lookback: usize) -> Option<PriceSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.market.get_series(ticker, lookback)
        }
    }

    impl CompanyDirectory for Counting {
        fn company_info(&self, ticker: &str) -> Option<CompanyInfo> {
            self.market.company_info(ticker)
        }
    }

    #[test]
    fn test_in_memory_tail_and_case() {
        let market = InMemoryMarket::new()
            .with_series("acme", series(300))
            .with_company("ACME", CompanyInfo::new("Acme Inc", "Industrials"));

        let tail = market.get_series("ACME", 252).unwrap();
        assert_eq!(tail.len(), 252);
        assert_eq!(tail.last_close(), Some(349.0));
        assert_eq!(market.company_info("acme").unwrap().sector, "Industrials");
        assert_eq!(market.tickers(), vec!["ACME".to_string()]);
    }

    #[test]
    fn test_in_memory_missing_and_empty() {
        let empty = PriceSeries::new(Vec::new(), Vec::new()).unwrap();
        let market = InMemoryMarket::new().with_series("NIL", empty);
        assert!(market.get_series("NIL", 10).is_none());
        assert!(market.get_series("NOPE", 10).is_none());
        assert!(market.company_info("NOPE").is_none());
    }

    #[test]
    fn test_cache_reuses_fresh_entries() {
        let provider = CachedSeries::new(Counting::new(InMemoryMarket::new().with_series("A", series(100))));

        let first = provider.get_series("A", 60).unwrap();
        let second = provider.get_series("a", 60).unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.inner().calls(), 1);

        // A different lookback is a different entry.
        provider.get_series("A", 80).unwrap();
        assert_eq!(provider.inner().calls(), 2);
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn test_cache_expires_entries() {
        let provider = CachedSeries::with_ttl(
            Counting::new(InMemoryMarket::new().with_series("A", series(100))),
            Duration::ZERO,
        );
        provider.get_series("A", 60).unwrap();
        provider.get_series("A", 60).unwrap();
        assert_eq!(provider.inner().calls(), 2);
    }

    #[test]
    fn test_cache_skips_missing_series() {
        let provider = CachedSeries::new(Counting::new(InMemoryMarket::new()));
        assert!(provider.get_series("GONE", 60).is_none());
        assert!(provider.get_series("GONE", 60).is_none());
        assert_eq!(provider.inner().calls(), 2);
        assert!(provider.is_empty());
    }

    #[test]
    fn test_cache_invalidate() {
        let provider = CachedSeries::new(Counting::new(
            InMemoryMarket::new()
                .with_series("A", series(100))
                .with_series("B", series(100)),
        ));
        provider.get_series("A", 60);
        provider.get_series("A", 90);
        provider.get_series("B", 60);
        provider.invalidate("a");
        assert_eq!(provider.len(), 1);
        provider.clear();
        assert!(provider.is_empty());
        assert_eq!(CachedSeries::<InMemoryMarket>::DEFAULT_TTL, Duration::from_secs(14_400));
    }

    #[test]
    fn test_cache_delegates_company_info() {
        let market = InMemoryMarket::new().with_company("Z", CompanyInfo::new("Zed", "Tech"));
        let provider = CachedSeries::new(market);
        assert_eq!(provider.company_info("z").unwrap().name, "Zed");
    }
}
