use serde::{Deserialize, Serialize};

use super::{calculate_rsi, calculate_rsi_series, calculate_sma, calculate_sma_series};
use crate::models::PriceBar;

/// Indicator values for the most recent bar
///
/// `None` marks a value that is undefined for the supplied history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorSnapshot {
    /// All three indicators are defined
    pub fn is_ready(&self) -> bool {
        self.short_ma.is_some() && self.long_ma.is_some() && self.rsi.is_some()
    }
}

/// Computes the trend filter (two SMAs) and the RSI oscillator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorEngine {
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
            rsi_period: 14,
        }
    }
}

impl IndicatorEngine {
    /// Snapshot for the latest bar, `None` for an empty sequence
    pub fn compute(&self, bars: &[PriceBar]) -> Option<IndicatorSnapshot> {
        let closes = closes(bars);
        let price = *closes.last()?;

        Some(IndicatorSnapshot {
            price,
            short_ma: calculate_sma(&closes, self.short_window),
            long_ma: calculate_sma(&closes, self.long_window),
            rsi: calculate_rsi(&closes, self.rsi_period),
        })
    }

    /// Snapshot for every bar in the sequence
    pub fn series(&self, bars: &[PriceBar]) -> Vec<IndicatorSnapshot> {
        let closes = closes(bars);
        let short = calculate_sma_series(&closes, self.short_window);
        let long = calculate_sma_series(&closes, self.long_window);
        let rsi = calculate_rsi_series(&closes, self.rsi_period);

        closes
            .iter()
            .enumerate()
            .map(|(i, &price)| IndicatorSnapshot {
                price,
                short_ma: short[i],
                long_ma: long[i],
                rsi: rsi[i],
            })
            .collect()
    }

    /// Bars needed before every indicator can be defined
    pub fn bars_required(&self) -> usize {
        self.long_window
            .max(self.short_window)
            .max(self.rsi_period + 1)
    }
}

fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                open_time: start + Duration::hours(i as i64),
                close,
                high: close + 1.0,
                low: close - 1.0,
            })
            .collect()
    }

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64) * 0.1 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect()
    }

    #[test]
    fn test_empty_input_has_no_snapshot() {
        let engine = IndicatorEngine::default();
        assert!(engine.compute(&[]).is_none());
    }

    #[test]
    fn test_long_ma_undefined_below_window() {
        let engine = IndicatorEngine::default();
        let snapshot = engine.compute(&bars_from(&zigzag(199))).unwrap();

        assert!(snapshot.short_ma.is_some());
        assert!(snapshot.long_ma.is_none());
        assert!(snapshot.rsi.is_some());
        assert!(!snapshot.is_ready());
    }

    #[test]
    fn test_full_history_is_ready() {
        let engine = IndicatorEngine::default();
        let closes = zigzag(500);
        let snapshot = engine.compute(&bars_from(&closes)).unwrap();

        assert!(snapshot.is_ready());
        assert_eq!(snapshot.price, *closes.last().unwrap());
        assert_eq!(snapshot.long_ma, calculate_sma(&closes, 200));
        assert_eq!(snapshot.short_ma, calculate_sma(&closes, 50));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let engine = IndicatorEngine::default();
        let bars = bars_from(&zigzag(300));

        assert_eq!(engine.compute(&bars), engine.compute(&bars));
    }

    #[test]
    fn test_rising_market_saturates_rsi() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64).collect();
        let snapshot = engine.compute(&bars_from(&closes)).unwrap();

        assert_eq!(snapshot.rsi, Some(100.0));
        assert!(snapshot.short_ma.unwrap() > snapshot.long_ma.unwrap());
    }

    #[test]
    fn test_series_last_matches_compute() {
        let engine = IndicatorEngine {
            short_window: 3,
            long_window: 5,
            rsi_period: 2,
        };
        let bars = bars_from(&[10.0, 11.0, 10.5, 12.0, 11.0, 13.0, 12.5]);
        let series = engine.series(&bars);

        assert_eq!(series.len(), bars.len());
        assert!(series[3].long_ma.is_none());
        assert_eq!(series.last().copied(), engine.compute(&bars));
    }

    #[test]
    fn test_bars_required() {
        assert_eq!(IndicatorEngine::default().bars_required(), 200);
    }
}
