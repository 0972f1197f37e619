use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC bar from the exchange
///
/// Sequences of bars are always ordered oldest to newest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub open_time: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl PriceBar {
    /// Finite and non-negative in every price field
    pub fn is_valid(&self) -> bool {
        [self.close, self.high, self.low]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire name used by the exchange
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill confirmation for a market order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderFill {
    pub order_id: u64,
    pub side: Side,
    pub executed_qty: Decimal,
    /// Quote amount spent or received; `None` when the venue does not report it
    pub quote_qty: Option<Decimal>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> PriceBar {
        PriceBar {
            open_time: Utc::now(),
            close,
            high: close,
            low: close,
        }
    }

    #[test]
    fn test_bar_validation() {
        assert!(bar(100.0).is_valid());
        assert!(bar(0.0).is_valid());
        assert!(!bar(-1.0).is_valid());
        assert!(!bar(f64::NAN).is_valid());
        assert!(!bar(f64::INFINITY).is_valid());
    }

    #[test]
    fn test_side_wire_names() {
        assert_eq!(Side::Buy.as_str(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
