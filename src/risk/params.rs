use serde::{Deserialize, Serialize};

/// Exit thresholds and entry limits, expressed as price multipliers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskParams {
    /// Initial stop, and the trailing distance below the activation level
    pub stop_loss_factor: f64,
    /// Fixed take-profit relative to entry
    pub take_profit_factor: f64,
    /// Gain relative to entry at which the tight trail takes over
    pub trail_activation_factor: f64,
    /// Trailing distance once activated
    pub tight_trail_factor: f64,
    /// RSI must be strictly below this to enter
    pub rsi_entry_max: f64,
    /// Fractional digits kept when sizing the base quantity
    pub quantity_decimals: u32,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            stop_loss_factor: 0.95,        // -5% from entry / price
            take_profit_factor: 1.15,      // +15% from entry
            trail_activation_factor: 1.10, // +10% from entry
            tight_trail_factor: 0.98,      // -2% from price
            rsi_entry_max: 50.0,
            quantity_decimals: 6,
        }
    }
}

impl RiskParams {
    /// Check the factors describe a coherent long-only policy
    pub fn validate(&self) -> Result<(), String> {
        let factors = [
            ("stop_loss_factor", self.stop_loss_factor),
            ("take_profit_factor", self.take_profit_factor),
            ("trail_activation_factor", self.trail_activation_factor),
            ("tight_trail_factor", self.tight_trail_factor),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be a positive number, got {}", name, value));
            }
        }

        if self.stop_loss_factor >= 1.0 || self.tight_trail_factor >= 1.0 {
            return Err("stop factors must be below 1.0".to_string());
        }
        if self.take_profit_factor <= 1.0 {
            return Err("take_profit_factor must be above 1.0".to_string());
        }
        if !(0.0..=100.0).contains(&self.rsi_entry_max) {
            return Err(format!(
                "rsi_entry_max must be within [0, 100], got {}",
                self.rsi_entry_max
            ));
        }
        if self.quantity_decimals > 18 {
            return Err("quantity_decimals must be at most 18".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RiskParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        let params = RiskParams {
            tight_trail_factor: 0.0,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("tight_trail_factor"));
    }

    #[test]
    fn test_rejects_stop_above_entry() {
        let params = RiskParams {
            stop_loss_factor: 1.05,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_take_profit_below_entry() {
        let params = RiskParams {
            take_profit_factor: 0.9,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
