use serde::Deserialize;
use tokio::time::Duration;

use crate::api::binance::{BinanceCredentials, BINANCE_TESTNET_API, DEFAULT_REQUEST_TIMEOUT};
use crate::execution::LoopSettings;
use crate::indicators::IndicatorEngine;
use crate::risk::RiskParams;
use crate::{BotError, Result};

/// Process configuration, read from the environment at startup
///
/// Variable names match the field names upper-cased (`BINANCE_API_KEY`,
/// `POLL_INTERVAL_SECS`, ...). Risk overrides nest with `__`, e.g.
/// `RISK__STOP_LOSS_FACTOR=0.97`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub binance_api_key: Option<String>,
    #[serde(default)]
    pub binance_api_secret: Option<String>,
    #[serde(default = "default_base_url")]
    pub binance_base_url: String,
    #[serde(default)]
    pub discord_webhook: Option<String>,

    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_kline_limit")]
    pub kline_limit: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub risk: RiskParams,
}

fn default_base_url() -> String {
    BINANCE_TESTNET_API.to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_base_asset() -> String {
    "BTC".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_kline_limit() -> usize {
    500
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Environment-style source over an explicit variable map
pub fn environment(vars: config::Map<String, String>) -> config::Environment {
    config::Environment::default()
        .separator("__")
        .try_parsing(true)
        .source(Some(vars))
}

impl Settings {
    /// Load `.env` (if any) and the process environment, then validate
    pub fn load(env_file: Option<&str>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_filename(path)
                    .map_err(|e| BotError::Config(format!("cannot read {}: {}", path, e)))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        // Only plain upper-snake names; anything else cannot be a setting key
        let vars: config::Map<String, String> = std::env::vars()
            .filter(|(key, _)| {
                !key.starts_with('_')
                    && !key.ends_with('_')
                    && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
            .collect();

        Self::from_source(environment(vars))
    }

    /// Build from any `config` source (tests use an in-memory map)
    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Fail fast on anything that would make the loop meaningless
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;

        if self.poll_interval_secs == 0 {
            return Err(BotError::Config(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(BotError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let required = IndicatorEngine::default().bars_required();
        if self.kline_limit < required {
            return Err(BotError::Config(format!(
                "KLINE_LIMIT must be at least {} to define the long moving average, got {}",
                required, self.kline_limit
            )));
        }

        if self.symbol.trim().is_empty() || self.quote_asset.trim().is_empty() {
            return Err(BotError::Config("SYMBOL and QUOTE_ASSET must be set".to_string()));
        }

        self.risk.validate().map_err(BotError::Config)
    }

    pub fn credentials(&self) -> Result<BinanceCredentials> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        let api_key = non_empty(&self.binance_api_key).ok_or_else(|| {
            BotError::Config("BINANCE_API_KEY not found in environment".to_string())
        })?;
        let api_secret = non_empty(&self.binance_api_secret).ok_or_else(|| {
            BotError::Config("BINANCE_API_SECRET not found in environment".to_string())
        })?;

        Ok(BinanceCredentials {
            api_key,
            api_secret,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            symbol: self.symbol.clone(),
            base_asset: self.base_asset.clone(),
            quote_asset: self.quote_asset.clone(),
            interval: self.interval.clone(),
            kline_limit: self.kline_limit,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_source(environment(map))
    }

    fn load_with_credentials(extra: &[(&str, &str)]) -> Result<Settings> {
        let mut vars = vec![("BINANCE_API_KEY", "key"), ("BINANCE_API_SECRET", "secret")];
        vars.extend_from_slice(extra);
        load(&vars)
    }

    #[test]
    fn test_defaults() {
        let settings = load_with_credentials(&[]).unwrap();

        assert_eq!(settings.symbol, "BTCUSDT");
        assert_eq!(settings.quote_asset, "USDT");
        assert_eq!(settings.interval, "1h");
        assert_eq!(settings.kline_limit, 500);
        assert_eq!(settings.poll_interval_secs, 60);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.binance_base_url, BINANCE_TESTNET_API);
        assert!(settings.discord_webhook.is_none());
        assert_eq!(settings.risk, RiskParams::default());

        let loop_settings = settings.loop_settings();
        assert_eq!(loop_settings.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let settings = load_with_credentials(&[
            ("SYMBOL", "ETHUSDT"),
            ("BASE_ASSET", "ETH"),
            ("POLL_INTERVAL_SECS", "30"),
            ("DISCORD_WEBHOOK", "https://discord.com/api/webhooks/1/abc"),
            ("RISK__STOP_LOSS_FACTOR", "0.97"),
        ])
        .unwrap();

        assert_eq!(settings.symbol, "ETHUSDT");
        assert_eq!(settings.base_asset, "ETH");
        assert_eq!(settings.poll_interval_secs, 30);
        assert!(settings.discord_webhook.is_some());
        assert_eq!(settings.risk.stop_loss_factor, 0.97);
        assert_eq!(settings.risk.take_profit_factor, 1.15);
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let err = load(&[("BINANCE_API_KEY", "key")]).unwrap_err();
        match err {
            BotError::Config(msg) => assert!(msg.contains("BINANCE_API_SECRET")),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = load(&[("BINANCE_API_KEY", " "), ("BINANCE_API_SECRET", "secret")]).unwrap_err();
        assert!(err.to_string().contains("BINANCE_API_KEY"));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let result = load_with_credentials(&[("POLL_INTERVAL_SECS", "0")]);
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_request_timeout_override() {
        let settings = load_with_credentials(&[("REQUEST_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));

        let result = load_with_credentials(&[("REQUEST_TIMEOUT_SECS", "0")]);
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_rejects_short_kline_limit() {
        let err = load_with_credentials(&[("KLINE_LIMIT", "100")]).unwrap_err();
        assert!(err.to_string().contains("KLINE_LIMIT"));
    }

    #[test]
    fn test_rejects_bad_risk_override() {
        let result = load_with_credentials(&[("RISK__TAKE_PROFIT_FACTOR", "0.5")]);
        assert!(matches!(result, Err(BotError::Config(_))));
    }
}
