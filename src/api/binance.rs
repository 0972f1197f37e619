use crate::api::{BalanceProvider, MarketDataSource, OrderExecutor};
use crate::models::{OrderFill, PriceBar, Side};
use crate::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Spot REST API, testnet by default
// Docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
pub const BINANCE_TESTNET_API: &str = "https://testnet.binance.vision";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_WINDOW_MS: u64 = 5000;
const REQUESTS_PER_SECOND: u32 = 10;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

type HmacSha256 = Hmac<Sha256>;

/// API key pair for signed endpoints
#[derive(Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for BinanceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceCredentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

/// Client for one Binance spot symbol
///
/// Serves klines, account balances and market orders. Cloneable; all clones
/// share the same rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    symbol: String,
    credentials: BinanceCredentials,
    rate_limiter: Arc<BinanceRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    status: String,
    executed_qty: String,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        symbol: impl Into<String>,
        credentials: BinanceCredentials,
        timeout: Duration,
    ) -> Self {
        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol: symbol.into(),
            credentials,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }

    /// HMAC-SHA256 of the query string, hex encoded
    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| BotError::Config(format!("invalid API secret: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Append recvWindow, timestamp and signature to `params`
    fn signed_query(&self, params: &str) -> Result<String> {
        let timestamp = Utc::now().timestamp_millis();
        let unsigned = if params.is_empty() {
            format!("recvWindow={}&timestamp={}", RECV_WINDOW_MS, timestamp)
        } else {
            format!("{}&recvWindow={}&timestamp={}", params, RECV_WINDOW_MS, timestamp)
        };
        let signature = self.sign(&unsigned)?;
        Ok(format!("{}&signature={}", unsigned, signature))
    }
}

/// Extract the exchange message from a failed response
async fn error_message(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(err) => format!("{} (code {})", err.msg, err.code),
        Err(_) if body.is_empty() => format!("HTTP {}", status),
        Err(_) => body,
    };
    (status, message)
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| BotError::Decode(format!("{} '{}': {}", field, raw, e)))
}

/// Binance kline row: [open time, open, high, low, close, volume, close time, ...]
fn parse_kline(row: &[Value]) -> Result<PriceBar> {
    let open_time = row
        .first()
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| BotError::Decode("kline open time".to_string()))?;

    let price_at = |idx: usize, name: &str| -> Result<f64> {
        let raw = row
            .get(idx)
            .and_then(Value::as_str)
            .ok_or_else(|| BotError::Decode(format!("kline {} missing", name)))?;
        raw.parse::<f64>()
            .map_err(|e| BotError::Decode(format!("kline {} '{}': {}", name, raw, e)))
    };

    Ok(PriceBar {
        open_time,
        high: price_at(2, "high")?,
        low: price_at(3, "low")?,
        close: price_at(4, "close")?,
    })
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_recent_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(BotError::DataUnavailable(format!(
                "klines for {} returned {}: {}",
                symbol, status, message
            )));
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        let bars = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>>>()?;

        if let Some(bad) = bars.iter().find(|b| !b.is_valid()) {
            return Err(BotError::DataUnavailable(format!(
                "invalid bar at {}",
                bad.open_time
            )));
        }

        tracing::debug!(symbol, interval, bars = bars.len(), "Fetched klines");

        Ok(bars)
    }
}

#[async_trait]
impl OrderExecutor for BinanceClient {
    async fn submit_market_order(&self, side: Side, quantity: Decimal) -> Result<OrderFill> {
        self.rate_limiter.until_ready().await;

        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            self.symbol,
            side.as_str(),
            quantity.normalize(),
            Uuid::new_v4().simple()
        );
        let url = format!("{}/api/v3/order?{}", self.base_url, self.signed_query(&params)?);

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let (_, message) = error_message(response).await;
            return Err(BotError::OrderRejected(message));
        }

        let order: OrderResponse = response.json().await?;
        let executed_qty = parse_decimal(&order.executed_qty, "executedQty")?;

        if order.status != "FILLED" && order.status != "PARTIALLY_FILLED" {
            return Err(BotError::OrderRejected(format!(
                "order {} ended with status {}",
                order.order_id, order.status
            )));
        }
        if executed_qty.is_zero() {
            return Err(BotError::OrderRejected(format!(
                "order {} executed nothing",
                order.order_id
            )));
        }

        let quote_qty = order
            .cummulative_quote_qty
            .as_deref()
            .map(|q| parse_decimal(q, "cummulativeQuoteQty"))
            .transpose()?;

        tracing::info!(
            order_id = order.order_id,
            side = %side,
            executed_qty = %executed_qty,
            "Market order filled"
        );

        Ok(OrderFill {
            order_id: order.order_id,
            side,
            executed_qty,
            quote_qty,
            status: order.status,
        })
    }
}

#[async_trait]
impl BalanceProvider for BinanceClient {
    async fn available(&self, asset: &str) -> Result<Decimal> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/v3/account?{}", self.base_url, self.signed_query("")?);
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(BotError::Exchange { status, message });
        }

        let account: AccountResponse = response.json().await?;
        match account.balances.iter().find(|b| b.asset == asset) {
            Some(balance) => parse_decimal(&balance.free, "free"),
            None => Ok(Decimal::ZERO),
        }
    }
}
