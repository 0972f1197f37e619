pub mod binance;
pub mod discord;

pub use binance::{BinanceClient, BinanceCredentials};
pub use discord::{DiscordNotifier, LogNotifier};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{OrderFill, PriceBar, Side};
use crate::Result;

/// Source of recent OHLC bars, oldest first
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_recent_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>>;
}

/// Venue accepting immediate market orders for the traded symbol
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit_market_order(&self, side: Side, quantity: Decimal) -> Result<OrderFill>;
}

/// Free balance lookup
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn available(&self, asset: &str) -> Result<Decimal>;
}

/// Best-effort message sink
///
/// Implementations must never fail the caller: delivery problems are logged
/// and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str);
}
