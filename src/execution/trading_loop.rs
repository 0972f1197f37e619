use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::api::{BalanceProvider, MarketDataSource, Notifier, OrderExecutor};
use crate::error::ErrorKind;
use crate::execution::{PositionManager, StepOutcome};
use crate::indicators::IndicatorEngine;
use crate::risk::RiskParams;
use crate::{BotError, Result};

/// What the loop trades and how often
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub interval: String,
    pub kline_limit: usize,
    pub poll_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            interval: "1h".to_string(),
            kline_limit: 500,
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Status of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub in_position: bool,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
}

/// Polls market data and drives the position state machine on a fixed cadence
///
/// One cycle runs at a time and owns the `PositionManager` exclusively, so at
/// most one order and one state transition are ever in flight.
pub struct TradingLoop {
    settings: LoopSettings,
    engine: IndicatorEngine,
    position_manager: PositionManager,
    market_data: Arc<dyn MarketDataSource>,
    orders: Arc<dyn OrderExecutor>,
    balances: Arc<dyn BalanceProvider>,
    notifier: Arc<dyn Notifier>,
}

impl TradingLoop {
    pub fn new(
        settings: LoopSettings,
        risk: RiskParams,
        market_data: Arc<dyn MarketDataSource>,
        orders: Arc<dyn OrderExecutor>,
        balances: Arc<dyn BalanceProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let position_manager = PositionManager::new(risk, settings.quote_asset.clone());

        Self {
            settings,
            engine: IndicatorEngine::default(),
            position_manager,
            market_data,
            orders,
            balances,
            notifier,
        }
    }

    pub fn position_manager(&self) -> &PositionManager {
        &self.position_manager
    }

    /// Fetch, compute, step, report
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let bars = self
            .market_data
            .fetch_recent_bars(
                &self.settings.symbol,
                &self.settings.interval,
                self.settings.kline_limit,
            )
            .await?;

        let snapshot = self.engine.compute(&bars).ok_or_else(|| {
            BotError::DataUnavailable(format!("no bars returned for {}", self.settings.symbol))
        })?;

        let required = self.engine.bars_required();
        if bars.len() < required {
            tracing::debug!("    → Collecting data... ({}/{} bars)", bars.len(), required);
        }

        let outcome = self
            .position_manager
            .step(
                snapshot.price,
                &snapshot,
                self.orders.as_ref(),
                self.balances.as_ref(),
            )
            .await?;

        let timestamp = Utc::now();
        self.announce(&outcome, timestamp).await;

        let in_position = self.position_manager.is_long();
        match self.position_manager.unrealized_pnl(snapshot.price) {
            Some(unrealized) => tracing::info!(
                "{} | Price: {:.2} | In Position: {} | Unrealized: {:+.2} {}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                snapshot.price,
                in_position,
                unrealized,
                self.settings.quote_asset
            ),
            None => tracing::info!(
                "{} | Price: {:.2} | In Position: {}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                snapshot.price,
                in_position
            ),
        }

        Ok(CycleReport {
            timestamp,
            price: snapshot.price,
            in_position,
            outcome,
        })
    }

    /// Run cycles until `shutdown` turns true (or its sender is dropped)
    ///
    /// A cycle in progress always completes; the signal is honoured between
    /// cycles and during the sleep.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        tracing::info!(
            "💹 Trading loop starting: {} {} every {:?}",
            self.settings.symbol,
            self.settings.interval,
            self.settings.poll_interval
        );
        self.notifier
            .send(&format!(
                "🚀 Bot started: trading {} on {} candles",
                self.settings.symbol, self.settings.interval
            ))
            .await;

        let mut summary = RunSummary::default();

        loop {
            summary.cycles += 1;

            if let Err(e) = self.run_cycle().await {
                summary.failed_cycles += 1;
                self.report_failure(&e).await;
            }

            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "👋 Trading loop stopped after {} cycles ({} failed)",
            summary.cycles,
            summary.failed_cycles
        );
        self.notifier
            .send(&format!(
                "🛑 Bot stopped: {} | realized P&L {:.2} {} over {} trades",
                if self.position_manager.is_long() {
                    "position still open"
                } else {
                    "flat"
                },
                self.position_manager.total_pnl(),
                self.settings.quote_asset,
                self.position_manager.completed_trades()
            ))
            .await;

        summary
    }

    async fn announce(&self, outcome: &StepOutcome, timestamp: DateTime<Utc>) {
        let now = timestamp.format("%Y-%m-%d %H:%M:%S");

        let message = match outcome {
            StepOutcome::Entered { position, .. } => format!(
                "✅ BUY {} {} @ {:.2} {} ({})",
                position.quantity,
                self.settings.base_asset,
                position.entry_price,
                self.settings.quote_asset,
                now
            ),
            StepOutcome::Exited {
                position,
                exit_price,
                reason,
                pnl,
                ..
            } => format!(
                "✅ SELL {} {} @ {:.2} {} ({}, P&L {:+.2} {}) ({})",
                position.quantity,
                self.settings.base_asset,
                exit_price,
                self.settings.quote_asset,
                reason,
                pnl,
                self.settings.quote_asset,
                now
            ),
            StepOutcome::PartialExit {
                remaining,
                exit_price,
                reason,
                pnl,
                fill,
            } => format!(
                "⚠️ PARTIAL SELL {} {} @ {:.2} {} ({}, P&L {:+.2} {}), {} still held ({})",
                fill.executed_qty,
                self.settings.base_asset,
                exit_price,
                self.settings.quote_asset,
                reason,
                pnl,
                self.settings.quote_asset,
                remaining.quantity,
                now
            ),
            _ => return,
        };

        self.notifier.send(&message).await;
    }

    async fn report_failure(&self, err: &BotError) {
        let message = match err.kind() {
            ErrorKind::OrderRejected => {
                tracing::error!("✗ Error placing order: {}", err);
                format!("❌ Error placing order: {}", err)
            }
            ErrorKind::DataUnavailable => {
                tracing::warn!("✗ Cycle skipped, market data unavailable: {}", err);
                format!("⚠️ Bot error: {}", err)
            }
            ErrorKind::TransientInfra => {
                tracing::warn!("✗ Cycle failed: {}", err);
                format!("⚠️ Bot error: {}", err)
            }
            ErrorKind::Config => {
                tracing::error!("✗ Cycle failed on configuration: {}", err);
                format!("⚠️ Bot error: {}", err)
            }
        };

        self.notifier.send(&message).await;
    }
}
