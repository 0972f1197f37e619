use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::api::{BalanceProvider, OrderExecutor};
use crate::indicators::IndicatorSnapshot;
use crate::models::{OrderFill, Side};
use crate::risk::{calculate_position_size, RiskParams};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("stop loss"),
            ExitReason::TakeProfit => f.write_str("take profit"),
        }
    }
}

/// An open long position
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub entry_price: f64,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,   // ratchets up only
    pub take_profit: f64, // fixed at entry
}

/// Either nothing is held, or exactly one long position is
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(Position),
}

/// What one step did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Flat and at least one indicator undefined
    NotReady,
    /// Flat, indicators defined, entry rule not met
    NoSignal,
    /// Entry rule met but the balance buys nothing at this price
    InsufficientBalance { balance: Decimal },
    Entered { position: Position, fill: OrderFill },
    Holding { stop_loss: f64, take_profit: f64 },
    Exited {
        position: Position,
        exit_price: f64,
        reason: ExitReason,
        pnl: f64,
        fill: OrderFill,
    },
    /// Sell filled only part of the position; `remaining` is still held
    PartialExit {
        remaining: Position,
        exit_price: f64,
        reason: ExitReason,
        pnl: f64,
        fill: OrderFill,
    },
}

/// Owns the position state and applies the entry, trailing-stop and exit rules
pub struct PositionManager {
    state: PositionState,
    risk: RiskParams,
    quote_asset: String,
    total_pnl: f64,    // realized, this process only
    completed_trades: u32,
}

impl PositionManager {
    pub fn new(risk: RiskParams, quote_asset: impl Into<String>) -> Self {
        Self {
            state: PositionState::Flat,
            risk,
            quote_asset: quote_asset.into(),
            total_pnl: 0.0,
            completed_trades: 0,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Long(position) => Some(position),
            PositionState::Flat => None,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self.state, PositionState::Long(_))
    }

    /// Get total realized P&L
    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn completed_trades(&self) -> u32 {
        self.completed_trades
    }

    /// Uptrend (short SMA above long SMA) with RSI below the entry ceiling
    ///
    /// Any undefined indicator means no signal.
    pub fn entry_signal(&self, snapshot: &IndicatorSnapshot) -> bool {
        match (snapshot.short_ma, snapshot.long_ma, snapshot.rsi) {
            (Some(short), Some(long), Some(rsi)) => {
                short > long && rsi < self.risk.rsi_entry_max
            }
            _ => false,
        }
    }

    /// Calculate current P&L for the open position
    pub fn unrealized_pnl(&self, current_price: f64) -> Option<f64> {
        self.position()
            .map(|p| (current_price - p.entry_price) * p.quantity.to_f64().unwrap_or(0.0))
    }

    /// Advance the state machine by one cycle
    ///
    /// Order failures leave the state as it was (including a stop already
    /// ratcheted this cycle) and are returned to the caller.
    pub async fn step(
        &mut self,
        price: f64,
        snapshot: &IndicatorSnapshot,
        orders: &dyn OrderExecutor,
        balances: &dyn BalanceProvider,
    ) -> Result<StepOutcome> {
        if self.is_long() {
            self.manage_long(price, orders).await
        } else {
            self.try_enter(price, snapshot, orders, balances).await
        }
    }

    async fn try_enter(
        &mut self,
        price: f64,
        snapshot: &IndicatorSnapshot,
        orders: &dyn OrderExecutor,
        balances: &dyn BalanceProvider,
    ) -> Result<StepOutcome> {
        if !snapshot.is_ready() {
            tracing::debug!(
                short_ma = ?snapshot.short_ma,
                long_ma = ?snapshot.long_ma,
                rsi = ?snapshot.rsi,
                "Indicators undefined, no entry this cycle"
            );
            return Ok(StepOutcome::NotReady);
        }

        if !self.entry_signal(snapshot) {
            return Ok(StepOutcome::NoSignal);
        }

        let balance = balances.available(&self.quote_asset).await?;
        let quantity = calculate_position_size(balance, price, self.risk.quantity_decimals);

        if quantity.is_zero() {
            tracing::warn!(
                "Entry signal but {} {} buys nothing at ${:.2}",
                balance,
                self.quote_asset,
                price
            );
            return Ok(StepOutcome::InsufficientBalance { balance });
        }

        tracing::info!(
            "  → BUY {} @ ${:.2} (balance: {} {})",
            quantity,
            price,
            balance,
            self.quote_asset
        );

        let fill = orders.submit_market_order(Side::Buy, quantity).await?;
        let position = self.open_position(price, fill.executed_qty, Utc::now());

        tracing::info!(
            "  ✓ Opened position {} | SL: ${:.2} | TP: ${:.2}",
            position.id,
            position.stop_loss,
            position.take_profit
        );

        Ok(StepOutcome::Entered { position, fill })
    }

    async fn manage_long(&mut self, price: f64, orders: &dyn OrderExecutor) -> Result<StepOutcome> {
        let reason = self.should_exit(price);

        let position = match self.position() {
            Some(p) => p.clone(),
            None => return Ok(StepOutcome::NoSignal),
        };

        let reason = match reason {
            Some(reason) => reason,
            None => {
                return Ok(StepOutcome::Holding {
                    stop_loss: position.stop_loss,
                    take_profit: position.take_profit,
                })
            }
        };

        tracing::info!(
            "  → SELL {} @ ${:.2} ({}, SL: ${:.2}, TP: ${:.2})",
            position.quantity,
            price,
            reason,
            position.stop_loss,
            position.take_profit
        );

        let fill = orders.submit_market_order(Side::Sell, position.quantity).await?;

        if fill.executed_qty < position.quantity {
            let pnl = self.reduce_position(price, fill.executed_qty);
            let remaining = match self.position() {
                Some(p) => p.clone(),
                None => position,
            };

            tracing::warn!(
                "  ⚠ Partial exit {}: sold {}, {} still held",
                remaining.id,
                fill.executed_qty,
                remaining.quantity
            );

            return Ok(StepOutcome::PartialExit {
                remaining,
                exit_price: price,
                reason,
                pnl,
                fill,
            });
        }

        let pnl = self.close_position(price);
        let held = Utc::now() - position.entry_time;

        tracing::info!(
            "  ✓ Closed position {} @ ${:.2} after {}m | P&L: ${:.2} (total: ${:.2})",
            position.id,
            price,
            held.num_minutes(),
            pnl,
            self.total_pnl
        );

        Ok(StepOutcome::Exited {
            position,
            exit_price: price,
            reason,
            pnl,
            fill,
        })
    }

    fn open_position(
        &mut self,
        entry_price: f64,
        quantity: Decimal,
        entry_time: DateTime<Utc>,
    ) -> Position {
        let position = Position {
            id: Uuid::new_v4(),
            entry_price,
            quantity,
            entry_time,
            stop_loss: entry_price * self.risk.stop_loss_factor,
            take_profit: entry_price * self.risk.take_profit_factor,
        };

        self.state = PositionState::Long(position.clone());
        position
    }

    /// Ratchet the stop: tight trail above the activation level, wide trail below
    fn update_trailing_stop(&mut self, current_price: f64) {
        if let PositionState::Long(position) = &mut self.state {
            let activation_price = position.entry_price * self.risk.trail_activation_factor;

            let candidate = if current_price >= activation_price {
                current_price * self.risk.tight_trail_factor
            } else {
                current_price * self.risk.stop_loss_factor
            };

            position.stop_loss = position.stop_loss.max(candidate);
        }
    }

    /// Check if the position should exit (returns exit reason if yes)
    ///
    /// The trailing stop is updated first, so the exit is evaluated against
    /// the stop as tightened by this very price.
    pub fn should_exit(&mut self, current_price: f64) -> Option<ExitReason> {
        // Update trailing stop first
        self.update_trailing_stop(current_price);

        let position = self.position()?;

        if current_price >= position.take_profit {
            return Some(ExitReason::TakeProfit);
        }

        if current_price <= position.stop_loss {
            return Some(ExitReason::StopLoss);
        }

        None
    }

    /// Book P&L on `sold` units and keep the rest open
    fn reduce_position(&mut self, exit_price: f64, sold: Decimal) -> f64 {
        let pnl = match &mut self.state {
            PositionState::Long(position) => {
                position.quantity -= sold;
                (exit_price - position.entry_price) * sold.to_f64().unwrap_or(0.0)
            }
            PositionState::Flat => return 0.0,
        };

        self.total_pnl += pnl;
        pnl
    }

    /// Go flat, returning the realized P&L
    fn close_position(&mut self, exit_price: f64) -> f64 {
        let pnl = match std::mem::take(&mut self.state) {
            PositionState::Long(position) => {
                (exit_price - position.entry_price) * position.quantity.to_f64().unwrap_or(0.0)
            }
            PositionState::Flat => return 0.0,
        };

        self.total_pnl += pnl;
        self.completed_trades += 1;
        pnl
    }
}
