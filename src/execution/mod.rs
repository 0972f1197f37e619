// Position state machine and the polling loop that drives it
pub mod position_manager;
pub mod trading_loop;

pub use position_manager::{ExitReason, Position, PositionManager, PositionState, StepOutcome};
pub use trading_loop::{CycleReport, LoopSettings, RunSummary, TradingLoop};
