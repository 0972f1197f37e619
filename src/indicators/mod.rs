// Technical indicators module
// SMA trend filter and RSI oscillator feeding the entry rule

pub mod moving_average;
pub mod rsi;
pub mod snapshot;

pub use moving_average::{calculate_sma, calculate_sma_series};
pub use rsi::{calculate_rsi, calculate_rsi_series};
pub use snapshot::{IndicatorEngine, IndicatorSnapshot};
