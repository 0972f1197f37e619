// Risk management module
pub mod params;
pub mod sizing;

pub use params::RiskParams;
pub use sizing::calculate_position_size;
