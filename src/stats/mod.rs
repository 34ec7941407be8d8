//! Stats module - Aggregation helpers

mod calculator;

pub use calculator::{HexBin, HexScale, StatsCalculator};
