pub mod aggregator;
pub mod dispatch;
pub mod monitor;
pub mod policy;
pub mod state;
