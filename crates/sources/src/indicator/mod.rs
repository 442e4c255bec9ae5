pub mod analysis;
pub mod client;
pub mod response;

pub use client::CandleIndicatorSource;
