pub mod indicator;
pub mod sentiment;
pub mod traits;

pub use traits::{IndicatorSource, SentimentSource};
