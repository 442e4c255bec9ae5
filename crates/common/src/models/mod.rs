pub mod alert;
pub mod indicator;
pub mod sentiment;
pub mod signal;

pub use alert::{Alert, AlertState, Severity};
pub use indicator::{IndicatorSnapshot, Recommendation};
pub use sentiment::SentimentScore;
pub use signal::{Fingerprint, Signal, Zone};
