pub mod circuit;
pub mod client;
pub mod lexicon;

pub use circuit::GuardedSentimentSource;
pub use client::HeadlineSentimentSource;
