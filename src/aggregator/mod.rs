// Aggregator module: monthly grouping plus period-over-period indicators.

pub mod grouping;
pub mod price_change;

// Re-export the curation entry point for ease of use.
pub use grouping::curate;
