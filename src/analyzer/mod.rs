// Analyzer module: end-of-run summaries of the collected dataset.

pub mod price_analysis;

// Re-export the main Analyzer implementation for ease of use.
pub use price_analysis::{Analyzer, AnalyzerImpl};
