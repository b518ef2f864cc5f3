//! Combined Popularity Index (CPI) pipeline - shared modules for all binaries.
//!
//! Fuses YouTube view counts and TikTok post counts for a roster of artists
//! into one cohort-normalized, deterministically ranked table.

pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod rank;
pub mod reconcile;
pub mod report;
pub mod safety;
pub mod scoring;

pub use config::{PipelineConfig, Weights};
pub use error::{ConfigError, Error, ParseError, Result};
pub use pipeline::Pipeline;
