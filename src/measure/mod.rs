//! Metric measurement
//!
//! - **calculator**: counts files per metric, given a file list and a phrase probe
//! - **full_snapshot**: materialize and measure every commit
//! - **differential**: measure the oldest commit, then fold per-commit deltas
//! - **tree_query**: measure every commit through object store queries
//! - **phrase_cache**: batch-scoped phrase answers for the differential fold
//! - **progress**: per-phase progress, drawn only when asked for

mod calculator;
mod differential;
mod full_snapshot;
mod phrase_cache;
mod progress;
mod strategy;
mod tree_query;

pub use calculator::{contains_bytes, CheckoutProbe, MetricCalculator, PhraseProbe, RevisionProbe};
pub use differential::{commit_delta, DifferentialStrategy};
pub use full_snapshot::{list_checkout_files, FullSnapshotStrategy};
pub use phrase_cache::{PhraseCache, PhraseKey, PhraseRequests};
pub use progress::{NoopProgress, Phase, PhaseProgress, ProgressReporter, VerboseProgress};
pub use strategy::MeasurementStrategy;
pub use tree_query::TreeQueryStrategy;
