// Library crate exposing modules for the binary, integration tests and benches

pub mod config;
pub mod error;
pub mod measure;
pub mod model;
pub mod repository;
pub mod service;
pub mod util;

pub use config::{ContentLookupPolicy, MetricsConfig, MetricsSettings, StrategyKind};
pub use error::{MetricsError, Result};
pub use model::{CommitDetails, CommitMetrics, CommitWithMetrics, FileStatus};
pub use service::{filter_commits, measure, MeasurementService};
