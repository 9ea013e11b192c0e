mod commit;
mod metrics;

pub use commit::{CommitDetails, CommitSnapshot, FileStatus, PathTransition};
pub use metrics::{CommitMetrics, CommitWithMetrics, MetricDefinition, MetricDelta};
