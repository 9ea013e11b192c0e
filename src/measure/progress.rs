//! Progress of a measurement run
//!
//! Strategies count work per phase: commits snapshotted or queried, deltas
//! folded, phrase lookups answered. Whether any of it is drawn is decided once
//! from the resolved settings.

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::MetricsSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Snapshots,
    TreeQueries,
    Deltas,
    Lookups,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Snapshots => "Snapshots",
            Phase::TreeQueries => "Tree queries",
            Phase::Deltas => "Deltas",
            Phase::Lookups => "Phrase lookups",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Phase::Lookups => "lookups",
            _ => "commits",
        }
    }
}

/// Work done in one phase. A hidden phase still counts.
pub struct PhaseProgress {
    bar: ProgressBar,
}

impl PhaseProgress {
    fn hidden(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self { bar }
    }

    fn drawn(phase: Phase, total: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {}: [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
                phase.label(),
                phase.unit()
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        Self {
            bar: ProgressBar::new(total as u64).with_style(style),
        }
    }

    pub fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn done(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

pub trait ProgressReporter {
    fn phase(&self, phase: Phase, total: usize) -> PhaseProgress;
}

/// Never draws; for tests, benchmarks and library callers
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn phase(&self, _phase: Phase, total: usize) -> PhaseProgress {
        PhaseProgress::hidden(total)
    }
}

/// Draws on stderr when `showProgress` is set and a phase has more than one
/// unit of work
pub struct VerboseProgress {
    show: bool,
}

impl VerboseProgress {
    pub fn for_settings(settings: &MetricsSettings) -> Self {
        Self {
            show: settings.show_progress(),
        }
    }

    fn shows(&self, total: usize) -> bool {
        self.show && total > 1
    }
}

impl ProgressReporter for VerboseProgress {
    fn phase(&self, phase: Phase, total: usize) -> PhaseProgress {
        if self.shows(total) {
            PhaseProgress::drawn(phase, total)
        } else {
            PhaseProgress::hidden(total)
        }
    }
}
