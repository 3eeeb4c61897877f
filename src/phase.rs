//! Lifecycle phase timing
//!
//! The host fires named start/end notifications as a request moves through
//! its lifecycle (bootstrap, component loading, rendering, ...). This module
//! keeps an ordered log of those phases and closes them eagerly: starting a
//! new phase force-closes whatever was still open, so the gap between two
//! checkpoints is always attributed to the earlier one even when the host
//! never emits an explicit end.

use serde::Serialize;

/// One occurrence of a named lifecycle phase
///
/// `end` and `duration` are set together, never independently.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub name: String,
    pub start: f64,
    pub end: Option<f64>,
    pub duration: Option<f64>,
}

impl PhaseRecord {
    fn open(name: &str, start: f64) -> Self {
        Self {
            name: name.to_string(),
            start,
            end: None,
            duration: None,
        }
    }

    fn close(&mut self, now: f64) {
        if self.end.is_none() {
            self.end = Some(now);
            self.duration = Some((now - self.start).max(0.0));
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Summary row for one phase
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseSummary {
    pub name: String,
    /// Duration in seconds
    pub duration: f64,
    /// Share of the total request time, 0-100
    pub percentage: f64,
}

/// Chart-ready row for the presentation layer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseChartPoint {
    pub label: String,
    /// Duration in milliseconds
    pub value_ms: f64,
    pub percentage: f64,
}

/// Ordered log of lifecycle phases for one request
#[derive(Debug, Default)]
pub struct PhaseTracker {
    phases: Vec<PhaseRecord>,
    /// Index of the most recently opened, not yet closed phase
    open: Option<usize>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a phase named `name` at `now`
    ///
    /// Any phase still open is force-closed first, so intervening time is
    /// always attributed to the previous checkpoint. Re-firing a name opens
    /// a new occurrence sharing that name; the last occurrence wins as the
    /// current phase.
    pub fn on_phase_start(&mut self, name: &str, now: f64) {
        if let Some(idx) = self.open.take() {
            self.phases[idx].close(now);
        }
        self.phases.push(PhaseRecord::open(name, now));
        self.open = Some(self.phases.len() - 1);
    }

    /// Close the open phase named `name`, if any
    ///
    /// An end notification with no matching open start is silently ignored;
    /// host event ordering is trusted but not assumed well-formed.
    pub fn on_phase_end(&mut self, name: &str, now: f64) {
        if let Some(idx) = self.open {
            if self.phases[idx].name == name {
                self.phases[idx].close(now);
                self.open = None;
            }
        }
    }

    /// Force-close any still-open phase at end of request. Idempotent.
    pub fn finalize(&mut self, now: f64) {
        if let Some(idx) = self.open.take() {
            self.phases[idx].close(now);
        }
    }

    /// Timestamp of the first phase start, if any phase was ever opened
    pub fn first_start(&self) -> Option<f64> {
        self.phases.first().map(|p| p.start)
    }

    /// Summaries in the order phases were first opened
    ///
    /// A zero `total_time` yields 0% everywhere rather than dividing by zero.
    pub fn summarize(&self, total_time: f64) -> Vec<PhaseSummary> {
        self.phases
            .iter()
            .filter_map(|p| {
                let duration = p.duration?;
                let percentage = if total_time > 0.0 {
                    duration / total_time * 100.0
                } else {
                    0.0
                };
                Some(PhaseSummary {
                    name: p.name.clone(),
                    duration,
                    percentage,
                })
            })
            .collect()
    }

    /// Slowest closed phase; ties broken by first-encountered order
    pub fn slowest_phase(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for phase in &self.phases {
            if let Some(duration) = phase.duration {
                match best {
                    Some((_, d)) if duration <= d => {}
                    _ => best = Some((phase.name.as_str(), duration)),
                }
            }
        }
        best
    }

    /// JSON-serializable series for charting: label, value in ms, percentage
    pub fn chart_series(&self, total_time: f64) -> Vec<PhaseChartPoint> {
        self.summarize(total_time)
            .into_iter()
            .map(|s| PhaseChartPoint {
                label: s.name,
                value_ms: s.duration * 1000.0,
                percentage: s.percentage,
            })
            .collect()
    }

    pub fn records(&self) -> &[PhaseRecord] {
        &self.phases
    }

    /// Print the phase table to stdout
    pub fn print_summary(&self, total_time: f64) {
        let summaries = self.summarize(total_time);
        if summaries.is_empty() {
            println!("No phases recorded.");
            return;
        }

        println!("{:<30} {:>12} {:>8}", "Phase", "Duration", "% Total");
        println!("{}", "-".repeat(52));
        for s in &summaries {
            println!(
                "{:<30} {:>10.3}ms {:>7.1}%",
                s.name,
                s.duration * 1000.0,
                s.percentage
            );
        }
        println!("{}", "-".repeat(52));
    }
}
