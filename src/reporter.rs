//! Dashboard-ready summaries
//!
//! Pure reductions over the raw logs: the per-request summary handed to the
//! presentation layer, the persisted sample handed to the storage
//! collaborator, and averages over stored history. Nothing in here performs
//! I/O; the actual write is the storage collaborator's problem.

use crate::hook_profiler::ComponentPerformanceTotal;
use serde::{Deserialize, Serialize};

/// Component label used for whole-page aggregate samples
pub const PAGE_LOAD_LABEL: &str = "page load";

/// Per-request summary for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    /// Total request time in seconds
    pub total_time: f64,
    pub query_count: usize,
    /// Sum of completed query durations in seconds
    pub query_time: f64,
    /// Peak memory in bytes
    pub memory_usage: u64,
    /// Top components by attributed time; empty when hook profiling is off
    pub top_components: Vec<ComponentPerformanceTotal>,
}

/// The record handed to the storage collaborator, at most one per request
///
/// The storage layer owns the schema and sets the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSample {
    pub page_url: String,
    pub component_label: String,
    /// Seconds
    pub execution_time: f64,
    /// Bytes
    pub memory_usage: u64,
    pub query_count: u64,
    /// Seconds
    pub query_time: f64,
}

/// Build the aggregate page-load sample for one request. Pure transform.
pub fn build_persisted_sample(page_url: &str, summary: &RequestSummary) -> PersistedSample {
    PersistedSample {
        page_url: page_url.to_string(),
        component_label: PAGE_LOAD_LABEL.to_string(),
        execution_time: summary.total_time,
        memory_usage: summary.memory_usage,
        query_count: summary.query_count as u64,
        query_time: summary.query_time,
    }
}

/// Keep the `n` largest component totals (input is already sorted)
pub fn top_components(
    mut totals: Vec<ComponentPerformanceTotal>,
    n: usize,
) -> Vec<ComponentPerformanceTotal> {
    totals.truncate(n);
    totals
}

/// Averages over a window of stored samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalAverages {
    pub samples: usize,
    /// Seconds
    pub avg_execution_time: f64,
    pub avg_query_count: f64,
    /// Bytes
    pub avg_memory_usage: f64,
}

/// Reduce stored samples to dashboard averages; empty input yields zeros
pub fn aggregate(samples: &[PersistedSample]) -> HistoricalAverages {
    if samples.is_empty() {
        return HistoricalAverages {
            samples: 0,
            avg_execution_time: 0.0,
            avg_query_count: 0.0,
            avg_memory_usage: 0.0,
        };
    }

    let n = samples.len() as f64;
    HistoricalAverages {
        samples: samples.len(),
        avg_execution_time: samples.iter().map(|s| s.execution_time).sum::<f64>() / n,
        avg_query_count: samples.iter().map(|s| s.query_count as f64).sum::<f64>() / n,
        avg_memory_usage: samples.iter().map(|s| s.memory_usage as f64).sum::<f64>() / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RequestSummary {
        RequestSummary {
            total_time: 0.25,
            query_count: 12,
            query_time: 0.05,
            memory_usage: 32 * 1024 * 1024,
            top_components: Vec::new(),
        }
    }

    #[test]
    fn test_build_persisted_sample_copies_summary_fields() {
        let sample = build_persisted_sample("/shop/cart", &summary());
        assert_eq!(sample.page_url, "/shop/cart");
        assert_eq!(sample.component_label, PAGE_LOAD_LABEL);
        assert_eq!(sample.execution_time, 0.25);
        assert_eq!(sample.memory_usage, 32 * 1024 * 1024);
        assert_eq!(sample.query_count, 12);
        assert_eq!(sample.query_time, 0.05);
    }

    #[test]
    fn test_persisted_sample_round_trips_through_json() {
        let sample = build_persisted_sample("/", &summary());
        let json = serde_json::to_string(&sample).unwrap();
        let back: PersistedSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_top_components_truncates() {
        let totals = vec![
            ComponentPerformanceTotal {
                component: "a".into(),
                total_time: 3.0,
                ..Default::default()
            },
            ComponentPerformanceTotal {
                component: "b".into(),
                total_time: 2.0,
                ..Default::default()
            },
            ComponentPerformanceTotal {
                component: "c".into(),
                total_time: 1.0,
                ..Default::default()
            },
        ];
        let top = top_components(totals, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].component, "a");
        assert_eq!(top[1].component, "b");
    }

    #[test]
    fn test_aggregate_empty_is_all_zero() {
        let averages = aggregate(&[]);
        assert_eq!(averages.samples, 0);
        assert_eq!(averages.avg_execution_time, 0.0);
        assert_eq!(averages.avg_query_count, 0.0);
        assert_eq!(averages.avg_memory_usage, 0.0);
    }

    #[test]
    fn test_aggregate_averages_fields() {
        let mut a = build_persisted_sample("/a", &summary());
        a.execution_time = 0.2;
        a.query_count = 10;
        a.memory_usage = 1000;
        let mut b = a.clone();
        b.execution_time = 0.4;
        b.query_count = 20;
        b.memory_usage = 3000;

        let averages = aggregate(&[a, b]);
        assert_eq!(averages.samples, 2);
        assert!((averages.avg_execution_time - 0.3).abs() < 1e-9);
        assert!((averages.avg_query_count - 15.0).abs() < 1e-9);
        assert!((averages.avg_memory_usage - 2000.0).abs() < 1e-9);
    }
}
