//! JSON report for machine consumption and charting
//!
//! The shape mirrors what the dashboard renders: the request summary, the
//! phase chart series (label, value in milliseconds, percentage), query
//! histograms, and the component table.

use crate::hook_profiler::ComponentPerformanceTotal;
use crate::phase::PhaseChartPoint;
use crate::query_log::{QueryTiming, QueryType, QueryTypeGroup};
use crate::reporter::RequestSummary;
use crate::request::RequestProfiler;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonSlowestPhase {
    pub name: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub page_url: String,
    pub summary: RequestSummary,
    pub phases: Vec<PhaseChartPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_phase: Option<JsonSlowestPhase>,
    pub queries_by_type: BTreeMap<QueryType, QueryTypeGroup>,
    pub slowest_queries: Vec<QueryTiming>,
    pub components: Vec<ComponentPerformanceTotal>,
}

impl JsonReport {
    pub fn from_profiler(profiler: &RequestProfiler, summary: RequestSummary) -> Self {
        Self {
            page_url: profiler.page_url().to_string(),
            phases: profiler.phase_chart(),
            slowest_phase: profiler
                .slowest_phase()
                .map(|(name, duration)| JsonSlowestPhase {
                    name: name.to_string(),
                    duration,
                }),
            queries_by_type: profiler.grouped_queries(),
            slowest_queries: profiler.slowest_queries(profiler.config().slow_query_limit),
            components: profiler.per_component_totals(),
            summary,
        }
    }

    pub fn to_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ProfilerConfig;
    use crate::provenance::{BacktraceInspector, ComponentResolver, ComponentRoots};
    use std::sync::Arc;

    fn profiler() -> (ManualClock, RequestProfiler) {
        let clock = ManualClock::new();
        let resolver = Arc::new(ComponentResolver::new(ComponentRoots::default()));
        let profiler = RequestProfiler::with_parts(
            ProfilerConfig::default(),
            resolver,
            "/report",
            Box::new(clock.clone()),
            Box::new(BacktraceInspector),
        );
        (clock, profiler)
    }

    #[test]
    fn test_report_contains_phase_chart() {
        let (clock, mut profiler) = profiler();
        profiler.on_phase_start("boot");
        clock.set(0.05);
        profiler.on_phase_end("boot");
        clock.set(0.1);

        let summary = profiler.current_request_summary();
        let report = JsonReport::from_profiler(&profiler, summary);
        assert_eq!(report.page_url, "/report");
        assert_eq!(report.phases.len(), 1);
        assert!((report.phases[0].value_ms - 50.0).abs() < 1e-6);
        assert_eq!(report.slowest_phase.as_ref().unwrap().name, "boot");
    }

    #[test]
    fn test_report_serializes_query_types_as_strings() {
        let (clock, mut profiler) = profiler();
        profiler.on_query_start("SELECT 1");
        clock.set(0.01);
        profiler.on_query_end("SELECT 1");

        let summary = profiler.current_request_summary();
        let report = JsonReport::from_profiler(&profiler, summary);
        let json = report.to_pretty().unwrap();
        assert!(json.contains("\"SELECT\""));
        assert!(json.contains("\"queries_by_type\""));
    }

    #[test]
    fn test_empty_report_is_valid_json() {
        let (_clock, profiler) = profiler();
        let summary = profiler.current_request_summary();
        let report = JsonReport::from_profiler(&profiler, summary);
        let json = report.to_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["components"].as_array().unwrap().is_empty());
        // No slowest phase: the field is omitted entirely.
        assert!(value.get("slowest_phase").is_none());
    }
}
