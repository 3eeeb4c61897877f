//! Per-request profiling context
//!
//! One `RequestProfiler` is constructed at the top of each request and
//! passed to every collaborator that feeds it notifications; there is no
//! ambient global state. The only thing shared between requests is the
//! `ComponentResolver` (behind an `Arc`) so provenance caching survives
//! across requests in one worker process.
//!
//! Nothing in here ever surfaces an error to the host: malformed event
//! orderings degrade to missing data, and the end-of-request persistence
//! write is fire-and-forget.

use crate::clock::{EventClock, SystemClock};
use crate::config::ProfilerConfig;
use crate::hook_profiler::{ComponentPerformanceTotal, HookProfiler, HookRegistry};
use crate::phase::{PhaseChartPoint, PhaseSummary, PhaseTracker};
use crate::provenance::{BacktraceInspector, ComponentResolver, StackInspector};
use crate::query_log::{CorrelationKey, QueryLog, QueryTiming, QueryType, QueryTypeGroup};
use crate::reporter::{self, RequestSummary};
use crate::sampler::SampleGate;
use crate::storage::SampleStore;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct RequestProfiler {
    config: ProfilerConfig,
    resolver: Arc<ComponentResolver>,
    clock: Box<dyn EventClock>,
    inspector: Box<dyn StackInspector>,
    page_url: String,
    start_time: f64,
    phases: PhaseTracker,
    queries: QueryLog,
    hooks: Option<HookProfiler>,
    finished: bool,
}

impl RequestProfiler {
    /// Production profiler: system clock, backtrace-based caller capture
    pub fn new(
        config: ProfilerConfig,
        resolver: Arc<ComponentResolver>,
        page_url: impl Into<String>,
    ) -> Self {
        Self::with_parts(
            config,
            resolver,
            page_url,
            Box::new(SystemClock::new()),
            Box::new(BacktraceInspector),
        )
    }

    /// Profiler with injected clock and stack inspector (tests, replay)
    pub fn with_parts(
        config: ProfilerConfig,
        resolver: Arc<ComponentResolver>,
        page_url: impl Into<String>,
        clock: Box<dyn EventClock>,
        inspector: Box<dyn StackInspector>,
    ) -> Self {
        let start_time = clock.now();
        let hooks = config
            .profile_hooks
            .then(|| HookProfiler::new(config.reserved_hook_prefixes.clone()));

        Self {
            config,
            resolver,
            clock,
            inspector,
            page_url: page_url.into(),
            start_time,
            phases: PhaseTracker::new(),
            queries: QueryLog::new(),
            hooks,
            finished: false,
        }
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Seconds since this profiler was constructed
    pub fn total_time(&self) -> f64 {
        (self.clock.now() - self.start_time).max(0.0)
    }

    // --- host notifications -------------------------------------------------

    pub fn on_phase_start(&mut self, name: &str) {
        let now = self.clock.now();
        self.phases.on_phase_start(name, now);
    }

    pub fn on_phase_end(&mut self, name: &str) {
        let now = self.clock.now();
        self.phases.on_phase_end(name, now);
    }

    pub fn on_query_start(&mut self, query: &str) -> CorrelationKey {
        let now = self.clock.now();
        self.queries.on_query_start(query, now)
    }

    pub fn on_query_end(&mut self, last_query: &str) {
        let now = self.clock.now();
        let caller = self.resolver.query_caller(&self.inspector.frames());
        self.queries.on_query_end(last_query, now, caller);
    }

    pub fn on_hook_fire(&mut self, hook_name: &str, registry: &dyn HookRegistry) {
        let now = self.clock.now();
        if let Some(hooks) = self.hooks.as_mut() {
            hooks.on_hook_fire(hook_name, now, registry, &self.resolver);
        }
    }

    pub fn on_hook_complete(&mut self, hook_name: &str) {
        let now = self.clock.now();
        if let Some(hooks) = self.hooks.as_mut() {
            hooks.on_hook_complete(hook_name, now);
        }
    }

    // --- reporting surface --------------------------------------------------

    pub fn current_request_summary(&self) -> RequestSummary {
        let top_components = self
            .hooks
            .as_ref()
            .map(|hooks| {
                reporter::top_components(
                    hooks.per_component_totals(),
                    self.config.top_component_limit,
                )
            })
            .unwrap_or_default();

        RequestSummary {
            total_time: self.total_time(),
            query_count: self.queries.count(),
            query_time: self.queries.total_time(),
            memory_usage: self.clock.peak_memory(),
            top_components,
        }
    }

    pub fn phase_summary(&self) -> Vec<PhaseSummary> {
        self.phases.summarize(self.total_time())
    }

    pub fn phase_chart(&self) -> Vec<PhaseChartPoint> {
        self.phases.chart_series(self.total_time())
    }

    pub fn slowest_phase(&self) -> Option<(&str, f64)> {
        self.phases.slowest_phase()
    }

    pub fn grouped_queries(&self) -> BTreeMap<QueryType, QueryTypeGroup> {
        self.queries.group_by_type()
    }

    pub fn slowest_queries(&self, n: usize) -> Vec<QueryTiming> {
        self.queries.slowest(n)
    }

    pub fn per_component_totals(&self) -> Vec<ComponentPerformanceTotal> {
        self.hooks
            .as_ref()
            .map(HookProfiler::per_component_totals)
            .unwrap_or_default()
    }

    pub fn phases(&self) -> &PhaseTracker {
        &self.phases
    }

    pub fn queries(&self) -> &QueryLog {
        &self.queries
    }

    pub fn hook_profiler(&self) -> Option<&HookProfiler> {
        self.hooks.as_ref()
    }

    // --- end of request -----------------------------------------------------

    /// Close out the request: force-close open phases, build the summary,
    /// and persist one sample subject to the sampling gate.
    ///
    /// Idempotent: a second call returns a fresh summary but never persists
    /// again. A failed write is logged at debug level and dropped; it must
    /// never affect the host's response.
    pub fn finish(&mut self, store: &mut dyn SampleStore, gate: &mut SampleGate) -> RequestSummary {
        let now = self.clock.now();
        self.phases.finalize(now);

        let summary = self.current_request_summary();

        if self.finished {
            return summary;
        }
        self.finished = true;

        if !self.config.tracking_enabled {
            return summary;
        }
        if !gate.should_persist(self.config.sampling_rate_percent) {
            tracing::debug!(page_url = %self.page_url, "request not sampled, skipping persist");
            return summary;
        }

        let sample = reporter::build_persisted_sample(&self.page_url, &summary);
        if let Err(err) = store.insert(sample) {
            tracing::debug!(
                page_url = %self.page_url,
                error = %err,
                "dropping performance sample after failed store write"
            );
        }

        summary
    }
}
