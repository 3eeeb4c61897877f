//! Hook-level profiling with per-component attribution
//!
//! When enabled, the profiler observes every hook the host dispatches. Each
//! firing snapshots the registered callback set, resolves each callback to
//! its owning component, and brackets the dispatch with start/end
//! timestamps. Totals credit the full occurrence duration to every
//! component that had at least one callback on the hook, so shared hooks
//! inflate per-component totals. That is a documented reporting
//! approximation, not a bug: exclusive per-callback slicing is not
//! observable from outside the dispatcher.

use crate::provenance::{CallbackInfo, CallbackHandle, ComponentResolver};
use serde::Serialize;
use std::collections::HashMap;

/// Capability seam: snapshot of the callbacks registered for a hook
///
/// The snapshot is read once at fire time; handlers added or removed during
/// the same dispatch are not tracked for that occurrence.
pub trait HookRegistry {
    fn snapshot(&self, hook_name: &str) -> Vec<CallbackHandle>;
}

/// One firing of one hook
///
/// `occurrence_id` embeds a per-hook-name sequence number so re-entrant
/// firings of the same name never collide.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOccurrence {
    pub hook_name: String,
    pub occurrence_id: String,
    pub start: f64,
    pub end: Option<f64>,
    pub callbacks: Vec<CallbackInfo>,
}

impl HookOccurrence {
    pub fn duration(&self) -> Option<f64> {
        self.end.map(|end| (end - self.start).max(0.0))
    }
}

/// Accumulated time attributed to one component
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ComponentPerformanceTotal {
    pub component: String,
    /// Seconds; inflated when hooks are shared between components
    pub total_time: f64,
    /// Number of completed occurrences this component participated in
    pub hook_count: u64,
    /// Accumulated time per hook name
    pub per_hook: HashMap<String, f64>,
}

/// Observes every hook dispatch and aggregates per-component time
#[derive(Debug)]
pub struct HookProfiler {
    /// Hook-name prefixes belonging to the instrumentation itself; firing
    /// one of these never creates an occurrence (self-profiling guard).
    reserved_prefixes: Vec<String>,
    /// Per-hook-name sequence counters, never reused within the process
    sequence: HashMap<String, u64>,
    /// Occurrences whose completion has not been observed yet
    open: Vec<HookOccurrence>,
    /// Completed occurrences per hook name, in completion order
    completed: HashMap<String, Vec<HookOccurrence>>,
}

impl HookProfiler {
    pub fn new(reserved_prefixes: Vec<String>) -> Self {
        Self {
            reserved_prefixes,
            sequence: HashMap::new(),
            open: Vec::new(),
            completed: HashMap::new(),
        }
    }

    /// True for hook names this instrumentation dispatches itself
    pub fn is_reserved(&self, hook_name: &str) -> bool {
        self.reserved_prefixes
            .iter()
            .any(|prefix| hook_name.starts_with(prefix.as_str()))
    }

    /// Record a hook firing and snapshot its callback set
    ///
    /// Reserved names return before anything is allocated, which is what
    /// stops the profiler from recursively profiling its own hooks.
    pub fn on_hook_fire(
        &mut self,
        hook_name: &str,
        now: f64,
        registry: &dyn HookRegistry,
        resolver: &ComponentResolver,
    ) {
        if self.is_reserved(hook_name) {
            return;
        }

        let seq = self.sequence.entry(hook_name.to_string()).or_insert(0);
        *seq += 1;
        let occurrence_id = format!("{hook_name}#{seq}");

        let callbacks = registry
            .snapshot(hook_name)
            .iter()
            .map(|handle| resolver.resolve_callback(handle))
            .collect();

        self.open.push(HookOccurrence {
            hook_name: hook_name.to_string(),
            occurrence_id,
            start: now,
            end: None,
            callbacks,
        });
    }

    /// Record the completion of a hook dispatch
    ///
    /// Matches the first unfinished occurrence with this name. Under deep
    /// re-entrancy of the same name this may close the outer occurrence
    /// first; the approximation is kept deliberately (host dispatch is not
    /// typically re-entrant for one name) rather than guessed around.
    pub fn on_hook_complete(&mut self, hook_name: &str, now: f64) {
        let Some(idx) = self.open.iter().position(|o| o.hook_name == hook_name) else {
            tracing::debug!(hook_name, "hook completion with no open occurrence, dropping");
            return;
        };

        let mut occurrence = self.open.remove(idx);
        occurrence.end = Some(now);
        self.completed
            .entry(occurrence.hook_name.clone())
            .or_default()
            .push(occurrence);
    }

    /// Completed occurrences for one hook name, in completion order
    pub fn series(&self, hook_name: &str) -> &[HookOccurrence] {
        self.completed
            .get(hook_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.values().map(Vec::len).sum()
    }

    /// Per-component totals, sorted descending by total time
    ///
    /// Every component with at least one callback on an occurrence is
    /// credited the occurrence's full duration.
    pub fn per_component_totals(&self) -> Vec<ComponentPerformanceTotal> {
        let mut totals: HashMap<&str, ComponentPerformanceTotal> = HashMap::new();

        for occurrence in self.completed.values().flatten() {
            let Some(duration) = occurrence.duration() else {
                continue;
            };

            // Credit each distinct component once per occurrence.
            let mut seen: Vec<&str> = Vec::new();
            for callback in &occurrence.callbacks {
                let component = callback.owning_component.as_str();
                if seen.contains(&component) {
                    continue;
                }
                seen.push(component);

                let entry = totals.entry(component).or_insert_with(|| {
                    ComponentPerformanceTotal {
                        component: component.to_string(),
                        ..Default::default()
                    }
                });
                entry.total_time += duration;
                entry.hook_count += 1;
                *entry
                    .per_hook
                    .entry(occurrence.hook_name.clone())
                    .or_insert(0.0) += duration;
            }
        }

        let mut sorted: Vec<ComponentPerformanceTotal> = totals.into_values().collect();
        sorted.sort_by(|a, b| {
            b.total_time
                .partial_cmp(&a.total_time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// Print the component table to stdout, sorted by total time
    pub fn print_summary(&self) {
        let totals = self.per_component_totals();
        if totals.is_empty() {
            println!("No hook profiling data collected.");
            return;
        }

        println!("{:<30} {:>12} {:>8}", "Component", "Total Time", "Hooks");
        println!("{}", "-".repeat(52));
        for total in &totals {
            println!(
                "{:<30} {:>10.3}ms {:>8}",
                total.component,
                total.total_time * 1000.0,
                total.hook_count
            );
        }
        println!("{}", "-".repeat(52));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{CallbackKind, ComponentRoots};
    use std::collections::HashMap as StdHashMap;
    use std::path::PathBuf;

    /// Test registry: fixed handle lists per hook name
    #[derive(Debug, Default)]
    struct FixedRegistry {
        hooks: StdHashMap<String, Vec<CallbackHandle>>,
    }

    impl FixedRegistry {
        fn with(mut self, hook: &str, handles: Vec<CallbackHandle>) -> Self {
            self.hooks.insert(hook.to_string(), handles);
            self
        }
    }

    impl HookRegistry for FixedRegistry {
        fn snapshot(&self, hook_name: &str) -> Vec<CallbackHandle> {
            self.hooks.get(hook_name).cloned().unwrap_or_default()
        }
    }

    fn resolver() -> ComponentResolver {
        ComponentResolver::new(ComponentRoots {
            plugins: PathBuf::from("/srv/app/plugins"),
            theme: PathBuf::from("/srv/app/theme"),
            core: PathBuf::from("/srv/app/core"),
        })
    }

    fn plugin_handle(plugin: &str) -> CallbackHandle {
        CallbackHandle::new(
            CallbackKind::Function,
            format!("/srv/app/plugins/{plugin}/hooks.ext"),
            1,
        )
    }

    fn profiler() -> HookProfiler {
        HookProfiler::new(vec!["pulso_".to_string()])
    }

    #[test]
    fn test_fire_and_complete_records_occurrence() {
        let registry = FixedRegistry::default().with("init", vec![plugin_handle("gallery")]);
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 1.0, &registry, &resolver);
        assert_eq!(profiler.open_count(), 1);

        profiler.on_hook_complete("init", 1.5);
        assert_eq!(profiler.open_count(), 0);
        assert_eq!(profiler.completed_count(), 1);

        let series = profiler.series("init");
        assert_eq!(series[0].occurrence_id, "init#1");
        assert_eq!(series[0].duration(), Some(0.5));
        assert_eq!(series[0].callbacks[0].owning_component, "gallery");
    }

    #[test]
    fn test_reserved_hook_never_creates_occurrence() {
        let registry = FixedRegistry::default();
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("pulso_sample_saved", 1.0, &registry, &resolver);
        assert_eq!(profiler.open_count(), 0);
        assert_eq!(profiler.completed_count(), 0);
        // The sequence counter is untouched too: the guard runs first.
        assert!(profiler.sequence.is_empty());
    }

    #[test]
    fn test_sequence_numbers_are_per_hook_and_monotonic() {
        let registry = FixedRegistry::default();
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_fire("render", 0.1, &registry, &resolver);
        profiler.on_hook_fire("init", 0.2, &registry, &resolver);

        let ids: Vec<&str> = profiler
            .open
            .iter()
            .map(|o| o.occurrence_id.as_str())
            .collect();
        assert_eq!(ids, vec!["init#1", "render#1", "init#2"]);
    }

    #[test]
    fn test_completion_matches_first_unfinished_occurrence() {
        let registry = FixedRegistry::default();
        let resolver = resolver();
        let mut profiler = profiler();

        // Re-entrant firing of the same name: the first unfinished one is
        // closed first (documented approximation).
        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_fire("init", 0.1, &registry, &resolver);
        profiler.on_hook_complete("init", 0.2);

        assert_eq!(profiler.open_count(), 1);
        let series = profiler.series("init");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].occurrence_id, "init#1");
        assert_eq!(series[0].end, Some(0.2));
    }

    #[test]
    fn test_completion_without_fire_is_ignored() {
        let mut profiler = profiler();
        profiler.on_hook_complete("init", 1.0);
        assert_eq!(profiler.completed_count(), 0);
    }

    #[test]
    fn test_interleaved_hooks_complete_independently() {
        let registry = FixedRegistry::default();
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("outer", 0.0, &registry, &resolver);
        profiler.on_hook_fire("inner", 0.1, &registry, &resolver);
        profiler.on_hook_complete("inner", 0.2);
        profiler.on_hook_complete("outer", 0.4);

        assert_eq!(profiler.series("inner")[0].duration(), Some(0.1));
        assert!((profiler.series("outer")[0].duration().unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_shared_hook_credits_full_duration_to_each_component() {
        let registry = FixedRegistry::default().with(
            "init",
            vec![
                plugin_handle("gallery"),
                plugin_handle("shop"),
                CallbackHandle::new(CallbackKind::Method, "/srv/app/core/kernel.ext", 9),
            ],
        );
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_complete("init", 0.010);

        let totals = profiler.per_component_totals();
        assert_eq!(totals.len(), 3);
        for total in &totals {
            // Intentional inflation: all three components get the full 10ms.
            assert!(total.total_time >= 0.010 - 1e-9);
            assert_eq!(total.hook_count, 1);
        }
    }

    #[test]
    fn test_component_credited_once_per_occurrence() {
        // Two callbacks from the same plugin on one hook must not double
        // the credited time.
        let registry = FixedRegistry::default().with(
            "init",
            vec![plugin_handle("gallery"), plugin_handle("gallery")],
        );
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_complete("init", 0.010);

        let totals = profiler.per_component_totals();
        assert_eq!(totals.len(), 1);
        assert!((totals[0].total_time - 0.010).abs() < 1e-9);
        assert_eq!(totals[0].hook_count, 1);
    }

    #[test]
    fn test_totals_sorted_descending_by_time() {
        let registry = FixedRegistry::default()
            .with("fast", vec![plugin_handle("gallery")])
            .with("slow", vec![plugin_handle("shop")]);
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("fast", 0.0, &registry, &resolver);
        profiler.on_hook_complete("fast", 0.001);
        profiler.on_hook_fire("slow", 1.0, &registry, &resolver);
        profiler.on_hook_complete("slow", 1.5);

        let totals = profiler.per_component_totals();
        assert_eq!(totals[0].component, "shop");
        assert_eq!(totals[1].component, "gallery");
    }

    #[test]
    fn test_per_hook_breakdown_accumulates() {
        let registry = FixedRegistry::default().with("init", vec![plugin_handle("gallery")]);
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_complete("init", 0.1);
        profiler.on_hook_fire("init", 1.0, &registry, &resolver);
        profiler.on_hook_complete("init", 1.2);

        let totals = profiler.per_component_totals();
        assert_eq!(totals[0].hook_count, 2);
        let per_hook = totals[0].per_hook.get("init").copied().unwrap();
        assert!((per_hook - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_opaque_callbacks_attribute_to_unknown() {
        let registry = FixedRegistry::default().with("init", vec![CallbackHandle::opaque()]);
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_complete("init", 0.1);

        let totals = profiler.per_component_totals();
        assert_eq!(totals[0].component, "unknown");
    }

    #[test]
    fn test_unfinished_occurrences_are_excluded_from_totals() {
        let registry = FixedRegistry::default().with("init", vec![plugin_handle("gallery")]);
        let resolver = resolver();
        let mut profiler = profiler();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        assert!(profiler.per_component_totals().is_empty());
    }

    #[test]
    fn test_print_summary_does_not_panic() {
        let registry = FixedRegistry::default().with("init", vec![plugin_handle("gallery")]);
        let resolver = resolver();
        let mut profiler = profiler();
        profiler.print_summary();

        profiler.on_hook_fire("init", 0.0, &registry, &resolver);
        profiler.on_hook_complete("init", 0.1);
        profiler.print_summary();
    }
}
