//! Database query timing for one request
//!
//! The host reports a raw query just before it runs and a "query finished"
//! notification afterwards, with no correlation id of its own. The log
//! pairs the two through a time-salted FNV key: two structurally identical
//! queries issued back-to-back still get distinct keys. Pairing tracks a
//! single current key (last start wins), so nested query timing is a known
//! approximation. Starts that never see an end are dropped, not reported.

use fnv::{FnvHashMap, FnvHasher};
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hasher;

/// Opaque pairing key for one in-flight query
pub type CorrelationKey = u64;

/// A completed query measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryTiming {
    pub query: String,
    pub started_at: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Attributed caller: a plugin folder name, or "core"
    pub caller: String,
}

/// Query classification by statement prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Show,
    Other,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Show => "SHOW",
            QueryType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a query by case-insensitive prefix match, in fixed rule order
pub fn classify(query: &str) -> QueryType {
    const RULES: [(&str, QueryType); 5] = [
        ("SELECT", QueryType::Select),
        ("INSERT", QueryType::Insert),
        ("UPDATE", QueryType::Update),
        ("DELETE", QueryType::Delete),
        ("SHOW", QueryType::Show),
    ];

    let bytes = query.trim_start().as_bytes();
    for (prefix, query_type) in RULES {
        let p = prefix.as_bytes();
        if bytes.len() >= p.len() && bytes[..p.len()].eq_ignore_ascii_case(p) {
            return query_type;
        }
    }
    QueryType::Other
}

/// Aggregate bucket for one query type
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct QueryTypeGroup {
    pub count: usize,
    pub total_time: f64,
    pub queries: Vec<QueryTiming>,
}

/// Start/end pairing and the per-request timing log
#[derive(Debug, Default)]
pub struct QueryLog {
    /// In-flight starts keyed by correlation key
    open: FnvHashMap<CorrelationKey, f64>,
    /// Most recently started, not yet ended key (last start wins)
    current: Option<CorrelationKey>,
    timings: Vec<QueryTiming>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query about to run; returns its correlation key
    ///
    /// The key hashes the query text together with the timestamp bits. The
    /// time salt is collision avoidance for identical back-to-back queries,
    /// not a security property.
    pub fn on_query_start(&mut self, query: &str, now: f64) -> CorrelationKey {
        let mut hasher = FnvHasher::default();
        hasher.write(query.as_bytes());
        hasher.write_u64(now.to_bits());
        let key = hasher.finish();

        self.open.insert(key, now);
        self.current = Some(key);
        key
    }

    /// Record the end of the current query
    ///
    /// `last_query` is whatever the host reports as the last executed query
    /// text. An end with no open start is silently ignored.
    pub fn on_query_end(&mut self, last_query: &str, now: f64, caller: impl Into<String>) {
        let Some(key) = self.current.take() else {
            tracing::debug!("query end with no open start, dropping");
            return;
        };
        let Some(started_at) = self.open.remove(&key) else {
            tracing::debug!(key, "query end for unknown correlation key, dropping");
            return;
        };

        self.timings.push(QueryTiming {
            query: last_query.to_string(),
            started_at,
            duration: (now - started_at).max(0.0),
            caller: caller.into(),
        });
    }

    pub fn timings(&self) -> &[QueryTiming] {
        &self.timings
    }

    /// Completed query count (unmatched starts are not counted)
    pub fn count(&self) -> usize {
        self.timings.len()
    }

    /// Starts still waiting for an end; dropped at request end
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Sum of completed query durations in seconds
    pub fn total_time(&self) -> f64 {
        self.timings.iter().map(|t| t.duration).sum()
    }

    /// Histogram of completed queries by type
    pub fn group_by_type(&self) -> BTreeMap<QueryType, QueryTypeGroup> {
        let mut groups: BTreeMap<QueryType, QueryTypeGroup> = BTreeMap::new();
        for timing in &self.timings {
            let group = groups.entry(classify(&timing.query)).or_default();
            group.count += 1;
            group.total_time += timing.duration;
            group.queries.push(timing.clone());
        }
        groups
    }

    /// The `n` slowest queries, descending by duration, stable on ties
    pub fn slowest(&self, n: usize) -> Vec<QueryTiming> {
        let mut sorted = self.timings.clone();
        sorted.sort_by(|a, b| {
            b.duration
                .partial_cmp(&a.duration)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    /// Print the per-type summary and slowest queries to stdout
    pub fn print_summary(&self, slowest_limit: usize) {
        if self.timings.is_empty() {
            println!("No queries recorded.");
            return;
        }

        println!("{:<8} {:>7} {:>12} {:>12}", "Type", "Count", "Total", "Avg");
        println!("{}", "-".repeat(42));
        for (query_type, group) in self.group_by_type() {
            let avg_ms = group.total_time / group.count as f64 * 1000.0;
            println!(
                "{:<8} {:>7} {:>10.3}ms {:>10.3}ms",
                query_type,
                group.count,
                group.total_time * 1000.0,
                avg_ms
            );
        }

        println!();
        println!("Slowest queries:");
        for timing in self.slowest(slowest_limit) {
            let text = ellipsize(&timing.query, 80);
            println!(
                "  {:>10.3}ms  {:<20} {}",
                timing.duration * 1000.0,
                timing.caller,
                text
            );
        }
    }
}

/// Shorten display text to at most `max` bytes, cutting only on a char
/// boundary so multibyte query text never splits mid-character.
fn ellipsize(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
