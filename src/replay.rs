//! Recorded request replay
//!
//! A recorded request is a JSON-lines stream of timestamped notifications,
//! one object per line, exactly the notifications a live host would have
//! delivered. Replaying drives a `RequestProfiler` through a hand-driven
//! clock so the reports come out identical to what the live request would
//! have produced.

use crate::clock::ManualClock;
use crate::config::ProfilerConfig;
use crate::hook_profiler::HookRegistry;
use crate::provenance::{
    CallbackHandle, CallbackKind, ComponentResolver, FrameInfo, StackInspector,
};
use crate::reporter::RequestSummary;
use crate::request::RequestProfiler;
use crate::sampler::SampleGate;
use crate::storage::SampleStore;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// One recorded notification from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RequestEvent {
    PhaseStart {
        at: f64,
        name: String,
    },
    PhaseEnd {
        at: f64,
        name: String,
    },
    QueryStart {
        at: f64,
        query: String,
    },
    QueryEnd {
        at: f64,
        query: String,
        /// Source files of the captured stack, innermost first
        #[serde(default)]
        stack: Vec<PathBuf>,
    },
    HookFire {
        at: f64,
        name: String,
        #[serde(default)]
        callbacks: Vec<RecordedCallback>,
    },
    HookComplete {
        at: f64,
        name: String,
    },
    Finish {
        at: f64,
        #[serde(default)]
        peak_memory: u64,
    },
}

impl RequestEvent {
    pub fn at(&self) -> f64 {
        match self {
            RequestEvent::PhaseStart { at, .. }
            | RequestEvent::PhaseEnd { at, .. }
            | RequestEvent::QueryStart { at, .. }
            | RequestEvent::QueryEnd { at, .. }
            | RequestEvent::HookFire { at, .. }
            | RequestEvent::HookComplete { at, .. }
            | RequestEvent::Finish { at, .. } => *at,
        }
    }
}

/// A callback as captured at record time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCallback {
    #[serde(default)]
    pub kind: CallbackKind,
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl RecordedCallback {
    fn to_handle(&self) -> CallbackHandle {
        match &self.file {
            Some(file) => CallbackHandle::new(self.kind, file.clone(), self.line.unwrap_or(0)),
            None => CallbackHandle::opaque(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("line {line}: invalid event: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON-lines event stream; blank lines are skipped
pub fn parse_events(raw: &str) -> Result<Vec<RequestEvent>, ReplayError> {
    let mut events = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|source| ReplayError::Parse {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Registry view over one recorded hook firing
struct RecordedRegistry {
    handles: Vec<CallbackHandle>,
}

impl HookRegistry for RecordedRegistry {
    fn snapshot(&self, _hook_name: &str) -> Vec<CallbackHandle> {
        self.handles.clone()
    }
}

/// Inspector replaying the stack captured alongside each query end
#[derive(Debug, Clone, Default)]
struct RecordedInspector {
    frames: Rc<RefCell<Vec<FrameInfo>>>,
}

impl StackInspector for RecordedInspector {
    fn frames(&self) -> Vec<FrameInfo> {
        self.frames.borrow().clone()
    }
}

pub struct ReplayOutcome {
    pub profiler: RequestProfiler,
    pub summary: RequestSummary,
}

/// Feed a recorded event stream through a fresh profiler and finish it
///
/// The request finishes at the `finish` event's timestamp, or at the last
/// event's timestamp when the recording was cut short.
pub fn replay(
    events: &[RequestEvent],
    config: ProfilerConfig,
    resolver: Arc<ComponentResolver>,
    page_url: &str,
    store: &mut dyn SampleStore,
    gate: &mut SampleGate,
) -> ReplayOutcome {
    let clock = ManualClock::new();
    let inspector = RecordedInspector::default();
    let frames = Rc::clone(&inspector.frames);

    let mut profiler = RequestProfiler::with_parts(
        config,
        resolver,
        page_url,
        Box::new(clock.clone()),
        Box::new(inspector),
    );

    for event in events {
        clock.set(event.at());
        match event {
            RequestEvent::PhaseStart { name, .. } => profiler.on_phase_start(name),
            RequestEvent::PhaseEnd { name, .. } => profiler.on_phase_end(name),
            RequestEvent::QueryStart { query, .. } => {
                profiler.on_query_start(query);
            }
            RequestEvent::QueryEnd { query, stack, .. } => {
                *frames.borrow_mut() = stack
                    .iter()
                    .map(|file| FrameInfo {
                        file: Some(file.clone()),
                        line: None,
                    })
                    .collect();
                profiler.on_query_end(query);
            }
            RequestEvent::HookFire {
                name, callbacks, ..
            } => {
                let registry = RecordedRegistry {
                    handles: callbacks.iter().map(RecordedCallback::to_handle).collect(),
                };
                profiler.on_hook_fire(name, &registry);
            }
            RequestEvent::HookComplete { name, .. } => profiler.on_hook_complete(name),
            RequestEvent::Finish { peak_memory, .. } => {
                clock.set_peak_memory(*peak_memory);
            }
        }
    }

    let summary = profiler.finish(store, gate);
    ReplayOutcome { profiler, summary }
}
