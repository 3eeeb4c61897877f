//! Callback provenance and component attribution
//!
//! Hooks and queries are attributed to an owning component (a plugin, the
//! active theme, or the host core) by classifying the source file a callback
//! or stack frame was declared in. Classification follows a fixed rule
//! order: plugins root, then theme root, then core root, then unknown.
//! Resolution is cached per file path because path ownership is invariant
//! within one process run and manifest lookups touch the filesystem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Component name used when a callback cannot be attributed
pub const UNKNOWN_COMPONENT: &str = "unknown";
/// Component name for anything under the host core tree
pub const CORE_COMPONENT: &str = "core";
/// Component name for anything under the theme root
pub const THEME_COMPONENT: &str = "active theme";

/// Maximum frames walked during caller attribution
const MAX_STACK_DEPTH: usize = 64;

/// How a registered callback is shaped, as reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    Function,
    Method,
    StaticMethod,
    Closure,
    #[default]
    Unknown,
}

/// Source location a callback handle resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

/// Opaque handle the host hands us for a registered callback
///
/// The host's introspection mechanism is out of scope; all the profiler
/// needs is the kind tag and, when introspection succeeded, a source
/// location. `location: None` models an introspection failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackHandle {
    pub kind: CallbackKind,
    pub location: Option<SourceLocation>,
}

impl CallbackHandle {
    pub fn new(kind: CallbackKind, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            kind,
            location: Some(SourceLocation {
                file: file.into(),
                line,
            }),
        }
    }

    /// Handle whose introspection failed
    pub fn opaque() -> Self {
        Self {
            kind: CallbackKind::Unknown,
            location: None,
        }
    }
}

/// Resolved provenance for one callback on one hook occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackInfo {
    pub kind: CallbackKind,
    pub source_file: Option<PathBuf>,
    pub source_line: Option<u32>,
    pub owning_component: String,
}

impl CallbackInfo {
    fn unknown() -> Self {
        Self {
            kind: CallbackKind::Unknown,
            source_file: None,
            source_line: None,
            owning_component: UNKNOWN_COMPONENT.to_string(),
        }
    }
}

/// One captured stack frame, innermost first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

/// Capability seam for capturing the current call stack
pub trait StackInspector {
    /// Frames of the current stack, innermost first
    fn frames(&self) -> Vec<FrameInfo>;
}

/// Production inspector backed by the `backtrace` crate
#[derive(Debug, Default)]
pub struct BacktraceInspector;

impl StackInspector for BacktraceInspector {
    fn frames(&self) -> Vec<FrameInfo> {
        let mut frames = Vec::with_capacity(16);
        backtrace::trace(|frame| {
            // One entry per physical frame, even when inlining gives the
            // resolver several symbols for it.
            let mut resolved = None;
            backtrace::resolve_frame(frame, |symbol| {
                if resolved.is_none() {
                    resolved = Some(FrameInfo {
                        file: symbol.filename().map(Path::to_path_buf),
                        line: symbol.lineno(),
                    });
                }
            });
            frames.push(resolved.unwrap_or_default());
            frames.len() < MAX_STACK_DEPTH
        });
        frames
    }
}

/// Filesystem roots the classifier checks, in rule order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRoots {
    pub plugins: PathBuf,
    pub theme: PathBuf,
    pub core: PathBuf,
}

impl Default for ComponentRoots {
    fn default() -> Self {
        Self {
            plugins: PathBuf::from("plugins"),
            theme: PathBuf::from("theme"),
            core: PathBuf::from("core"),
        }
    }
}

/// Manifest file a plugin folder may carry to provide a display name
const MANIFEST_FILE: &str = "component.toml";

#[derive(Debug, Deserialize)]
struct ComponentManifest {
    name: Option<String>,
}

/// Classifies file paths into owning components, with a process-lifetime cache
///
/// The cache is append-only (path -> component, values immutable once
/// computed) and guarded by a single lock, so one resolver can be shared
/// across concurrent requests behind an `Arc`.
#[derive(Debug)]
pub struct ComponentResolver {
    roots: ComponentRoots,
    cache: RwLock<HashMap<PathBuf, String>>,
}

impl ComponentResolver {
    pub fn new(roots: ComponentRoots) -> Self {
        Self {
            roots,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn roots(&self) -> &ComponentRoots {
        &self.roots
    }

    /// Resolve a callback handle into attributed provenance
    ///
    /// Introspection failures degrade to `kind = Unknown` / component
    /// "unknown"; they never abort instrumentation.
    pub fn resolve_callback(&self, handle: &CallbackHandle) -> CallbackInfo {
        match &handle.location {
            Some(location) => CallbackInfo {
                kind: handle.kind,
                source_file: Some(location.file.clone()),
                source_line: Some(location.line),
                owning_component: self.resolve_component(&location.file),
            },
            None => CallbackInfo::unknown(),
        }
    }

    /// Owning component for a source file path, cached per path
    pub fn resolve_component(&self, file: &Path) -> String {
        if let Some(hit) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(file).cloned())
        {
            return hit;
        }

        let component = self.classify(file);
        if let Ok(mut cache) = self.cache.write() {
            cache
                .entry(file.to_path_buf())
                .or_insert_with(|| component.clone());
        }
        component
    }

    /// Fixed rule order: plugins root, theme root, core root, unknown
    fn classify(&self, file: &Path) -> String {
        if let Ok(rel) = file.strip_prefix(&self.roots.plugins) {
            if let Some(folder) = top_level_name(rel) {
                return self.plugin_display_name(&folder);
            }
        }
        if file.starts_with(&self.roots.theme) {
            return THEME_COMPONENT.to_string();
        }
        if file.starts_with(&self.roots.core) {
            return CORE_COMPONENT.to_string();
        }
        UNKNOWN_COMPONENT.to_string()
    }

    /// Human-readable plugin name from its manifest, else the folder name
    fn plugin_display_name(&self, folder: &str) -> String {
        let manifest_path = self.roots.plugins.join(folder).join(MANIFEST_FILE);
        match std::fs::read_to_string(&manifest_path) {
            Ok(raw) => match toml::from_str::<ComponentManifest>(&raw) {
                Ok(manifest) => manifest.name.unwrap_or_else(|| folder.to_string()),
                Err(err) => {
                    tracing::debug!(
                        manifest = %manifest_path.display(),
                        error = %err,
                        "unparseable component manifest, falling back to folder name"
                    );
                    folder.to_string()
                }
            },
            Err(_) => folder.to_string(),
        }
    }

    /// Caller attribution for a query: first frame under the plugins root
    /// wins, attributed by top-level folder name; no match means "core".
    pub fn query_caller(&self, frames: &[FrameInfo]) -> String {
        for frame in frames.iter().take(MAX_STACK_DEPTH) {
            let Some(file) = &frame.file else { continue };
            if let Ok(rel) = file.strip_prefix(&self.roots.plugins) {
                if let Some(folder) = top_level_name(rel) {
                    return folder;
                }
            }
        }
        CORE_COMPONENT.to_string()
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

/// First path component of a root-relative path, as the owning folder name
fn top_level_name(rel: &Path) -> Option<String> {
    rel.components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
}
