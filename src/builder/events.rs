//! Build events and their subscribers.
//!
//! Events are delivered to every subscriber registered on an [`EventBus`] and
//! serialize to one JSON object per line for `--message-format=json`.
//!
//! # Event Types
//!
//! - `project-started`: A project was taken from the queue
//! - `project-finished`: A project finished compiling and linking
//! - `build-finished`: The workspace build completed (success or failure)
//! - `compiler-warning`: A compiler warning was emitted
//! - `compiler-error`: A compiler error was emitted
//! - `build-progress`: A file finished compiling
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

/// A build event emitted during a workspace build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// A project build began.
    #[serde(rename = "project-started")]
    ProjectStarted {
        workspace: String,
        project: String,
        /// Number of source files to compile
        files: usize,
    },

    /// A project build ended.
    #[serde(rename = "project-finished")]
    ProjectFinished {
        workspace: String,
        project: String,
        /// Linked artifact, if linking ran
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
        success: bool,
        /// Number of files compiled successfully
        compiled: usize,
        duration_ms: u64,
    },

    /// The workspace build ended.
    #[serde(rename = "build-finished")]
    WorkspaceFinished {
        workspace: String,
        /// Workspace directory
        location: PathBuf,
        /// Output of the last project built, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
        success: bool,
    },

    /// A compiler warning was emitted.
    #[serde(rename = "compiler-warning")]
    CompilerWarning {
        project: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },

    /// A compiler error was emitted.
    #[serde(rename = "compiler-error")]
    CompilerError {
        project: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },

    /// Build progress update.
    #[serde(rename = "build-progress")]
    Progress {
        project: String,
        current: u64,
        total: u64,
    },
}

impl BuildEvent {
    pub fn project_started(
        workspace: impl Into<String>,
        project: impl Into<String>,
        files: usize,
    ) -> Self {
        BuildEvent::ProjectStarted {
            workspace: workspace.into(),
            project: project.into(),
            files,
        }
    }

    /// Create a workspace finished event.
    pub fn workspace_finished(
        workspace: impl Into<String>,
        location: impl Into<PathBuf>,
        output: Option<PathBuf>,
        success: bool,
    ) -> Self {
        BuildEvent::WorkspaceFinished {
            workspace: workspace.into(),
            location: location.into(),
            output,
            success,
        }
    }

    pub fn progress(project: impl Into<String>, current: u64, total: u64) -> Self {
        BuildEvent::Progress {
            project: project.into(),
            current,
            total,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Fan-out of build events to registered callbacks.
///
/// Subscribers are invoked synchronously, in registration order, on the
/// thread that publishes.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&BuildEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subs) = self.subscribers.write() {
            subs.push((id, Arc::new(callback)));
        }
        id
    }

    /// Remove a subscriber. Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut subs) = self.subscribers.write() else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        subs.len() != before
    }

    pub fn publish(&self, event: &BuildEvent) {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking.
        let subs: Vec<Subscriber> = match self.subscribers.read() {
            Ok(subs) => subs.iter().map(|(_, s)| Arc::clone(s)).collect(),
            Err(_) => return,
        };
        for subscriber in subs {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
