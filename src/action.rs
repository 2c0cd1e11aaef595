//! Action data model: effect closures, drafts, and history projections.

use std::{fmt, future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::types::ActionId;

/// Error produced by a caller-supplied effect closure.
pub type EffectError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed future returned by an [`Effect`].
pub type EffectFuture = Pin<Box<dyn Future<Output = Result<(), EffectError>> + Send>>;

/// A replayable asynchronous effect.
///
/// Effects are `Fn`, not `FnOnce`: a recorded action must be able to run
/// `execute` and `undo` any number of times across undo/redo cycles.
/// Closures must capture owned before/after values rather than reading
/// shared state at call time, otherwise replay desyncs after unrelated
/// mutations.
pub type Effect = Box<dyn Fn() -> EffectFuture + Send>;

/// Boxes an async closure as an [`Effect`].
pub fn effect<F, Fut>(f: F) -> Effect
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Record payload handed to [`crate::core::history::ActionHistory::record`].
///
/// Both closures are required; validation happens at record time so a
/// malformed draft fails before any effect runs.
pub struct ActionDraft {
    /// Human-readable label surfaced in events and history listings.
    pub description: String,
    /// Effect producing the "after" state. Required.
    pub execute: Option<Effect>,
    /// Effect restoring the "before" state. Required.
    pub undo: Option<Effect>,
}

impl ActionDraft {
    /// Creates an empty draft with `description`.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            execute: None,
            undo: None,
        }
    }

    /// Sets the execute effect.
    pub fn on_execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        self.execute = Some(effect(f));
        self
    }

    /// Sets the undo effect.
    pub fn on_undo<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        self.undo = Some(effect(f));
        self
    }
}

impl fmt::Debug for ActionDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDraft")
            .field("description", &self.description)
            .field("execute", &self.execute.is_some())
            .field("undo", &self.undo.is_some())
            .finish()
    }
}

pub(crate) struct Action {
    pub(crate) id: ActionId,
    pub(crate) description: String,
    pub(crate) ts_ms: u64,
    pub(crate) execute: Effect,
    pub(crate) undo: Effect,
}

impl Action {
    pub(crate) fn summary(&self) -> ActionSummary {
        ActionSummary {
            id: self.id,
            description: self.description.clone(),
            ts_ms: self.ts_ms,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("ts_ms", &self.ts_ms)
            .finish()
    }
}

/// Read-only projection of a recorded action, for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    /// Action identifier.
    pub id: ActionId,
    /// Human-readable label.
    pub description: String,
    /// Record timestamp in milliseconds since epoch.
    pub ts_ms: u64,
}
