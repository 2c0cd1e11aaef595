use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fmt, future::Future, pin::Pin};

use hashbrown::HashMap;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::{
    action::{EffectError, EffectFuture},
    types::OperationId,
};

type LocalEffect = Box<dyn FnOnce() -> EffectFuture + Send>;
type ServerEffect<T> =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<T, EffectError>> + Send>> + Send>;

/// Phase outcome of an in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still running.
    Pending,
    /// Server action (if any) completed.
    Success,
    /// A phase failed.
    Error,
}

/// Bookkeeping record for one in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Current status.
    pub status: OperationStatus,
    /// Execution start timestamp in milliseconds.
    pub started_at_ms: u64,
}

/// One optimistic operation: an optional local effect applied immediately,
/// an optional authoritative server call, and an optional compensating
/// rollback run when either fails.
pub struct Operation<T = ()> {
    id: Option<OperationId>,
    optimistic: Option<LocalEffect>,
    server: Option<ServerEffect<T>>,
    rollback: Option<LocalEffect>,
    show_error: bool,
    show_pending_indicator: bool,
}

impl<T> Operation<T> {
    /// Creates an empty operation. Errors are surfaced by default; the
    /// pending indicator is opt-in.
    pub fn new() -> Self {
        Self {
            id: None,
            optimistic: None,
            server: None,
            rollback: None,
            show_error: true,
            show_pending_indicator: false,
        }
    }

    /// Sets the identity key used for same-id de-duplication.
    pub fn id(mut self, id: impl Into<OperationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the local effect applied before server confirmation.
    pub fn optimistic<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        self.optimistic = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Sets the authoritative remote call.
    pub fn server<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, EffectError>> + Send + 'static,
    {
        self.server = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Sets the compensating effect reversing the optimistic one.
    pub fn rollback<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        self.rollback = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Controls whether a failure emits [`ExecutorEvent::OperationFailed`].
    pub fn show_error(mut self, show: bool) -> Self {
        self.show_error = show;
        self
    }

    /// Controls whether a busy indicator is surfaced while pending.
    pub fn show_pending_indicator(mut self, show: bool) -> Self {
        self.show_pending_indicator = show;
        self
    }
}

impl<T> Default for Operation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("optimistic", &self.optimistic.is_some())
            .field("server", &self.server.is_some())
            .field("rollback", &self.rollback.is_some())
            .field("show_error", &self.show_error)
            .field("show_pending_indicator", &self.show_pending_indicator)
            .finish()
    }
}

/// Indicator and failure notifications for the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// A busy indicator should be shown for this operation.
    IndicatorShown {
        /// Operation id.
        id: OperationId,
    },
    /// The busy indicator for this operation should be removed.
    IndicatorHidden {
        /// Operation id.
        id: OperationId,
    },
    /// An operation failed and the caller asked for a visible error.
    OperationFailed {
        /// Operation id.
        id: OperationId,
        /// Rendered error message.
        message: String,
    },
}

struct Inner {
    pending: Mutex<HashMap<OperationId, PendingOperation>>,
    id_counter: AtomicU64,
    events_tx: broadcast::Sender<ExecutorEvent>,
}

/// Runs optimistic operations with at most one in-flight execution per
/// identity. Cheap to clone; all clones share the pending set.
#[derive(Clone)]
pub struct OptimisticExecutor {
    inner: Arc<Inner>,
}

impl Default for OptimisticExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticExecutor {
    pub fn new() -> Self {
        Self::with_events_capacity(64)
    }

    pub fn with_events_capacity(capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                id_counter: AtomicU64::new(0),
                events_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Runs one operation to completion.
    ///
    /// Returns `Ok(None)` when an operation with the same id is already
    /// pending (no side effects run) or when there is no server action;
    /// returns the server result otherwise. The primary error from either
    /// phase is returned to the caller after best-effort rollback; the
    /// operation is removed from the pending set on every path.
    pub async fn execute<T: Send>(&self, op: Operation<T>) -> Result<Option<T>, EffectError> {
        let Operation {
            id,
            optimistic,
            server,
            rollback,
            show_error,
            show_pending_indicator,
        } = op;
        let id = id.unwrap_or_else(|| self.generate_id());

        {
            let mut pending = self.pending_guard();
            if pending.contains_key(&id) {
                warn!(id = %id, "operation already pending, rejecting duplicate");
                return Ok(None);
            }
            pending.insert(
                id.clone(),
                PendingOperation {
                    status: OperationStatus::Pending,
                    started_at_ms: now_ms(),
                },
            );
        }

        let mut indicator_shown = false;
        let outcome = {
            let indicator_shown = &mut indicator_shown;
            async {
                if let Some(optimistic) = optimistic {
                    optimistic().await?;
                }
                if show_pending_indicator {
                    *indicator_shown = true;
                    let _ = self
                        .inner
                        .events_tx
                        .send(ExecutorEvent::IndicatorShown { id: id.clone() });
                }
                match server {
                    Some(server) => server().await.map(Some),
                    None => Ok(None),
                }
            }
            .await
        };

        let result = match outcome {
            Ok(value) => {
                self.set_status(&id, OperationStatus::Success);
                Ok(value)
            }
            Err(source) => {
                self.set_status(&id, OperationStatus::Error);
                error!(id = %id, error = %source, "optimistic operation failed");
                if let Some(rollback) = rollback {
                    if let Err(rollback_err) = rollback().await {
                        // Rollback is best-effort; the primary error wins.
                        warn!(id = %id, error = %rollback_err, "rollback failed");
                    }
                }
                if show_error {
                    let _ = self.inner.events_tx.send(ExecutorEvent::OperationFailed {
                        id: id.clone(),
                        message: source.to_string(),
                    });
                }
                Err(source)
            }
        };

        if indicator_shown {
            let _ = self
                .inner
                .events_tx
                .send(ExecutorEvent::IndicatorHidden { id: id.clone() });
        }
        self.pending_guard().remove(&id);

        result
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending_guard().contains_key(id)
    }

    /// Snapshot of one pending operation's bookkeeping, for diagnostics.
    pub fn pending(&self, id: &str) -> Option<PendingOperation> {
        self.pending_guard().get(id).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_guard().len()
    }

    /// Discards all pending bookkeeping and hides any visible indicators.
    /// In-flight futures are not aborted; their cleanup becomes a no-op.
    pub fn cancel_all(&self) {
        let mut pending = self.pending_guard();
        warn!(count = pending.len(), "cancelling all pending operations");
        for id in pending.keys() {
            let _ = self
                .inner
                .events_tx
                .send(ExecutorEvent::IndicatorHidden { id: id.clone() });
        }
        pending.clear();
    }

    fn set_status(&self, id: &str, status: OperationStatus) {
        if let Some(op) = self.pending_guard().get_mut(id) {
            op.status = status;
        }
    }

    fn pending_guard(&self) -> MutexGuard<'_, HashMap<OperationId, PendingOperation>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_id(&self) -> OperationId {
        let n = self.inner.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("op-{}-{n}", now_ms())
    }
}

impl fmt::Debug for OptimisticExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticExecutor")
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
