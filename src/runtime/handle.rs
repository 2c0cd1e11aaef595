use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

use crate::{
    action::{ActionDraft, ActionSummary},
    core::history::{ActionHistory, HistoryError},
    entry::StoredEntry,
    keymap::EditCommand,
    persist::{EntrySink, PersistError},
    types::{ActionId, EntrySeq},
};

use super::events::HistoryEvent;

#[derive(Debug)]
pub enum RuntimeError {
    History(HistoryError),
    Persist(PersistError),
    ChannelClosed,
}

impl From<HistoryError> for RuntimeError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

impl From<PersistError> for RuntimeError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub journal_batch_max: usize,
    pub journal_max_latency_ms: u64,
    pub journal_queue_bound: usize,
    pub events_capacity: usize,
    pub command_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            journal_batch_max: 32,
            journal_max_latency_ms: 75,
            journal_queue_bound: 64,
            events_capacity: 1024,
            command_queue_bound: 256,
        }
    }
}

pub struct HistoryHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<HistoryEvent>,
}

impl Clone for HistoryHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Record {
        draft: ActionDraft,
        resp: oneshot::Sender<Result<ActionId, RuntimeError>>,
    },
    Undo {
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Redo {
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Clear {
        resp: oneshot::Sender<()>,
    },
    History {
        resp: oneshot::Sender<Vec<ActionSummary>>,
    },
    CanUndo {
        resp: oneshot::Sender<bool>,
    },
    CanRedo {
        resp: oneshot::Sender<bool>,
    },
    Flush {
        resp: oneshot::Sender<Result<EntrySeq, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum JournalMsg {
    Entries(Vec<StoredEntry>),
    Flush {
        resp: oneshot::Sender<Result<EntrySeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the single-writer history loop. All mutation funnels through
/// one command queue, so concurrent undo/redo calls are serialized rather
/// than racing.
pub fn spawn_history(
    history: ActionHistory,
    sink: Option<Box<dyn EntrySink>>,
    config: RuntimeConfig,
) -> HistoryHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<HistoryEvent>(config.events_capacity.max(1));

    let journal_tx_opt = sink.map(|sink| {
        let (journal_tx, journal_rx) = mpsc::channel::<JournalMsg>(config.journal_queue_bound.max(1));
        spawn_journal_worker(sink, journal_rx, config.clone());
        journal_tx
    });

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut history = history;
        while let Some(cmd) = cmd_rx.recv().await {
            let done =
                handle_command(cmd, &mut history, &events_tx_loop, journal_tx_opt.as_ref()).await;
            if done {
                break;
            }
        }
    });

    HistoryHandle { cmd_tx, events_tx }
}

impl HistoryHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events_tx.subscribe()
    }

    /// Validates, executes, and records one action. Validation and
    /// execute failures propagate; nothing is pushed in that case.
    pub async fn record(&self, draft: ActionDraft) -> Result<ActionId, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Record { draft, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Rolls back the most recent action. `Ok(false)` means there was
    /// nothing to undo or the undo effect failed; details arrive on the
    /// event stream.
    pub async fn undo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Undo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Reapplies the most recently undone action.
    pub async fn redo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Redo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Routes a resolved keyboard command to `undo` or `redo`.
    pub async fn dispatch(&self, cmd: EditCommand) -> Result<bool, RuntimeError> {
        match cmd {
            EditCommand::Undo => self.undo().await,
            EditCommand::Redo => self.redo().await,
        }
    }

    pub async fn clear(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Clear { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn history(&self) -> Result<Vec<ActionSummary>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::History { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn can_undo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CanUndo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn can_redo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CanRedo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces the journal to durable storage, returning the last durable
    /// entry sequence.
    pub async fn flush(&self) -> Result<EntrySeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    history: &mut ActionHistory,
    events_tx: &broadcast::Sender<HistoryEvent>,
    journal_tx: Option<&mpsc::Sender<JournalMsg>>,
) -> bool {
    match cmd {
        Command::Record { draft, resp } => {
            let res = match history.record(draft).await {
                Ok(summary) => {
                    let _ = events_tx.send(HistoryEvent::Recorded {
                        id: summary.id,
                        description: summary.description,
                    });
                    Ok(summary.id)
                }
                Err(err) => {
                    if let HistoryError::ExecuteFailed { description, .. } = &err {
                        error!(action = %description, "record failed, action not pushed");
                        let _ = events_tx.send(HistoryEvent::RecordFailed {
                            description: description.clone(),
                        });
                    }
                    Err(RuntimeError::History(err))
                }
            };
            publish_availability(history, events_tx);
            enqueue_journal(history, journal_tx).await;
            let _ = resp.send(res);
        }
        Command::Undo { resp } => {
            let res = match history.undo().await {
                Ok(summary) => {
                    let _ = events_tx.send(HistoryEvent::Undone {
                        id: summary.id,
                        description: summary.description,
                    });
                    Ok(true)
                }
                Err(HistoryError::NothingToUndo) => {
                    let _ = events_tx.send(HistoryEvent::NothingToUndo);
                    Ok(false)
                }
                Err(HistoryError::UndoFailed { summary, source }) => {
                    error!(action = %summary.description, error = %source, "undo failed");
                    let _ = events_tx.send(HistoryEvent::UndoFailed {
                        id: summary.id,
                        description: summary.description,
                    });
                    Ok(false)
                }
                Err(other) => Err(RuntimeError::History(other)),
            };
            publish_availability(history, events_tx);
            enqueue_journal(history, journal_tx).await;
            let _ = resp.send(res);
        }
        Command::Redo { resp } => {
            let res = match history.redo().await {
                Ok(summary) => {
                    let _ = events_tx.send(HistoryEvent::Redone {
                        id: summary.id,
                        description: summary.description,
                    });
                    Ok(true)
                }
                Err(HistoryError::NothingToRedo) => {
                    let _ = events_tx.send(HistoryEvent::NothingToRedo);
                    Ok(false)
                }
                Err(HistoryError::RedoFailed { summary, source }) => {
                    error!(action = %summary.description, error = %source, "redo failed");
                    let _ = events_tx.send(HistoryEvent::RedoFailed {
                        id: summary.id,
                        description: summary.description,
                    });
                    Ok(false)
                }
                Err(other) => Err(RuntimeError::History(other)),
            };
            publish_availability(history, events_tx);
            enqueue_journal(history, journal_tx).await;
            let _ = resp.send(res);
        }
        Command::Clear { resp } => {
            history.clear();
            let _ = events_tx.send(HistoryEvent::Cleared);
            publish_availability(history, events_tx);
            enqueue_journal(history, journal_tx).await;
            let _ = resp.send(());
        }
        Command::History { resp } => {
            let _ = resp.send(history.history());
        }
        Command::CanUndo { resp } => {
            let _ = resp.send(history.can_undo());
        }
        Command::CanRedo { resp } => {
            let _ = resp.send(history.can_redo());
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = journal_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(JournalMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(history.latest_entry_seq())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = journal_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(JournalMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn publish_availability(history: &ActionHistory, events_tx: &broadcast::Sender<HistoryEvent>) {
    let _ = events_tx.send(HistoryEvent::Availability {
        can_undo: history.can_undo(),
        can_redo: history.can_redo(),
    });
}

async fn enqueue_journal(history: &mut ActionHistory, journal_tx: Option<&mpsc::Sender<JournalMsg>>) {
    let entries = history.drain_pending_entries();
    if entries.is_empty() {
        return;
    }
    let Some(tx) = journal_tx else {
        return;
    };
    if tx.send(JournalMsg::Entries(entries)).await.is_err() {
        warn!("journal worker unavailable, entries dropped");
    }
}

fn spawn_journal_worker(
    sink: Box<dyn EntrySink>,
    mut rx: mpsc::Receiver<JournalMsg>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredEntry>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.journal_max_latency_ms);
        let mut last_durable: EntrySeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        if let Err(err) = flush_buf(&sink, &mut buf, &mut last_durable, true).await {
                            warn!(error = ?err, "journal append failed on close");
                        }
                        break;
                    };

                    match msg {
                        JournalMsg::Entries(entries) => {
                            buf.extend(entries);
                            if buf.len() >= config.journal_batch_max {
                                if let Err(err) = flush_buf(&sink, &mut buf, &mut last_durable, true).await {
                                    warn!(error = ?err, "journal append failed");
                                }
                                deadline = Instant::now() + Duration::from_millis(config.journal_max_latency_ms);
                            }
                        }
                        JournalMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.journal_max_latency_ms);
                        }
                        JournalMsg::Shutdown { resp } => {
                            if let Err(err) = flush_buf(&sink, &mut buf, &mut last_durable, true).await {
                                warn!(error = ?err, "journal append failed on shutdown");
                            }
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    if let Err(err) = flush_buf(&sink, &mut buf, &mut last_durable, false).await {
                        warn!(error = ?err, "journal append failed");
                    }
                    deadline = Instant::now() + Duration::from_millis(config.journal_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn EntrySink>>>,
    buf: &mut Vec<StoredEntry>,
    last_durable: &mut EntrySeq,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let entries = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let seq = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_entries(&entries)?;
        if call_flush {
            sink.flush()?;
        }
        Result::<EntrySeq, PersistError>::Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))??;

    *last_durable = (*last_durable).max(seq);
    debug!(seq, "journal batch flushed");
    Ok(())
}
