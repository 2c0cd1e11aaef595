use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    action::{Action, ActionDraft, ActionSummary, EffectError},
    entry::{Entry, StoredEntry},
    types::{ActionId, EntrySeq},
};

pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Debug)]
pub enum HistoryError {
    MissingExecute,
    MissingUndo,
    ExecuteFailed {
        description: String,
        source: EffectError,
    },
    NothingToUndo,
    NothingToRedo,
    UndoFailed {
        summary: ActionSummary,
        source: EffectError,
    },
    RedoFailed {
        summary: ActionSummary,
        source: EffectError,
    },
}

#[derive(Debug)]
pub struct ActionHistory {
    undo: VecDeque<Action>,
    redo: Vec<Action>,
    max_history: usize,
    pending_entries: Vec<StoredEntry>,
    next_action_id: ActionId,
    next_entry_seq: EntrySeq,
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_history: max_history.max(1),
            pending_entries: Vec::new(),
            next_action_id: 1,
            next_entry_seq: 1,
        }
    }

    /// Recording is executing: the draft's execute effect runs here, and
    /// the action is pushed only when it succeeds.
    pub async fn record(&mut self, draft: ActionDraft) -> Result<ActionSummary, HistoryError> {
        let ActionDraft {
            description,
            execute,
            undo,
        } = draft;
        let execute = execute.ok_or(HistoryError::MissingExecute)?;
        let undo = undo.ok_or(HistoryError::MissingUndo)?;

        if let Err(source) = execute().await {
            self.push_entry(Entry::RecordFailed {
                description: description.clone(),
            });
            return Err(HistoryError::ExecuteFailed {
                description,
                source,
            });
        }

        let id = self.take_next_action_id();
        let action = Action {
            id,
            description,
            ts_ms: now_ms(),
            execute,
            undo,
        };

        let summary = action.summary();
        self.push_entry(Entry::Recorded {
            action_id: id,
            description: action.description.clone(),
        });
        self.undo.push_back(action);
        self.redo.clear();
        while self.undo.len() > self.max_history {
            self.undo.pop_front();
        }
        Ok(summary)
    }

    pub async fn undo(&mut self) -> Result<ActionSummary, HistoryError> {
        let action = self.undo.pop_back().ok_or(HistoryError::NothingToUndo)?;
        let summary = action.summary();

        match (action.undo)().await {
            Ok(()) => {
                self.push_entry(Entry::Undone {
                    action_id: summary.id,
                    description: summary.description.clone(),
                });
                self.redo.push(action);
                Ok(summary)
            }
            Err(source) => {
                // Failed undo keeps the action reachable.
                self.push_entry(Entry::UndoFailed {
                    action_id: summary.id,
                    description: summary.description.clone(),
                });
                self.undo.push_back(action);
                Err(HistoryError::UndoFailed { summary, source })
            }
        }
    }

    pub async fn redo(&mut self) -> Result<ActionSummary, HistoryError> {
        let action = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        let summary = action.summary();

        match (action.execute)().await {
            Ok(()) => {
                self.push_entry(Entry::Redone {
                    action_id: summary.id,
                    description: summary.description.clone(),
                });
                self.undo.push_back(action);
                Ok(summary)
            }
            Err(source) => {
                self.push_entry(Entry::RedoFailed {
                    action_id: summary.id,
                    description: summary.description.clone(),
                });
                self.redo.push(action);
                Err(HistoryError::RedoFailed { summary, source })
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.push_entry(Entry::Cleared);
    }

    pub fn history(&self) -> Vec<ActionSummary> {
        self.undo.iter().map(Action::summary).collect()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn drain_pending_entries(&mut self) -> Vec<StoredEntry> {
        std::mem::take(&mut self.pending_entries)
    }

    pub fn latest_entry_seq(&self) -> EntrySeq {
        self.next_entry_seq.saturating_sub(1)
    }

    fn push_entry(&mut self, entry: Entry) {
        let seq = self.take_next_entry_seq();
        self.pending_entries.push(StoredEntry {
            seq,
            ts_ms: now_ms(),
            entry,
        });
    }

    fn take_next_action_id(&mut self) -> ActionId {
        let id = self.next_action_id;
        self.next_action_id += 1;
        id
    }

    fn take_next_entry_seq(&mut self) -> EntrySeq {
        let seq = self.next_entry_seq;
        self.next_entry_seq += 1;
        seq
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
