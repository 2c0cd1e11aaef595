//! Audit journal entry model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::types::{ActionId, EntrySeq};

/// Version number for serialized [`StoredEntryEnvelope`] payloads.
pub const ENTRY_FORMAT_VERSION: u16 = 1;

/// Immutable history transition appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// An action was executed and pushed onto the undo stack.
    Recorded {
        /// Recorded action id.
        action_id: ActionId,
        /// Action label.
        description: String,
    },
    /// An action's execute effect failed at record time; nothing was pushed.
    RecordFailed {
        /// Label of the rejected action.
        description: String,
    },
    /// An action was undone and moved to the redo stack.
    Undone {
        /// Undone action id.
        action_id: ActionId,
        /// Action label.
        description: String,
    },
    /// An undo effect failed; the action was pushed back onto the undo stack.
    UndoFailed {
        /// Action id.
        action_id: ActionId,
        /// Action label.
        description: String,
    },
    /// An action was reapplied and moved back to the undo stack.
    Redone {
        /// Redone action id.
        action_id: ActionId,
        /// Action label.
        description: String,
    },
    /// A redo effect failed; the action was pushed back onto the redo stack.
    RedoFailed {
        /// Action id.
        action_id: ActionId,
        /// Action label.
        description: String,
    },
    /// Both stacks were emptied.
    Cleared,
}

impl Entry {
    /// Stable kind tag used for journal indexing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Recorded { .. } => "recorded",
            Self::RecordFailed { .. } => "record_failed",
            Self::Undone { .. } => "undone",
            Self::UndoFailed { .. } => "undo_failed",
            Self::Redone { .. } => "redone",
            Self::RedoFailed { .. } => "redo_failed",
            Self::Cleared => "cleared",
        }
    }

    /// Action id referenced by this entry, when there is one.
    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            Self::Recorded { action_id, .. }
            | Self::Undone { action_id, .. }
            | Self::UndoFailed { action_id, .. }
            | Self::Redone { action_id, .. }
            | Self::RedoFailed { action_id, .. } => Some(*action_id),
            Self::RecordFailed { .. } | Self::Cleared => None,
        }
    }
}

/// Journal row metadata plus entry payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Monotonic entry sequence.
    pub seq: EntrySeq,
    /// Entry timestamp in milliseconds.
    pub ts_ms: u64,
    /// Entry body.
    pub entry: Entry,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntryEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped entry.
    pub stored: StoredEntry,
}

impl StoredEntryEnvelope {
    /// Constructs an envelope using [`ENTRY_FORMAT_VERSION`].
    pub fn new(stored: StoredEntry) -> Self {
        Self {
            format_version: ENTRY_FORMAT_VERSION,
            stored,
        }
    }
}
