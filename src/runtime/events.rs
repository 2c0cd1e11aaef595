//! Runtime event stream payloads.

use crate::types::ActionId;

/// Events emitted from the single-writer history loop.
///
/// `Availability` drives undo/redo affordance state; the remaining
/// variants carry the action description for transient notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// An action was executed and recorded.
    Recorded {
        /// Recorded action id.
        id: ActionId,
        /// Action label.
        description: String,
    },
    /// An action's execute effect failed at record time.
    RecordFailed {
        /// Label of the rejected action.
        description: String,
    },
    /// One undo step was applied.
    Undone {
        /// Undone action id.
        id: ActionId,
        /// Action label.
        description: String,
    },
    /// An undo effect failed; the action remains undoable.
    UndoFailed {
        /// Action id.
        id: ActionId,
        /// Action label.
        description: String,
    },
    /// Undo was requested on an empty stack.
    NothingToUndo,
    /// One redo step was applied.
    Redone {
        /// Redone action id.
        id: ActionId,
        /// Action label.
        description: String,
    },
    /// A redo effect failed; the action remains redoable.
    RedoFailed {
        /// Action id.
        id: ActionId,
        /// Action label.
        description: String,
    },
    /// Redo was requested on an empty stack.
    NothingToRedo,
    /// Both stacks were emptied.
    Cleared,
    /// Current affordance state, emitted after every transition.
    Availability {
        /// True when at least one action can be undone.
        can_undo: bool,
        /// True when at least one undone action can be reapplied.
        can_redo: bool,
    },
}
