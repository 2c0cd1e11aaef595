//! Headless keyboard-chord resolution for undo/redo dispatch.

/// Edit command resolved from a key chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    /// Roll back the most recent action.
    Undo,
    /// Reapply the most recently undone action.
    Redo,
}

/// A pressed key with modifier state, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyChord {
    /// Control key held.
    pub ctrl: bool,
    /// Command/meta key held.
    pub meta: bool,
    /// Shift key held.
    pub shift: bool,
    /// Alt/option key held.
    pub alt: bool,
    /// The pressed key.
    pub key: char,
}

/// Resolves the conventional edit chords: a primary modifier (ctrl or
/// meta) plus `z` undoes; primary plus `y`, or primary plus shift plus
/// `z`, redoes. Everything else is no command.
pub fn resolve(chord: &KeyChord) -> Option<EditCommand> {
    if !(chord.ctrl || chord.meta) {
        return None;
    }
    match (chord.key.to_ascii_lowercase(), chord.shift) {
        ('z', false) => Some(EditCommand::Undo),
        ('z', true) => Some(EditCommand::Redo),
        ('y', _) => Some(EditCommand::Redo),
        _ => None,
    }
}
