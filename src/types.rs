//! Shared primitive identifier aliases.

/// Monotonic per-session action identifier, assigned at record time.
pub type ActionId = u64;
/// Monotonic journal entry sequence number.
pub type EntrySeq = u64;
/// Identity key for an optimistic operation.
///
/// Callers supply a semantic key (e.g. `"lock-msg-1"`) so repeated
/// gestures on the same target de-duplicate; omitted ids are generated.
pub type OperationId = String;
