//! Reversible action history with optimistic execution for interactive clients.
//!
//! Two independent, composable pieces: an action history that sequences
//! reversible user actions (bounded undo/redo with an audit journal), and
//! an optimistic executor that applies local effects before server
//! confirmation with best-effort rollback and single-flight identity
//! de-duplication.
//!
//! # Examples
//!
//! In-memory usage with [`core::history::ActionHistory`]:
//! ```
//! use std::sync::{
//!     Arc,
//!     atomic::{AtomicBool, Ordering},
//! };
//!
//! use actionlog::{action::ActionDraft, core::history::ActionHistory};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let locked = Arc::new(AtomicBool::new(false));
//! let mut history = ActionHistory::new();
//!
//! let on = Arc::clone(&locked);
//! let off = Arc::clone(&locked);
//! let summary = history
//!     .record(
//!         ActionDraft::new("Lock msg-1")
//!             .on_execute(move || {
//!                 let on = Arc::clone(&on);
//!                 async move {
//!                     on.store(true, Ordering::SeqCst);
//!                     Ok(())
//!                 }
//!             })
//!             .on_undo(move || {
//!                 let off = Arc::clone(&off);
//!                 async move {
//!                     off.store(false, Ordering::SeqCst);
//!                     Ok(())
//!                 }
//!             }),
//!     )
//!     .await
//!     .expect("record");
//! assert_eq!(summary.id, 1);
//! assert!(locked.load(Ordering::SeqCst));
//!
//! history.undo().await.expect("undo");
//! assert!(!locked.load(Ordering::SeqCst));
//! # }
//! ```
//!
//! Runtime usage with SQLite journal sink:
//! ```no_run
//! use actionlog::{
//!     action::ActionDraft,
//!     core::history::ActionHistory,
//!     persist::sqlite::SqliteEntrySink,
//!     runtime::handle::{RuntimeConfig, spawn_history},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteEntrySink::open("history.db").expect("open sqlite");
//! let handle = spawn_history(
//!     ActionHistory::new(),
//!     Some(Box::new(sink)),
//!     RuntimeConfig::default(),
//! );
//!
//! let _id = handle
//!     .record(
//!         ActionDraft::new("Tag msg-7")
//!             .on_execute(|| async { Ok(()) })
//!             .on_undo(|| async { Ok(()) }),
//!     )
//!     .await
//!     .expect("record");
//! assert!(handle.undo().await.expect("undo"));
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Action data model: effect closures, drafts, and summaries.
pub mod action;
/// In-memory history core and undo/redo mechanics.
pub mod core;
/// Journal entry model and persistence wrapper types.
pub mod entry;
/// Keyboard-chord resolution for undo/redo dispatch.
pub mod keymap;
/// Optimistic executor and pending-operation tracking.
pub mod optimistic;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
