use tempfile::TempDir;

use actionlog::{
    action::ActionDraft,
    core::history::ActionHistory,
    entry::Entry,
    persist::{EntrySink, sqlite::SqliteEntrySink},
    runtime::handle::{RuntimeConfig, spawn_history},
};

fn noop_draft(description: &str) -> ActionDraft {
    ActionDraft::new(description)
        .on_execute(|| async { Ok(()) })
        .on_undo(|| async { Ok(()) })
}

#[tokio::test]
async fn sqlite_journal_round_trips_entries_in_order() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("audit.db");

    let mut history = ActionHistory::new();
    history.record(noop_draft("Tag msg-3")).await.expect("record");
    history.record(noop_draft("Move msg-9")).await.expect("record");
    assert!(history.undo().await.is_ok());

    let entries = history.drain_pending_entries();
    let mut sink = SqliteEntrySink::open(&db_path).expect("open sqlite");
    let last = sink.append_entries(&entries).expect("append");
    assert_eq!(last, 3);

    drop(sink);

    let reopened = SqliteEntrySink::open(&db_path).expect("reopen");
    assert_eq!(reopened.latest_seq().expect("latest"), 3);

    let loaded = reopened.load_entries_after(0).expect("load");
    assert_eq!(loaded, entries);

    let tail = reopened.load_entries_after(2).expect("load tail");
    assert_eq!(tail.len(), 1);
    assert!(matches!(tail[0].entry, Entry::Undone { action_id: 2, .. }));
}

#[tokio::test]
async fn runtime_journals_transitions_durably() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("runtime.db");

    let sink = SqliteEntrySink::open(&db_path).expect("open sqlite");
    let handle = spawn_history(
        ActionHistory::new(),
        Some(Box::new(sink)),
        RuntimeConfig::default(),
    );

    handle.record(noop_draft("Pin msg-4")).await.expect("record");
    assert!(handle.undo().await.expect("undo"));
    // Undo on the now-empty stack journals nothing.
    assert!(!handle.undo().await.expect("second undo"));

    let durable = handle.flush().await.expect("flush");
    assert_eq!(durable, 2);

    handle.shutdown().await.expect("shutdown");

    let reopened = SqliteEntrySink::open(&db_path).expect("reopen");
    let loaded = reopened.load_entries_after(0).expect("load");
    let kinds: Vec<_> = loaded.iter().map(|e| e.entry.kind()).collect();
    assert_eq!(kinds, ["recorded", "undone"]);
    assert!(loaded.iter().all(|e| e.entry.action_id() == Some(1)));
}

#[tokio::test]
async fn failure_entries_reach_the_journal() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("failures.db");

    let sink = SqliteEntrySink::open(&db_path).expect("open sqlite");
    let handle = spawn_history(
        ActionHistory::new(),
        Some(Box::new(sink)),
        RuntimeConfig::default(),
    );

    handle
        .record(
            ActionDraft::new("sticky")
                .on_execute(|| async { Ok(()) })
                .on_undo(|| async { Err("undo refused".into()) }),
        )
        .await
        .expect("record");
    assert!(!handle.undo().await.expect("undo call"));

    handle.flush().await.expect("flush");
    handle.shutdown().await.expect("shutdown");

    let reopened = SqliteEntrySink::open(&db_path).expect("reopen");
    let kinds: Vec<_> = reopened
        .load_entries_after(0)
        .expect("load")
        .iter()
        .map(|e| e.entry.kind())
        .collect();
    assert_eq!(kinds, ["recorded", "undo_failed"]);
}
