use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actionlog::{
    action::ActionDraft,
    core::history::ActionHistory,
    keymap::{self, EditCommand, KeyChord},
    runtime::{
        events::HistoryEvent,
        handle::{HistoryHandle, RuntimeConfig, spawn_history},
    },
};

fn noop_draft(description: &str) -> ActionDraft {
    ActionDraft::new(description)
        .on_execute(|| async { Ok(()) })
        .on_undo(|| async { Ok(()) })
}

fn lock_draft(description: &str, flag: &Arc<AtomicBool>) -> ActionDraft {
    let flag_on = Arc::clone(flag);
    let flag_off = Arc::clone(flag);
    ActionDraft::new(description)
        .on_execute(move || {
            let flag = Arc::clone(&flag_on);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_undo(move || {
            let flag = Arc::clone(&flag_off);
            async move {
                flag.store(false, Ordering::SeqCst);
                Ok(())
            }
        })
}

async fn next_notification(
    sub: &mut tokio::sync::broadcast::Receiver<HistoryEvent>,
) -> HistoryEvent {
    loop {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event timeout")
            .expect("recv");
        if !matches!(evt, HistoryEvent::Availability { .. }) {
            return evt;
        }
    }
}

fn spawn_default() -> HistoryHandle {
    spawn_history(ActionHistory::new(), None, RuntimeConfig::default())
}

#[tokio::test]
async fn record_undo_redo_emit_ordered_events() {
    let handle = spawn_default();
    let mut sub = handle.subscribe();
    let locked = Arc::new(AtomicBool::new(false));

    let id = handle
        .record(lock_draft("Lock msg-1", &locked))
        .await
        .expect("record");
    assert_eq!(id, 1);
    assert!(locked.load(Ordering::SeqCst));

    assert!(handle.undo().await.expect("undo"));
    assert!(!locked.load(Ordering::SeqCst));

    assert!(handle.redo().await.expect("redo"));
    assert!(locked.load(Ordering::SeqCst));

    assert_eq!(
        next_notification(&mut sub).await,
        HistoryEvent::Recorded {
            id,
            description: "Lock msg-1".into()
        }
    );
    assert_eq!(
        next_notification(&mut sub).await,
        HistoryEvent::Undone {
            id,
            description: "Lock msg-1".into()
        }
    );
    assert_eq!(
        next_notification(&mut sub).await,
        HistoryEvent::Redone {
            id,
            description: "Lock msg-1".into()
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn undo_on_empty_history_reports_nothing_to_undo() {
    let handle = spawn_default();
    let mut sub = handle.subscribe();

    assert!(!handle.undo().await.expect("undo"));
    assert_eq!(next_notification(&mut sub).await, HistoryEvent::NothingToUndo);

    assert!(!handle.redo().await.expect("redo"));
    assert_eq!(next_notification(&mut sub).await, HistoryEvent::NothingToRedo);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_undo_surfaces_event_and_returns_false() {
    let handle = spawn_default();
    let mut sub = handle.subscribe();

    let id = handle
        .record(
            ActionDraft::new("sticky")
                .on_execute(|| async { Ok(()) })
                .on_undo(|| async { Err("undo refused".into()) }),
        )
        .await
        .expect("record");

    assert!(!handle.undo().await.expect("undo call"));
    assert_eq!(
        next_notification(&mut sub).await,
        HistoryEvent::Recorded {
            id,
            description: "sticky".into()
        }
    );
    assert_eq!(
        next_notification(&mut sub).await,
        HistoryEvent::UndoFailed {
            id,
            description: "sticky".into()
        }
    );

    // The action stays reachable after the failed undo.
    let listed = handle.history().await.expect("history");
    assert_eq!(listed.len(), 1);
    assert!(handle.can_undo().await.expect("can_undo"));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn availability_tracks_stack_state() {
    let handle = spawn_default();
    let mut sub = handle.subscribe();

    handle.record(noop_draft("A")).await.expect("record");
    assert_eq!(
        sub.recv().await.expect("recorded"),
        HistoryEvent::Recorded {
            id: 1,
            description: "A".into()
        }
    );
    assert_eq!(
        sub.recv().await.expect("availability"),
        HistoryEvent::Availability {
            can_undo: true,
            can_redo: false
        }
    );

    assert!(handle.undo().await.expect("undo"));
    assert_eq!(
        sub.recv().await.expect("undone"),
        HistoryEvent::Undone {
            id: 1,
            description: "A".into()
        }
    );
    assert_eq!(
        sub.recv().await.expect("availability"),
        HistoryEvent::Availability {
            can_undo: false,
            can_redo: true
        }
    );

    handle.clear().await.expect("clear");
    assert_eq!(sub.recv().await.expect("cleared"), HistoryEvent::Cleared);
    assert_eq!(
        sub.recv().await.expect("availability"),
        HistoryEvent::Availability {
            can_undo: false,
            can_redo: false
        }
    );
    assert!(!handle.can_redo().await.expect("can_redo"));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn concurrent_undo_calls_are_serialized() {
    let handle = spawn_default();

    handle
        .record(
            ActionDraft::new("slow undo")
                .on_execute(|| async { Ok(()) })
                .on_undo(|| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                }),
        )
        .await
        .expect("record");

    let h1 = handle.clone();
    let h2 = handle.clone();
    let (r1, r2) = tokio::join!(h1.undo(), h2.undo());
    let applied = [r1.expect("undo 1"), r2.expect("undo 2")];

    // One call wins; the other observes the already-empty stack.
    assert_eq!(applied.iter().filter(|b| **b).count(), 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn keyboard_chords_dispatch_to_history() {
    let handle = spawn_default();
    handle.record(noop_draft("typed text")).await.expect("record");

    let undo_chord = KeyChord {
        ctrl: true,
        key: 'z',
        ..KeyChord::default()
    };
    let cmd = keymap::resolve(&undo_chord).expect("chord resolves");
    assert_eq!(cmd, EditCommand::Undo);
    assert!(handle.dispatch(cmd).await.expect("dispatch undo"));

    let redo_chord = KeyChord {
        meta: true,
        shift: true,
        key: 'z',
        ..KeyChord::default()
    };
    let cmd = keymap::resolve(&redo_chord).expect("chord resolves");
    assert_eq!(cmd, EditCommand::Redo);
    assert!(handle.dispatch(cmd).await.expect("dispatch redo"));

    handle.shutdown().await.expect("shutdown");
}

#[test]
fn chord_resolution_table() {
    let chord = |ctrl: bool, meta: bool, shift: bool, key: char| KeyChord {
        ctrl,
        meta,
        shift,
        alt: false,
        key,
    };

    assert_eq!(
        keymap::resolve(&chord(true, false, false, 'z')),
        Some(EditCommand::Undo)
    );
    assert_eq!(
        keymap::resolve(&chord(false, true, false, 'z')),
        Some(EditCommand::Undo)
    );
    assert_eq!(
        keymap::resolve(&chord(true, false, false, 'y')),
        Some(EditCommand::Redo)
    );
    assert_eq!(
        keymap::resolve(&chord(false, true, true, 'z')),
        Some(EditCommand::Redo)
    );
    assert_eq!(
        keymap::resolve(&chord(true, false, false, 'Z')),
        Some(EditCommand::Undo)
    );
    assert_eq!(keymap::resolve(&chord(false, false, false, 'z')), None);
    assert_eq!(keymap::resolve(&chord(true, false, false, 'x')), None);
}
