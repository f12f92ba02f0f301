//! End-to-end exercise of the synchronization engine against a real tree.

use std::fs;
use std::time::{Duration, Instant};

use quickfind::index::{IndexDatabase, SearchOptions};
use quickfind::monitor::{IndexMonitor, MonitorOptions, MonitorState};
use tempfile::tempdir;

fn fast_options() -> MonitorOptions {
    MonitorOptions {
        poll_interval: Duration::from_millis(50),
        debounce_window: Duration::from_millis(50),
        ..MonitorOptions::default()
    }
}

fn wait_for(check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn full_cycle_keeps_index_and_search_in_sync() {
    let data = tempdir().unwrap();
    let home = tempdir().unwrap();
    let nested = data.path().join("projects");
    fs::create_dir_all(&nested).unwrap();
    fs::write(data.path().join("notes.txt"), b"notes").unwrap();
    fs::write(nested.join("report_final.pdf"), b"pdf contents").unwrap();
    fs::write(data.path().join(".dotfile"), b"ignored").unwrap();

    let db_path = home.path().join("index.db");
    let mut monitor = IndexMonitor::new(&db_path, vec![data.path().to_path_buf()], fast_options());
    monitor.start().unwrap();
    assert_eq!(monitor.state(), MonitorState::Running);

    // The initial sync is synchronous, so searches work immediately.
    let db = IndexDatabase::open(&db_path).unwrap();
    let hits = db.search("report", &SearchOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "report_final.pdf");
    assert!(db
        .search("dotfile", &SearchOptions::default())
        .unwrap()
        .is_empty());
    assert_eq!(
        db.root_state(data.path()).unwrap().unwrap().file_count,
        2
    );

    // A burst of changes settles into one consistent index state.
    fs::write(nested.join("report_draft.pdf"), b"draft").unwrap();
    fs::write(data.path().join("notes.txt"), b"notes grew longer").unwrap();
    fs::remove_file(nested.join("report_final.pdf")).unwrap();

    assert!(wait_for(|| {
        let hits = db.search("report_*.pdf", &SearchOptions::default()).unwrap();
        hits.len() == 1 && hits[0].name == "report_draft.pdf"
    }));
    assert!(wait_for(|| {
        db.record_for_path(&data.path().join("notes.txt"))
            .unwrap()
            .is_some_and(|record| record.size == 17)
    }));
    assert!(wait_for(|| {
        db.root_state(data.path())
            .unwrap()
            .is_some_and(|state| state.file_count == 2)
    }));

    monitor.stop();
    assert_eq!(monitor.state(), MonitorState::Stopped);

    // A stopped monitor leaves the index untouched.
    fs::write(data.path().join("after_stop.txt"), b"late").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(db
        .record_for_path(&data.path().join("after_stop.txt"))
        .unwrap()
        .is_none());

    // Restarting catches up with what happened while stopped.
    monitor.start().unwrap();
    assert!(db
        .record_for_path(&data.path().join("after_stop.txt"))
        .unwrap()
        .is_some());
    monitor.stop();
}
