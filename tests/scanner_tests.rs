//! Scanner tests: extension filtering, batching, cancellation, record fields.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use imgsieve::pipeline::{ScanContext, collect_records, is_supported_image};
use imgsieve::types::{Event, FileRecord, StatusTag};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("imgsieve-scan-{}-{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"not a real image, scanner does not decode").unwrap();
}

fn scan(root: &Path, batch_size: usize, cancel: bool) -> (Vec<FileRecord>, bool, Vec<Event>) {
    let ctx = ScanContext {
        root: root.to_path_buf(),
        follow_links: false,
        cancel: Arc::new(AtomicBool::new(cancel)),
        batch_size,
    };
    let mut events = Vec::new();
    let (records, summary) = collect_records(ctx, &mut |e| events.push(e.clone())).unwrap();
    (records, summary.completed, events)
}

#[test]
fn test_supported_extensions_case_insensitive() {
    for name in [
        "a.png", "b.jpg", "c.jpeg", "d.bmp", "e.gif", "f.PNG", "g.JPG", "h.JpEg",
    ] {
        assert!(is_supported_image(Path::new(name)), "{name}");
    }
    for name in ["a.txt", "b.webp", "c.tiff", "noext", "d.png.bak", ".png"] {
        assert!(!is_supported_image(Path::new(name)), "{name}");
    }
}

#[test]
fn test_scan_filters_to_supported_images() {
    let dir = temp_dir("filter");
    touch(&dir, "one.png");
    touch(&dir, "two.JPG");
    touch(&dir, "three.txt");
    touch(&dir, "four.gif");
    touch(&dir, "five.webp");

    let (records, completed, _) = scan(&dir, 100, false);
    assert!(completed);
    let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["four.gif", "one.png", "two.JPG"]);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_scan_recurses_into_subdirectories() {
    let dir = temp_dir("nested");
    fs::create_dir_all(dir.join("a/b")).unwrap();
    touch(&dir, "root.png");
    touch(&dir.join("a"), "mid.jpg");
    touch(&dir.join("a/b"), "deep.bmp");

    let (records, completed, _) = scan(&dir, 100, false);
    assert!(completed);
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|r| r.path.ends_with("a/b/deep.bmp")));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_batch_size_does_not_change_result_set() {
    let dir = temp_dir("batches");
    for i in 0..7 {
        touch(&dir, &format!("img{i}.png"));
    }

    let paths = |records: Vec<FileRecord>| {
        let mut p: Vec<PathBuf> = records.into_iter().map(|r| r.path).collect();
        p.sort();
        p
    };
    let (small, done_small, _) = scan(&dir, 1, false);
    let (large, done_large, _) = scan(&dir, 100, false);
    assert!(done_small && done_large);
    assert_eq!(paths(small), paths(large));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_records_are_numbered_and_unclassified() {
    let dir = temp_dir("fields");
    for i in 0..5 {
        touch(&dir, &format!("img{i}.jpeg"));
    }

    let (records, _, _) = scan(&dir, 2, false);
    assert_eq!(records.len(), 5);
    let mut sequences: Vec<usize> = records.iter().map(|r| r.sequence).collect();
    sequences.sort();
    assert_eq!(sequences, [1, 2, 3, 4, 5]);
    for rec in &records {
        assert_eq!(rec.status, StatusTag::Unclassified);
        assert_eq!(rec.score, None);
        assert!(rec.size_bytes > 0);
        assert!(rec.path.is_absolute() || rec.path.starts_with(&dir));
    }
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_cancelled_scan_emits_no_scan_complete() {
    let dir = temp_dir("cancel");
    touch(&dir, "img.png");

    let (_, completed, events) = scan(&dir, 100, true);
    assert!(!completed);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::ScanComplete(_))),
        "cancelled scan must not announce completion"
    );
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_scan_complete_reports_found_count() {
    let dir = temp_dir("count");
    for i in 0..3 {
        touch(&dir, &format!("img{i}.gif"));
    }

    let (records, completed, events) = scan(&dir, 100, false);
    assert!(completed);
    let found = events.iter().find_map(|e| match e {
        Event::ScanComplete(n) => Some(*n),
        _ => None,
    });
    assert_eq!(found, Some(records.len()));
    assert_eq!(records.len(), 3);
    fs::remove_dir_all(&dir).unwrap();
}
