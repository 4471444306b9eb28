//! Scanner integration tests over real temporary directory trees.

use std::fs;
use std::path::Path;

use scrivener::error::ScrivenerError;
use scrivener::scan::{ScanOptions, scan, scan_records};

fn write(root: &Path, rel: &str, bytes: usize) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![b'x'; bytes]).unwrap();
}

fn options(include: &[&str], exclude: &[&str]) -> ScanOptions {
    ScanOptions {
        include_patterns: include.iter().map(|s| (*s).to_string()).collect(),
        exclude_patterns: exclude.iter().map(|s| (*s).to_string()).collect(),
        max_size_bytes: None,
        follow_symlinks: false,
    }
}

// ---------------------------------------------------------------------------
// Pattern selection
// ---------------------------------------------------------------------------

#[test]
fn include_exclude_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.py", 50);
    write(root, "b.pyc", 50);
    write(root, "__pycache__/c.py", 50);

    let opts = ScanOptions {
        max_size_bytes: Some(1000),
        ..options(&["*.py"], &["*.pyc", "__pycache__"])
    };
    let found = scan(root, &opts).unwrap();

    assert_eq!(found.len(), 1, "expected only a.py, got {found:?}");
    assert!(found[0].ends_with("a.py"));
}

#[test]
fn exclude_dominates_include() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "kept.py", 10);
    write(root, "dropped.py", 10);

    let found = scan(root, &options(&["*.py"], &["dropped.py"])).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("kept.py"));
}

#[test]
fn empty_include_matches_everything() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.py", 10);
    write(root, "notes.txt", 10);
    write(root, "sub/data.bin", 10);

    let found = scan(root, &options(&[], &[])).unwrap();
    assert_eq!(found.len(), 3);
}

#[test]
fn name_pattern_matches_in_nested_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "top.py", 10);
    write(root, "deep/nested/inner.py", 10);
    write(root, "deep/nested/other.go", 10);

    let found = scan(root, &options(&["*.py"], &[])).unwrap();
    assert_eq!(found.len(), 2);
}

// ---------------------------------------------------------------------------
// Determinism and ordering
// ---------------------------------------------------------------------------

#[test]
fn repeated_scans_identical_and_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    // Created out of order on purpose.
    write(root, "zeta.py", 10);
    write(root, "alpha.py", 10);
    write(root, "mid/beta.py", 10);

    let first = scan(root, &options(&[], &[])).unwrap();
    let second = scan(root, &options(&[], &[])).unwrap();
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    assert_eq!(first, sorted);
}

// ---------------------------------------------------------------------------
// Size limit boundary
// ---------------------------------------------------------------------------

#[test]
fn file_exactly_at_limit_included_above_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "at_limit.py", 100);
    write(root, "over_limit.py", 101);

    let opts = ScanOptions {
        max_size_bytes: Some(100),
        ..options(&[], &[])
    };
    let found = scan(root, &opts).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("at_limit.py"));
}

#[test]
fn oversized_file_excluded_even_when_pattern_matches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "big.py", 5000);

    let opts = ScanOptions {
        max_size_bytes: Some(1000),
        ..options(&["*.py"], &[])
    };
    assert!(scan(root, &opts).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Symlink policy
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn symlinked_directory_skipped_unless_followed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    let root = dir.path().join("root");
    fs::create_dir_all(&target).unwrap();
    fs::create_dir_all(&root).unwrap();
    fs::write(target.join("hidden.py"), "x").unwrap();
    fs::write(root.join("visible.py"), "x").unwrap();
    std::os::unix::fs::symlink(&target, root.join("link")).unwrap();

    let found = scan(&root, &options(&["*.py"], &[])).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("visible.py"));

    let opts = ScanOptions {
        follow_symlinks: true,
        ..options(&["*.py"], &[])
    };
    let followed = scan(&root, &opts).unwrap();
    assert_eq!(followed.len(), 2);
    assert!(followed.iter().any(|p| p.ends_with("link/hidden.py")));
}

#[cfg(unix)]
#[test]
fn symlinked_file_skipped_unless_followed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "real.py", 10);
    std::os::unix::fs::symlink(root.join("real.py"), root.join("aliased.py")).unwrap();

    let found = scan(root, &options(&["*.py"], &[])).unwrap();
    assert_eq!(found.len(), 1);

    let opts = ScanOptions {
        follow_symlinks: true,
        ..options(&["*.py"], &[])
    };
    assert_eq!(scan(root, &opts).unwrap().len(), 2);
}

#[cfg(unix)]
#[test]
fn symlink_loop_does_not_hang() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.py", 10);
    // Link back to the root itself; with follow off this must terminate.
    std::os::unix::fs::symlink(root, root.join("loop")).unwrap();

    let found = scan(root, &options(&["*.py"], &[])).unwrap();
    assert_eq!(found.len(), 1);
}

#[cfg(unix)]
#[test]
fn broken_symlink_skipped_when_following() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "ok.py", 10);
    std::os::unix::fs::symlink(root.join("gone.py"), root.join("dangling.py")).unwrap();

    let opts = ScanOptions {
        follow_symlinks: true,
        ..options(&["*.py"], &[])
    };
    let found = scan(root, &opts).unwrap();
    assert_eq!(found.len(), 1);
}

// ---------------------------------------------------------------------------
// Records and failure semantics
// ---------------------------------------------------------------------------

#[test]
fn records_carry_relative_path_language_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/main.py", 42);

    let records = scan_records(root, &options(&[], &[])).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.relative_path, Path::new("src/main.py"));
    assert_eq!(record.language, "python");
    assert_eq!(record.size_bytes, 42);
    assert!(record.path.is_absolute());
}

#[test]
fn missing_root_is_an_error() {
    let err = scan(Path::new("/nonexistent/scrivener-test-root"), &ScanOptions::default())
        .unwrap_err();
    assert!(matches!(err, ScrivenerError::Scan(_)));
}

#[test]
fn non_regular_entries_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "file.py", 10);
    fs::create_dir_all(root.join("empty_dir")).unwrap();

    let found = scan(root, &options(&[], &[])).unwrap();
    assert_eq!(found.len(), 1);
}
