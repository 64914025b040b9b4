//! Tests for DiskRowSet
//!
//! These tests verify:
//! - Writing and reopening row sets
//! - Point lookups and tombstones
//! - File naming
//! - Sort order enforcement
//! - Corruption detection

use std::fs;

use tabletd::tablet::{DiskRowSet, RowEntry};
use tabletd::TabletError;
use tempfile::TempDir;

fn value(v: &str) -> RowEntry {
    RowEntry::Value(v.as_bytes().to_vec())
}

fn sample_entries() -> Vec<(Vec<u8>, RowEntry)> {
    vec![
        (b"apple".to_vec(), value("red")),
        (b"banana".to_vec(), RowEntry::Tombstone),
        (b"cherry".to_vec(), value("dark")),
    ]
}

// =============================================================================
// Naming
// =============================================================================

#[test]
fn test_path_for_and_parse_id() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::path_for(dir.path(), 42);

    assert_eq!(path.file_name().unwrap(), "rowset_000042.drs");
    assert_eq!(DiskRowSet::parse_id(&path), Some(42));
    assert_eq!(DiskRowSet::parse_id(&dir.path().join("rowset_000042.drs.tmp")), None);
    assert_eq!(DiskRowSet::parse_id(&dir.path().join("other.drs")), None);
}

// =============================================================================
// Write / Read
// =============================================================================

#[test]
fn test_write_and_get() {
    let dir = TempDir::new().unwrap();
    let rowset = DiskRowSet::write(dir.path(), 1, sample_entries()).unwrap();

    assert_eq!(rowset.id(), 1);
    assert_eq!(rowset.entry_count(), 3);
    assert_eq!(rowset.get(b"apple").unwrap(), Some(value("red")));
    assert_eq!(rowset.get(b"banana").unwrap(), Some(RowEntry::Tombstone));
    assert_eq!(rowset.get(b"cherry").unwrap(), Some(value("dark")));
    assert_eq!(rowset.get(b"durian").unwrap(), None);
}

#[test]
fn test_reopen() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::write(dir.path(), 3, sample_entries())
        .unwrap()
        .path()
        .to_path_buf();

    let reopened = DiskRowSet::open(&path).unwrap();
    assert_eq!(reopened.id(), 3);
    assert_eq!(reopened.scan().unwrap(), sample_entries());
}

#[test]
fn test_no_temp_file_left_behind() {
    let dir = TempDir::new().unwrap();
    DiskRowSet::write(dir.path(), 1, sample_entries()).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["rowset_000001.drs".to_string()]);
}

#[test]
fn test_empty_rowset() {
    let dir = TempDir::new().unwrap();
    let rowset = DiskRowSet::write(dir.path(), 1, Vec::<(Vec<u8>, RowEntry)>::new()).unwrap();
    assert_eq!(rowset.entry_count(), 0);
    assert!(rowset.scan().unwrap().is_empty());
}

#[test]
fn test_unsorted_entries_rejected() {
    let dir = TempDir::new().unwrap();
    let entries = vec![(b"b".to_vec(), value("1")), (b"a".to_vec(), value("2"))];
    assert!(matches!(
        DiskRowSet::write(dir.path(), 1, entries),
        Err(TabletError::InvalidState(_))
    ));
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corrupted_data_detected() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::write(dir.path(), 1, sample_entries())
        .unwrap()
        .path()
        .to_path_buf();

    let mut bytes = fs::read(&path).unwrap();
    bytes[20] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        DiskRowSet::open(&path),
        Err(TabletError::Corruption(_))
    ));
}

#[test]
fn test_truncated_file_detected() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::path_for(dir.path(), 1);
    fs::write(&path, b"TDRS").unwrap();

    assert!(matches!(
        DiskRowSet::open(&path),
        Err(TabletError::Corruption(_))
    ));
}

#[test]
fn test_corrupted_entry_count_detected() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::write(dir.path(), 1, vec![(b"a".to_vec(), value("1"))])
        .unwrap()
        .path()
        .to_path_buf();

    let mut bytes = fs::read(&path).unwrap();
    bytes[6..14].copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        DiskRowSet::open(&path),
        Err(TabletError::Corruption(_))
    ));
}

#[test]
fn test_inflated_entry_count_detected() {
    let dir = TempDir::new().unwrap();
    let path = DiskRowSet::write(dir.path(), 1, sample_entries())
        .unwrap()
        .path()
        .to_path_buf();

    let mut bytes = fs::read(&path).unwrap();
    bytes[6..14].copy_from_slice(&1_000_000_000u64.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        DiskRowSet::open(&path),
        Err(TabletError::Corruption(_))
    ));
}
