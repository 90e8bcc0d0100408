use std::fs;

use studio_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("Lobby");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_bytes() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().join("Standard"));

    let first = writer.write("1.png", b"\x89PNG first").unwrap();
    assert_eq!(first.file_name().unwrap(), "1.png");
    assert_eq!(fs::read(&first).unwrap(), b"\x89PNG first");

    let second = writer.write("1.png", b"\x89PNG second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"\x89PNG second");

    let leftovers: Vec<_> = fs::read_dir(temp.path().join("Standard"))
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn no_partial_file_when_target_is_not_a_directory() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("manifest.json", "{}");
    assert!(matches!(result, Err(PersistError::OutputDir { .. })));
    assert!(!file_path.with_file_name("manifest.json").exists());
}

#[test]
fn reset_dir_empties_existing_contents() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("Lobby");
    fs::create_dir_all(dir.join("Pro")).unwrap();
    fs::write(dir.join("Pro").join("1.png"), "old").unwrap();

    studio_engine::reset_dir(&dir).unwrap();
    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    let missing = temp.path().join("Kitchen");
    studio_engine::reset_dir(&missing).unwrap();
    assert!(missing.is_dir());
}
