use hoard_fs::{AtomicWriteOptions, atomic_read, atomic_write, file_len};
use tempfile::tempdir;

#[test]
fn test_atomic_write_replaces_existing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("existing.txt");

    std::fs::write(&path, "original").unwrap();

    atomic_write(&path, b"new content", AtomicWriteOptions::new()).unwrap();

    assert_eq!(atomic_read(&path).unwrap(), b"new content");
    assert_eq!(file_len(&path).unwrap(), 11);
}

#[test]
fn test_stray_temporary_does_not_shadow_target() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checksums.json");

    atomic_write(&path, b"{\"a\":\"00\"}", AtomicWriteOptions::new()).unwrap();
    // What a crash between temp write and rename leaves behind.
    std::fs::write(dir.path().join(".checksums.json.abc123.tmp"), b"{\"a\":").unwrap();

    assert_eq!(atomic_read(&path).unwrap(), b"{\"a\":\"00\"}");
}
