use std::fs;
use std::io::{Cursor, Write};

use hoard_verify::{Digest, IntegrityVerifier, Sha256Hasher, VerifyError};
use zip::write::SimpleFileOptions;

fn zip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("albedo.exr", options).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn verify_returns_whole_file_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rock.zip");
    let bytes = zip_bytes(&[3u8; 4096]);
    fs::write(&path, &bytes).unwrap();

    let verified = IntegrityVerifier::new().verify(&path).unwrap();

    let expected = Digest::from_slice(&Sha256Hasher::digest(&bytes)).unwrap();
    assert_eq!(verified.digest, expected);
    assert_eq!(verified.size, bytes.len() as u64);
    assert_eq!(verified.archive.entry_count, 1);
}

#[test]
fn flipped_byte_is_corrupt_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rock.zip");
    let payload: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 256) as u8).collect();
    let mut bytes = zip_bytes(&payload);
    let at = bytes.windows(64).position(|w| w == &payload[..64]).unwrap();
    bytes[at + 1000] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let err = IntegrityVerifier::new().verify(&path).unwrap_err();
    assert!(matches!(err, VerifyError::CorruptArchive { .. }), "{err}");
    assert!(err.is_corrupt());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = IntegrityVerifier::new().verify(&dir.path().join("absent.zip")).unwrap_err();
    assert!(matches!(err, VerifyError::Io { .. }));
    assert!(!err.is_corrupt());
}

#[test]
fn verify_against_detects_digest_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rock.zip");
    fs::write(&path, zip_bytes(b"texture")).unwrap();

    let wrong = Digest::from_bytes([0u8; 32]);
    let err = IntegrityVerifier::new().verify_against(&path, &wrong).unwrap_err();
    assert!(matches!(err, VerifyError::Mismatch { .. }));
}
