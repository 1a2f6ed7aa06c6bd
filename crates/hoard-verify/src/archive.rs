//! Structural scan of zip containers.
//!
//! Every member is decompressed into a sink; the zip reader checks each
//! member's CRC-32 once its stream is exhausted, so a flipped byte anywhere in
//! a member's data surfaces as an error here.

use std::io::{self, Read, Seek};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub entry_count:        usize,
    pub uncompressed_bytes: u64,
}

/// Reason a container failed the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure(pub String);

pub fn scan_zip<R: Read + Seek>(reader: R) -> Result<ArchiveReport, ScanFailure> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| ScanFailure(format!("unreadable container: {e}")))?;

    let mut report = ArchiveReport::default();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ScanFailure(format!("entry #{index}: {e}")))?;
        if entry.is_dir() {
            report.entry_count += 1;
            continue;
        }
        let name = entry.name().to_string();
        let copied = io::copy(&mut entry, &mut io::sink())
            .map_err(|e| ScanFailure(format!("entry {name:?}: {e}")))?;
        if copied != entry.size() {
            return Err(ScanFailure(format!(
                "entry {name:?}: expected {} bytes, read {copied}",
                entry.size()
            )));
        }
        report.entry_count += 1;
        report.uncompressed_bytes += copied;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn scans_valid_archive() {
        let bytes = build(&[("a.txt", b"alpha"), ("b/c.bin", &[7u8; 300])]);
        let report = scan_zip(Cursor::new(bytes)).unwrap();
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.uncompressed_bytes, 305);
    }

    #[test]
    fn rejects_non_zip() {
        assert!(scan_zip(Cursor::new(b"definitely not a zip".to_vec())).is_err());
    }

    #[test]
    fn rejects_truncated_container() {
        let bytes = build(&[("a.txt", b"alpha")]);
        let cut = bytes[..bytes.len() / 2].to_vec();
        assert!(scan_zip(Cursor::new(cut)).is_err());
    }

    #[test]
    fn rejects_flipped_member_byte() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let mut bytes = build(&[("fox.txt", &payload)]);
        let at = bytes
            .windows(payload.len())
            .position(|w| w == payload.as_slice())
            .unwrap();
        bytes[at + 10] ^= 0xff;
        let err = scan_zip(Cursor::new(bytes)).unwrap_err();
        assert!(err.0.contains("fox.txt"), "{err:?}");
    }
}
