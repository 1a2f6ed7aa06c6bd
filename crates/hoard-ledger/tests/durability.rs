use std::sync::Arc;

use hoard_ledger::{Entries, Ledger, encode};
use hoard_verify::{Digest, Sha256Hasher};

fn digest_of(id: &str) -> Digest { Digest::from_slice(&Sha256Hasher::digest(id.as_bytes())).unwrap() }

/// A crash at any byte of the replacement write leaves only a stray
/// temporary behind; the ledger file itself stays the prior mapping.
#[test]
fn torn_replacement_never_observable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checksums.json");

    let ledger = Ledger::open(&path).unwrap();
    ledger.record_complete("a", digest_of("a")).unwrap();
    let prior = ledger.load_all();

    let mut updated = prior.clone();
    updated.insert("b".to_string(), digest_of("b"));
    let next_bytes = encode(&updated).unwrap();

    for cut in 0..=next_bytes.len() {
        let stray = dir.path().join(format!(".checksums.json.crash{cut}.tmp"));
        std::fs::write(&stray, &next_bytes[..cut]).unwrap();

        let seen = Ledger::open(&path).unwrap().load_all();
        assert_eq!(seen, prior, "torn state visible at byte {cut}");

        std::fs::remove_file(&stray).unwrap();
    }

    ledger.record_complete("b", digest_of("b")).unwrap();
    assert_eq!(Ledger::open(&path).unwrap().load_all(), updated);
}

#[test]
fn concurrent_records_all_land() {
    const N: usize = 48;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checksums.json");
    let ledger = Arc::new(Ledger::open(&path).unwrap());

    std::thread::scope(|scope| {
        for i in 0..N {
            let ledger = Arc::clone(&ledger);
            scope.spawn(move || {
                let id = format!("asset_{i:02}");
                ledger.record_complete(&id, digest_of(&id)).unwrap();
            });
        }
    });

    let on_disk: Entries = Ledger::open(&path).unwrap().load_all();
    assert_eq!(on_disk.len(), N);
    for (id, digest) in &on_disk {
        assert_eq!(*digest, digest_of(id));
    }
    assert_eq!(on_disk, ledger.load_all());
}
