use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hoard_catalog::{Catalog, CatalogEntry, Layout};
use hoard_fetch::testing::{ScriptedRemote, Step};
use hoard_fetch::{Backoff, Credential, CredentialHolder, FetchOptions, RemoteError, ResumableFetcher};
use hoard_ledger::Ledger;
use hoard_transfer::{
    CREDENTIAL_EXPIRED, FailureReport, ItemOutcome, Orchestrator, SkipReport, TransferError, TransferOptions,
};
use hoard_verify::{Digest, Sha256Hasher};
use tempfile::tempdir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn archive(seed: usize, len: usize) -> Vec<u8> {
    let payload: Vec<u8> = (0..len).map(|i| ((i * 31 + seed * 7) % 251) as u8).collect();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file(format!("asset_{seed}/albedo.exr"), options).unwrap();
    zip.write_all(&payload).unwrap();
    zip.finish().unwrap().into_inner()
}

fn digest_of(bytes: &[u8]) -> Digest { Digest::from_slice(&Sha256Hasher::digest(bytes)).unwrap() }

fn entry() -> CatalogEntry { CatalogEntry::default().with_category("3d") }

fn catalog<'a>(ids: impl IntoIterator<Item = &'a str>) -> Catalog { ids.into_iter().map(|id| (id, entry())).collect() }

fn orchestrator(remote: ScriptedRemote, credentials: CredentialHolder) -> Orchestrator<ScriptedRemote> {
    let fetcher = ResumableFetcher::new(remote).with_options(
        FetchOptions::default()
            .max_attempts(3)
            .backoff(Backoff::none()),
    );
    Orchestrator::new(fetcher, Arc::new(credentials)).with_options(TransferOptions::default().concurrency(4))
}

fn token() -> CredentialHolder { CredentialHolder::new(Credential::new("good")) }

#[tokio::test]
async fn clean_truncated_and_absent_items() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());
    let (a, b) = (archive(1, 12_000), archive(2, 15_000));

    let remote = ScriptedRemote::new()
        .with_archive("A", a.clone())
        .with_archive("B", b.clone())
        .with_script("B", [Step::Truncate(4_000)])
        .with_absent("C");
    let summary = orchestrator(remote, token())
        .run(&catalog(["A", "B", "C"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, vec!["A", "B"]);
    assert_eq!(summary.skipped, vec!["C"]);
    assert!(summary.failed.is_empty());
    assert!(summary.is_clean());

    let reopened = Ledger::open(layout.ledger_path()).unwrap().load_all();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened["A"], digest_of(&a));
    assert_eq!(reopened["B"], digest_of(&b));

    assert!(SkipReport::load(&layout.skip_report_path()).unwrap().covers("C", &entry()));
    assert!(FailureReport::load(&layout.failure_report_path()).unwrap().items.is_empty());
}

#[tokio::test]
async fn second_run_transfers_nothing() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());
    let catalog = catalog(["A", "B", "C"]);
    let remote = || {
        ScriptedRemote::new()
            .with_archive("A", archive(1, 9_000))
            .with_archive("B", archive(2, 9_000))
            .with_absent("C")
    };

    let first = orchestrator(remote(), token());
    first.run(&catalog, Arc::clone(&ledger), &layout).await.unwrap();
    assert!(first.fetcher().remote().bytes_served() > 0);

    let second = orchestrator(remote(), token());
    let summary = second.run(&catalog, Arc::clone(&ledger), &layout).await.unwrap();

    assert_eq!(summary.total(), 0);
    assert_eq!(summary.transferred, 0);
    assert_eq!(second.fetcher().remote().bytes_served(), 0);
    assert!(second.fetcher().remote().initiated().is_empty());
}

#[tokio::test]
async fn skipped_item_returns_when_its_entry_changes() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());

    let gone = ScriptedRemote::new().with_absent("C");
    orchestrator(gone, token())
        .run(&catalog(["C"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap();

    let unchanged = orchestrator(ScriptedRemote::new().with_archive("C", archive(3, 5_000)), token());
    let summary = unchanged.run(&catalog(["C"]), Arc::clone(&ledger), &layout).await.unwrap();
    assert_eq!(summary.total(), 0);
    assert!(unchanged.fetcher().remote().initiated().is_empty());

    let mut changed = Catalog::new();
    changed.insert("C", entry().with_components(["albedo"]));
    let back = orchestrator(ScriptedRemote::new().with_archive("C", archive(3, 5_000)), token());
    let summary = back.run(&changed, Arc::clone(&ledger), &layout).await.unwrap();

    assert_eq!(summary.succeeded, vec!["C"]);
    assert!(ledger.is_complete("C"));
    assert!(!SkipReport::load(&layout.skip_report_path()).unwrap().contains("C"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_record_every_item() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());

    let ids: Vec<String> = (0..24).map(|i| format!("asset{i:02}")).collect();
    let mut remote = ScriptedRemote::new();
    for (i, id) in ids.iter().enumerate() {
        remote = remote.with_archive(id.clone(), archive(i, 3_000 + i * 100));
    }
    let catalog = catalog(ids.iter().map(String::as_str));

    let orchestrator = orchestrator(remote, token()).with_options(TransferOptions::default().concurrency(8));
    let summary = orchestrator.run(&catalog, Arc::clone(&ledger), &layout).await.unwrap();

    assert_eq!(summary.succeeded.len(), 24);
    let recorded = Ledger::open(layout.ledger_path()).unwrap().load_all();
    assert_eq!(recorded.len(), 24);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(recorded[id], digest_of(&archive(i, 3_000 + i * 100)));
    }
}

#[tokio::test]
async fn exhausted_items_land_in_the_failure_report() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());
    let busy = || Step::FailInitiate(RemoteError::Transport("timed out".into()));

    let remote = ScriptedRemote::new()
        .with_archive("A", archive(1, 4_000))
        .with_archive("B", archive(2, 4_000))
        .with_script("B", [busy(), busy(), busy()]);
    let summary = orchestrator(remote, token())
        .run(&catalog(["A", "B"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, vec!["A"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, "B");
    assert!(!summary.is_clean());
    assert!(!ledger.is_complete("B"));

    let report = FailureReport::load(&layout.failure_report_path()).unwrap();
    assert_eq!(report.items, summary.failed);
}

#[tokio::test]
async fn expired_credential_is_refreshed_once_for_all_workers() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let credentials = CredentialHolder::new(Credential::new("stale")).with_refresh(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Some(Credential::new("fresh")) }
    });

    let remote = ScriptedRemote::new()
        .with_archive("A", archive(1, 4_000))
        .with_archive("B", archive(2, 4_000))
        .with_archive("C", archive(3, 4_000))
        .accepting(["fresh"]);
    let summary = orchestrator(remote, credentials)
        .run(&catalog(["A", "B", "C"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, vec!["A", "B", "C"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unrenewable_credential_fails_items_and_run_continues() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());
    let remote = ScriptedRemote::new()
        .with_archive("A", archive(1, 4_000))
        .accepting(["fresh"]);

    let summary = orchestrator(remote, token())
        .run(&catalog(["A"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].reason, CREDENTIAL_EXPIRED);
}

#[tokio::test]
async fn ledger_write_failure_stops_the_run() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    // The ledger's directory does not exist, so every replacement fails.
    let ledger = Arc::new(Ledger::open(dir.path().join("missing").join("checksums.json")).unwrap());
    let remote = ScriptedRemote::new()
        .with_archive("A", archive(1, 4_000))
        .with_absent("C");

    let err = orchestrator(remote, token())
        .run(&catalog(["A", "C"]), Arc::clone(&ledger), &layout)
        .await
        .unwrap_err();

    let TransferError::Aborted { summary, source } = err else {
        panic!("expected an aborted run, got {err:?}");
    };
    assert!(matches!(*source, TransferError::Ledger(_)));
    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.skipped, vec!["C"]);
    assert!(!ledger.is_complete("A"));
    assert!(SkipReport::load(&layout.skip_report_path()).unwrap().contains("C"));
}

#[tokio::test]
async fn every_settled_item_is_reported() {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let ledger = Arc::new(Ledger::open(layout.ledger_path()).unwrap());
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let remote = ScriptedRemote::new()
        .with_archive("A", archive(1, 4_000))
        .with_absent("C");
    let orchestrator = orchestrator(remote, token()).with_options(TransferOptions::default().on_item(
        move |id, outcome| {
            let kind = match outcome {
                ItemOutcome::Succeeded { .. } => "ok",
                ItemOutcome::Skipped { .. } => "skip",
                ItemOutcome::Failed { .. } => "fail",
            };
            sink.lock().unwrap().push(format!("{id}:{kind}"));
        },
    ));
    orchestrator.run(&catalog(["A", "C"]), ledger, &layout).await.unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["A:ok", "C:skip"]);
}
