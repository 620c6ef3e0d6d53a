//! End-to-end behaviour of the build cache across both tiers.
//!
//! Run with: `cargo test -p cairn-tests --test cache_properties`

use cairn_cache::{
    Fingerprinter, InputClassifier, InputFingerprint, LoadOutcome, LocalStatus, PushStatus,
    TierSource, fingerprint,
};
use cairn_core::ContentDigest;
use cairn_tests::{
    BuildContext, OutputFixture, TaskFixture, assert_completes_within, entry_for_source,
    init_test_logging, start_test_server, unreachable_url,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn test_same_inputs_give_same_key() {
    let a = TaskFixture::key_for_source("class A {}");
    let b = TaskFixture::key_for_source("class A {}");
    let c = TaskFixture::key_for_source("class A { int x; }");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_input_order_changes_key() {
    let task = TaskFixture::compile();
    let first = InputFingerprint::new(
        "sources",
        InputClassifier::FullContent,
        ContentDigest::of_bytes(b"src"),
    );
    let second = InputFingerprint::new(
        "classpath",
        InputClassifier::InterfaceOnly,
        ContentDigest::of_bytes(b"lib"),
    );

    let forward =
        fingerprint(&task, "1.0", &[first.clone(), second.clone()], &["classes"]).unwrap();
    let reversed = fingerprint(&task, "1.0", &[second, first], &["classes"]).unwrap();
    assert_ne!(forward, reversed);
}

#[test]
fn test_version_and_outputs_change_key() {
    let base = || {
        Fingerprinter::new(TaskFixture::compile(), "1.0")
            .value("target", "17")
            .output("classes")
    };
    let key = base().finish().unwrap();
    let bumped = Fingerprinter::new(TaskFixture::compile(), "1.1")
        .value("target", "17")
        .output("classes")
        .finish()
        .unwrap();
    let extra_output = base().output("headers").finish().unwrap();

    assert_ne!(key, bumped);
    assert_ne!(key, extra_output);
}

#[tokio::test]
async fn test_store_is_idempotent() {
    let build = BuildContext::local_only().unwrap();
    let key = TaskFixture::key_for_source("A");
    let coordinator = build.coordinator();

    let first = coordinator
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;
    let second = coordinator
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;

    assert_eq!(first.local, LocalStatus::Stored);
    assert_eq!(second.local, LocalStatus::AlreadyPresent);
    assert_eq!(build.local().usage().unwrap().entries, 1);

    let loaded = coordinator.try_load(&key).await.into_outputs().unwrap();
    assert_eq!(loaded, OutputFixture::classes("A"));
}

#[tokio::test]
async fn test_corrupt_entry_is_a_miss_and_is_removed() {
    init_test_logging();
    let build = BuildContext::local_only().unwrap();
    let key = TaskFixture::key_for_source("A");
    build
        .coordinator()
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;

    let path = build.local().entry_path(&key);
    std::fs::write(&path, b"definitely not an entry").unwrap();

    assert_eq!(build.coordinator().try_load(&key).await, LoadOutcome::Miss);
    assert!(!path.exists());

    // The slot is usable again.
    let report = build
        .coordinator()
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;
    assert_eq!(report.local, LocalStatus::Stored);
    assert!(build.coordinator().try_load(&key).await.is_hit());
}

#[tokio::test]
async fn test_remote_hit_is_promoted_to_local() {
    let server = start_test_server().await.unwrap();
    let entry = entry_for_source("A");
    server.store().write_entry(&entry).unwrap();

    let build = BuildContext::with_remote(&server.url(), false).unwrap();
    assert!(!build.local().contains(&entry.key));

    let outcome = build.coordinator().try_load(&entry.key).await;
    assert_eq!(outcome.source(), Some(TierSource::Remote));
    assert!(build.local().contains(&entry.key));

    // Second lookup no longer needs the remote.
    server.stop().await.unwrap();
    let again = build.coordinator().try_load(&entry.key).await;
    assert_eq!(again.source(), Some(TierSource::Local));

    let summary = build.coordinator().summary();
    assert_eq!(summary.remote_hits, 1);
    assert_eq!(summary.local_hits, 1);
}

#[tokio::test]
async fn test_push_disabled_never_writes_remote() {
    let server = start_test_server().await.unwrap();
    let build = BuildContext::with_remote(&server.url(), false).unwrap();
    let key = TaskFixture::key_for_source("A");

    let report = build
        .coordinator()
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;

    assert_eq!(report.local, LocalStatus::Stored);
    assert_eq!(report.remote, PushStatus::Disabled);
    assert!(!server.store().contains(&key));
}

#[tokio::test]
async fn test_push_enabled_writes_remote() {
    let server = start_test_server().await.unwrap();
    let build = BuildContext::with_remote(&server.url(), true).unwrap();
    let key = TaskFixture::key_for_source("A");

    let report = build
        .coordinator()
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;

    assert_eq!(report.remote, PushStatus::Pushed);
    assert!(server.store().contains(&key));

    // A second build pushing the same result finds it already there.
    let other = BuildContext::with_remote(&server.url(), true).unwrap();
    let report = other
        .coordinator()
        .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
        .await;
    assert_eq!(report.remote, PushStatus::AlreadyPresent);
}

#[tokio::test]
async fn test_unreachable_remote_degrades_to_local() {
    init_test_logging();
    let build = BuildContext::with_remote(&unreachable_url().unwrap(), true).unwrap();
    let key = TaskFixture::key_for_source("A");

    let outcome = assert_completes_within(
        build.coordinator().try_load(&key),
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(outcome, LoadOutcome::Miss);

    let report = assert_completes_within(
        build
            .coordinator()
            .store(key, TaskFixture::compile(), OutputFixture::classes("A")),
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(report.local, LocalStatus::Stored);
    assert!(matches!(
        report.remote,
        PushStatus::Failed(_) | PushStatus::RemoteUnavailable
    ));

    let hit = build.coordinator().try_load(&key).await;
    assert_eq!(hit.source(), Some(TierSource::Local));
    assert!(build.coordinator().summary().remote_errors >= 1);
}

/// Two builds sharing one remote: the first computes X and Y and pushes,
/// the second gets both from the remote, then only a changed Y misses.
#[tokio::test]
async fn test_second_build_reuses_first_builds_outputs() {
    let server = start_test_server().await.unwrap();

    let ci = BuildContext::with_remote(&server.url(), true).unwrap();
    let x = TaskFixture::key_for_source("X");
    let y = TaskFixture::key_for_source("Y");
    for (key, source) in [(x, "X"), (y, "Y")] {
        assert_eq!(ci.coordinator().try_load(&key).await, LoadOutcome::Miss);
        let report = ci
            .coordinator()
            .store(key, TaskFixture::compile(), OutputFixture::classes(source))
            .await;
        assert_eq!(report.remote, PushStatus::Pushed);
    }

    let dev = BuildContext::with_remote(&server.url(), false).unwrap();
    for (key, source) in [(x, "X"), (y, "Y")] {
        let outcome = dev.coordinator().try_load(&key).await;
        assert_eq!(outcome.source(), Some(TierSource::Remote));
        assert_eq!(outcome.into_outputs().unwrap(), OutputFixture::classes(source));
    }

    let y_changed = TaskFixture::key_for_source("Y'");
    assert_eq!(dev.coordinator().try_load(&y_changed).await, LoadOutcome::Miss);
    assert_eq!(
        dev.coordinator().try_load(&x).await.source(),
        Some(TierSource::Local)
    );

    let summary = dev.cache.finish().await.0;
    assert_eq!(summary.remote_hits, 2);
    assert_eq!(summary.misses, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_of_one_key() {
    let server = start_test_server().await.unwrap();
    let build = BuildContext::with_remote(&server.url(), true).unwrap();
    let key = TaskFixture::key_for_source("A");

    let stores = (0..16).map(|_| {
        let coordinator = build.coordinator().clone();
        tokio::spawn(async move {
            coordinator
                .store(key, TaskFixture::compile(), OutputFixture::classes("A"))
                .await
        })
    });
    let reports: Vec<_> = futures::future::join_all(stores)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let stored = reports
        .iter()
        .filter(|r| r.local == LocalStatus::Stored)
        .count();
    let pushed = reports
        .iter()
        .filter(|r| r.remote == PushStatus::Pushed)
        .count();
    assert_eq!(stored, 1);
    assert_eq!(pushed, 1);
    assert!(reports.iter().all(|r| r.warning().is_none()));
    assert_eq!(build.local().usage().unwrap().entries, 1);
    assert_eq!(server.store().usage().unwrap().entries, 1);
}
