//! Client synchronization against an in-process service.

use std::time::Duration;

use futures::TryStreamExt;

use confstore::{ChangeDetector, Clock, NewValue, SyncOptions, SyncProvider, ValueKind};
use confstore_testkit::TestService;

#[tokio::test]
async fn diff_reload_merges_without_refetching_unchanged_keys() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;
    let svc = &fixture.service;

    svc.add_values(
        &alice.principal,
        ValueKind::Setting,
        &[NewValue::new("a", "1"), NewValue::new("b", "2")],
    )
    .await
    .unwrap();

    let detector = ChangeDetector::start(
        ValueKind::Setting,
        fixture.source(&alice),
        fixture.clock.clone(),
    )
    .await;
    assert_eq!(detector.snapshot().len(), 2);

    fixture.advance(1_000);
    svc.add_values(
        &alice.principal,
        ValueKind::Setting,
        &[NewValue::new("b", "3"), NewValue::new("c", "4")],
    )
    .await
    .unwrap();

    assert!(detector.reload().await);

    assert_eq!(detector.get("a").as_deref(), Some("1"));
    assert_eq!(detector.get("b").as_deref(), Some("3"));
    assert_eq!(detector.get("c").as_deref(), Some("4"));
    assert_eq!(detector.last_detection_at(), Some(fixture.clock.now()));

    // Nothing changed since the last detection.
    assert!(!detector.reload().await);
    assert_eq!(detector.snapshot().len(), 3);
}

#[tokio::test]
async fn diff_contains_every_key_changed_since() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;
    let svc = &fixture.service;

    for key in ["k1", "k2", "k3"] {
        svc.add_values(&alice.principal, ValueKind::Configuration, &[NewValue::new(key, "0")])
            .await
            .unwrap();
    }
    fixture.advance(500);
    let since = fixture.clock.now();

    for (key, value) in [("k2", "1"), ("k4", "1"), ("k2", "2")] {
        svc.add_values(&alice.principal, ValueKind::Configuration, &[NewValue::new(key, value)])
            .await
            .unwrap();
    }

    let diff = svc
        .get_diff(&alice.principal, ValueKind::Configuration, since)
        .await
        .unwrap();
    let keys: Vec<&str> = diff.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["k4", "k2"]);

    let values = svc
        .get_values(&alice.principal, ValueKind::Configuration, Some(since))
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    let mut pairs: Vec<(String, String)> = values.into_iter().map(|r| (r.key, r.value)).collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![("k2".into(), "2".into()), ("k4".into(), "1".into())]
    );
}

#[tokio::test]
async fn provider_polls_settings_in_background() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;
    let svc = &fixture.service;

    svc.add_values(&alice.principal, ValueKind::Setting, &[NewValue::new("timeout", "30")])
        .await
        .unwrap();
    svc.add_values(&alice.principal, ValueKind::Configuration, &[NewValue::new("db.host", "h")])
        .await
        .unwrap();

    let options = SyncOptions::default()
        .with_kinds([ValueKind::Configuration, ValueKind::Setting])
        .with_refresh(ValueKind::Setting, Some(Duration::from_millis(20)));
    let provider = SyncProvider::start(fixture.source(&alice), fixture.clock.clone(), &options).await;
    assert_eq!(provider.get(ValueKind::Setting, "timeout").as_deref(), Some("30"));
    assert_eq!(provider.get(ValueKind::Configuration, "db.host").as_deref(), Some("h"));

    let mut changes = provider
        .detector(ValueKind::Setting)
        .map(ChangeDetector::subscribe)
        .unwrap();

    fixture.advance(1_000);
    svc.add_values(&alice.principal, ValueKind::Setting, &[NewValue::new("timeout", "60")])
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), changes.changed())
        .await
        .expect("settings were not reloaded")
        .unwrap();
    assert_eq!(provider.get(ValueKind::Setting, "timeout").as_deref(), Some("60"));

    provider.shutdown().await;
}

#[tokio::test]
async fn rejected_credentials_keep_cache_empty() {
    let fixture = TestService::new().await;
    let mut alice = fixture.client("alice").await;
    alice.secret = "wrong".into();

    let detector = ChangeDetector::start(
        ValueKind::Secret,
        fixture.source(&alice),
        fixture.clock.clone(),
    )
    .await;
    assert!(detector.snapshot().is_empty());
    assert_eq!(detector.last_detection_at(), None);
    assert!(!detector.reload().await);
}
