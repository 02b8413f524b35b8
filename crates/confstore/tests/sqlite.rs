//! The service over SQLite storage.

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;

use confstore::{
    Confstore, ManualClock, NewValue, Principal, SqliteStore, Timestamp, TokenIssuer, ValueKind,
};
use confstore_testkit::{test_config, START_MILLIS};

#[tokio::test]
async fn values_and_clients_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confstore.db");
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(START_MILLIS)));

    let (alice_secret, version) = {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let service = Confstore::open_with(test_config(), store, clock.clone(), None)
            .await
            .unwrap();
        let system = Principal::new("system");
        let alice = service.setup_client(&system, "alice", "Alice").await.unwrap();
        let principal = Principal::new("alice");

        service
            .add_values(&principal, ValueKind::Secret, &[NewValue::new("db.password", "p1")])
            .await
            .unwrap();
        clock.advance(10);
        service
            .add_values(&principal, ValueKind::Secret, &[NewValue::new("db.password", "p2")])
            .await
            .unwrap();

        let history: Vec<_> = service
            .values(ValueKind::Secret)
            .get_history("db.password")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        (alice.client_secret, history[1].version.clone())
    };

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let service = Confstore::open_with(test_config(), store, clock.clone(), None)
        .await
        .unwrap();

    let issuer = TokenIssuer::new(
        "alice",
        &alice_secret,
        Duration::from_secs(60),
        clock.clone(),
    );
    let alice = service.authenticate(&issuer.token().unwrap()).await.unwrap();

    let values = service
        .get_values(&alice, ValueKind::Secret, None)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, "p2");

    let first = service
        .get_value(&alice, ValueKind::Secret, "db.password", &version)
        .await
        .unwrap();
    assert_eq!(first.value, "p1");

    let diff = service
        .get_diff(&alice, ValueKind::Secret, Timestamp::EPOCH)
        .await
        .unwrap();
    assert_eq!(diff.len(), 1);
}
