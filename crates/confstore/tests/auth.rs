//! Client setup, secret protection, and bearer tokens end to end.

use std::time::Duration;

use confstore::{Error, TokenIssuer};
use confstore_testkit::TestService;

#[tokio::test]
async fn client_secret_roundtrips_with_encryption() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;

    let stored = fixture
        .service
        .clients()
        .get_client("alice")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.protected_secret, alice.secret);
    assert_eq!(
        fixture
            .service
            .clients()
            .receive_client_secret(&stored)
            .await
            .unwrap(),
        alice.secret
    );
}

#[tokio::test]
async fn client_secret_roundtrips_with_vault() {
    let fixture = TestService::with_vault().await;
    let alice = fixture.client("alice").await;

    let stored = fixture
        .service
        .clients()
        .get_client("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.protected_secret.starts_with("clients-"));
    assert_eq!(
        fixture
            .service
            .clients()
            .receive_client_secret(&stored)
            .await
            .unwrap(),
        alice.secret
    );

    let token = fixture.issuer(&alice).token().unwrap();
    assert!(fixture.service.authenticate(&token).await.is_ok());
}

#[tokio::test]
async fn token_is_valid_until_expiry() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;
    let issuer = TokenIssuer::new(
        alice.client_id.clone(),
        &alice.secret,
        Duration::from_secs(120),
        fixture.clock.clone(),
    );
    let token = issuer.token().unwrap();

    let principal = fixture.service.authenticate(&token).await.unwrap();
    assert_eq!(principal.client_id, "alice");

    fixture.advance(119_000);
    assert!(fixture.service.authenticate(&token).await.is_ok());

    fixture.advance(1_000);
    assert!(matches!(
        fixture.service.authenticate(&token).await,
        Err(Error::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn token_of_one_client_cannot_claim_another() {
    let fixture = TestService::new().await;
    let alice = fixture.client("alice").await;
    fixture.client("bob").await;

    let impostor = TokenIssuer::new(
        "bob",
        &alice.secret,
        Duration::from_secs(60),
        fixture.clock.clone(),
    );
    assert!(matches!(
        fixture.service.authenticate(&impostor.token().unwrap()).await,
        Err(Error::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn system_client_authenticates_from_config() {
    let fixture = TestService::new().await;
    let header = fixture.issuer(&fixture.system).bearer().unwrap();

    let principal = fixture.service.authenticate_header(&header).await.unwrap();
    assert_eq!(principal, fixture.system.principal);

    let created = fixture
        .service
        .setup_client(&principal, "billing", "Billing")
        .await
        .unwrap();
    assert_eq!(created.client_id, "billing");
    assert!(!format!("{:?}", created).contains(&created.client_secret));
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let fixture = TestService::new().await;
    for token in ["", "abc", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30.x"] {
        assert!(matches!(
            fixture.service.authenticate(token).await,
            Err(Error::Unauthenticated(_))
        ));
    }
}
