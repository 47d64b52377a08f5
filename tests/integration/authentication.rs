//! Integration tests for the login handshake

use super::support::{self, CUSTOMER_ID, PASSWORD, SESSION_COOKIE, USERNAME};
use irace_stats::stats::auth::{AuthError, AuthState, Authenticator};
use irace_stats::stats::reference::ReferenceCategory;
use irace_stats::stats::ScrapeError;
use irace_stats::{Stats, StatsError, ThrottledTransport};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_builds_session_and_reference() {
    let server = MockServer::start().await;
    let stats = support::login(&server).await;

    assert_eq!(stats.customer_id(), CUSTOMER_ID);
    assert_eq!(stats.session().cookie(), SESSION_COOKIE);
    assert!(stats.session().cookie().contains("irsso_members"));

    for category in ReferenceCategory::ALL {
        assert!(
            !stats.reference().get(category).is_null(),
            "{category} should be loaded"
        );
    }
    assert!(stats.reference().has_car(67));
    assert!(!stats.reference().has_car(999));
}

#[tokio::test]
async fn test_login_without_marker_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/membersite/Login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=xyz; Path=/")
                .set_body_string(support::home_page()),
        )
        .mount(&server)
        .await;

    let result = Stats::authenticate(support::config(&server), USERNAME, PASSWORD).await;

    match result {
        Err(StatsError::Auth(AuthError::MissingSessionMarker { username })) => {
            assert_eq!(username, USERNAME)
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("login should fail"),
    }
}

#[tokio::test]
async fn test_login_rejected_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/membersite/Login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = Stats::authenticate(support::config(&server), USERNAME, PASSWORD).await;
    assert!(matches!(
        result,
        Err(StatsError::Auth(AuthError::Rejected { status: 503 }))
    ));
}

#[tokio::test]
async fn test_login_missing_customer_id() {
    let server = MockServer::start().await;
    let home = support::home_page().replace("js_custid", "js_other");
    support::mount_login_with(&server, home).await;

    let result = Stats::authenticate(support::config(&server), USERNAME, PASSWORD).await;
    assert!(matches!(
        result,
        Err(StatsError::Auth(AuthError::CustomerId(ScrapeError::CustomerIdNotFound)))
    ));
}

#[tokio::test]
async fn test_login_missing_reference_listing() {
    let server = MockServer::start().await;
    let home = support::home_page_with(&[("TrackListing", "[]"), ("CarListing", "[]")]);
    support::mount_login_with(&server, home).await;

    let result = Stats::authenticate(support::config(&server), USERNAME, PASSWORD).await;
    match result {
        Err(StatsError::Auth(AuthError::ReferenceData(e))) => {
            assert_eq!(e.category, ReferenceCategory::CarClass);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("login should fail"),
    }
}

#[tokio::test]
async fn test_authenticator_runs_once() {
    let server = MockServer::start().await;
    support::mount_login(&server).await;

    let transport = ThrottledTransport::open(support::config(&server).transport).unwrap();
    let mut authenticator = Authenticator::new(transport, server.uri());
    assert_eq!(authenticator.state(), AuthState::Unauthenticated);

    let outcome = authenticator.authenticate(USERNAME, PASSWORD).await.unwrap();
    assert_eq!(outcome.session.customer_id(), CUSTOMER_ID);
    assert_eq!(authenticator.state(), AuthState::Authenticated);

    let again = authenticator.authenticate(USERNAME, PASSWORD).await;
    assert!(matches!(
        again,
        Err(AuthError::AlreadyAttempted(AuthState::Authenticated))
    ));
}

#[tokio::test]
async fn test_failed_authenticator_stays_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/membersite/Login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = ThrottledTransport::open(support::config(&server).transport).unwrap();
    let mut authenticator = Authenticator::new(transport, server.uri());

    assert!(authenticator.authenticate(USERNAME, PASSWORD).await.is_err());
    assert_eq!(authenticator.state(), AuthState::Failed);
    assert!(matches!(
        authenticator.authenticate(USERNAME, PASSWORD).await,
        Err(AuthError::AlreadyAttempted(AuthState::Failed))
    ));
}

#[tokio::test]
async fn test_shared_transport_serves_two_clients() {
    let server = MockServer::start().await;
    support::mount_login(&server).await;

    let config = support::config(&server);
    let transport = ThrottledTransport::open(config.transport.clone()).unwrap();
    let first = Stats::authenticate_with(transport.clone(), config.clone(), USERNAME, PASSWORD)
        .await
        .unwrap();
    let second = Stats::authenticate_with(transport.clone(), config, USERNAME, PASSWORD)
        .await
        .unwrap();

    assert!(std::sync::Arc::ptr_eq(first.transport(), second.transport()));

    drop(first);
    assert!(!transport.is_shut_down());

    second.shutdown();
    assert!(transport.is_shut_down());
}
