//! Record submission against in-process matching servers.

use std::time::Duration;

use serde_json::{json, Value};

use collector_bridge::records::SubmitOutcome;
use collector_bridge::{Bridge, BridgeError};

mod common;
use common::{upstream_config, MockUpstream};

async fn send_cv(client: &reqwest::Client, base: &str, record: &Value) -> SubmitOutcome {
    let response = client
        .post(format!("{base}/send_cv"))
        .json(record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_primary_match_is_cached_and_not_resent() {
    let primary = MockUpstream::start().await;
    primary.set_has_matches(true);

    let bridge = Bridge::prepare(upstream_config(&primary, &[])).await.unwrap();
    let cache = bridge.state().cache.clone();
    let running = bridge.start().await.unwrap();
    let client = reqwest::Client::new();

    let record = json!({ "referenceNumber": "abc-1", "presentation": { "name": "Jane" } });
    let first = send_cv(&client, &running.base_url(), &record).await;
    assert_eq!(
        first,
        SubmitOutcome {
            already_sent: false,
            has_matches: true
        }
    );

    let remaining = cache.remaining("abc-1").unwrap();
    assert!(remaining > Duration::from_secs(71 * 3600));
    assert!(remaining <= Duration::from_secs(72 * 3600));

    let second = send_cv(&client, &running.base_url(), &record).await;
    assert!(second.already_sent);
    assert_eq!(primary.scan_calls(), 1);

    // record forwarded verbatim under "cv"
    assert_eq!(primary.scanned_bodies(), vec![json!({ "cv": record })]);

    running.shutdown().await;
}

#[tokio::test]
async fn test_alternative_match_does_not_count() {
    let primary = MockUpstream::start().await;
    let alternative = MockUpstream::start().await;
    alternative.set_has_matches(true);

    let bridge = Bridge::prepare(upstream_config(&primary, &[&alternative])).await.unwrap();
    let cache = bridge.state().cache.clone();
    let running = bridge.start().await.unwrap();
    let client = reqwest::Client::new();

    let outcome = send_cv(&client, &running.base_url(), &json!({ "referenceNumber": "xyz" })).await;
    assert_eq!(
        outcome,
        SubmitOutcome {
            already_sent: false,
            has_matches: false
        }
    );
    assert!(!cache.exists("xyz"));
    assert_eq!(primary.scan_calls(), 1);
    assert_eq!(alternative.scan_calls(), 1);

    running.shutdown().await;
}

#[tokio::test]
async fn test_invalid_record_rejected_before_upstream() {
    let primary = MockUpstream::start().await;
    let bridge = Bridge::prepare(upstream_config(&primary, &[])).await.unwrap();
    let running = bridge.start().await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/send_cv", running.base_url()))
        .body(r#"{"name":"no reference"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "referenceNumber field does not exist");
    assert_eq!(primary.scan_calls(), 0);

    running.shutdown().await;
}

#[tokio::test]
async fn test_warm_up_marks_scanned_references_as_sent() {
    let primary = MockUpstream::start_with(vec![1], vec!["warm-1".into(), "warm-2".into()]).await;

    let bridge = Bridge::prepare(upstream_config(&primary, &[])).await.unwrap();
    assert!(bridge.state().cache.exists("warm-1"));
    assert!(bridge.state().cache.exists("warm-2"));

    let running = bridge.start().await.unwrap();
    let outcome = send_cv(
        &reqwest::Client::new(),
        &running.base_url(),
        &json!({ "referenceNumber": "warm-2" }),
    )
    .await;
    assert!(outcome.already_sent);
    assert_eq!(primary.scan_calls(), 0);

    running.shutdown().await;
}

#[tokio::test]
async fn test_key_without_scraper_role_aborts_startup() {
    let primary = MockUpstream::start_with(vec![2, 3], Vec::new()).await;

    let err = Bridge::prepare(upstream_config(&primary, &[])).await.err().unwrap();
    assert!(matches!(err, BridgeError::Configuration(_)), "{err}");
}

#[tokio::test]
async fn test_requests_carry_hashed_api_key() {
    let primary = MockUpstream::start().await;
    let _bridge = Bridge::prepare(upstream_config(&primary, &[])).await.unwrap();

    let authorization = primary.last_authorization().unwrap();
    let (scheme, credentials) = authorization.split_once(' ').unwrap();
    assert_eq!(scheme, "Basic");
    let (id, digest) = credentials.split_once(':').unwrap();
    assert_eq!(id, "key-id");
    assert_eq!(digest.len(), 128);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_failed_warm_up_aborts_startup() {
    let primary = MockUpstream::start().await;
    primary.set_fail_scanned_references(true);

    let err = Bridge::prepare(upstream_config(&primary, &[])).await.err().unwrap();
    assert!(
        matches!(err, BridgeError::Upstream { status: 500, ref message } if message == "database offline"),
        "{err}"
    );
}

#[tokio::test]
async fn test_failing_alternative_fails_whole_submission() {
    let primary = MockUpstream::start().await;
    let alternative = MockUpstream::start().await;
    primary.set_has_matches(true);
    alternative.set_fail_scan_cv(true);

    let bridge = Bridge::prepare(upstream_config(&primary, &[&alternative])).await.unwrap();
    let cache = bridge.state().cache.clone();
    let running = bridge.start().await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/send_cv", running.base_url()))
        .json(&json!({ "referenceNumber": "split-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "scan failed");

    assert!(!cache.exists("split-1"));
    assert_eq!(primary.scan_calls(), 1);
    assert_eq!(alternative.scan_calls(), 1);

    running.shutdown().await;
}
