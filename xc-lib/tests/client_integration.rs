//! Search client against a mock xeno-canto endpoint.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xc_lib::{Query, QueryBuilder, RetryPolicy, XcClient, XcError};

const ENDPOINT: &str = "/api/3/recordings";

fn recording(id: u32, gen: &str, sp: &str) -> Value {
    json!({
        "id": id.to_string(),
        "gen": gen,
        "sp": sp,
        "en": "Test Bird",
        "cnt": "Spain",
        "q": "A",
        "file": format!("https://xeno-canto.org/{id}/download"),
        "file-name": format!("XC{id}-test.mp3"),
    })
}

fn page_body(page: u32, num_pages: u32, total: u32, recordings: Vec<Value>) -> Value {
    json!({
        "numRecordings": total.to_string(),
        "numSpecies": "1",
        "page": page,
        "numPages": num_pages,
        "recordings": recordings,
    })
}

fn client(server: &MockServer) -> XcClient {
    XcClient::builder("test-key")
        .base_url(format!("{}{ENDPOINT}", server.uri()))
        .page_delay(Duration::ZERO)
        .retry_policy(
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40))
                .with_jitter(Duration::ZERO),
        )
        .build()
        .expect("client should build")
}

fn query() -> Query {
    QueryBuilder::new()
        .group("birds")
        .country("Spain")
        .quality("A")
        .build()
        .expect("query should build")
}

#[tokio::test]
async fn test_search_aggregates_pages_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            1,
            2,
            3,
            vec![recording(1, "Larus", "fuscus"), recording(2, "Larus", "fuscus")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            2,
            2,
            3,
            vec![recording(3, "Parus", "major")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).search(&query()).await.unwrap();

    assert_eq!(result.recordings.len(), 3);
    let ids: Vec<u64> = result.recordings.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(result.num_recordings, 3);
    assert_eq!(result.num_pages, 2);
}

#[tokio::test]
async fn test_search_sends_query_key_and_page_size() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("query", "grp:birds cnt:Spain q:A"))
        .and(query_param("key", "test-key"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1, 0, vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).search(&query()).await.unwrap();
    assert!(result.recordings.is_empty());
}

#[tokio::test]
async fn test_progress_callback_sees_every_page() {
    let server = MockServer::start().await;

    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                page,
                3,
                3,
                vec![recording(page, "Larus", "fuscus")],
            )))
            .mount(&server)
            .await;
    }

    let mut seen = Vec::new();
    let result = client(&server)
        .search_with_progress(&query(), |page, total| seen.push((page, total)))
        .await
        .unwrap();

    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(result.recordings.len(), 3);
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            1,
            1,
            1,
            vec![recording(7, "Larus", "fuscus")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).search(&query()).await.unwrap();
    assert_eq!(result.recordings.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1, 0, vec![])))
        .mount(&server)
        .await;

    assert!(client(&server).search(&query()).await.is_ok());
}

#[tokio::test]
async fn test_unauthorized_fails_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": "unauthorized", "message": "invalid key" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search(&query()).await.unwrap_err();
    assert!(matches!(err, XcError::Authentication(_)), "got {err:?}");
}

#[tokio::test]
async fn test_bad_request_is_rejected_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": "client_error", "message": "unknown tag" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search(&query()).await.unwrap_err();
    match err {
        XcError::RequestRejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "unknown tag");
        }
        other => panic!("expected RequestRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).search(&query()).await.unwrap_err();
    match err {
        XcError::TransientNetwork { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected TransientNetwork, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search(&query()).await.unwrap_err();
    assert!(matches!(err, XcError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_recording_without_id_is_malformed() {
    let server = MockServer::start().await;

    let mut broken = recording(1, "Larus", "fuscus");
    broken.as_object_mut().unwrap().remove("id");
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1, 1, vec![broken])))
        .mount(&server)
        .await;

    let err = client(&server).search(&query()).await.unwrap_err();
    assert!(matches!(err, XcError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_max_results_truncates_and_stops_paging() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            1,
            5,
            10,
            vec![
                recording(1, "Larus", "fuscus"),
                recording(2, "Larus", "fuscus"),
                recording(3, "Larus", "fuscus"),
            ],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, 5, 10, vec![])))
        .expect(0)
        .mount(&server)
        .await;

    let client = XcClient::builder("test-key")
        .base_url(format!("{}{ENDPOINT}", server.uri()))
        .page_delay(Duration::ZERO)
        .max_results(Some(2))
        .build()
        .unwrap();

    let result = client.search(&query()).await.unwrap();
    assert_eq!(result.recordings.len(), 2);
}

#[tokio::test]
async fn test_summary_uses_minimum_page_size() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("per_page", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numRecordings": "1234",
            "numSpecies": "56",
            "page": 1,
            "numPages": 25,
            "recordings": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server).summary(&query()).await.unwrap();
    assert_eq!(summary.num_recordings, 1234);
    assert_eq!(summary.num_species, 56);
    assert_eq!(summary.num_pages, 25);
}

fn impatient_client(server: &MockServer) -> XcClient {
    XcClient::builder("test-key")
        .base_url(format!("{}{ENDPOINT}", server.uri()))
        .page_delay(Duration::ZERO)
        .timeout(Duration::from_millis(100))
        .retry_policy(
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40))
                .with_jitter(Duration::ZERO),
        )
        .build()
        .expect("client should build")
}

#[tokio::test]
async fn test_timeout_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(1, 1, 0, vec![]))
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            1,
            1,
            1,
            vec![recording(9, "Larus", "fuscus")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let result = impatient_client(&server).search(&query()).await.unwrap();
    assert_eq!(result.recordings.len(), 1);
}

#[tokio::test]
async fn test_persistent_timeout_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(1, 1, 0, vec![]))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = impatient_client(&server).search(&query()).await.unwrap_err();
    match err {
        XcError::TransientNetwork { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("timed out"), "got {message}");
        }
        other => panic!("expected TransientNetwork, got {other:?}"),
    }
}

#[tokio::test]
async fn test_page_delay_separates_page_requests() {
    let server = MockServer::start().await;

    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                page,
                2,
                2,
                vec![recording(page, "Larus", "fuscus")],
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let delay = Duration::from_millis(250);
    let client = XcClient::builder("test-key")
        .base_url(format!("{}{ENDPOINT}", server.uri()))
        .page_delay(delay)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = client.search(&query()).await.unwrap();
    assert_eq!(result.recordings.len(), 2);
    assert!(started.elapsed() >= delay, "took {:?}", started.elapsed());
}
