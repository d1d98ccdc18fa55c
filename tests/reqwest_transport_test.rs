//! End-to-end tests over the reqwest transport against a local mock server.

use azure_storage::error::StorageError;
use azure_storage::mocks::TestFixtures;
use azure_storage::resilience::{LinearRetryPolicy, NoRetryPolicy};
use azure_storage::{
    LocationMode, RequestOptions, StorageClient, StorageClientBuilder, StorageClientImpl,
    StorageConfig, StorageCredentials,
};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(primary: &str, secondary: Option<&str>) -> StorageClientImpl {
    let config = StorageConfig::builder()
        .credentials(StorageCredentials::shared_key("myaccount", "a2V5"))
        .blob_endpoint(primary, secondary)
        .default_request_options(
            RequestOptions::new()
                .with_retry_policy(LinearRetryPolicy::new(Duration::from_millis(10), 3)),
        )
        .build()
        .expect("Failed to build config");

    StorageClientBuilder::new()
        .config(config)
        .build()
        .expect("Failed to build client")
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, values)| values.last().as_str().to_string())
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/photos"))
        .and(query_param("restype", "container"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/photos"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), None);
    let context = client.operation_context();

    let exists = client
        .blobs()
        .container_exists("photos", &RequestOptions::new(), &context)
        .await
        .unwrap();

    assert!(exists);
    assert_eq!(context.request_result_count(), 3);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(
            header(request, "x-ms-client-request-id"),
            Some(context.client_request_id())
        );
        assert!(header(request, "authorization")
            .unwrap()
            .starts_with("SharedKey myaccount:"));
        assert!(header(request, "x-ms-date").is_some());
    }
}

#[tokio::test]
async fn test_read_fails_over_to_secondary() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&secondary)
        .await;

    let client = client_for(&primary.uri(), Some(&secondary.uri()));
    let options = RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary);

    let exists = client
        .blobs()
        .container_exists("photos", &options, &client.operation_context())
        .await
        .unwrap();

    assert!(exists);
    assert_eq!(primary.received_requests().await.unwrap().len(), 1);
    assert_eq!(secondary.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_service_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/photos"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ms-request-id", "req-403")
                .set_body_string(TestFixtures::error_xml(
                    "AuthenticationFailed",
                    "Server failed to authenticate the request.",
                )),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), None);

    let err = client
        .blobs()
        .create_container("photos", &RequestOptions::new(), &client.operation_context())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Service(_)));
    assert_eq!(err.status_code(), Some(403));
    assert_eq!(err.service_error_code(), Some("AuthenticationFailed"));
    assert_eq!(err.request_id(), Some("req-403"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_download_checks_md5() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/photos/a.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-MD5", "XUFAKrxLKna5cZ2REBfFkg==")
                .set_body_string("hello"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), None);

    let blob = client
        .blobs()
        .download_blob("photos", "a.txt", &RequestOptions::new(), &client.operation_context())
        .await
        .unwrap();

    assert_eq!(&blob.content[..], b"hello");
    assert_eq!(blob.properties.content_length, 5);
}

#[tokio::test]
async fn test_connection_failure_is_recorded() {
    // Nothing listens on port 1.
    let client = client_for("http://127.0.0.1:1", None);
    let context = client.operation_context();

    let err = client
        .blobs()
        .container_exists(
            "photos",
            &RequestOptions::new().with_retry_policy(NoRetryPolicy),
            &context,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Network { .. }));
    assert_eq!(err.status_code(), None);
    assert_eq!(context.request_result_count(), 1);
    assert!(!context.last_request_result().unwrap().is_response_available());
}
