//! Integration tests for BlobService.

use azure_storage::error::{ResponseError, StorageError};
use azure_storage::mocks::{MockResponse, MockTransport, TestFixtures};
use azure_storage::resilience::{LinearRetryPolicy, NoRetryPolicy};
use azure_storage::types::*;
use azure_storage::{
    LocationMode, RequestBody, RequestOptions, StorageClient, StorageClientBuilder,
    StorageClientImpl, StorageConfig, StorageCredentials, StorageLocation,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

const PRIMARY_HOST: &str = "myaccount.blob.core.windows.net";
const SECONDARY_HOST: &str = "myaccount-secondary.blob.core.windows.net";

fn create_test_client(transport: Arc<MockTransport>) -> StorageClientImpl {
    create_test_client_with(transport, RequestOptions::new())
}

fn create_test_client_with(
    transport: Arc<MockTransport>,
    defaults: RequestOptions,
) -> StorageClientImpl {
    let config = StorageConfig::builder()
        .credentials(StorageCredentials::shared_key("myaccount", "a2V5"))
        .default_request_options(
            defaults.merge(
                &RequestOptions::new()
                    .with_retry_policy(LinearRetryPolicy::new(Duration::from_millis(5), 3)),
            ),
        )
        .build()
        .unwrap();

    StorageClientBuilder::new()
        .config(config)
        .transport(transport)
        .build()
        .unwrap()
}

fn no_options() -> RequestOptions {
    RequestOptions::new()
}

#[tokio::test]
async fn test_create_container_success() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::status(201)]));
    let client = create_test_client(transport.clone());
    let context = client.operation_context();

    let created = client
        .blobs()
        .create_container("photos", &no_options(), &context)
        .await
        .unwrap();

    assert!(created);
    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "PUT");
    assert_eq!(
        request.url,
        "https://myaccount.blob.core.windows.net/photos?restype=container"
    );
    assert_eq!(request.body, Some(Bytes::new()));
    assert!(request.get_header("x-ms-version").is_some());
    assert!(request.get_header("x-ms-date").is_some());
    assert!(request
        .get_header("authorization")
        .unwrap()
        .starts_with("SharedKey myaccount:"));
}

#[tokio::test]
async fn test_create_container_already_exists() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::with_error(
        409,
        "ContainerAlreadyExists",
        "The specified container already exists.",
    )]));
    let client = create_test_client(transport.clone());

    let created = client
        .blobs()
        .create_container("photos", &no_options(), &client.operation_context())
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_create_container_being_deleted_is_an_error() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::with_error(
        409,
        "ContainerBeingDeleted",
        "The specified container is being deleted.",
    )]));
    let client = create_test_client(transport);

    let err = client
        .blobs()
        .create_container("photos", &no_options(), &client.operation_context())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Service(_)));
    assert_eq!(err.service_error_code(), Some("ContainerBeingDeleted"));
}

#[tokio::test]
async fn test_container_exists_not_found() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::status(404)]));
    let client = create_test_client(transport.clone());

    let exists = client
        .blobs()
        .container_exists("photos", &no_options(), &client.operation_context())
        .await
        .unwrap();

    assert!(!exists);
    assert_eq!(transport.last_request().unwrap().method, "HEAD");
}

#[tokio::test]
async fn test_container_exists_reads_from_secondary() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::status(503),
        MockResponse::ok(),
    ]));
    let client = create_test_client(transport.clone());
    let options = RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary);
    let context = client.operation_context();

    let exists = client
        .blobs()
        .container_exists("photos", &options, &context)
        .await
        .unwrap();

    assert!(exists);
    assert_eq!(transport.requested_hosts(), vec![PRIMARY_HOST, SECONDARY_HOST]);
    assert_eq!(
        context.last_request_result().unwrap().target_location(),
        StorageLocation::Secondary
    );
}

#[tokio::test]
async fn test_writes_stay_on_primary() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::status(500),
        MockResponse::status(202),
    ]));
    let client = create_test_client(transport.clone());
    let options = RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary);

    client
        .blobs()
        .delete_container("photos", &options, &client.operation_context())
        .await
        .unwrap();

    assert_eq!(transport.requested_hosts(), vec![PRIMARY_HOST, PRIMARY_HOST]);
    assert_eq!(transport.last_request().unwrap().method, "DELETE");
}

#[tokio::test]
async fn test_list_blobs_segment_and_continuation() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::status(500),
        MockResponse::ok_with_body(TestFixtures::list_blobs_xml(
            &["a.txt", "b.txt"],
            Some("marker-2"),
        )),
        MockResponse::ok_with_body(TestFixtures::list_blobs_xml(&["c.txt"], None)),
    ]));
    let client = create_test_client_with(
        transport.clone(),
        RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary),
    );
    let list_options = ListBlobsOptions::new().prefix("").max_results(2);

    let first = client
        .blobs()
        .list_blobs_segmented(
            "photos",
            &list_options,
            None,
            &no_options(),
            &client.operation_context(),
        )
        .await
        .unwrap();

    let names: Vec<&str> = first.blobs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(first.blobs[0].properties.content_length, 5);
    let token = first.continuation_token.unwrap();
    assert_eq!(token.next_marker(), "marker-2");
    assert_eq!(token.target_location(), StorageLocation::Secondary);

    let second = client
        .blobs()
        .list_blobs_segmented(
            "photos",
            &list_options,
            Some(&token),
            &no_options(),
            &client.operation_context(),
        )
        .await
        .unwrap();

    assert_eq!(second.blobs.len(), 1);
    assert!(second.continuation_token.is_none());

    let request = transport.last_request().unwrap();
    assert!(request.url.starts_with(&format!("https://{}/photos?", SECONDARY_HOST)));
    assert!(request.url.contains("comp=list"));
    assert!(request.url.contains("marker=marker-2"));
    assert!(request.url.contains("maxresults=2"));
}

#[tokio::test]
async fn test_list_blobs_invalid_xml_is_reported() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
        vec![0xffu8, 0xfe, 0xfd],
    )]));
    let client = create_test_client(transport);

    let err = client
        .blobs()
        .list_blobs_segmented(
            "photos",
            &ListBlobsOptions::new(),
            None,
            &RequestOptions::new().with_retry_policy(NoRetryPolicy),
            &client.operation_context(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Response {
            source: ResponseError::XmlParseError { .. },
            ..
        }
    ));
    assert_eq!(err.status_code(), Some(200));
}

#[tokio::test]
async fn test_upload_blob_buffered_is_retried() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::status(500),
        MockResponse::status(201).with_header("ETag", "\"0x8D1\""),
    ]));
    let client = create_test_client(transport.clone());

    let properties = client
        .blobs()
        .upload_blob(
            "photos",
            "dir/cat.jpg",
            RequestBody::buffered("hello"),
            Some("image/jpeg"),
            &no_options(),
            &client.operation_context(),
        )
        .await
        .unwrap();

    assert_eq!(properties.etag.as_deref(), Some("\"0x8D1\""));
    assert_eq!(properties.content_length, 5);
    assert_eq!(transport.request_count(), 2);

    let request = transport.last_request().unwrap();
    assert_eq!(
        request.url,
        "https://myaccount.blob.core.windows.net/photos/dir/cat.jpg"
    );
    assert_eq!(request.get_header("x-ms-blob-type"), Some("BlockBlob"));
    assert_eq!(request.get_header("content-length"), Some("5"));
    assert_eq!(request.get_header("x-ms-blob-content-type"), Some("image/jpeg"));
    assert_eq!(request.body, Some(Bytes::from("hello")));
}

#[tokio::test]
async fn test_upload_blob_stream_requires_length() {
    let transport = Arc::new(MockTransport::new());
    let client = create_test_client(transport.clone());
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from("x"))];

    let err = client
        .blobs()
        .upload_blob(
            "photos",
            "b",
            RequestBody::stream(futures::stream::iter(chunks), None),
            None,
            &no_options(),
            &client.operation_context(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Request(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_download_blob_validates_md5() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
        "hello",
    )
    .with_header("Content-Length", "5")
    .with_header("Content-MD5", "XUFAKrxLKna5cZ2REBfFkg==")
    .with_header("Content-Type", "text/plain")]));
    let client = create_test_client(transport);

    let blob = client
        .blobs()
        .download_blob("photos", "a.txt", &no_options(), &client.operation_context())
        .await
        .unwrap();

    assert_eq!(blob.content, Bytes::from("hello"));
    assert_eq!(blob.properties.content_type.as_deref(), Some("text/plain"));
    assert_eq!(blob.properties.content_length, 5);
}

#[tokio::test]
async fn test_download_blob_corruption_is_retried_then_reported() {
    let transport = Arc::new(MockTransport::with_default(
        MockResponse::ok_with_body("hellx").with_header("Content-MD5", "XUFAKrxLKna5cZ2REBfFkg=="),
    ));
    let client = create_test_client(transport.clone());
    let context = client.operation_context();

    let err = client
        .blobs()
        .download_blob("photos", "a.txt", &no_options(), &context)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Response {
            source: ResponseError::ChecksumMismatch { .. },
            ..
        }
    ));
    // First attempt plus three retries.
    assert_eq!(transport.request_count(), 4);
    assert_eq!(context.request_result_count(), 4);
}

#[tokio::test]
async fn test_download_blob_incorrect_length() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
        "hello",
    )
    .with_header("Content-Length", "10")]));
    let client = create_test_client(transport);

    let err = client
        .blobs()
        .download_blob(
            "photos",
            "a.txt",
            &RequestOptions::new().with_retry_policy(NoRetryPolicy),
            &client.operation_context(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Response {
            source: ResponseError::IncorrectLength {
                expected: 10,
                received: 5
            },
            ..
        }
    ));
}

#[tokio::test]
async fn test_get_blob_properties() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok()
        .with_header("Content-Length", "1024")
        .with_header("ETag", "\"0x8D2\"")
        .with_header("Last-Modified", "Mon, 15 Jan 2024 10:30:00 GMT")
        .with_header("x-ms-blob-type", "BlockBlob")]));
    let client = create_test_client(transport.clone());

    let properties = client
        .blobs()
        .get_blob_properties("photos", "a.txt", &no_options(), &client.operation_context())
        .await
        .unwrap();

    assert_eq!(properties.content_length, 1024);
    assert_eq!(properties.etag.as_deref(), Some("\"0x8D2\""));
    assert_eq!(properties.blob_type.as_deref(), Some("BlockBlob"));
    assert!(properties.last_modified.is_some());
    assert_eq!(transport.last_request().unwrap().method, "HEAD");
}

#[tokio::test]
async fn test_sas_credentials_sign_the_query() {
    let transport = Arc::new(MockTransport::with_default(MockResponse::ok()));
    let config = StorageConfig::builder()
        .account_name("myaccount")
        .credentials(StorageCredentials::sas_token("?sv=2021-08-06&sig=abc"))
        .build()
        .unwrap();
    let client = StorageClientBuilder::new()
        .config(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    client
        .blobs()
        .container_exists("photos", &no_options(), &client.operation_context())
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert!(request.url.contains("restype=container"));
    assert!(request.url.contains("sig=abc"));
    assert!(request.get_header("authorization").is_none());
}
