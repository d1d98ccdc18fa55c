//! Blob service operations.

use super::{service_request, ServiceCore};
use crate::config::RequestOptions;
use crate::error::{RequestError, ResponseError, ServiceError, StorageError};
use crate::executor::{check_success, BodyDescriptor, RequestBody, StorageCommand};
use crate::location::{CommandLocationMode, StorageUri};
use crate::operation::{OperationContext, RequestResult};
use crate::transport::HttpResponse;
use crate::types::*;
use crate::xml;
use std::sync::Arc;

/// Service for containers and block blobs.
pub struct BlobService {
    core: Arc<ServiceCore>,
}

impl BlobService {
    pub(crate) fn new(core: Arc<ServiceCore>) -> Self {
        Self { core }
    }

    fn resource_uri(&self, path: &str) -> Result<StorageUri, StorageError> {
        self.core.config().blob_endpoint.join(path)
    }

    /// Create a container.
    ///
    /// Returns `false` if the container already exists.
    pub async fn create_container(
        &self,
        container: &str,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<bool, StorageError> {
        let command = StorageCommand::new(
            self.resource_uri(container)?,
            |url, timeout, _| {
                Ok(service_request(
                    "PUT",
                    url,
                    &[("restype", "container".to_string())],
                    timeout,
                ))
            },
            |response, result, _| match response.status {
                201 => Ok(true),
                409 if result.extended_error().code() == "ContainerAlreadyExists" => Ok(false),
                _ => Err(ServiceError::from_result(result.clone()).into()),
            },
        )
        .with_signer(self.core.signer());

        self.core.execute(command, options, context).await
    }

    /// Check whether a container exists. May be served by the secondary.
    pub async fn container_exists(
        &self,
        container: &str,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<bool, StorageError> {
        let command = StorageCommand::new(
            self.resource_uri(container)?,
            |url, timeout, _| {
                Ok(service_request(
                    "HEAD",
                    url,
                    &[("restype", "container".to_string())],
                    timeout,
                ))
            },
            |response, result, _| match response.status {
                200 => Ok(true),
                404 => Ok(false),
                _ => Err(ServiceError::from_result(result.clone()).into()),
            },
        )
        .with_signer(self.core.signer())
        .with_location_mode(CommandLocationMode::PrimaryOrSecondary);

        self.core.execute(command, options, context).await
    }

    /// Delete a container.
    pub async fn delete_container(
        &self,
        container: &str,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<(), StorageError> {
        let command = StorageCommand::new(
            self.resource_uri(container)?,
            |url, timeout, _| {
                Ok(service_request(
                    "DELETE",
                    url,
                    &[("restype", "container".to_string())],
                    timeout,
                ))
            },
            |response, result, _| check_success(response, result),
        )
        .with_signer(self.core.signer());

        self.core.execute(command, options, context).await
    }

    /// List one segment of the blobs in a container.
    ///
    /// A continuation token pins the request to the location that served the
    /// previous segment.
    pub async fn list_blobs_segmented(
        &self,
        container: &str,
        list_options: &ListBlobsOptions,
        continuation: Option<&ContinuationToken>,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<ListBlobsSegment, StorageError> {
        let mut query = vec![
            ("restype", "container".to_string()),
            ("comp", "list".to_string()),
        ];
        if let Some(prefix) = &list_options.prefix {
            query.push(("prefix", prefix.clone()));
        }
        if let Some(delimiter) = &list_options.delimiter {
            query.push(("delimiter", delimiter.clone()));
        }
        if let Some(max_results) = list_options.max_results {
            query.push(("maxresults", max_results.to_string()));
        }
        if let Some(token) = continuation {
            query.push(("marker", token.next_marker().to_string()));
        }

        let mut command = StorageCommand::new(
            self.resource_uri(container)?,
            move |url, timeout, _| Ok(service_request("GET", url, &query, timeout)),
            |response, result, _| {
                check_success(response, result).map(|_| ListBlobsSegment::default())
            },
        )
        .with_signer(self.core.signer())
        .with_location_mode(CommandLocationMode::PrimaryOrSecondary)
        .with_postprocess(|response, result, _, _| Box::pin(read_segment(response, result)));

        if let Some(token) = continuation {
            command = command.with_location_hint(token.target_location());
        }

        self.core.execute(command, options, context).await
    }

    /// Upload a block blob in a single request.
    ///
    /// A streamed body is sent once; if the attempt fails the upload is not
    /// retried.
    pub async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        body: RequestBody,
        content_type: Option<&str>,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<BlobProperties, StorageError> {
        let length = body.len().ok_or_else(|| RequestError::Validation {
            message: "upload_blob requires a body of known length".to_string(),
        })?;
        let content_type = content_type.map(String::from);

        let command = StorageCommand::new(
            self.resource_uri(&format!("{}/{}", container, blob))?,
            move |url, timeout, _| {
                let mut request = service_request("PUT", url, &[], timeout)
                    .with_header("x-ms-blob-type", "BlockBlob")
                    .with_header("Content-Length", length.to_string());
                if let Some(content_type) = &content_type {
                    request.set_header("x-ms-blob-content-type", content_type.as_str());
                }
                Ok(request)
            },
            move |response, result, _| {
                check_success(response, result)?;
                let mut properties = BlobProperties::from_response(response);
                properties.content_length = length;
                properties.blob_type = Some("BlockBlob".to_string());
                Ok(properties)
            },
        )
        .with_signer(self.core.signer())
        .with_body(body);

        self.core.execute(command, options, context).await
    }

    /// Download a blob. May be served by the secondary.
    ///
    /// The body length is checked against `Content-Length`, and its MD5 against
    /// `Content-MD5` when the service returns one.
    pub async fn download_blob(
        &self,
        container: &str,
        blob: &str,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<DownloadedBlob, StorageError> {
        let command = StorageCommand::new(
            self.resource_uri(&format!("{}/{}", container, blob))?,
            |url, timeout, _| Ok(service_request("GET", url, &[], timeout)),
            |response, result, _| {
                check_success(response, result)?;
                Ok(DownloadedBlob {
                    content: Default::default(),
                    properties: BlobProperties::from_response(response),
                })
            },
        )
        .with_signer(self.core.signer())
        .with_location_mode(CommandLocationMode::PrimaryOrSecondary)
        .with_response_md5(true)
        .with_postprocess(|response, result, descriptor, _| {
            Box::pin(read_download(response, result, descriptor))
        });

        self.core.execute(command, options, context).await
    }

    /// Read a blob's system properties. May be served by the secondary.
    pub async fn get_blob_properties(
        &self,
        container: &str,
        blob: &str,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<BlobProperties, StorageError> {
        let command = StorageCommand::new(
            self.resource_uri(&format!("{}/{}", container, blob))?,
            |url, timeout, _| Ok(service_request("HEAD", url, &[], timeout)),
            |response, result, _| {
                check_success(response, result)?;
                Ok(BlobProperties::from_response(response))
            },
        )
        .with_signer(self.core.signer())
        .with_location_mode(CommandLocationMode::PrimaryOrSecondary);

        self.core.execute(command, options, context).await
    }
}

async fn read_segment(
    response: HttpResponse,
    result: RequestResult,
) -> Result<ListBlobsSegment, StorageError> {
    let body = std::str::from_utf8(&response.body).map_err(|e| ResponseError::XmlParseError {
        message: e.to_string(),
    })?;
    let page = xml::parse_list_blobs(body)?;

    Ok(ListBlobsSegment {
        blobs: page.blobs,
        prefixes: page.prefixes,
        continuation_token: page
            .next_marker
            .map(|marker| ContinuationToken::new(marker, result.target_location())),
    })
}

async fn read_download(
    response: HttpResponse,
    result: RequestResult,
    descriptor: BodyDescriptor,
) -> Result<DownloadedBlob, StorageError> {
    if let Some(expected) = result.content_length() {
        if expected != descriptor.length() {
            return Err(ResponseError::IncorrectLength {
                expected,
                received: descriptor.length(),
            }
            .into());
        }
    }
    if let (Some(expected), Some(actual)) = (result.content_md5(), descriptor.md5()) {
        if expected != actual {
            return Err(ResponseError::ChecksumMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
    }

    let properties = BlobProperties::from_response(&response);
    Ok(DownloadedBlob {
        content: response.body,
        properties,
    })
}

impl std::fmt::Debug for BlobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobService")
            .field("endpoint", &self.core.config().blob_endpoint)
            .finish()
    }
}
