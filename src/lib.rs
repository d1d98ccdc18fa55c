//! Azure Storage Integration Module
//!
//! Request execution core for Azure Storage: every operation runs as a
//! [`StorageCommand`] through an [`Executor`] that signs each attempt, records its
//! outcome, and consults a retry policy to decide whether to try again, where,
//! and after how long.
//!
//! # Features
//!
//! - **Retry policies**: linear and exponential backoff with jitter, per-location
//!   interval alignment, or no retry at all
//! - **Replica failover**: primary/secondary location modes for read-access
//!   geo-redundant accounts
//! - **Operation context**: client request id, per-attempt results, request hooks
//! - **Authorization**: Shared Key, shared access signatures and bearer tokens
//! - **Deadlines**: a maximum execution time bounding attempts and waits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use azure_storage::{LocationMode, RequestOptions, StorageClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), azure_storage::StorageError> {
//!     let client = azure_storage::create_client_from_connection_string(
//!         "DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey=a2V5",
//!     )?;
//!
//!     let options = RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary);
//!     let context = client.operation_context();
//!     let exists = client
//!         .blobs()
//!         .container_exists("photos", &options, &context)
//!         .await?;
//!
//!     println!("exists: {} after {} attempt(s)", exists, context.request_result_count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod location;
pub mod mocks;
pub mod operation;
pub mod resilience;
pub mod services;
pub mod signing;
pub mod transport;
pub mod types;
pub mod xml;

// Re-export main types at crate root
pub use client::{StorageClient, StorageClientBuilder, StorageClientImpl};
pub use config::{RequestOptions, StorageConfig, StorageConfigBuilder};
pub use credentials::StorageCredentials;
pub use error::{
    ConfigurationError, NetworkError, RequestError, ResponseError, ServiceError, SigningError,
    StorageError, TransferError,
};
pub use executor::{check_success, BodyDescriptor, Executor, RequestBody, StorageCommand};
pub use location::{CommandLocationMode, LocationMode, StorageLocation, StorageUri};
pub use operation::{ClientLogLevel, ExtendedError, OperationContext, RequestResult};
pub use resilience::{
    ExponentialRetryPolicy, LinearRetryPolicy, NoRetryPolicy, RetryContext, RetryInfo,
    RetryPolicy,
};
pub use services::BlobService;
pub use signing::{RequestSigner, SharedKeySigner};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportSettings};
pub use types::{
    BlobItem, BlobProperties, ContinuationToken, DownloadedBlob, ListBlobsOptions,
    ListBlobsSegment,
};

/// Create a new client from an account connection string.
///
/// # Example
///
/// ```rust,no_run
/// let client = azure_storage::create_client_from_connection_string("UseDevelopmentStorage=true")?;
/// # Ok::<(), azure_storage::StorageError>(())
/// ```
pub fn create_client_from_connection_string(
    connection_string: &str,
) -> Result<impl StorageClient> {
    StorageClientBuilder::new()
        .connection_string(connection_string)
        .build()
}

/// Create a new client with explicit configuration.
///
/// # Example
///
/// ```rust,no_run
/// use azure_storage::{StorageConfig, StorageCredentials};
///
/// let config = StorageConfig::builder()
///     .credentials(StorageCredentials::shared_key("myaccount", "a2V5"))
///     .build()?;
///
/// let client = azure_storage::create_client(config)?;
/// # Ok::<(), azure_storage::StorageError>(())
/// ```
pub fn create_client(config: StorageConfig) -> Result<impl StorageClient> {
    StorageClientBuilder::new().config(config).build()
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
