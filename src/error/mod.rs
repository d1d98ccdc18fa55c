//! Error types for the storage integration.
//!
//! Errors are grouped by the concern that raised them. Failures produced while an
//! attempt was in flight carry that attempt's [`RequestResult`], so a caller can
//! always inspect what the service answered for the attempt that ended the
//! operation.

mod mapping;

pub use mapping::parse_extended_error;

use crate::operation::{ExtendedError, RequestResult};
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the storage integration.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Request signing errors.
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// Request validation and client-classified errors.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// No response was obtained from the service.
    #[error("Network error: {source}")]
    Network {
        /// Underlying transport failure.
        #[source]
        source: NetworkError,
        /// Result of the attempt that failed, once recorded.
        result: Option<Box<RequestResult>>,
    },

    /// The service answered with a status the operation does not accept.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A response was received but could not be interpreted.
    #[error("Response error: {source}")]
    Response {
        /// Underlying parse or validation failure.
        #[source]
        source: ResponseError,
        /// Result of the attempt whose response was rejected.
        result: Option<Box<RequestResult>>,
    },

    /// The request body could not be reproduced for another attempt.
    #[error("Transfer error: {source}")]
    Transfer {
        /// Underlying transfer failure.
        #[source]
        source: TransferError,
        /// Result of the last attempt.
        result: Option<Box<RequestResult>>,
    },

    /// The maximum execution time of the operation elapsed.
    #[error("Timeout: the client could not finish the operation within {elapsed:?}")]
    Timeout {
        /// Time spent on the operation when the deadline was detected.
        elapsed: Duration,
        /// Result of the last attempt, if any attempt was made.
        result: Option<Box<RequestResult>>,
        /// Failure of the last attempt, if any attempt was made.
        #[source]
        last_error: Option<Box<StorageError>>,
    },
}

impl StorageError {
    /// Returns true if the failure may be handed to the retry policy.
    ///
    /// The retry policy still decides on its own whether the status code of the
    /// attempt warrants another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Network { .. } | StorageError::Service(_) | StorageError::Response { .. }
        )
    }

    /// Returns true if the failure is the operation deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StorageError::Timeout { .. })
    }

    /// Returns the result of the attempt that produced this failure.
    pub fn request_result(&self) -> Option<&RequestResult> {
        match self {
            StorageError::Service(e) => Some(&e.result),
            StorageError::Network { result, .. }
            | StorageError::Response { result, .. }
            | StorageError::Transfer { result, .. }
            | StorageError::Timeout { result, .. } => result.as_deref(),
            _ => None,
        }
    }

    /// Attaches an attempt result unless the error already carries one.
    ///
    /// Errors raised before any request was dispatched have no slot for a result
    /// and are returned unchanged.
    pub fn with_request_result(mut self, request_result: RequestResult) -> Self {
        match &mut self {
            StorageError::Network { result, .. }
            | StorageError::Response { result, .. }
            | StorageError::Transfer { result, .. }
            | StorageError::Timeout { result, .. } => {
                if result.is_none() {
                    *result = Some(Box::new(request_result));
                }
            }
            _ => {}
        }
        self
    }

    /// Returns the HTTP status code of the failed attempt, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.request_result().and_then(|r| r.http_status_code())
    }

    /// Returns the service error code (e.g. `ServerBusy`) if the body carried one.
    pub fn service_error_code(&self) -> Option<&str> {
        self.request_result()
            .map(|r| r.extended_error().code())
            .filter(|code| !code.is_empty())
    }

    /// Returns the service-assigned request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.request_result().and_then(|r| r.service_request_id())
    }
}

impl From<NetworkError> for StorageError {
    fn from(source: NetworkError) -> Self {
        StorageError::Network {
            source,
            result: None,
        }
    }
}

impl From<ResponseError> for StorageError {
    fn from(source: ResponseError) -> Self {
        StorageError::Response {
            source,
            result: None,
        }
    }
}

impl From<TransferError> for StorageError {
    fn from(source: TransferError) -> Self {
        StorageError::Transfer {
            source,
            result: None,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No service endpoint could be determined.
    #[error("Missing endpoint: an endpoint or an account name must be configured")]
    MissingEndpoint,

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Details about the validation error.
        details: String,
    },

    /// Malformed connection string.
    #[error("Invalid connection string: {message}")]
    InvalidConnectionString {
        /// Details about what could not be parsed.
        message: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfiguration {
        /// The configuration field name.
        field: String,
        /// Error message.
        message: String,
    },
}

/// Request signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The account key is not valid base64.
    #[error("Invalid account key: {message}")]
    InvalidKey {
        /// Details about the decoding error.
        message: String,
    },

    /// The request URL could not be canonicalized.
    #[error("Invalid request URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Details about the parse error.
        message: String,
    },

    /// Signature calculation failed.
    #[error("Signature calculation failed: {message}")]
    CalculationFailed {
        /// Details about the calculation error.
        message: String,
    },
}

/// Request validation errors.
///
/// These are never retried.
#[derive(Debug, Error)]
pub enum RequestError {
    /// General validation error.
    #[error("Validation error: {message}")]
    Validation {
        /// Details about the validation error.
        message: String,
    },

    /// The URI for a location the mode may use is not configured.
    #[error("The URI for the {location:?} location is not specified; consider changing the location mode")]
    MissingLocationUri {
        /// The location without a URI.
        location: crate::location::StorageLocation,
    },

    /// A primary-only operation was asked to run against the secondary only.
    #[error("This operation can only be executed against the primary storage location")]
    PrimaryOnlyCommand,

    /// A secondary-only operation was asked to run against the primary only.
    #[error("This operation can only be executed against the secondary storage location")]
    SecondaryOnlyCommand,
}

/// Transport failures: no response was obtained.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
    },

    /// Request timed out before a response was received.
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// The timeout duration.
        duration: Duration,
    },

    /// TLS/SSL error.
    #[error("TLS error: {message}")]
    TlsError {
        /// Error message.
        message: String,
    },

    /// The connection broke while the body was being transferred.
    #[error("Transfer interrupted: {message}")]
    Interrupted {
        /// Error message.
        message: String,
    },
}

/// A response with an error status.
#[derive(Debug, Error)]
#[error("status {status}: {message}")]
pub struct ServiceError {
    /// HTTP status code.
    pub status: u16,
    /// Service message, or the canonical reason phrase when the body had none.
    pub message: String,
    /// Result of the attempt.
    pub result: Box<RequestResult>,
}

impl ServiceError {
    /// Build a service error from the result of an attempt that received a response.
    pub fn from_result(result: RequestResult) -> Self {
        let status = result.http_status_code().unwrap_or_default();
        let message = if result.extended_error().message().is_empty() {
            http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unexpected status code")
                .to_string()
        } else {
            result.extended_error().message().to_string()
        };

        Self {
            status,
            message,
            result: Box::new(result),
        }
    }

    /// The structured error returned by the service.
    pub fn extended_error(&self) -> &ExtendedError {
        self.result.extended_error()
    }
}

/// Response parsing and validation errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// XML parse error.
    #[error("XML parse error: {message}")]
    XmlParseError {
        /// Error message.
        message: String,
    },

    /// JSON parse error.
    #[error("JSON parse error: {message}")]
    JsonParseError {
        /// Error message.
        message: String,
    },

    /// Missing required field.
    #[error("Missing required field '{field}' in response")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// The body length does not match `Content-Length`.
    #[error("Incorrect length: expected {expected} bytes, received {received} bytes")]
    IncorrectLength {
        /// Length announced by the service.
        expected: u64,
        /// Length actually received.
        received: u64,
    },

    /// The body MD5 does not match `Content-MD5`.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum announced by the service.
        expected: String,
        /// Checksum of the received body.
        actual: String,
    },
}

/// Request body transfer errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A one-shot body was already consumed by an earlier attempt.
    #[error("The request body cannot be re-read for a retry")]
    BodyNotRewindable,

    /// The command declined to recover its request for another attempt.
    #[error("The request cannot be recovered for a retry")]
    RecoveryDeclined,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StorageLocation;
    use chrono::Utc;

    fn result_with_status(status: u16) -> RequestResult {
        let now = Utc::now();
        RequestResult::new(now, now, StorageLocation::Primary, Some(status))
    }

    #[test]
    fn test_storage_error_is_retryable() {
        let network: StorageError = NetworkError::Timeout {
            duration: Duration::from_secs(30),
        }
        .into();
        assert!(network.is_retryable());

        let service = StorageError::Service(ServiceError::from_result(result_with_status(503)));
        assert!(service.is_retryable());

        let validation = StorageError::Request(RequestError::Validation {
            message: "bad".into(),
        });
        assert!(!validation.is_retryable());

        let body: StorageError = TransferError::BodyNotRewindable.into();
        assert!(!body.is_retryable());

        let timeout = StorageError::Timeout {
            elapsed: Duration::from_secs(2),
            result: None,
            last_error: None,
        };
        assert!(!timeout.is_retryable());
        assert!(timeout.is_timeout());
    }

    #[test]
    fn test_with_request_result_fills_empty_slot() {
        let error: StorageError = NetworkError::ConnectionFailed {
            message: "refused".into(),
        }
        .into();
        assert!(error.request_result().is_none());

        let now = Utc::now();
        let attached = error.with_request_result(RequestResult::transport_failure(
            now,
            StorageLocation::Secondary,
        ));
        let result = attached.request_result().unwrap();
        assert_eq!(result.target_location(), StorageLocation::Secondary);
        assert!(!result.is_response_available());
        assert_eq!(attached.status_code(), None);
    }

    #[test]
    fn test_with_request_result_keeps_existing() {
        let error: StorageError = NetworkError::ConnectionFailed {
            message: "refused".into(),
        }
        .into();
        let now = Utc::now();
        let first = error.with_request_result(RequestResult::transport_failure(
            now,
            StorageLocation::Primary,
        ));
        let second = first.with_request_result(result_with_status(500));

        assert_eq!(
            second.request_result().unwrap().target_location(),
            StorageLocation::Primary
        );
        assert_eq!(second.status_code(), None);
    }

    #[test]
    fn test_service_error_message_falls_back_to_reason() {
        let error = ServiceError::from_result(result_with_status(503));
        assert_eq!(error.status, 503);
        assert_eq!(error.message, "Service Unavailable");
        assert_eq!(error.to_string(), "status 503: Service Unavailable");
    }

    #[test]
    fn test_status_code_accessor() {
        let error = StorageError::Service(ServiceError::from_result(result_with_status(404)));
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(error.service_error_code(), None);
    }
}
