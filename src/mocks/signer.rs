//! Mock signer for testing.

use crate::error::{SigningError, StorageError};
use crate::operation::OperationContext;
use crate::signing::RequestSigner;
use crate::transport::HttpRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Authorization header value set by [`MockSigner`].
pub const MOCK_AUTHORIZATION: &str = "SharedKey mock:signature";

/// Mock signer for testing.
///
/// Sets a fixed `Authorization` header and records every request it signs.
#[derive(Default)]
pub struct MockSigner {
    sign_count: AtomicUsize,
    signed: Mutex<Vec<HttpRequest>>,
    error: Mutex<Option<String>>,
}

impl MockSigner {
    /// Create a new mock signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent sign call.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.error.lock() = Some(message.into());
    }

    /// Number of sign calls.
    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::SeqCst)
    }

    /// Requests as they were received for signing.
    pub fn signed_requests(&self) -> Vec<HttpRequest> {
        self.signed.lock().clone()
    }
}

#[async_trait]
impl RequestSigner for MockSigner {
    async fn sign(
        &self,
        mut request: HttpRequest,
        _context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        self.signed.lock().push(request.clone());

        if let Some(message) = self.error.lock().clone() {
            return Err(SigningError::CalculationFailed { message }.into());
        }

        request.set_header("Authorization", MOCK_AUTHORIZATION);
        Ok(request)
    }
}

impl std::fmt::Debug for MockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSigner")
            .field("sign_count", &self.sign_count())
            .finish()
    }
}
