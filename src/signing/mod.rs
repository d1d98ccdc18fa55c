//! Request authorization.
//!
//! The executor hands every attempt to a [`RequestSigner`] after the request is
//! built and before the sending-request hook runs, so each attempt carries a fresh
//! signature (and a fresh `x-ms-date`).

mod shared_key;

pub use shared_key::{
    build_string_to_sign, canonicalized_headers, canonicalized_resource, SharedKeySigner,
};

use crate::credentials::StorageCredentials;
use crate::error::{SigningError, StorageError};
use crate::operation::OperationContext;
use crate::transport::HttpRequest;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Authorizes requests before they are sent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Return the request with authorization applied.
    async fn sign(
        &self,
        request: HttpRequest,
        context: &OperationContext,
    ) -> Result<HttpRequest, StorageError>;
}

/// Calculate HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| SigningError::CalculationFailed {
        message: e.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Leaves requests untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSigner;

#[async_trait]
impl RequestSigner for AnonymousSigner {
    async fn sign(
        &self,
        request: HttpRequest,
        _context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        Ok(request)
    }
}

/// Appends a shared access signature to the query string.
pub struct SasSigner {
    token: SecretString,
}

impl SasSigner {
    /// Create a signer for a SAS token (without the leading `?`).
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl RequestSigner for SasSigner {
    async fn sign(
        &self,
        mut request: HttpRequest,
        _context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        let mut url = Url::parse(&request.url).map_err(|e| SigningError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        let existing: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in url::form_urlencoded::parse(self.token.expose_secret().as_bytes())
            {
                if !existing.iter().any(|k| k == name.as_ref()) {
                    pairs.append_pair(&name, &value);
                }
            }
        }

        request.url = url.to_string();
        Ok(request)
    }
}

impl std::fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasSigner").finish_non_exhaustive()
    }
}

/// Sends an OAuth bearer token.
pub struct BearerTokenSigner {
    token: SecretString,
}

impl BearerTokenSigner {
    /// Create a signer for a bearer token.
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl RequestSigner for BearerTokenSigner {
    async fn sign(
        &self,
        mut request: HttpRequest,
        _context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        request.set_header(
            "Authorization",
            format!("Bearer {}", self.token.expose_secret()),
        );
        Ok(request)
    }
}

impl std::fmt::Debug for BearerTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenSigner").finish_non_exhaustive()
    }
}

/// Select the signer for a set of credentials.
pub fn signer_for(credentials: &StorageCredentials) -> Result<Arc<dyn RequestSigner>, StorageError> {
    let signer: Arc<dyn RequestSigner> = match credentials {
        StorageCredentials::Anonymous => Arc::new(AnonymousSigner),
        StorageCredentials::SharedKey { account_name, .. } => {
            let key = credentials.decoded_key()?.unwrap_or_default();
            Arc::new(SharedKeySigner::new(account_name.clone(), key))
        }
        StorageCredentials::SharedAccessSignature(token) => Arc::new(SasSigner::new(token.clone())),
        StorageCredentials::BearerToken(token) => Arc::new(BearerTokenSigner::new(token.clone())),
    };
    Ok(signer)
}
