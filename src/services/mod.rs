//! Storage service implementations.
//!
//! Services are thin call sites over the [`Executor`]: each operation builds a
//! [`StorageCommand`] describing how to construct and interpret one attempt, and
//! the executor takes care of signing, retries and replica failover.
//!
//! [`StorageCommand`]: crate::executor::StorageCommand

mod blobs;

pub use blobs::BlobService;

use crate::config::{RequestOptions, StorageConfig};
use crate::error::StorageError;
use crate::executor::{Executor, StorageCommand};
use crate::operation::OperationContext;
use crate::signing::RequestSigner;
use crate::transport::HttpRequest;
use crate::types::STORAGE_SERVICE_VERSION;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// State shared by the client and its services.
pub(crate) struct ServiceCore {
    config: Arc<StorageConfig>,
    executor: Executor,
    signer: Arc<dyn RequestSigner>,
}

impl ServiceCore {
    pub(crate) fn new(
        config: Arc<StorageConfig>,
        executor: Executor,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            config,
            executor,
            signer,
        }
    }

    pub(crate) fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn signer(&self) -> Arc<dyn RequestSigner> {
        self.signer.clone()
    }

    /// A context carrying the configured default log level.
    pub(crate) fn new_context(&self) -> OperationContext {
        OperationContext::with_log_level(self.config.default_log_level)
    }

    /// Run `command` with `options` layered over the client defaults.
    pub(crate) async fn execute<T>(
        &self,
        command: StorageCommand<T>,
        options: &RequestOptions,
        context: &OperationContext,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
    {
        let merged = options.merge(&self.config.default_request_options);
        self.executor.execute(command, &merged, context).await
    }
}

/// Build a service request: query parameters, the server `timeout` parameter and
/// the `x-ms-version` header.
pub(crate) fn service_request(
    method: &str,
    url: &Url,
    query: &[(&str, String)],
    server_timeout: Option<Duration>,
) -> HttpRequest {
    let mut url = url.clone();
    if !query.is_empty() || server_timeout.is_some() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
        if let Some(timeout) = server_timeout {
            pairs.append_pair("timeout", &timeout.as_secs().max(1).to_string());
        }
    }

    let mut request = HttpRequest::new(method, url.as_str())
        .with_header("x-ms-version", STORAGE_SERVICE_VERSION);
    if method == "PUT" {
        // The service rejects PUTs without a Content-Length.
        request.body = Some(Bytes::new());
    }
    request
}
