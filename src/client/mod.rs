//! Storage client implementation.
//!
//! This module provides the main client interface and builder.

use crate::config::{RequestOptions, StorageConfig};
use crate::error::StorageError;
use crate::executor::{Executor, StorageCommand};
use crate::operation::OperationContext;
use crate::services::{BlobService, ServiceCore};
use crate::signing::signer_for;
use crate::transport::{HttpTransport, ReqwestTransport};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Storage client trait.
pub trait StorageClient: Send + Sync {
    /// Get the blob service.
    fn blobs(&self) -> &BlobService;

    /// Get the client configuration.
    fn config(&self) -> &StorageConfig;

    /// Create an operation context with the client's default log level.
    fn operation_context(&self) -> OperationContext;
}

/// Storage client implementation.
pub struct StorageClientImpl {
    core: Arc<ServiceCore>,

    // Lazy-initialized services
    blobs: OnceCell<BlobService>,
}

impl StorageClientImpl {
    /// Create a new client with the given configuration and transport.
    pub fn new(config: StorageConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, StorageError> {
        let signer = signer_for(&config.credentials)?;
        let core = ServiceCore::new(Arc::new(config), Executor::new(transport), signer);

        Ok(Self {
            core: Arc::new(core),
            blobs: OnceCell::new(),
        })
    }

    /// Run a custom command.
    ///
    /// `options` are layered over the client defaults. Without a context, a new
    /// one is created with the client's default log level.
    pub async fn execute<T>(
        &self,
        command: StorageCommand<T>,
        options: &RequestOptions,
        context: Option<&OperationContext>,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
    {
        match context {
            Some(context) => self.core.execute(command, options, context).await,
            None => {
                let context = self.core.new_context();
                self.core.execute(command, options, &context).await
            }
        }
    }
}

impl StorageClient for StorageClientImpl {
    fn blobs(&self) -> &BlobService {
        self.blobs
            .get_or_init(|| BlobService::new(self.core.clone()))
    }

    fn config(&self) -> &StorageConfig {
        self.core.config()
    }

    fn operation_context(&self) -> OperationContext {
        self.core.new_context()
    }
}

impl std::fmt::Debug for StorageClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClientImpl")
            .field("config", self.core.config())
            .finish_non_exhaustive()
    }
}

/// Builder for the storage client.
pub struct StorageClientBuilder {
    config: Option<StorageConfig>,
    connection_string: Option<String>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl StorageClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            connection_string: None,
            transport: None,
        }
    }

    /// Use the provided configuration.
    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Configure the client from an account connection string.
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Use a custom HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<StorageClientImpl, StorageError> {
        let config = match (self.config, self.connection_string) {
            (Some(config), _) => config,
            (None, Some(connection_string)) => {
                StorageConfig::from_connection_string(&connection_string)?
            }
            (None, None) => StorageConfig::builder().build()?,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_settings(config.transport_settings())?),
        };

        StorageClientImpl::new(config, transport)
    }
}

impl Default for StorageClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
