//! Configuration types for the storage client.
//!
//! This module provides the `StorageConfig` type for configuring the client,
//! including the account, credentials, service endpoints, transport settings and
//! the client-level default [`RequestOptions`].

mod options;

pub use options::*;

use crate::credentials::StorageCredentials;
use crate::error::{ConfigurationError, StorageError};
use crate::location::StorageUri;
use crate::operation::ClientLogLevel;
use crate::transport::{default_user_agent, TransportSettings};
use std::collections::HashMap;
use std::time::Duration;

/// Default DNS suffix of the public cloud.
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Account name of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known account key of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEVELOPMENT_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";
const DEVELOPMENT_BLOB_SECONDARY_ENDPOINT: &str =
    "http://127.0.0.1:10000/devstoreaccount1-secondary";

/// Configuration for the storage client.
#[derive(Clone)]
pub struct StorageConfig {
    /// Storage account name.
    pub account_name: Option<String>,

    /// Credentials used to authorize requests.
    pub credentials: StorageCredentials,

    /// Primary and secondary blob service endpoints.
    pub blob_endpoint: StorageUri,

    /// Request options applied when a call leaves a value unset.
    pub default_request_options: RequestOptions,

    /// Log level given to operation contexts the client creates.
    pub default_log_level: ClientLogLevel,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Read timeout for a single attempt.
    pub read_timeout: Duration,

    /// Maximum idle connections kept per host.
    pub max_connections: usize,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Verify TLS certificates.
    pub verify_ssl: bool,

    /// Custom user agent.
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("default_request_options", &self.default_request_options)
            .field("default_log_level", &self.default_log_level)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("verify_ssl", &self.verify_ssl)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account_name: None,
            credentials: StorageCredentials::Anonymous,
            blob_endpoint: StorageUri::default(),
            default_request_options: RequestOptions::default(),
            default_log_level: ClientLogLevel::Warning,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(90),
            max_connections: 100,
            idle_timeout: Duration::from_secs(90),
            verify_ssl: true,
            user_agent: None,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration builder.
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Connection settings for the default transport.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            max_idle_connections: self.max_connections,
            idle_timeout: self.idle_timeout,
            verify_ssl: self.verify_ssl,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
        }
    }

    /// Parse an account connection string.
    ///
    /// Recognized keys: `DefaultEndpointsProtocol`, `AccountName`, `AccountKey`,
    /// `SharedAccessSignature`, `EndpointSuffix`, `BlobEndpoint`,
    /// `BlobSecondaryEndpoint` and `UseDevelopmentStorage`. Keys are matched
    /// case-insensitively; unknown keys are ignored.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, StorageError> {
        let settings = parse_connection_string(connection_string)?;
        let get = |key: &str| settings.get(key).map(String::as_str);

        if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return StorageConfig::builder()
                .account_name(DEVELOPMENT_ACCOUNT_NAME)
                .credentials(StorageCredentials::shared_key(
                    DEVELOPMENT_ACCOUNT_NAME,
                    DEVELOPMENT_ACCOUNT_KEY,
                ))
                .blob_endpoint(
                    DEVELOPMENT_BLOB_ENDPOINT,
                    Some(DEVELOPMENT_BLOB_SECONDARY_ENDPOINT),
                )
                .build();
        }

        let mut builder = StorageConfig::builder();
        let account_name = get("accountname");
        if let Some(name) = account_name {
            builder = builder.account_name(name);
        }

        builder = match (account_name, get("accountkey"), get("sharedaccesssignature")) {
            (Some(name), Some(key), _) => {
                builder.credentials(StorageCredentials::shared_key(name, key))
            }
            (None, Some(_), _) => {
                return Err(ConfigurationError::InvalidConnectionString {
                    message: "AccountKey requires AccountName".to_string(),
                }
                .into())
            }
            (_, None, Some(sas)) => builder.credentials(StorageCredentials::sas_token(sas)),
            (_, None, None) => builder,
        };

        if let Some(protocol) = get("defaultendpointsprotocol") {
            builder = match protocol.to_ascii_lowercase().as_str() {
                "https" => builder.use_https(true),
                "http" => builder.use_https(false),
                other => {
                    return Err(ConfigurationError::InvalidConnectionString {
                        message: format!("unsupported DefaultEndpointsProtocol '{}'", other),
                    }
                    .into())
                }
            };
        }
        if let Some(suffix) = get("endpointsuffix") {
            builder = builder.endpoint_suffix(suffix);
        }
        if let Some(endpoint) = get("blobendpoint") {
            builder = builder.blob_endpoint(endpoint, get("blobsecondaryendpoint"));
        }

        builder.build()
    }
}

fn parse_connection_string(
    connection_string: &str,
) -> Result<HashMap<String, String>, StorageError> {
    let mut settings = HashMap::new();

    for part in connection_string.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (key, value) =
            part.split_once('=')
                .ok_or_else(|| ConfigurationError::InvalidConnectionString {
                    message: format!("setting '{}' is not of the form key=value", part),
                })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigurationError::InvalidConnectionString {
                message: "empty setting name".to_string(),
            }
            .into());
        }
        settings.insert(key.to_ascii_lowercase(), value.trim().to_string());
    }

    if settings.is_empty() {
        return Err(ConfigurationError::InvalidConnectionString {
            message: "connection string is empty".to_string(),
        }
        .into());
    }
    Ok(settings)
}

/// Builder for storage configuration.
#[derive(Default)]
pub struct StorageConfigBuilder {
    account_name: Option<String>,
    credentials: Option<StorageCredentials>,
    blob_endpoint: Option<(String, Option<String>)>,
    endpoint_suffix: Option<String>,
    use_https: Option<bool>,
    default_request_options: Option<RequestOptions>,
    default_log_level: Option<ClientLogLevel>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_connections: Option<usize>,
    idle_timeout: Option<Duration>,
    verify_ssl: Option<bool>,
    user_agent: Option<String>,
}

impl StorageConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage account name.
    pub fn account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = Some(name.into());
        self
    }

    /// Set the credentials.
    ///
    /// Shared Key credentials also set the account name when none was given.
    pub fn credentials(mut self, credentials: StorageCredentials) -> Self {
        if self.account_name.is_none() {
            self.account_name = credentials.account_name().map(String::from);
        }
        self.credentials = Some(credentials);
        self
    }

    /// Set explicit blob service endpoints.
    pub fn blob_endpoint(mut self, primary: impl Into<String>, secondary: Option<&str>) -> Self {
        self.blob_endpoint = Some((primary.into(), secondary.map(String::from)));
        self
    }

    /// Set the DNS suffix used to derive endpoints from the account name.
    pub fn endpoint_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.endpoint_suffix = Some(suffix.into());
        self
    }

    /// Use HTTPS (the default) or HTTP for derived endpoints.
    pub fn use_https(mut self, enabled: bool) -> Self {
        self.use_https = Some(enabled);
        self
    }

    /// Set the client-level default request options.
    pub fn default_request_options(mut self, options: RequestOptions) -> Self {
        self.default_request_options = Some(options);
        self
    }

    /// Set the default log level of new operation contexts.
    pub fn default_log_level(mut self, level: ClientLogLevel) -> Self {
        self.default_log_level = Some(level);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    pub fn max_connections(mut self, connections: usize) -> Self {
        self.max_connections = Some(connections);
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration.
    ///
    /// Without explicit endpoints, `https://{account}.blob.{suffix}` and
    /// `https://{account}-secondary.blob.{suffix}` are derived from the account
    /// name.
    pub fn build(self) -> Result<StorageConfig, StorageError> {
        let defaults = StorageConfig::default();

        let blob_endpoint = match (&self.blob_endpoint, &self.account_name) {
            (Some((primary, secondary)), _) => {
                StorageUri::parse(primary, secondary.as_deref())?
            }
            (None, Some(account)) => {
                validate_account_name(account)?;
                let scheme = if self.use_https.unwrap_or(true) {
                    "https"
                } else {
                    "http"
                };
                let suffix = self
                    .endpoint_suffix
                    .as_deref()
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                StorageUri::parse(
                    &format!("{}://{}.blob.{}", scheme, account, suffix),
                    Some(&format!("{}://{}-secondary.blob.{}", scheme, account, suffix)),
                )?
            }
            (None, None) => return Err(ConfigurationError::MissingEndpoint.into()),
        };

        let max_connections = self.max_connections.unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                field: "max_connections".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }

        Ok(StorageConfig {
            account_name: self.account_name,
            credentials: self.credentials.unwrap_or(defaults.credentials),
            blob_endpoint,
            default_request_options: self
                .default_request_options
                .unwrap_or(defaults.default_request_options),
            default_log_level: self.default_log_level.unwrap_or(defaults.default_log_level),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            read_timeout: self.read_timeout.unwrap_or(defaults.read_timeout),
            max_connections,
            idle_timeout: self.idle_timeout.unwrap_or(defaults.idle_timeout),
            verify_ssl: self.verify_ssl.unwrap_or(defaults.verify_ssl),
            user_agent: self.user_agent.or(defaults.user_agent),
        })
    }
}

fn validate_account_name(account: &str) -> Result<(), StorageError> {
    let valid = (3..=24).contains(&account.len())
        && account
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidConfiguration {
            field: "account_name".to_string(),
            message: format!(
                "'{}' must be 3-24 lowercase letters or digits",
                account
            ),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationMode;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert!(config.account_name.is_none());
        assert!(config.credentials.is_anonymous());
        assert_eq!(config.default_log_level, ClientLogLevel::Warning);
        assert!(config.verify_ssl);
    }

    #[test]
    fn test_transport_settings_follow_config() {
        let config = StorageConfig::builder()
            .account_name("myaccount")
            .connect_timeout(Duration::from_secs(2))
            .max_connections(8)
            .build()
            .unwrap();

        let settings = config.transport_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(2));
        assert_eq!(settings.max_idle_connections, 8);
        assert_eq!(settings.user_agent, default_user_agent());

        let custom = StorageConfig::builder()
            .account_name("myaccount")
            .user_agent("backup-tool/2.0")
            .build()
            .unwrap();
        assert_eq!(custom.transport_settings().user_agent, "backup-tool/2.0");
    }

    #[test]
    fn test_builder_derives_endpoints() {
        let config = StorageConfig::builder()
            .account_name("myaccount")
            .build()
            .unwrap();

        assert_eq!(
            config.blob_endpoint.primary().unwrap().as_str(),
            "https://myaccount.blob.core.windows.net/"
        );
        assert_eq!(
            config.blob_endpoint.secondary().unwrap().as_str(),
            "https://myaccount-secondary.blob.core.windows.net/"
        );
    }

    #[test]
    fn test_builder_without_account_or_endpoint() {
        let result = StorageConfig::builder().build();
        assert!(matches!(
            result,
            Err(StorageError::Configuration(ConfigurationError::MissingEndpoint))
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_account_name() {
        assert!(StorageConfig::builder()
            .account_name("Not_Valid")
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_keeps_request_options() {
        let config = StorageConfig::builder()
            .account_name("myaccount")
            .default_request_options(
                RequestOptions::new().with_location_mode(LocationMode::PrimaryThenSecondary),
            )
            .default_log_level(ClientLogLevel::Verbose)
            .build()
            .unwrap();

        assert_eq!(
            config.default_request_options.location_mode(),
            LocationMode::PrimaryThenSecondary
        );
        assert_eq!(config.default_log_level, ClientLogLevel::Verbose);
    }

    #[test]
    fn test_connection_string_with_account_key() {
        let config = StorageConfig::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey=a2V5;EndpointSuffix=core.chinacloudapi.cn",
        )
        .unwrap();

        assert_eq!(config.account_name.as_deref(), Some("myaccount"));
        assert_eq!(config.credentials.account_name(), Some("myaccount"));
        assert_eq!(
            config.blob_endpoint.primary().unwrap().as_str(),
            "https://myaccount.blob.core.chinacloudapi.cn/"
        );
        assert_eq!(
            config.blob_endpoint.secondary().unwrap().host_str(),
            Some("myaccount-secondary.blob.core.chinacloudapi.cn")
        );
    }

    #[test]
    fn test_connection_string_with_explicit_endpoints_and_sas() {
        let config = StorageConfig::from_connection_string(
            "BlobEndpoint=https://custom.example.com;SharedAccessSignature=sv=2021-08-06&sig=abc;",
        )
        .unwrap();

        assert!(matches!(
            config.credentials,
            StorageCredentials::SharedAccessSignature(_)
        ));
        assert_eq!(
            config.blob_endpoint.primary().unwrap().host_str(),
            Some("custom.example.com")
        );
        assert!(config.blob_endpoint.secondary().is_none());
    }

    #[test]
    fn test_connection_string_development_storage() {
        let config = StorageConfig::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(config.account_name.as_deref(), Some(DEVELOPMENT_ACCOUNT_NAME));
        assert_eq!(
            config.blob_endpoint.primary().unwrap().as_str(),
            DEVELOPMENT_BLOB_ENDPOINT
        );
    }

    #[test]
    fn test_connection_string_errors() {
        assert!(StorageConfig::from_connection_string("").is_err());
        assert!(StorageConfig::from_connection_string("AccountName").is_err());
        assert!(StorageConfig::from_connection_string("AccountKey=a2V5").is_err());
        assert!(StorageConfig::from_connection_string(
            "DefaultEndpointsProtocol=ftp;AccountName=myaccount"
        )
        .is_err());
    }

    #[test]
    fn test_debug_omits_credentials() {
        let config = StorageConfig::builder()
            .credentials(StorageCredentials::shared_key("myaccount", "c2VjcmV0"))
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("myaccount"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
