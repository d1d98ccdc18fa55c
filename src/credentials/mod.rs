//! Storage account credentials.
//!
//! Secrets are held in [`SecretString`] and never appear in `Debug` output.

use crate::error::{SigningError, StorageError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Credentials used to authorize requests.
#[derive(Clone, Default)]
pub enum StorageCredentials {
    /// No authorization; only public resources are reachable.
    #[default]
    Anonymous,
    /// Account name and base64 account key (Shared Key authorization).
    SharedKey {
        /// Storage account name.
        account_name: String,
        /// Base64-encoded account key.
        account_key: SecretString,
    },
    /// Shared access signature query string.
    SharedAccessSignature(SecretString),
    /// OAuth bearer token.
    BearerToken(SecretString),
}

impl StorageCredentials {
    /// Shared Key credentials.
    pub fn shared_key(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        StorageCredentials::SharedKey {
            account_name: account_name.into(),
            account_key: SecretString::new(account_key.into()),
        }
    }

    /// Shared access signature credentials. A leading `?` is ignored.
    pub fn sas_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.strip_prefix('?').map(String::from).unwrap_or(token);
        StorageCredentials::SharedAccessSignature(SecretString::new(token))
    }

    /// Bearer token credentials.
    pub fn bearer_token(token: impl Into<String>) -> Self {
        StorageCredentials::BearerToken(SecretString::new(token.into()))
    }

    /// Account name, for Shared Key credentials.
    pub fn account_name(&self) -> Option<&str> {
        match self {
            StorageCredentials::SharedKey { account_name, .. } => Some(account_name),
            _ => None,
        }
    }

    /// Returns true for anonymous credentials.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, StorageCredentials::Anonymous)
    }

    /// Decoded account key, for Shared Key credentials.
    pub(crate) fn decoded_key(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match self {
            StorageCredentials::SharedKey { account_key, .. } => STANDARD
                .decode(account_key.expose_secret().as_bytes())
                .map(Some)
                .map_err(|e| {
                    SigningError::InvalidKey {
                        message: e.to_string(),
                    }
                    .into()
                }),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageCredentials::Anonymous => f.write_str("Anonymous"),
            StorageCredentials::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("account_key", &"[REDACTED]")
                .finish(),
            StorageCredentials::SharedAccessSignature(_) => {
                f.debug_tuple("SharedAccessSignature").field(&"[REDACTED]").finish()
            }
            StorageCredentials::BearerToken(_) => {
                f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_key_credentials() {
        let creds = StorageCredentials::shared_key("account", "a2V5");
        assert_eq!(creds.account_name(), Some("account"));
        assert_eq!(creds.decoded_key().unwrap(), Some(b"key".to_vec()));
    }

    #[test]
    fn test_invalid_key() {
        let creds = StorageCredentials::shared_key("account", "not base64!");
        assert!(matches!(
            creds.decoded_key(),
            Err(StorageError::Signing(SigningError::InvalidKey { .. }))
        ));
    }

    #[test]
    fn test_sas_strips_question_mark() {
        let creds = StorageCredentials::sas_token("?sv=2021-08-06&sig=abc");
        match creds {
            StorageCredentials::SharedAccessSignature(token) => {
                assert_eq!(token.expose_secret(), "sv=2021-08-06&sig=abc")
            }
            _ => panic!("Expected SAS credentials"),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = StorageCredentials::shared_key("account", "c2VjcmV0");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("account"));
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("[REDACTED]"));

        let debug = format!("{:?}", StorageCredentials::bearer_token("tok3n"));
        assert!(!debug.contains("tok3n"));
    }

    #[test]
    fn test_default_is_anonymous() {
        assert!(StorageCredentials::default().is_anonymous());
    }
}
