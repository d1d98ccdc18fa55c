//! Storage locations, location modes, and replica selection.
//!
//! A geo-replicated account exposes a primary endpoint and a read-only secondary
//! endpoint. The [`LocationMode`] chosen by the caller decides which endpoints an
//! operation may use and in what order; the [`CommandLocationMode`] of an
//! operation narrows that further (writes are primary-only).

use crate::error::{ConfigurationError, RequestError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A replica endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageLocation {
    /// No location decided yet.
    #[default]
    Unspecified,
    /// The primary (read-write) endpoint.
    Primary,
    /// The secondary (read-only) endpoint.
    Secondary,
}

impl StorageLocation {
    /// The other replica. `Unspecified` stays `Unspecified`.
    pub fn other(self) -> Self {
        match self {
            StorageLocation::Primary => StorageLocation::Secondary,
            StorageLocation::Secondary => StorageLocation::Primary,
            StorageLocation::Unspecified => StorageLocation::Unspecified,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageLocation::Unspecified => "unspecified",
            StorageLocation::Primary => "primary",
            StorageLocation::Secondary => "secondary",
        };
        f.write_str(name)
    }
}

/// Which replicas an operation may use, and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocationMode {
    /// Primary only.
    #[default]
    PrimaryOnly,
    /// Primary first, then alternate with the secondary on retries.
    PrimaryThenSecondary,
    /// Secondary only.
    SecondaryOnly,
    /// Secondary first, then alternate with the primary on retries.
    SecondaryThenPrimary,
}

impl LocationMode {
    /// Location of the first attempt.
    pub fn first_location(self) -> StorageLocation {
        match self {
            LocationMode::PrimaryOnly | LocationMode::PrimaryThenSecondary => {
                StorageLocation::Primary
            }
            LocationMode::SecondaryOnly | LocationMode::SecondaryThenPrimary => {
                StorageLocation::Secondary
            }
        }
    }

    /// Location the next attempt should use when the current one was sent to
    /// `current`. Single-location modes always return their location; the
    /// alternating modes switch replicas.
    pub fn next_location(self, current: StorageLocation) -> StorageLocation {
        match self {
            LocationMode::PrimaryOnly => StorageLocation::Primary,
            LocationMode::SecondaryOnly => StorageLocation::Secondary,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary => {
                match current {
                    StorageLocation::Unspecified => self.first_location(),
                    other => other.other(),
                }
            }
        }
    }

    /// Returns true if the mode may send an attempt to `location`.
    pub fn permits(self, location: StorageLocation) -> bool {
        match location {
            StorageLocation::Primary => self != LocationMode::SecondaryOnly,
            StorageLocation::Secondary => self != LocationMode::PrimaryOnly,
            StorageLocation::Unspecified => false,
        }
    }

    /// Returns true if the mode uses both replicas.
    pub fn is_dual(self) -> bool {
        matches!(
            self,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary
        )
    }
}

/// Replica restriction of an individual operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandLocationMode {
    /// The operation must run against the primary (writes).
    #[default]
    PrimaryOnly,
    /// The operation must run against the secondary.
    SecondaryOnly,
    /// The operation may run against either replica (reads).
    PrimaryOrSecondary,
}

/// Narrow the requested mode by the operation's restriction.
///
/// A primary-only operation under `SecondaryOnly` (and the reverse) cannot run at
/// all; otherwise a restricted operation runs in its single-location mode.
pub fn resolve_location_mode(
    requested: LocationMode,
    command: CommandLocationMode,
) -> Result<LocationMode, StorageError> {
    match command {
        CommandLocationMode::PrimaryOrSecondary => Ok(requested),
        CommandLocationMode::PrimaryOnly => {
            if requested == LocationMode::SecondaryOnly {
                Err(RequestError::PrimaryOnlyCommand.into())
            } else {
                Ok(LocationMode::PrimaryOnly)
            }
        }
        CommandLocationMode::SecondaryOnly => {
            if requested == LocationMode::PrimaryOnly {
                Err(RequestError::SecondaryOnlyCommand.into())
            } else {
                Ok(LocationMode::SecondaryOnly)
            }
        }
    }
}

/// Location of the first attempt.
///
/// A hint (e.g. the location recorded in a continuation token) wins when the mode
/// permits it.
pub fn initial_location(mode: LocationMode, hint: Option<StorageLocation>) -> StorageLocation {
    match hint {
        Some(location) if mode.permits(location) => location,
        _ => mode.first_location(),
    }
}

/// Primary and optional secondary endpoint URI of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageUri {
    primary: Option<Url>,
    secondary: Option<Url>,
}

impl StorageUri {
    /// A resource reachable only through its primary endpoint.
    pub fn new(primary: Url) -> Self {
        Self {
            primary: Some(primary),
            secondary: None,
        }
    }

    /// A resource with both endpoints.
    pub fn with_secondary(primary: Url, secondary: Url) -> Self {
        Self {
            primary: Some(primary),
            secondary: Some(secondary),
        }
    }

    /// Parse both endpoints from strings.
    pub fn parse(primary: &str, secondary: Option<&str>) -> Result<Self, StorageError> {
        let primary = parse_endpoint(primary)?;
        let secondary = secondary.map(parse_endpoint).transpose()?;
        Ok(Self {
            primary: Some(primary),
            secondary,
        })
    }

    /// Primary endpoint.
    pub fn primary(&self) -> Option<&Url> {
        self.primary.as_ref()
    }

    /// Secondary endpoint.
    pub fn secondary(&self) -> Option<&Url> {
        self.secondary.as_ref()
    }

    /// Endpoint of `location`.
    pub fn location_uri(&self, location: StorageLocation) -> Option<&Url> {
        match location {
            StorageLocation::Primary => self.primary(),
            StorageLocation::Secondary => self.secondary(),
            StorageLocation::Unspecified => None,
        }
    }

    /// Fail unless every location `mode` may use has an endpoint.
    pub fn validate(&self, mode: LocationMode) -> Result<(), StorageError> {
        let required: &[StorageLocation] = match mode {
            LocationMode::PrimaryOnly => &[StorageLocation::Primary],
            LocationMode::SecondaryOnly => &[StorageLocation::Secondary],
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary => {
                &[StorageLocation::Primary, StorageLocation::Secondary]
            }
        };

        for &location in required {
            if self.location_uri(location).is_none() {
                return Err(RequestError::MissingLocationUri { location }.into());
            }
        }
        Ok(())
    }

    /// Append path segments to both endpoints.
    ///
    /// `path` is split on `/`; each segment is percent-encoded.
    pub fn join(&self, path: &str) -> Result<Self, StorageError> {
        Ok(Self {
            primary: self.primary.as_ref().map(|u| join_path(u, path)).transpose()?,
            secondary: self
                .secondary
                .as_ref()
                .map(|u| join_path(u, path))
                .transpose()?,
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, StorageError> {
    Url::parse(endpoint).map_err(|e| {
        ConfigurationError::InvalidEndpoint {
            url: endpoint.to_string(),
            details: e.to_string(),
        }
        .into()
    })
}

fn join_path(base: &Url, path: &str) -> Result<Url, StorageError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            StorageError::from(ConfigurationError::InvalidEndpoint {
                url: base.to_string(),
                details: "endpoint cannot be a base URL".to_string(),
            })
        })?;
        segments.pop_if_empty();
        segments.extend(path.split('/'));
    }
    Ok(url)
}
