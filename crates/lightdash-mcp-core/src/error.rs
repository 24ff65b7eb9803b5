//! Error types for lightdash-mcp-core.

use thiserror::Error;

use crate::enrich::ApiError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A required setting has no value.
    #[error("{key} is not set (set it in a config file or via {env})")]
    Missing {
        /// Config key that was empty.
        key: &'static str,
        /// Environment variable that can provide it.
        env: &'static str,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned by [`LightdashClient`](crate::client::LightdashClient).
///
/// The `Display` output of every variant is what the retry policy inspects,
/// so it must carry the HTTP status for API failures and must not carry
/// request URLs.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The API answered with a non-success status or an error envelope.
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Enriched, human-readable message.
        message: String,
        /// Structured error payload as reported by the API.
        error: ApiError,
    },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("Lightdash request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body could not be understood.
    #[error("unexpected Lightdash response for {endpoint}: {reason}")]
    Decode {
        /// Logical endpoint name, e.g. `listProjects`.
        endpoint: &'static str,
        /// What went wrong while decoding.
        reason: String,
    },

    /// The client could not be constructed.
    #[error("cannot build Lightdash client: {0}")]
    Setup(String),
}

impl ClientError {
    /// HTTP status code, when the failure came from an API response.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }
}

/// Result type alias using [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;

/// A query request that cannot be sent as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No explore was named.
    #[error("explore_id must not be empty")]
    MissingExplore,

    /// Neither dimensions nor metrics were requested.
    #[error("a query needs at least one dimension or metric")]
    NoFields,

    /// The row limit is outside the accepted range.
    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange {
        /// Requested limit.
        limit: u32,
        /// Largest accepted limit.
        max: u32,
    },
}

/// Result type alias using [`QueryError`].
pub type QueryResult<T> = Result<T, QueryError>;
