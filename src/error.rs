//! Error taxonomy shared by every provider component.
//!
//! Configuration errors surface at startup and stop the process. Everything
//! raised inside a sync cycle (fetch, mapping, submission) is caught at the
//! [`ScheduledSyncTask`](crate::task::ScheduledSyncTask) boundary and logged.

use thiserror::Error;

/// Everything that can go wrong while building or running a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Invalid or incomplete host configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `run()` was called before `connect()`.
    #[error("provider is not initialized: connect() has not been called")]
    NotInitialized,

    /// `connect()` was called on a provider that already holds a connection.
    #[error("provider is already connected")]
    AlreadyConnected,

    /// The remote endpoint could not be reached or answered with a failure.
    #[error("failed to fetch event types: {message}")]
    RemoteFetch {
        status: Option<u16>,
        message: String,
    },

    /// A remote record could not be turned into a catalog entity.
    #[error("failed to map event type: {0}")]
    Mapping(String),

    /// The catalog connection rejected the mutation.
    #[error("failed to apply mutation: {0}")]
    Submission(#[source] anyhow::Error),
}

impl ProviderError {
    /// Stable, human-readable kind of the error, used as the `name` log field.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderError::Configuration(_) => "ConfigurationError",
            ProviderError::NotInitialized => "NotInitializedError",
            ProviderError::AlreadyConnected => "AlreadyConnectedError",
            ProviderError::RemoteFetch { .. } => "RemoteFetchError",
            ProviderError::Mapping(_) => "MappingError",
            ProviderError::Submission(_) => "SubmissionError",
        }
    }

    /// HTTP status code of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::RemoteFetch { status, .. } => *status,
            _ => None,
        }
    }

    /// The chain of underlying causes, outermost first, joined with `: `.
    ///
    /// Stands in for a stack trace in log output.
    pub fn stack(&self) -> String {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        chain.join(": ")
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        ProviderError::Configuration(message.into())
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
