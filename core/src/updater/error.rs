//! Error types for subscription refresh

use thiserror::Error;

use crate::subscription::{DocumentError, RegistryError};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("fetched document for subscription {id} is invalid")]
    Document {
        id: i64,
        #[source]
        source: DocumentError,
    },

    #[error("fetched document has id {found}, expected {expected}")]
    IdMismatch { expected: i64, found: i64 },

    #[error("subscription {id} is up to date (have version {current}, fetched {fetched})")]
    NotNewer { id: i64, current: i64, fetched: i64 },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
