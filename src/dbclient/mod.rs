//! The Database Client contract (spec §4.3, §6): open a session to a
//! Postgres-like service, run a text query with the simple query protocol
//! (for pooler compatibility), return a [`QueryResult`]; close cleanly.

pub mod sqlx_client;

use crate::query_result::QueryResult;
use futures::future::BoxFuture;
use secrecy::SecretString;
use thiserror::Error;

/// Connection parameters for one monitored service (spec §3, Service's
/// "connection endpoint" field).
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("server unreachable at {0}")]
    Unreachable(String),
    #[error("authentication failed for user {0}")]
    AuthFailed(String),
    #[error("connected to wrong database, expected {0}")]
    WrongDatabase(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error(transparent)]
    UnsupportedType(#[from] crate::query_result::UnsupportedTypeError),
}

/// An opaque, live connection. Strictly scoped to one collection cycle
/// (spec §5: "never pooled across cycles").
pub trait Session: Send {
    /// # Errors
    /// Returns [`DbError::QueryFailed`] on a version-read failure.
    fn version(&mut self) -> BoxFuture<'_, Result<u32, DbError>>;

    /// # Errors
    /// Returns [`DbError::QueryFailed`] on execution failure, or
    /// [`DbError::UnsupportedType`] if a returned column's type OID is not
    /// in [`crate::query_result::SUPPORTED_OIDS`].
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryResult, DbError>>;

    /// Best-effort; failures are logged by the implementation, never
    /// propagated (spec §4.3).
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// The Database Client contract itself: how to obtain a [`Session`].
pub trait DatabaseClient: Send + Sync {
    /// # Errors
    /// Returns [`DbError::Unreachable`], [`DbError::AuthFailed`], or
    /// [`DbError::WrongDatabase`].
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>>;
}
