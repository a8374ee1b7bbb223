//! Connection pooling abstractions.
//!
//! This module provides the [`ConnectionProvider`] trait which abstracts over
//! different ways to obtain a database connection, so `run()` and the
//! shortcut builders don't need to know whether they're talking to a single
//! shared client or a pool. The engine itself never constructs or owns a
//! connection (spec.md §1: the client/pool implementation is an external
//! collaborator).

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tokio_postgres::Client;

use crate::error::Error;

/// A source of database connections.
///
/// Implementations provide a way to obtain a connection that can be used
/// for database operations. The connection is returned as a guard type
/// that derefs to [`tokio_postgres::Client`].
///
/// # Example
///
/// ```ignore
/// async fn do_query<P: ConnectionProvider>(provider: &P) -> Result<(), Error> {
///     let conn = provider.get().await?;
///     conn.execute("SELECT 1", &[]).await?;
///     Ok(())
/// }
/// ```
pub trait ConnectionProvider: Clone + Send + Sync + 'static {
    /// The guard type that holds the connection.
    ///
    /// This type must deref to `Client` and will release the connection
    /// back to the pool (if applicable) when dropped.
    type Guard<'a>: Deref<Target = Client> + Send
    where
        Self: 'a;

    /// Obtain a connection from this provider.
    ///
    /// For a single connection, this returns immediately.
    /// For a pool, this may wait for a connection to become available.
    fn get(&self) -> impl Future<Output = Result<Self::Guard<'_>, Error>> + Send;
}

/// Implementation for a single shared connection.
///
/// This is useful for simple cases where you don't need pooling,
/// such as CLI tools or tests.
impl ConnectionProvider for Arc<Client> {
    type Guard<'a> = Arc<Client>;

    async fn get(&self) -> Result<Self::Guard<'_>, Error> {
        Ok(self.clone())
    }
}
