//! Connection acquisition.
//!
//! Migrations run on exactly one connection. It comes from a pool of size one
//! so that acquisition is scoped: the [`deadpool_postgres::Object`] goes back
//! to the pool (or is closed with it) when dropped, on every exit path.

use crate::Result;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Build a single-connection pool for `config`.
///
/// No connection is opened until the first [`Pool::get`].
pub fn single_connection_pool(config: tokio_postgres::Config) -> Result<Pool> {
    let manager = Manager::from_config(
        config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager).max_size(1).build()?;
    Ok(pool)
}

/// Acquire the pool's connection.
///
/// Fails with [`Error::Connection`](crate::Error::Connection) when the
/// database cannot be reached.
pub async fn acquire(pool: &Pool) -> Result<deadpool_postgres::Object> {
    let conn = pool.get().await?;
    tracing::debug!("acquired database connection");
    Ok(conn)
}
