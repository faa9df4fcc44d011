//! Connection failures, which need no running database.

use plinth::Error;
use std::time::Duration;

fn unreachable_config() -> tokio_postgres::Config {
    // Nothing listens on port 1
    let mut config = tokio_postgres::Config::new();
    config
        .host("127.0.0.1")
        .port(1)
        .user("postgres")
        .connect_timeout(Duration::from_secs(2));
    config
}

#[tokio::test]
async fn unreachable_database_is_a_connection_error() {
    let pool = plinth::single_connection_pool(unreachable_config()).unwrap();
    let err = plinth::acquire(&pool).await.unwrap_err();

    assert!(
        matches!(err, Error::Connection(_)),
        "expected Connection, got {:?}",
        err
    );
    assert!(err.report().is_none());
    assert!(err.to_string().starts_with("cannot reach database"));
}

#[tokio::test]
async fn pool_is_built_without_connecting() {
    // Building must not touch the network; only acquisition fails
    let pool = plinth::single_connection_pool(unreachable_config()).unwrap();
    assert_eq!(pool.status().max_size, 1);
}
