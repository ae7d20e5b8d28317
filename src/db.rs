use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Boxed future returned by a transaction body
pub type TxnFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'c>>;

/// Pool options derived from the `db_*` settings.
pub fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);
    opt
}

/// Opens the connection pool described by `cfg`.
///
/// # Errors
/// Returns the driver error if the pool cannot be established
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    gauge!("storefront_db.max_connections", cfg.db_max_connections as f64);
    debug!(
        max_connections = cfg.db_max_connections,
        min_connections = cfg.db_min_connections,
        "Opening database pool"
    );

    let pool = Database::connect(connect_options(cfg)).await?;
    info!(backend = ?pool.get_database_backend(), "Database pool ready");
    Ok(pool)
}

/// Runs `body` inside a database transaction.
///
/// The transaction commits when `body` returns `Ok` and rolls back otherwise,
/// including when the returned future is dropped before completion.
pub async fn transaction<F, T>(pool: &DbPool, name: &'static str, body: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxnFuture<'c, T> + Send,
    T: Send,
{
    let start = Instant::now();
    counter!("storefront_db.transaction.started", 1, "name" => name);

    let result = pool.transaction::<_, T, ServiceError>(body).await;

    let elapsed = start.elapsed();
    histogram!("storefront_db.transaction.duration", elapsed, "name" => name);

    match &result {
        Ok(_) => {
            counter!("storefront_db.transaction.committed", 1, "name" => name);
            debug!(transaction = name, duration = ?elapsed, "Transaction committed");
        }
        Err(err) => {
            counter!("storefront_db.transaction.rolled_back", 1, "name" => name);
            warn!(transaction = name, duration = ?elapsed, error = %err, "Transaction rolled back");
        }
    }

    result.map_err(ServiceError::from)
}

/// Applies every pending schema migration.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    let start = Instant::now();
    let pending = crate::migrator::Migrator::get_pending_migrations(pool).await?.len();
    crate::migrator::Migrator::up(pool, None).await?;
    info!(applied = pending, elapsed = ?start.elapsed(), "Schema up to date");
    Ok(())
}

/// Round-trips `SELECT 1`; backs the health endpoint.
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    let backend = pool.get_database_backend();
    pool.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
        .await
        .map(|_| ())
}
