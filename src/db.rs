use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::gauge;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("aberturas_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        ServiceError::db_error(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies every pending migration.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let backend = pool.get_database_backend();
    pool.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("Database health check failed: {}", e);
            ServiceError::db_error(e)
        })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_and_connection_answers() {
        let pool = test_support::migrated_memory_pool().await;
        run_migrations(&pool).await.unwrap();
        // Running again is a no-op.
        run_migrations(&pool).await.unwrap();
        check_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_sqlite_schema_stores_decimal_bounds() {
        use crate::entities::{stock_item, stock_item::ItemKind};
        use crate::models::max_stored_decimal;
        use chrono::Utc;
        use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
        use uuid::Uuid;

        let dir = tempfile::tempdir().unwrap();
        let pool = test_support::migrated_file_pool(&dir.path().join("fresh.db"), 1).await;
        let now = Utc::now();
        let id = Uuid::new_v4();
        stock_item::ActiveModel {
            id: Set(id),
            sku: Set("TOPE".to_string()),
            name: Set("Tope".to_string()),
            unit: Set("u".to_string()),
            kind: Set(ItemKind::Component),
            min_stock: Set(max_stored_decimal()),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&pool)
        .await
        .unwrap();

        let stored = stock_item::Entity::find_by_id(id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        // SQLite keeps NUMERIC as REAL, so the last digit may drift
        let drift = (stored.min_stock - max_stored_decimal()).abs();
        assert!(drift < rust_decimal::Decimal::new(1, 2), "{}", stored.min_stock);
    }
}
