use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    Error, Executor, Pool, Sqlite, Transaction,
    sqlite::{
        SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
        SqliteSynchronous,
    },
};
use tracing::{error, info};

pub mod models;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod validation;

pub use retry::{RetryConfig, is_retryable_error, with_retry};

// ============================================================================
// Connection Pool Configuration
// ============================================================================

/// SQLite benefits from a small pool because of its single-writer model.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DEFAULT_MIN_CONNECTIONS: u32 = 1;

const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connections are closed after 10 minutes.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pragmas applied to every new connection via `after_connect`.
///
/// `synchronous` must come after `mmap_size`: with mmap enabled and no explicit
/// synchronous level, heavy write load can surface SQLITE_IOERR (522).
async fn apply_performance_pragmas(conn: &mut SqliteConnection) -> Result<(), Error> {
    conn.execute("PRAGMA temp_store = 2").await?;
    conn.execute("PRAGMA mmap_size = 67108864").await?; // 64MB
    conn.execute("PRAGMA synchronous = NORMAL").await?;
    conn.execute("PRAGMA cache_size = -32000").await?; // 32MB
    Ok(())
}

/// Start a write transaction that holds the write lock from the first
/// statement. Read-then-write sequences use this so the upgrade can never
/// fail on a snapshot another writer has already moved past.
pub async fn begin_immediate(pool: &Pool<Sqlite>) -> Result<Transaction<'static, Sqlite>, Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    /// Open (creating if needed) the database at `db_path`, verify its
    /// integrity and apply pending migrations.
    pub async fn new(db_path: &Path, max_connections: u32) -> Result<DBService, Error> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let database_url = format!("sqlite://{}", db_path.to_string_lossy());
        let max_connections = max_connections.clamp(1, 100);

        info!(
            path = %db_path.display(),
            max_connections,
            "Initializing SQLite connection pool"
        );

        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(DEFAULT_MIN_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)))
            .after_connect(|conn, _meta| {
                Box::pin(async move { apply_performance_pragmas(conn).await })
            })
            .connect_with(options)
            .await?;

        check_integrity(&pool).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(DBService { pool })
    }

    /// Wrap an existing pool (already migrated), e.g. a test database.
    pub fn from_pool(pool: Pool<Sqlite>) -> DBService {
        DBService { pool }
    }

    /// Flush the WAL into the main database file and close every connection.
    pub async fn close(&self) {
        match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
        {
            Ok(_) => info!("Final WAL checkpoint completed"),
            Err(e) => tracing::warn!("Final WAL checkpoint failed: {}", e),
        }
        self.pool.close().await;
    }
}

/// `PRAGMA quick_check` catches most corruption far faster than a full
/// `integrity_check`.
async fn check_integrity(pool: &Pool<Sqlite>) -> Result<(), Error> {
    let result: String = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(pool)
        .await?;

    if result != "ok" {
        error!(result = %result, "DATABASE CORRUPTION DETECTED");
        return Err(Error::Protocol(format!(
            "Database integrity check failed: {}",
            result
        )));
    }

    info!("Database integrity check passed");
    Ok(())
}
