//! Throwaway migrated databases for tests.
//!
//! Migrations run once into a template file; every test then gets its own
//! copy of that file in a fresh temp dir.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::DBService;

static TEMPLATE_DIR: OnceLock<TempDir> = OnceLock::new();
static TEMPLATE_READY: OnceCell<PathBuf> = OnceCell::const_new();

fn options_for(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .expect("invalid sqlite path")
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
}

async fn template_path() -> &'static PathBuf {
    TEMPLATE_READY
        .get_or_init(|| async {
            let dir = TEMPLATE_DIR
                .get_or_init(|| TempDir::new().expect("failed to create template dir"));
            let path = dir.path().join("template.db");

            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options_for(&path))
                .await
                .expect("failed to open template database");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to migrate template database");
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&pool)
                .await
                .expect("failed to checkpoint template database");
            pool.close().await;

            tracing::debug!(path = %path.display(), "Template database ready");
            path
        })
        .await
}

/// A migrated pool on a private database file. Keep the `TempDir` alive for
/// as long as the pool is used.
pub async fn create_test_pool() -> (SqlitePool, TempDir) {
    let template = template_path().await;

    let temp_dir = TempDir::new().expect("failed to create test dir");
    let db_path = temp_dir.path().join("test.db");
    std::fs::copy(template, &db_path).expect("failed to copy template database");

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options_for(&db_path))
        .await
        .expect("failed to open test database");

    (pool, temp_dir)
}

/// Same as [`create_test_pool`], wrapped in a [`DBService`].
pub async fn create_test_db() -> (DBService, TempDir) {
    let (pool, dir) = create_test_pool().await;
    (DBService::from_pool(pool), dir)
}
