//! Console logging plus optional rotating JSON log files.
//!
//! - `KANBAN_FILE_LOGGING`: `true` or `1` turns file output on
//! - `KANBAN_LOG_DIR`: where files go (default `{data_dir}/logs`)
//! - `KANBAN_LOG_MAX_FILES`: daily files to keep (default 7)

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};
use utils::assets::{default_log_dir, expand_tilde};

const LOG_FILE_PREFIX: &str = "kanban.log";
const DEFAULT_MAX_FILES: usize = 7;

#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub max_files: usize,
}

impl FileLoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("KANBAN_FILE_LOGGING")
            .map(|v| matches!(v.trim(), "true" | "1"))
            .unwrap_or(false);
        let log_dir = lookup("KANBAN_LOG_DIR")
            .map(|dir| expand_tilde(dir.trim()))
            .unwrap_or_else(default_log_dir);
        let max_files = lookup("KANBAN_LOG_MAX_FILES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_FILES);

        Self {
            enabled,
            log_dir,
            max_files,
        }
    }
}

/// `warn` everywhere, `log_level` for the workspace crates.
pub fn filter_directives(log_level: &str) -> String {
    format!(
        "warn,server={level},services={level},db={level},utils={level}",
        level = log_level
    )
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(log_level)).unwrap_or_else(|e| {
        eprintln!("Invalid log level '{log_level}' ({e}), falling back to info");
        EnvFilter::new(filter_directives("info"))
    })
}

/// Install the global subscriber. Hold the returned guard until shutdown so
/// buffered file output gets flushed.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::from_env();
    let console_layer = tracing_subscriber::fmt::layer().with_filter(env_filter(log_level));

    if !config.enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", config.log_dir, e);
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = ?config.log_dir,
        max_files = config.max_files,
        "File logging enabled"
    );

    let log_dir = config.log_dir.clone();
    let max_files = config.max_files;
    std::thread::spawn(move || cleanup_old_logs(&log_dir, max_files));

    Some(guard)
}

/// Keep the newest `max_files` log files.
fn cleanup_old_logs(log_dir: &Path, max_files: usize) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| (e.path(), t))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(max_files) {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed old log file: {:?}", path),
            Err(e) => tracing::warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs, time::Duration};

    use super::*;

    #[test]
    fn test_config_defaults_and_overrides() {
        let off = FileLoggingConfig::from_lookup(|_| None);
        assert!(!off.enabled);
        assert_eq!(off.max_files, DEFAULT_MAX_FILES);

        let vars = HashMap::from([
            ("KANBAN_FILE_LOGGING", "1"),
            ("KANBAN_LOG_DIR", "/var/log/kanban"),
            ("KANBAN_LOG_MAX_FILES", "3"),
        ]);
        let on = FileLoggingConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(on.enabled);
        assert_eq!(on.log_dir, PathBuf::from("/var/log/kanban"));
        assert_eq!(on.max_files, 3);
    }

    #[test]
    fn test_filter_scopes_workspace_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("services=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for day in ["2026-01-01", "2026-01-02", "2026-01-03"] {
            fs::write(dir.path().join(format!("{LOG_FILE_PREFIX}.{day}")), day).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path(), 2);

        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "kanban.log.2026-01-02".to_string(),
                "kanban.log.2026-01-03".to_string(),
                "unrelated.txt".to_string(),
            ]
        );
    }
}
