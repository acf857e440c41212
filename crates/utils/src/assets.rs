use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Directory holding the database and log files.
///
/// Debug builds keep everything under `dev_assets/` at the workspace root so a
/// development server never touches the real data directory.
pub fn data_dir() -> PathBuf {
    let path = if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("dev", "kanban", "kanban-board")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!(path = %path.display(), "failed to create data directory: {}", e);
    }

    path
    // macOS → ~/Library/Application Support/dev.kanban.kanban-board
    // Linux → ~/.local/share/kanban-board (respects XDG_DATA_HOME)
}

/// Default SQLite file location: `{data_dir}/kanban.sqlite`
pub fn default_database_path() -> PathBuf {
    data_dir().join("kanban.sqlite")
}

/// Default directory for rotated log files: `{data_dir}/logs`
pub fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix('~') else {
        return PathBuf::from(path);
    };
    let Some(home) = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) else {
        return PathBuf::from(path);
    };
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        home
    } else {
        home.join(Path::new(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/lib/kanban.sqlite"), PathBuf::from("/var/lib/kanban.sqlite"));
    }

    #[test]
    fn test_expand_tilde_uses_home() {
        let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) else {
            return;
        };
        assert_eq!(expand_tilde("~/kanban/db.sqlite"), home.join("kanban/db.sqlite"));
        assert_eq!(expand_tilde("~"), home);
    }

    #[test]
    fn test_default_database_path_file_name() {
        let path = default_database_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("kanban.sqlite"));
    }
}
