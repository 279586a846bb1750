use std::path::{Path, PathBuf};

use crate::error::WatchError;

/// Candidate locations of the game-log directory, relative to the user's
/// home. The OneDrive variant covers redirected Documents folders.
const LOG_DIR_CANDIDATES: &[&[&str]] = &[
    &["Documents", "EVE", "logs", "Gamelogs"],
    &["OneDrive", "Documents", "EVE", "logs", "Gamelogs"],
];

/// Probes the standard game-log locations under the current user's home
/// directory. Returns `DirectoryNotFound` when none exists; the caller
/// decides whether and when to retry.
pub fn find_game_log_directory() -> Result<PathBuf, WatchError> {
    let home_dir = std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map_err(|_| WatchError::DirectoryNotFound {
            path: PathBuf::from("~"),
        })?;

    find_game_log_directory_under(Path::new(&home_dir))
}

/// Same probe against an explicit home directory.
pub fn find_game_log_directory_under(home_dir: &Path) -> Result<PathBuf, WatchError> {
    for segments in LOG_DIR_CANDIDATES {
        let mut candidate = home_dir.to_path_buf();
        for segment in *segments {
            candidate.push(segment);
        }
        if candidate.is_dir() {
            return Ok(candidate);
        }
    }

    tracing::warn!(home = %home_dir.display(), "no game log directory found in any candidate path");
    Err(WatchError::DirectoryNotFound {
        path: home_dir.join(LOG_DIR_CANDIDATES[0].join(std::path::MAIN_SEPARATOR_STR)),
    })
}

#[cfg(test)]
mod tests {
    use super::find_game_log_directory_under;
    use crate::error::WatchError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_the_documents_location() {
        let home = TempDir::new().unwrap();
        let logs = home.path().join("Documents/EVE/logs/Gamelogs");
        fs::create_dir_all(&logs).unwrap();

        assert_eq!(find_game_log_directory_under(home.path()).unwrap(), logs);
    }

    #[test]
    fn falls_back_to_the_onedrive_location() {
        let home = TempDir::new().unwrap();
        let logs = home.path().join("OneDrive/Documents/EVE/logs/Gamelogs");
        fs::create_dir_all(&logs).unwrap();

        assert_eq!(find_game_log_directory_under(home.path()).unwrap(), logs);
    }

    #[test]
    fn missing_directory_is_an_explicit_not_found() {
        let home = TempDir::new().unwrap();

        assert!(matches!(
            find_game_log_directory_under(home.path()),
            Err(WatchError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn documents_wins_over_onedrive_when_both_exist() {
        let home = TempDir::new().unwrap();
        let primary = home.path().join("Documents/EVE/logs/Gamelogs");
        fs::create_dir_all(&primary).unwrap();
        fs::create_dir_all(home.path().join("OneDrive/Documents/EVE/logs/Gamelogs")).unwrap();

        assert_eq!(find_game_log_directory_under(home.path()).unwrap(), primary);
    }
}
