//! Bulk renaming of replay files by player names.
//!
//! Walks a directory tree for `.mythrec` (or `.mythrec.gz`) files,
//! parses each one in slim mode, and renames it to the player names
//! joined by `_vs_`, with an optional prefix and suffix. Files are
//! processed concurrently, one worker per file, with errors collected
//! over a channel; the first error is surfaced after all workers
//! finish. Conflicting target names resolve last-writer-wins.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{ParserError, Result};
use crate::replay::{parse_file, ParseOptions};

/// Extension of a plain replay file.
pub const REPLAY_EXTENSION: &str = ".mythrec";

/// Extension of a gzipped replay file.
pub const REPLAY_EXTENSION_GZ: &str = ".mythrec.gz";

/// Renames every replay in `dir` after its players.
///
/// # Errors
///
/// Walk errors fail immediately. Parse and rename errors are collected
/// across workers and the first one is returned after all files were
/// attempted.
pub fn rename_rec_files(dir: &Path, is_gzip: bool, prefix: &str, suffix: &str) -> Result<()> {
    info!(directory = %dir.display(), is_gzip, "renaming replays in directory");

    let extension = if is_gzip {
        REPLAY_EXTENSION_GZ
    } else {
        REPLAY_EXTENSION
    };

    let mut replay_files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            ParserError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }))
        })?;
        if entry.file_type().is_file()
            && entry.path().to_string_lossy().ends_with(extension)
        {
            replay_files.push(entry.into_path());
        }
    }
    debug!(num_files = replay_files.len(), "found replay files");

    let options = ParseOptions {
        slim: true,
        stats: false,
        is_gzip,
    };

    let (sender, receiver) = mpsc::channel::<ParserError>();
    thread::scope(|scope| {
        for file in &replay_files {
            let sender = sender.clone();
            let options = options;
            scope.spawn(move || {
                if let Err(e) = rename_one(file, dir, extension, prefix, suffix, &options) {
                    error!(file = %file.display(), error = %e, "rename failed");
                    let _ = sender.send(e);
                }
            });
        }
    });
    drop(sender);

    // Workers are joined by the scope; surface the first failure.
    match receiver.try_recv() {
        Ok(error) => Err(error),
        Err(_) => Ok(()),
    }
}

/// Parses one replay and renames it in place.
fn rename_one(
    file: &Path,
    dir: &Path,
    extension: &str,
    prefix: &str,
    suffix: &str,
    options: &ParseOptions,
) -> Result<PathBuf> {
    let replay = parse_file(file, options)?;

    let player_names: Vec<&str> = replay
        .players
        .iter()
        .map(|player| player.name.as_str())
        .collect();
    let base = format!("{prefix}{}{suffix}", player_names.join("_vs_"));

    let new_path = dir.join(format!("{base}{extension}"));
    info!(
        old_path = %file.display(),
        new_path = %new_path.display(),
        "renaming file"
    );
    std::fs::rename(file, &new_path)?;
    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_constants() {
        assert_eq!(REPLAY_EXTENSION, ".mythrec");
        assert_eq!(REPLAY_EXTENSION_GZ, ".mythrec.gz");
        assert!(REPLAY_EXTENSION_GZ.starts_with(REPLAY_EXTENSION));
    }

    #[test]
    fn test_rename_missing_directory_fails() {
        let result = rename_rec_files(Path::new("/nonexistent/replays"), false, "", "");
        assert!(result.is_err());
    }

    #[test]
    fn test_rename_empty_directory_is_ok() {
        let dir = std::env::temp_dir().join("mythrec-rename-empty-test");
        std::fs::create_dir_all(&dir).unwrap();

        let result = rename_rec_files(&dir, false, "", "");
        assert!(result.is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_rename_collects_parse_errors() {
        let dir = std::env::temp_dir().join("mythrec-rename-error-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.mythrec"), b"not a replay").unwrap();

        let result = rename_rec_files(&dir, false, "", "");
        assert!(matches!(result, Err(ParserError::NotL33t)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
