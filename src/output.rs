//! Output path checks, run before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::OutputError;

/// `notes.md` becomes `notes.pdf` next to it.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// Refuse directories, existing files (unless overwriting is allowed) and
/// missing parent directories. Nothing is created here.
pub fn check_output(path: &Path, config: &Config) -> Result<(), OutputError> {
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.is_dir() {
            return Err(OutputError::IsDirectory {
                path: path.to_path_buf(),
            });
        }
        if !config.allow_overwrite {
            debug!(path = %path.display(), "refusing to overwrite existing output");
            return Err(OutputError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        warn!(path = %path.display(), "existing output will be replaced");
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    if !parent.is_dir() {
        return Err(OutputError::MissingParent {
            parent: parent.to_path_buf(),
        });
    }

    Ok(())
}
