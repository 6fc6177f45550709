use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::target::Target;

/// Default location of the last-target file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = ".last_target";

/// Read the last target. Missing, unreadable or invalid content yields `None`.
pub fn load_last_target(path: impl AsRef<Path>) -> Option<Target> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read last-target file");
            }
            return None;
        }
    };
    match Target::parse(content.trim()) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid last-target file");
            None
        }
    }
}

/// Replace the last target: write a sibling temp file, then rename over the old one.
pub fn save_last_target(path: impl AsRef<Path>, target: &Target) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let tmp = temp_path(path);
    fs::write(&tmp, target.as_str()).map_err(|source| PersistenceError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        PersistenceError::Rename {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::debug!(path = %path.display(), saved = %target, "Last target saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
