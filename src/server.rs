//! Precondition check for the bundled `server` executable.
//!
//! The shim spawns `./server` from the extracted artifact, so a deployment
//! without an executable `server` file would only fail once it is already
//! live. The check runs before any packaging or provider call.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Name of the server executable the shim spawns.
pub const SERVER_FILE_NAME: &str = "server";

/// Errors raised while checking the server executable.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ServerFileError {
    /// Raised when the workspace has no `server` file.
    #[error("can't find or open the 'server' file at '{path}': {message}")]
    Missing {
        /// Expected location of the server file.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the executable bits cannot be added.
    #[error("the 'server' file is not executable and updating permissions failed: {message}")]
    Permissions {
        /// Underlying error message.
        message: String,
    },
}

/// Verifies the workspace contains the `server` file the shim spawns,
/// adding the executable bits when they are missing.
///
/// Returns `true` when permissions had to be updated, so the caller can
/// mention the change.
///
/// # Errors
///
/// Returns [`ServerFileError`] when the file is absent or its permissions
/// cannot be changed.
pub fn ensure_server_executable(root: &Utf8Path) -> Result<bool, ServerFileError> {
    let path = root.join(SERVER_FILE_NAME);
    let metadata = std::fs::metadata(&path).map_err(|err| ServerFileError::Missing {
        path: path.clone(),
        message: err.to_string(),
    })?;

    make_executable(&path, &metadata)
}

#[cfg(unix)]
fn make_executable(
    path: &Utf8Path,
    metadata: &std::fs::Metadata,
) -> Result<bool, ServerFileError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = metadata.permissions();
    if permissions.mode() & 0o111 != 0 {
        return Ok(false);
    }

    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions).map_err(|err| ServerFileError::Permissions {
        message: err.to_string(),
    })?;
    Ok(true)
}

#[cfg(not(unix))]
fn make_executable(
    _path: &Utf8Path,
    _metadata: &std::fs::Metadata,
) -> Result<bool, ServerFileError> {
    Ok(false)
}
