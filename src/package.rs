//! Artifact packaging for deployment.
//!
//! The packager bundles the workspace into a zip archive with entries at
//! their workspace-relative paths, then appends the rendered shim as the one
//! synthetic top-level entry. Walk or read failures abort packaging; no
//! partial archive is ever returned.

use std::fs::File;
use std::io::{self, Cursor, Write};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::shim;

/// Errors raised while packaging the artifact.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PackageError {
    /// Raised when walking the workspace fails.
    #[error("failed to walk the workspace: {message}")]
    Walk {
        /// Underlying error message.
        message: String,
    },
    /// Raised when a workspace path is not valid UTF-8.
    #[error("workspace path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },
    /// Raised when reading a workspace file fails.
    #[error("failed to read '{path}': {message}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when writing an archive entry fails.
    #[error("failed to write archive entry '{entry}': {message}")]
    Archive {
        /// Entry being written when the failure occurred.
        entry: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the finished archive cannot be written to disk.
    #[error("failed to write '{path}': {message}")]
    Output {
        /// Destination that could not be written.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Packages the workspace into a deployable zip archive.
///
/// Entries keep their paths relative to `root`, directories included, so
/// extraction recreates the workspace layout. The walk is sorted, so
/// identical workspaces produce identical archives. The rendered shim is
/// appended last under [`shim::SHIM_FILE_NAME`].
///
/// # Errors
///
/// Returns [`PackageError`] when the walk, a file read, or an archive write
/// fails.
pub fn archive_workspace(root: &Utf8Path, port: u16) -> Result<Vec<u8>, PackageError> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for walked in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = walked.map_err(|err| PackageError::Walk {
            message: err.to_string(),
        })?;
        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| PackageError::NonUtf8Path {
            path: entry.path().display().to_string(),
        })?;
        let relative = path.strip_prefix(root).map_err(|err| PackageError::Walk {
            message: err.to_string(),
        })?;

        if entry.file_type().is_dir() {
            archive
                .add_directory(relative.as_str(), options)
                .map_err(|err| PackageError::Archive {
                    entry: relative.as_str().to_owned(),
                    message: err.to_string(),
                })?;
        } else {
            append_file(&mut archive, path, relative, options)?;
        }
    }

    append_shim(&mut archive, port, options)?;

    let cursor = archive.finish().map_err(|err| PackageError::Archive {
        entry: String::from("central directory"),
        message: err.to_string(),
    })?;
    Ok(cursor.into_inner())
}

/// Writes the packaged artifact to `<name>.zip` inside the workspace.
///
/// Backs the `package` subcommand, so the artifact can be inspected exactly
/// as it would have been uploaded.
///
/// # Errors
///
/// Returns [`PackageError`] when packaging or the final write fails.
pub fn write_archive(root: &Utf8Path, port: u16, name: &str) -> Result<Utf8PathBuf, PackageError> {
    let bytes = archive_workspace(root, port)?;
    let path = root.join(format!("{name}.zip"));
    std::fs::write(&path, bytes).map_err(|err| PackageError::Output {
        path: path.clone(),
        message: err.to_string(),
    })?;
    Ok(path)
}

fn append_file(
    archive: &mut ZipWriter<Cursor<Vec<u8>>>,
    path: &Utf8Path,
    relative: &Utf8Path,
    options: FileOptions,
) -> Result<(), PackageError> {
    archive
        .start_file(relative.as_str(), options)
        .map_err(|err| PackageError::Archive {
            entry: relative.as_str().to_owned(),
            message: err.to_string(),
        })?;

    let mut file = File::open(path).map_err(|err| PackageError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    io::copy(&mut file, archive).map_err(|err| PackageError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(())
}

fn append_shim(
    archive: &mut ZipWriter<Cursor<Vec<u8>>>,
    port: u16,
    options: FileOptions,
) -> Result<(), PackageError> {
    archive
        .start_file(shim::SHIM_FILE_NAME, options)
        .map_err(|err| PackageError::Archive {
            entry: shim::SHIM_FILE_NAME.to_owned(),
            message: err.to_string(),
        })?;
    archive
        .write_all(shim::render_shim(port).as_bytes())
        .map_err(|err| PackageError::Archive {
            entry: shim::SHIM_FILE_NAME.to_owned(),
            message: err.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_workspace_aborts_packaging() {
        let result = archive_workspace(Utf8Path::new("/nonexistent/liftoff-workspace"), 3000);
        assert!(matches!(result, Err(PackageError::Walk { .. })));
    }
}
