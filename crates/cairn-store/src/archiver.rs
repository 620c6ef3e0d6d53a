//! Pack declared output files and directories into a single blob.
//!
//! Entries compress their payload as a whole, so archives are plain tar.

use cairn_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Archive `paths` (relative to `base_dir`, or absolute below it) into tar bytes.
///
/// Missing paths are skipped: a task may legitimately not produce an
/// optional output.
pub fn archive_paths(base_dir: &Path, paths: &[PathBuf]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    // Stable headers keep identical outputs byte-identical.
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    for p in paths {
        let abs_path = if p.is_absolute() {
            p.clone()
        } else {
            base_dir.join(p)
        };
        let name = abs_path.strip_prefix(base_dir).map_err(|_| {
            Error::InvalidInput(format!(
                "output {} is outside {}",
                abs_path.display(),
                base_dir.display()
            ))
        })?;

        if !abs_path.exists() {
            debug!(path = %abs_path.display(), "Skipping missing output");
            continue;
        }
        if abs_path.is_dir() {
            builder
                .append_dir_all(name, &abs_path)
                .map_err(|e| Error::Internal(format!("Failed to pack dir: {}", e)))?;
        } else {
            builder
                .append_path_with_name(&abs_path, name)
                .map_err(|e| Error::Internal(format!("Failed to pack file: {}", e)))?;
        }
    }

    builder
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to finish tar: {}", e)))
}

/// Unpack an archive produced by [`archive_paths`] into `dest`.
pub fn restore_archive(archive: &[u8], dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(|e| Error::storage(dest, e))?;
    let mut archive = tar::Archive::new(archive);
    archive.set_preserve_mtime(false);
    archive
        .unpack(dest)
        .map_err(|e| Error::Protocol(format!("Failed to unpack archive: {}", e)))
}
