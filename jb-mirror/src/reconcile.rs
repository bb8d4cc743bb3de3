use crate::error::MirrorError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Everything under `root` that the current run did not produce.
///
/// Plain files sort before directories, and each group is in reverse
/// lexical order, so a later [`clean`] removes a directory's contents
/// before the directory itself.
pub fn diff(root: &Path, known_files: &HashSet<PathBuf>) -> Result<Vec<PathBuf>, MirrorError> {
    let mut entries = Vec::new();
    if root.is_dir() {
        collect(root, &mut entries)?;
    }

    let mut unknown: Vec<(bool, PathBuf)> = entries
        .into_iter()
        .filter(|entry| !known_files.contains(entry))
        .map(|entry| (!entry.is_dir(), entry))
        .collect();

    unknown.sort();
    unknown.reverse();

    Ok(unknown.into_iter().map(|(_, entry)| entry).collect())
}

fn collect(directory: &Path, entries: &mut Vec<PathBuf>) -> Result<(), MirrorError> {
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        let is_dir = path.is_dir();

        entries.push(path.clone());
        if is_dir {
            collect(&path, entries)?;
        }
    }

    Ok(())
}

/// Best-effort removal of unknown entries, in the order [`diff`] gave.
///
/// A failed removal (non-empty directory, permissions) is logged and
/// skipped; the remaining entries are still attempted.
pub fn clean(unknown_files: &[PathBuf]) {
    for entry in unknown_files {
        tracing::info!("Removing {}", entry.display());

        let result = if entry.is_dir() {
            std::fs::remove_dir(entry)
        } else {
            match std::fs::remove_file(entry) {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };

        if let Err(err) = result {
            tracing::warn!("Could not remove unknown file {}: {}", entry.display(), err);
        }
    }
}

/// Plain-text listing, one path per line.
pub fn write_report(report_file: &Path, unknown_files: &[PathBuf]) -> Result<(), MirrorError> {
    let mut listing = String::new();
    for entry in unknown_files {
        listing.push_str(&entry.display().to_string());
        listing.push('\n');
    }

    std::fs::write(report_file, listing)?;
    Ok(())
}
