//! Plugin discovery - scan a directory for `*.settings-plugin` manifests

use std::path::{Path, PathBuf};

use super::manifest::MANIFEST_SUFFIX;

/// List manifest files directly inside `dir`
///
/// Only regular files carrying the manifest suffix are returned, sorted by
/// file name so repeated scans visit candidates in the same order. A
/// directory that cannot be opened yields no candidates.
#[must_use]
pub fn discover_manifests(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "failed to open plugin directory"
            );
            return Vec::new();
        }
    };

    let mut manifests: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(MANIFEST_SUFFIX))
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    manifests.sort();
    manifests
}
