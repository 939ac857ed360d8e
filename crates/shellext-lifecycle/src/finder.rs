//! Extension discovery by directory scan.
//!
//! The per-user directory is scanned first, then each system directory in
//! order. The first directory containing a given id wins; later copies are
//! logged and skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use shellext_core::config::extensions::ExtensionsConfig;
use shellext_core::result::AppResult;
use shellext_core::types::ExtensionOrigin;

/// An extension directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredExtension {
    /// Directory name, taken as the extension id.
    pub uuid: String,
    /// Extension directory.
    pub dir: PathBuf,
    /// Which kind of directory it was found in.
    pub origin: ExtensionOrigin,
}

/// Scans extension directories.
#[derive(Debug, Clone)]
pub struct ExtensionFinder {
    /// Per-user extension directory.
    user_dir: PathBuf,
    /// System extension directories.
    system_dirs: Vec<PathBuf>,
}

impl ExtensionFinder {
    /// Creates a finder over the given directories.
    pub fn new(user_dir: impl Into<PathBuf>, system_dirs: Vec<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            system_dirs,
        }
    }

    /// Creates a finder from configuration.
    pub fn from_config(config: &ExtensionsConfig) -> Self {
        Self::new(
            &config.user_dir,
            config.system_dirs.iter().map(PathBuf::from).collect(),
        )
    }

    /// Per-user extension directory.
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// Lists every extension directory, first occurrence of an id winning.
    pub async fn scan(&self) -> AppResult<Vec<DiscoveredExtension>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut found = Vec::new();

        let roots = std::iter::once((self.user_dir.as_path(), ExtensionOrigin::PerUser)).chain(
            self.system_dirs
                .iter()
                .map(|d| (d.as_path(), ExtensionOrigin::System)),
        );

        for (root, origin) in roots {
            for (uuid, dir) in list_subdirectories(root).await? {
                if !seen.insert(uuid.clone()) {
                    info!(
                        uuid = %uuid,
                        path = %dir.display(),
                        "Extension already found in a higher-priority directory, skipping"
                    );
                    continue;
                }
                found.push(DiscoveredExtension { uuid, dir, origin });
            }
        }

        debug!(count = found.len(), "Extension scan complete");
        Ok(found)
    }
}

/// Subdirectories of `root` sorted by name. A missing root yields nothing.
async fn list_subdirectories(root: &Path) -> AppResult<Vec<(String, PathBuf)>> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %root.display(), "Extension directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path()));
        }
    }

    dirs.sort();
    Ok(dirs)
}
