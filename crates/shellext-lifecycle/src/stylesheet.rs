//! Stylesheet loading for extensions that ship CSS.
//!
//! A session-mode specific `<mode>.css` takes precedence over the generic
//! `stylesheet.css`. Rendering is out of scope: the "theme" is the set of
//! stylesheets currently loaded, keyed by extension id.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use shellext_core::error::ExtensionError;
use shellext_core::traits::StylesheetLoader;
use shellext_core::types::ExtensionInfo;

/// Generic stylesheet file name.
pub const STYLESHEET_FILE: &str = "stylesheet.css";

/// Stylesheet loaded into the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedStylesheet {
    /// File the stylesheet was read from.
    pub path: PathBuf,
    /// Stylesheet contents.
    pub css: String,
}

/// Theme holding the stylesheets of active extensions.
#[derive(Debug, Default)]
pub struct ThemeStylesheets {
    /// Extension id → loaded stylesheet.
    loaded: RwLock<HashMap<String, LoadedStylesheet>>,
}

impl ThemeStylesheets {
    /// Creates an empty theme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stylesheet currently loaded for `uuid`.
    pub async fn loaded(&self, uuid: &str) -> Option<LoadedStylesheet> {
        self.loaded.read().await.get(uuid).cloned()
    }
}

#[async_trait]
impl StylesheetLoader for ThemeStylesheets {
    async fn load_stylesheet(
        &self,
        extension: &ExtensionInfo,
        session_mode: &str,
    ) -> Result<Option<PathBuf>, ExtensionError> {
        let candidates = [format!("{session_mode}.css"), STYLESHEET_FILE.to_string()];

        for name in candidates {
            let path = extension.path.join(&name);
            let css = match tokio::fs::read_to_string(&path).await {
                Ok(css) => css,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ExtensionError::Stylesheet {
                        uuid: extension.uuid.clone(),
                        path,
                        reason: e.to_string(),
                    });
                }
            };

            info!(uuid = %extension.uuid, path = %path.display(), "Stylesheet loaded");
            self.loaded.write().await.insert(
                extension.uuid.clone(),
                LoadedStylesheet {
                    path: path.clone(),
                    css,
                },
            );
            return Ok(Some(path));
        }

        debug!(uuid = %extension.uuid, "Extension ships no stylesheet");
        Ok(None)
    }

    async fn unload_stylesheet(&self, uuid: &str) {
        if let Some(sheet) = self.loaded.write().await.remove(uuid) {
            debug!(uuid = %uuid, path = %sheet.path.display(), "Stylesheet unloaded");
        }
    }
}
