use std::path::{Path, PathBuf};

use crate::util::{
    canonicalize_within_root, directory_to_uri, escape_html, mime_type_for_path,
    normalize_base_uri, stays_within_root,
};

/// The base tag a production build of the embedded app ships with.
pub const DEFAULT_BASE_TAG: &str = r#"<base href="/">"#;

pub const DEFAULT_ENTRY_DOCUMENT: &str = "index.html";

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{} not found", .path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is outside the bundle root", .path.display())]
    OutsideRoot { path: PathBuf },
}

/// A static asset read from the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// A pre-built web app on disk: one entry document plus its assets.
#[derive(Debug, Clone)]
pub struct ContentBundle {
    root: PathBuf,
    entry: String,
}

impl ContentBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ContentBundle {
            root: root.into(),
            entry: DEFAULT_ENTRY_DOCUMENT.to_string(),
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }

    /// The URI the bundle is served from when the host gives none: the
    /// bundle directory itself.
    pub fn default_base_uri(&self) -> Option<String> {
        let absolute = std::fs::canonicalize(&self.root).ok()?;
        directory_to_uri(&absolute)
    }

    /// Read the entry document untouched.
    pub fn read_entry(&self) -> Result<String, ContentError> {
        let path = self.entry_path();
        std::fs::read_to_string(&path).map_err(|e| io_error(path, e))
    }

    /// The HTML to show in the webview: the entry document with its base
    /// href pointed at `base_uri`, or a placeholder explaining why the app
    /// could not be loaded.
    pub fn render_entry(&self, base_uri: &str) -> String {
        match self.read_entry() {
            Ok(html) => {
                log::debug!("Read entry document {}", self.entry_path().display());
                rewrite_base_href(&html, base_uri)
            }
            Err(e) => {
                log::error!("Could not load embedded app: {}", e);
                placeholder_document(&e)
            }
        }
    }

    /// Read a static asset by its path relative to the bundle root. Paths
    /// that resolve outside the root are refused before anything is looked
    /// up on disk.
    pub fn read_asset(&self, relative: &str) -> Result<Asset, ContentError> {
        let relative = relative.trim_start_matches('/');
        let requested = self.root.join(relative);
        if !stays_within_root(Path::new(relative)) {
            return Err(ContentError::OutsideRoot { path: requested });
        }
        let path = match canonicalize_within_root(&requested, &self.root) {
            Ok(Some(path)) => path,
            Ok(None) => return Err(ContentError::OutsideRoot { path: requested }),
            Err(e) => return Err(io_error(requested, e)),
        };
        let bytes = std::fs::read(&path).map_err(|e| io_error(path.clone(), e))?;
        Ok(Asset {
            mime_type: mime_type_for_path(&path),
            path,
            bytes,
        })
    }
}

fn io_error(path: PathBuf, e: std::io::Error) -> ContentError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ContentError::Missing { path }
    } else {
        ContentError::Unreadable { path, source: e }
    }
}

/// Point the first `<base href="/">` at `base_uri`. Only that one occurrence
/// changes; a document without the tag is returned as is.
pub fn rewrite_base_href(html: &str, base_uri: &str) -> String {
    let replacement = format!(
        r#"<base href="{}">"#,
        escape_html(&normalize_base_uri(base_uri))
    );
    if !html.contains(DEFAULT_BASE_TAG) {
        log::warn!("Entry document has no {} tag; leaving it unchanged", DEFAULT_BASE_TAG);
        return html.to_string();
    }
    html.replacen(DEFAULT_BASE_TAG, &replacement, 1)
}

/// Minimal document shown in place of the app when the bundle is unusable.
pub fn placeholder_document(error: &ContentError) -> String {
    format!(
        "<html><body><h1>Error: Could not load the embedded app</h1><p>{}</p></body></html>",
        escape_html(&error.to_string())
    )
}
