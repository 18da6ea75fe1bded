use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use relay_core::{HandlerRegistry, HandlerSpec};
use serde::{Deserialize, Serialize};

/// An external program that implements a named host command.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HostCommand {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Relay settings, read from `<config dir>/webview-relay/settings.json`.
///
/// `#[serde(default)]` fills any field missing from the file, so older files
/// keep working as fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // ── Bundle ───────────────────────────────────────────────────────────
    pub bundle_dir: String,
    pub entry_document: String,
    /// Root the bundle is served from; empty means the bundle directory's
    /// `file://` URI.
    pub base_uri: String,
    pub build_config: String,

    // ── Routing ──────────────────────────────────────────────────────────
    /// Extra handlers, replacing built-in ones with the same name.
    pub handlers: BTreeMap<String, HandlerSpec>,
    /// Built-in handlers to remove.
    pub disabled_handlers: Vec<String>,

    // ── Host ─────────────────────────────────────────────────────────────
    pub commands: Vec<HostCommand>,
    /// Also print messages shown to the user on stderr.
    pub echo_messages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bundle_dir: String::from("build/web"),
            entry_document: String::from("index.html"),
            base_uri: String::new(),
            build_config: String::new(),

            handlers: BTreeMap::new(),
            disabled_handlers: Vec::new(),

            commands: Vec::new(),
            echo_messages: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Settings {
    /// The handler table: built-ins, minus disabled ones, plus overrides.
    pub fn registry(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::with_defaults();
        for name in &self.disabled_handlers {
            if registry.remove(name).is_none() {
                log::warn!("Cannot disable unknown handler '{}'", name);
            }
        }
        for (name, spec) in &self.handlers {
            registry.insert(name.clone(), spec.clone());
        }
        registry
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("webview-relay").join("settings.json"))
}

pub fn load_from(path: &Path) -> Result<Settings, SettingsError> {
    let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load settings from `path` (or the default location). A missing default
/// file means defaults; a broken file is reported and replaced by defaults.
pub fn load(path: Option<&Path>) -> Settings {
    let explicit = path.is_some();
    let Some(path) = path.map(Path::to_path_buf).or_else(settings_path) else {
        log::warn!("Cannot determine config directory; using default settings");
        return Settings::default();
    };
    match load_from(&path) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path.display());
            settings
        }
        Err(SettingsError::Read { source, .. })
            if !explicit && source.kind() == std::io::ErrorKind::NotFound =>
        {
            Settings::default()
        }
        Err(e) => {
            log::warn!("{}; using default settings", e);
            Settings::default()
        }
    }
}
