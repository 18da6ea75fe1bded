use crate::assets::{ContentBundle, ContentError};

/// Loader bootstrap used when the bundle does not ship a rendered one.
pub const BOOTSTRAP_TEMPLATE: &str = include_str!("../web/bootstrap.js");

pub const DEFAULT_CANVASKIT_BASE_URL: &str = "canvaskit/";

/// Values substituted into a bootstrap template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapValues {
    /// Contents of the app's loader script (`flutter.js`).
    pub loader_js: String,
    /// Script assigning the build configuration, may be empty.
    pub build_config: String,
    /// Where the renderer fetches its wasm from, relative to the base href.
    pub canvaskit_base_url: String,
}

impl BootstrapValues {
    /// Take the loader script from the bundle; the build config is whatever
    /// the host was given.
    pub fn from_bundle(bundle: &ContentBundle, build_config: &str) -> Result<Self, ContentError> {
        let loader = bundle.read_asset("flutter.js")?;
        Ok(BootstrapValues {
            loader_js: String::from_utf8_lossy(&loader.bytes).into_owned(),
            build_config: build_config.to_string(),
            canvaskit_base_url: DEFAULT_CANVASKIT_BASE_URL.to_string(),
        })
    }
}

/// Fill `{{flutter_js}}`, `{{flutter_build_config}}` and
/// `{{canvaskit_base_url}}` in `template`. Other `{{...}}` markers are left
/// in place.
pub fn render_bootstrap(template: &str, values: &BootstrapValues) -> String {
    let substitutions = [
        ("flutter_js", values.loader_js.as_str()),
        ("flutter_build_config", values.build_config.as_str()),
        ("canvaskit_base_url", values.canvaskit_base_url.as_str()),
    ];

    let mut out = String::with_capacity(template.len() + values.loader_js.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after[..end].trim();
        match substitutions.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                log::warn!("Unknown bootstrap placeholder '{}'", name);
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
