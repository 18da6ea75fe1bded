//! Loading the pre-built web app shown inside the webview.
//!
//! The host serves one entry document with its `<base href="/">` pointed at
//! the URI the bundle is actually served from, and falls back to a small
//! diagnostic page when the bundle is missing.

pub mod assets;
pub mod bootstrap;
pub mod util;

pub use assets::{Asset, ContentBundle, ContentError};
pub use bootstrap::{render_bootstrap, BootstrapValues};
