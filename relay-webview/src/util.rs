use std::path::{Component, Path, PathBuf};

use url::Url;

/// Convert a local directory to a `file://` URI ending in `/`.
pub fn directory_to_uri(path: &Path) -> Option<String> {
    Url::from_directory_path(path).ok().map(|u| u.to_string())
}

/// Normalize the root the bundle is served from so it ends in exactly one `/`.
/// Everything else is kept as the caller wrote it.
pub fn normalize_base_uri(base: &str) -> String {
    format!("{}/", base.trim().trim_end_matches('/'))
}

/// Whether `relative`, joined onto a root, stays inside it without touching
/// the filesystem. Absolute paths and `..` climbing above the root do not.
pub fn stays_within_root(relative: &Path) -> bool {
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Canonicalize `path` and check it is still within `root`, which catches
/// symlinks pointing out of the root. `Ok(None)` means it escapes.
pub fn canonicalize_within_root(path: &Path, root: &Path) -> std::io::Result<Option<PathBuf>> {
    let canonical_root = std::fs::canonicalize(root)?;
    let canonical_path = std::fs::canonicalize(path)?;
    if canonical_path.starts_with(&canonical_root) {
        Ok(Some(canonical_path))
    } else {
        Ok(None)
    }
}

/// MIME type for a bundle asset, from its extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_single_trailing_slash() {
        assert_eq!(normalize_base_uri("https://host/abc"), "https://host/abc/");
        assert_eq!(normalize_base_uri("https://host/abc/"), "https://host/abc/");
        assert_eq!(normalize_base_uri("https://host/abc//"), "https://host/abc/");
    }

    #[test]
    fn normalize_bare_host() {
        assert_eq!(normalize_base_uri("https://host"), "https://host/");
    }

    #[test]
    fn normalize_keeps_root_verbatim() {
        assert_eq!(
            normalize_base_uri("https://Host.Example/A%20b"),
            "https://Host.Example/A%20b/"
        );
        assert_eq!(
            normalize_base_uri("vscode-webview://abc/build web"),
            "vscode-webview://abc/build web/"
        );
    }

    #[test]
    fn normalize_relative_root() {
        assert_eq!(normalize_base_uri("static/app"), "static/app/");
        assert_eq!(normalize_base_uri("/"), "/");
    }

    #[test]
    fn directory_uri_ends_with_slash() {
        let uri = directory_to_uri(Path::new("/tmp")).unwrap();
        assert_eq!(uri, "file:///tmp/");
    }

    #[test]
    fn lexical_root_check() {
        assert!(stays_within_root(Path::new("canvaskit/canvaskit.wasm")));
        assert!(stays_within_root(Path::new("assets/../main.dart.js")));
        assert!(stays_within_root(Path::new("./index.html")));
        assert!(!stays_within_root(Path::new("../settings.json")));
        assert!(!stays_within_root(Path::new("assets/../../x")));
        assert!(!stays_within_root(Path::new("/etc/passwd")));
    }

    #[test]
    fn canonical_path_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.dart.js");
        std::fs::write(&file, "x").unwrap();
        let resolved = canonicalize_within_root(&file, dir.path()).unwrap();
        assert!(resolved.unwrap().ends_with("main.dart.js"));
    }

    #[test]
    fn canonical_path_escaping_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("web");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "x").unwrap();
        let resolved = canonicalize_within_root(&root.join("../secret.txt"), &root).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn canonical_path_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = canonicalize_within_root(&dir.path().join("nope.js"), dir.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type_for_path(Path::new("a/index.html")), "text/html; charset=utf-8");
        assert_eq!(mime_type_for_path(Path::new("canvaskit/canvaskit.wasm")), "application/wasm");
        assert_eq!(mime_type_for_path(Path::new("main.dart.JS")), "text/javascript; charset=utf-8");
        assert_eq!(mime_type_for_path(Path::new("LICENSE")), "application/octet-stream");
    }

    #[test]
    fn escape_html_specials() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
