//! Maps asset references found in markup to the URLs they were imported
//! under. Used by both the HTML rewriter and the normalizer so the two
//! passes agree on what "the same asset" means.

use std::collections::BTreeMap;

/// Original relative path (e.g. `assets/img/a.jpg`) to final served URL.
pub type PathMap = BTreeMap<String, String>;

/// True for references that already point somewhere absolute and must not
/// be remapped onto a local asset.
pub fn is_absolute_reference(value: &str) -> bool {
    let v = value.trim();
    if v.starts_with("//") || v.starts_with('#') {
        return true;
    }
    let low = v.to_ascii_lowercase();
    if low.starts_with("data:") || low.starts_with("blob:") || low.starts_with("mailto:") {
        return true;
    }
    match v.find("://") {
        Some(idx) => v[..idx].chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        None => false,
    }
}

fn strip_query(value: &str) -> &str {
    let end = value.find(['?', '#']).unwrap_or(value.len());
    &value[..end]
}

/// Last path segment, ignoring any query string or fragment.
pub fn basename(value: &str) -> &str {
    let path = strip_query(value.trim());
    let path = path.trim_end_matches('/');
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn exact_key(value: &str) -> &str {
    let v = value.trim();
    let v = v.strip_prefix("./").unwrap_or(v);
    v.trim_start_matches('/')
}

/// Resolves `value` against the path map: exact relative path first, then a
/// basename match. Returns `None` when nothing matches.
pub fn resolve_asset<'a>(path_map: &'a PathMap, value: &str) -> Option<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_absolute_reference(trimmed) {
        return None;
    }
    if let Some(url) = path_map.get(trimmed).or_else(|| path_map.get(exact_key(trimmed))) {
        return Some(url.as_str());
    }
    let wanted = basename(trimmed);
    if wanted.is_empty() {
        return None;
    }
    path_map
        .iter()
        .find(|(key, _)| basename(key) == wanted)
        .map(|(_, url)| url.as_str())
}

/// Lowercased extension of the referenced file, without query string.
pub fn extension_of(value: &str) -> String {
    let name = basename(value);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> PathMap {
        let mut m = PathMap::new();
        m.insert("assets/a.jpg".to_string(), "https://cdn.test/media/a.jpg".to_string());
        m.insert("assets/sub/foo.jpg".to_string(), "https://cdn.test/media/foo.jpg".to_string());
        m
    }

    #[test]
    fn exact_match_wins() {
        assert_eq!(resolve_asset(&map(), "assets/a.jpg"), Some("https://cdn.test/media/a.jpg"));
        assert_eq!(resolve_asset(&map(), "./assets/a.jpg"), Some("https://cdn.test/media/a.jpg"));
        assert_eq!(resolve_asset(&map(), " assets/a.jpg "), Some("https://cdn.test/media/a.jpg"));
    }

    #[test]
    fn basename_fallback_handles_prefix_drift() {
        assert_eq!(resolve_asset(&map(), "img/foo.jpg"), Some("https://cdn.test/media/foo.jpg"));
        assert_eq!(resolve_asset(&map(), "foo.jpg?v=2"), Some("https://cdn.test/media/foo.jpg"));
    }

    #[test]
    fn unknown_and_absolute_references_are_left_alone() {
        assert_eq!(resolve_asset(&map(), "assets/missing.png"), None);
        assert_eq!(resolve_asset(&map(), "https://elsewhere.test/a.jpg"), None);
        assert_eq!(resolve_asset(&map(), "data:image/png;base64,AAAA"), None);
        assert_eq!(resolve_asset(&map(), ""), None);
    }

    #[test]
    fn extension_ignores_query() {
        assert_eq!(extension_of("assets/Clip.MP4?x=1"), "mp4");
        assert_eq!(extension_of("noext"), "");
    }
}
