//! Small URL helpers shared by the tool adapters.

use std::hash::{Hash, Hasher};

/// The path component of a URL, without query or fragment.
fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let path = match rest.find('/') {
        Some(i) => &rest[i..],
        None => "",
    };
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

pub fn has_extension(url: &str, ext: &str) -> bool {
    path_of(url)
        .to_ascii_lowercase()
        .ends_with(&ext.to_ascii_lowercase())
}

pub fn has_any_extension(url: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| has_extension(url, ext))
}

/// `scheme://host[:port]` of a URL, when it has a scheme.
pub fn origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}

/// A filesystem-safe, collision-resistant filename for a downloaded URL.
pub fn filename_for(url: &str) -> String {
    let last = path_of(url).rsplit('/').next().unwrap_or("");
    let (name, ext) = match last.rsplit_once('.') {
        Some((name, ext)) if !ext.is_empty() => (name, format!(".{ext}")),
        _ => (last, ".js".to_string()),
    };
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(50)
        .collect();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{sanitized}_{:08x}{ext}", hasher.finish() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_matching_ignores_query_and_case() {
        assert!(has_extension("https://a.example.com/app.JS?v=3", ".js"));
        assert!(has_extension("https://a.example.com/x/y/main.js#frag", ".js"));
        assert!(!has_extension("https://a.example.com/app.json", ".js"));
        assert!(!has_extension("https://a.example.com/js", ".js"));
    }

    #[test]
    fn origin_extraction() {
        assert_eq!(
            origin("https://cdn.example.com:8443/a/b.js?q=1").as_deref(),
            Some("https://cdn.example.com:8443")
        );
        assert_eq!(origin("not a url"), None);
    }

    #[test]
    fn filenames_are_safe_and_distinct_per_url() {
        let a = filename_for("https://a.example.com/static/app.min.js");
        let b = filename_for("https://b.example.com/static/app.min.js");
        assert!(a.ends_with(".js"));
        assert!(a.starts_with("app_min_"));
        assert_ne!(a, b);
    }

    #[test]
    fn extensionless_urls_default_to_js() {
        assert!(filename_for("https://a.example.com/bundle").ends_with(".js"));
    }
}
