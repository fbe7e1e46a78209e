//! Image URL normalization.
//!
//! Stored image references are either absolute URLs (external hosting) or
//! paths relative to the API host such as `uploads/users/abc.png`. Clients
//! render both through [`normalize_image_url`].

/// Placeholder shown when a record has no usable image.
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

fn is_absolute(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("data:")
        || lower.starts_with("blob:")
        || url.starts_with("//")
}

/// Resolve `raw` against `base_url`. Returns `None` for blank input.
pub fn normalize_image_url(base_url: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if is_absolute(raw) {
        return Some(raw.to_string());
    }

    let path = raw.replace('\\', "/");
    let path = path.trim_start_matches("./").trim_start_matches('/');
    let base = base_url.trim().trim_end_matches('/');

    if base.is_empty() {
        Some(format!("/{}", path))
    } else {
        Some(format!("{}/{}", base, path))
    }
}

/// First image of a record, normalized, or the placeholder.
pub fn primary_image(base_url: &str, images: &[String]) -> String {
    images
        .iter()
        .find_map(|raw| normalize_image_url(base_url, raw))
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_urls_pass_through() {
        assert_eq!(
            normalize_image_url("http://api", "https://cdn.example.com/a.png").as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(
            normalize_image_url("http://api", "data:image/png;base64,AAAA").as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn test_relative_paths_join_base() {
        assert_eq!(
            normalize_image_url("http://localhost:3001/", "/uploads/users/a.png").as_deref(),
            Some("http://localhost:3001/uploads/users/a.png")
        );
        assert_eq!(
            normalize_image_url("http://localhost:3001", "uploads\\users\\a.png").as_deref(),
            Some("http://localhost:3001/uploads/users/a.png")
        );
        assert_eq!(
            normalize_image_url("", "./uploads/a.png").as_deref(),
            Some("/uploads/a.png")
        );
    }

    #[test]
    fn test_blank_is_none_and_primary_falls_back() {
        assert_eq!(normalize_image_url("http://api", "   "), None);
        assert_eq!(primary_image("http://api", &["".to_string()]), PLACEHOLDER_IMAGE);
        assert_eq!(
            primary_image("http://api", &["".to_string(), "b.png".to_string()]),
            "http://api/b.png"
        );
    }
}
