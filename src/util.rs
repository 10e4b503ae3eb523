//! Shared utility functions

use url::Url;

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Turn arbitrary text into a lowercase, dash-separated name that is safe to
/// use as a folder name and inside URLs.
///
/// Alphanumeric characters (including non-ASCII letters) are kept, every other
/// run of characters collapses into a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Slug for the host of a source URL (`https://www.example.com/x` -> `www-example-com`)
pub fn host_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let slug = slugify(parsed.host_str()?);
    (!slug.is_empty()).then_some(slug)
}

/// Percent-encode a path segment the way HTML forms do (spaces become `+`)
pub fn quote_plus(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("short", 10), "short");
        let truncated = truncate_str("héllo wörld, this is long", 10);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 10);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Legendary Mechanic"), "the-legendary-mechanic");
        assert_eq!(slugify("  Re:Zero -- Starting Life!  "), "re-zero-starting-life");
        assert_eq!(slugify("Überall"), "überall");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_host_slug() {
        assert_eq!(
            host_slug("https://www.royalroad.com/fiction/123").as_deref(),
            Some("www-royalroad-com")
        );
        assert_eq!(host_slug("not a url"), None);
    }

    #[test]
    fn test_quote_plus() {
        assert_eq!(quote_plus("a b/c"), "a+b%2Fc");
    }
}
