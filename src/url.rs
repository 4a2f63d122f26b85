//! URL helpers shared by the extractors and the hydration pass

use url::Url;

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// The fragment of the resolved URL is dropped so the same item reached
/// through different anchors dedups to one row.
///
/// # Example
///
/// ```
/// use pagewalk::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/list?page=2").unwrap();
/// assert_eq!(
///     resolve_link("/item/7#reviews", &base).as_deref(),
///     Some("https://example.com/item/7")
/// );
/// assert_eq!(resolve_link("mailto:shop@example.com", &base), None);
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if !is_http(&absolute) {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute.to_string())
}

/// Parses `candidate` as an absolute http(s) URL with a host
///
/// Used to decide whether a value stored inside an item's info can be fetched.
pub fn usable_url(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate.trim()).ok()?;
    if is_http(&url) && url.host_str().is_some_and(|h| !h.is_empty()) {
        Some(url)
    } else {
        None
    }
}

fn is_http(url: &Url) -> bool {
    url.scheme() == "http" || url.scheme() == "https"
}
