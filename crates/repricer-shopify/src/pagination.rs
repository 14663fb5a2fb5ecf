//! Cursor extraction from the Admin API `Link` response header.
//!
//! Paginated REST endpoints return something like:
//!
//! ```text
//! <https://x.myshopify.com/admin/api/2024-10/products.json?limit=25&page_info=PREV>; rel="previous",
//! <https://x.myshopify.com/admin/api/2024-10/products.json?limit=25&page_info=NEXT>; rel="next"
//! ```
//!
//! Only the `page_info` value of the `rel="next"` link matters to the
//! engine; its absence means the final page. Cursors are base64url and
//! need no percent-decoding.

/// Pull the next-page `page_info` cursor out of a `Link` header value.
#[must_use]
pub fn extract_next_cursor(link_header: Option<&str>) -> Option<String> {
    link_header?
        .split(',')
        .filter_map(parse_link_segment)
        .find_map(|(url, rel)| (rel == "next").then(|| page_info_of(url)))
        .flatten()
}

/// Split one `<url>; rel="kind"` directive into its URL and relation.
fn parse_link_segment(segment: &str) -> Option<(&str, &str)> {
    let segment = segment.trim();
    let url_end = segment.find('>')?;
    let url = segment.get(1..url_end)?;
    if !segment.starts_with('<') || url.is_empty() {
        return None;
    }
    let rel = segment[url_end + 1..]
        .split(';')
        .map(str::trim)
        .find_map(|attr| attr.strip_prefix("rel="))?
        .trim_matches('"');
    Some((url, rel))
}

/// The `page_info` query value of a URL, if any.
fn page_info_of(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let value = pair.strip_prefix("page_info=")?;
        let value = value.split('#').next().unwrap_or(value);
        (!value.is_empty()).then(|| value.to_owned())
    })
}
