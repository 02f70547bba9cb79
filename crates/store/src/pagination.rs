//! Pagination headers of list responses.
//!
//! List responses carry the total record count in `X-Total-Count` and
//! navigation links in an RFC 8288 `Link` header:
//!
//! ```text
//! <http://host/api/strap-colors?page=1&size=20>; rel="next",<http://host/api/strap-colors?page=4&size=20>; rel="last"
//! ```

use slicekit_core::PageLinks;
use url::Url;

/// Header carrying the total number of records.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Page size a service applies when a list request names none.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Parse the `X-Total-Count` header value.
#[must_use]
pub fn parse_total_count(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Parse a `Link` header into page numbers.
///
/// Entries without a parseable URL, `rel`, or `page` query parameter are
/// skipped.
#[must_use]
pub fn parse_link_header(header: &str) -> PageLinks {
    let mut links = PageLinks::default();

    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let Some(target) = parts.next() else {
            continue;
        };
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');

        let Some(rel) = parts.find_map(|part| {
            part.trim()
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').to_string())
        }) else {
            continue;
        };

        let Some(page) = page_of(target) else {
            continue;
        };

        match rel.as_str() {
            "first" => links.first = Some(page),
            "prev" => links.prev = Some(page),
            "next" => links.next = Some(page),
            "last" => links.last = Some(page),
            _ => {}
        }
    }

    links
}

fn page_of(target: &str) -> Option<u32> {
    // Relative targets are resolved against a dummy base; only the query matters.
    let url = Url::parse(target)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(target)))
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Page numbers for page `page` of `size` records out of `total`.
#[must_use]
pub fn page_links(page: u32, size: u32, total: u64) -> PageLinks {
    let size = size.max(1);
    let last = u32::try_from(total.saturating_sub(1) / u64::from(size)).unwrap_or(u32::MAX);
    PageLinks {
        first: Some(0),
        prev: page.checked_sub(1),
        next: (page < last).then_some(page + 1),
        last: Some(last),
    }
}

/// Build a `Link` header for page `page` of `size` records out of `total`.
///
/// `base` is the collection URL; existing `page`/`size` parameters are replaced.
#[must_use]
pub fn link_header(base: &Url, page: u32, size: u32, total: u64) -> String {
    let size = size.max(1);
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "page" && key != "size")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let link = |page: u32, rel: &str| {
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("page", &page.to_string());
            query.append_pair("size", &size.to_string());
            for (key, value) in &retained {
                query.append_pair(key, value);
            }
        }
        format!("<{url}>; rel=\"{rel}\"")
    };

    let links = page_links(page, size, total);
    [
        (links.next, "next"),
        (links.prev, "prev"),
        (links.last, "last"),
        (links.first, "first"),
    ]
    .into_iter()
    .filter_map(|(page, rel)| page.map(|page| link(page, rel)))
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_total_count() {
        assert_eq!(parse_total_count("42"), Some(42));
        assert_eq!(parse_total_count(" 7 "), Some(7));
        assert_eq!(parse_total_count("many"), None);
    }

    #[test]
    fn test_parse_link_header() {
        let header = r#"<http://localhost:8080/api/strap-colors?page=2&size=20>; rel="next",<http://localhost:8080/api/strap-colors?page=0&size=20>; rel="prev",<http://localhost:8080/api/strap-colors?page=4&size=20>; rel="last",<http://localhost:8080/api/strap-colors?page=0&size=20>; rel="first""#;
        let links = parse_link_header(header);
        assert_eq!(
            links,
            PageLinks {
                first: Some(0),
                prev: Some(0),
                next: Some(2),
                last: Some(4),
            }
        );
        assert!(links.has_next());
    }

    #[test]
    fn test_parse_link_header_skips_malformed_entries() {
        let header = r#"garbage, <http://x/api/a?size=20>; rel="next", </api/a?page=3>; rel="last""#;
        let links = parse_link_header(header);
        assert_eq!(links.next, None);
        assert_eq!(links.last, Some(3));
    }

    #[test]
    fn test_link_header_round_trip() {
        let base = Url::parse("http://localhost/api/strap-colors?page=1&size=2&sort=name%2Casc").unwrap();
        let header = link_header(&base, 1, 2, 5);
        let links = parse_link_header(&header);
        assert_eq!(
            links,
            PageLinks {
                first: Some(0),
                prev: Some(0),
                next: Some(2),
                last: Some(2),
            }
        );
        assert!(header.contains("sort=name%2Casc"));
    }

    #[test]
    fn test_page_links_middle_and_edges() {
        let middle = page_links(2, 10, 45);
        assert_eq!(middle.prev, Some(1));
        assert_eq!(middle.next, Some(3));
        assert_eq!(middle.last, Some(4));

        let last = page_links(4, 10, 45);
        assert_eq!(last.next, None);

        let first = page_links(0, 10, 45);
        assert_eq!(first.prev, None);
        assert_eq!(first.first, Some(0));
    }

    #[test]
    fn test_link_header_single_page() {
        let base = Url::parse("http://localhost/api/strap-colors").unwrap();
        let links = parse_link_header(&link_header(&base, 0, 20, 0));
        assert_eq!(links.next, None);
        assert_eq!(links.prev, None);
        assert_eq!(links.last, Some(0));
    }
}
