//! Query parameters for list fetches.

use std::fmt;
use std::str::FromStr;

use url::Url;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort key, encoded as `sort=field,asc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.field, self.direction.as_str())
    }
}

impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = s.split_once(',').unwrap_or((s, "asc"));
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("empty sort field in {s:?}"));
        }
        let direction = match direction.trim().to_ascii_lowercase().as_str() {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            other => return Err(format!("unknown sort direction {other:?}")),
        };
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Filtering and paging for a list fetch.
///
/// Pages are zero-based. Filters are passed through verbatim, e.g.
/// `("name.equals", "Red")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Vec<Sort>,
    pub filters: Vec<(String, String)>,
}

impl QueryParams {
    /// No filtering, service-default paging.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Whether no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.size.is_none() && self.sort.is_empty() && self.filters.is_empty()
    }

    /// Query pairs in the order they are sent.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        for sort in &self.sort {
            pairs.push(("sort".to_string(), sort.to_string()));
        }
        pairs.extend(self.filters.iter().cloned());
        pairs
    }

    /// Append these parameters to `url`'s query string.
    pub fn append_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in self.to_pairs() {
            query.append_pair(&key, &value);
        }
    }

    /// Parse parameters back out of query pairs.
    ///
    /// Unparseable `page`/`size`/`sort` values are ignored; everything else is
    /// kept as a filter.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => params.page = value.parse().ok(),
                "size" => params.size = value.parse().ok(),
                "sort" => params.sort.extend(value.parse::<Sort>().ok()),
                _ => params.filters.push((key.to_string(), value.to_string())),
            }
        }
        params
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_leaves_url_untouched() {
        let mut url = Url::parse("http://localhost:8080/api/strap-colors").unwrap();
        QueryParams::new().append_to(&mut url);
        assert_eq!(url.as_str(), "http://localhost:8080/api/strap-colors");
    }

    #[test]
    fn test_query_encoding() {
        let mut url = Url::parse("http://localhost:8080/api/strap-colors").unwrap();
        QueryParams::new()
            .page(2)
            .size(20)
            .sort(Sort::desc("name"))
            .sort(Sort::asc("id"))
            .filter("name.contains", "Red & Blue")
            .append_to(&mut url);

        assert_eq!(
            url.query(),
            Some("page=2&size=20&sort=name%2Cdesc&sort=id%2Casc&name.contains=Red+%26+Blue")
        );
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("name,desc".parse::<Sort>().unwrap(), Sort::desc("name"));
        assert_eq!("name".parse::<Sort>().unwrap(), Sort::asc("name"));
        assert_eq!("id, ASC".parse::<Sort>().unwrap(), Sort::asc("id"));
        assert!("name,sideways".parse::<Sort>().is_err());
        assert!(",asc".parse::<Sort>().is_err());
    }

    #[test]
    fn test_pairs_round_trip_through_url() {
        let params = QueryParams::new()
            .page(1)
            .size(5)
            .sort(Sort::desc("quantity"))
            .filter("quantity.greaterThan", "2");
        let mut url = Url::parse("http://localhost/api/order-items").unwrap();
        params.append_to(&mut url);

        let parsed = QueryParams::from_pairs(url.query_pairs());
        assert_eq!(parsed, params);
    }
}
