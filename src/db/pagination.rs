//! Page parameters and the `{total, page, limit, pages}` envelope used by
//! list endpoints.

use serde::Serialize;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Normalizes raw query values: page is at least 1, limit falls back to
    /// `default_limit` and is capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(default_limit)
                .min(MAX_PAGE_SIZE),
        }
    }

    /// Same as [`PageRequest::new`] for raw query-string values. Blank,
    /// non-numeric and non-positive input counts as not given; fractions
    /// are truncated.
    pub fn from_query(page: Option<&str>, limit: Option<&str>, default_limit: u64) -> Self {
        Self::new(positive_int(page), positive_int(limit), default_limit)
    }

    /// Zero-based index expected by sea-orm's paginator.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

fn positive_int(raw: Option<&str>) -> Option<u64> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n >= 1.0)
        .map(|n| n.trunc() as u64)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            total,
            page: request.page,
            limit: request.limit,
            pages: total.div_ceil(request.limit),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paged<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_normalized() {
        assert_eq!(
            PageRequest::new(Some(0), Some(0), 6),
            PageRequest { page: 1, limit: 6 }
        );
        assert_eq!(PageRequest::new(None, Some(500), 6).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), None, 10).index(), 2);
    }

    #[test]
    fn query_values_fall_back_when_blank_or_garbage() {
        assert_eq!(
            PageRequest::from_query(Some(""), Some(""), 6),
            PageRequest { page: 1, limit: 6 }
        );
        assert_eq!(
            PageRequest::from_query(Some("abc"), Some("-4"), 10),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::from_query(Some("2.9"), Some(" 3 "), 6),
            PageRequest { page: 2, limit: 3 }
        );
    }

    #[test]
    fn pages_round_up() {
        let req = PageRequest::new(Some(1), Some(6), 6);
        assert_eq!(Pagination::new(req, 0).pages, 0);
        assert_eq!(Pagination::new(req, 6).pages, 1);
        assert_eq!(Pagination::new(req, 7).pages, 2);
    }
}
