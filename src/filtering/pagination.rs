use axum::{
    Json,
    http::header::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::{DEFAULT_PAGE_SIZE, PaginateConfig};
use crate::errors::QueryWarning;

/// Page number and size. Both are always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationOptions {
    page: u64,
    limit: u64,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Largest value the database drivers accept for `LIMIT` and `OFFSET`.
const MAX_BOUND: u64 = i64::MAX as u64;

impl PaginationOptions {
    /// Same as [`Self::with_config`] under the default [`PaginateConfig`], so
    /// the limit is capped at [`crate::config::MAX_PAGE_SIZE`].
    #[must_use]
    pub fn new(page: u64, limit: u64) -> Self {
        Self::with_config(page, limit, &PaginateConfig::default())
    }

    /// Page 0 becomes page 1; limit 0 becomes the configured default page
    /// size. The limit is capped at `config.max_page_size`.
    #[must_use]
    pub fn with_config(page: u64, limit: u64, config: &PaginateConfig) -> Self {
        let limit = if limit == 0 {
            config.effective_page_size()
        } else {
            limit.min(config.max_page_size.max(1))
        };
        Self {
            page: page.max(1),
            limit: limit.min(MAX_BOUND),
        }
    }

    /// Coerces raw request values: missing, zero or negative values take the
    /// defaults, and the limit is capped at `config.max_page_size`.
    #[must_use]
    pub fn coerce(page: Option<i64>, limit: Option<i64>, config: &PaginateConfig) -> Self {
        let positive = |value: Option<i64>| value.and_then(|value| u64::try_from(value).ok()).unwrap_or(0);
        Self::with_config(positive(page), positive(limit), config)
    }

    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Rows to skip. Pages past the end still skip past every row, but the
    /// offset never exceeds `i64::MAX`.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        let offset = (self.page - 1).saturating_mul(self.limit);
        if offset > MAX_BOUND { MAX_BOUND } else { offset }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_items: u64,
    pub item_count: u64,
    pub items_per_page: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

impl PageMeta {
    #[must_use]
    pub const fn new(total_items: u64, item_count: u64, options: PaginationOptions) -> Self {
        Self {
            total_items,
            item_count,
            items_per_page: options.limit,
            total_pages: total_items.div_ceil(options.limit),
            current_page: options.page,
        }
    }
}

/// Navigation links; `previous` and `next` are absent on the first and last page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageLinks {
    pub first: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub last: String,
}

impl PageLinks {
    #[must_use]
    pub fn new(route: &str, meta: &PageMeta) -> Self {
        let separator = if route.contains('?') { '&' } else { '?' };
        let link = |page: u64| format!("{route}{separator}page={page}&limit={}", meta.items_per_page);
        let last_page = meta.total_pages.max(1);

        Self {
            first: link(1),
            previous: (meta.current_page > 1).then(|| link((meta.current_page - 1).min(last_page))),
            next: (meta.current_page < meta.total_pages).then(|| link(meta.current_page + 1)),
            last: link(last_page),
        }
    }
}

/// One page of results.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
    /// Parts of the request that were ignored.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<QueryWarning>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total_items: u64, options: PaginationOptions) -> Self {
        let meta = PageMeta::new(total_items, items.len() as u64, options);
        Self {
            items,
            meta,
            links: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_links(mut self, route: &str) -> Self {
        self.links = Some(PageLinks::new(route, &self.meta));
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<QueryWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// `Content-Range` header for this page.
    #[must_use]
    pub fn content_range(&self, resource_name: &str) -> HeaderMap {
        let offset = (self.meta.current_page - 1).saturating_mul(self.meta.items_per_page);
        calculate_content_range(offset, self.meta.item_count, self.meta.total_items, resource_name)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
            links: self.links,
            warnings: self.warnings,
        }
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        let headers = self.content_range("items");
        (headers, Json(self)).into_response()
    }
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// Builds the `Content-Range` header of a page.
///
/// `<resource> <first>-<last>/<total>`, or `<resource> */<total>` for an empty page.
/// The resource name is sanitized so it cannot inject headers.
#[must_use]
pub fn calculate_content_range(offset: u64, item_count: u64, total_count: u64, resource_name: &str) -> HeaderMap {
    let range = if item_count == 0 {
        "*".to_string()
    } else {
        format!("{offset}-{}", offset.saturating_add(item_count - 1))
    };

    let mut headers = HeaderMap::new();
    let safe_name = sanitize_resource_name(resource_name);
    let value = HeaderValue::from_str(&format!("{safe_name} {range}/{total_count}"))
        .or_else(|_| HeaderValue::from_str(&format!("items {range}/{total_count}")));
    if let Ok(value) = value {
        headers.insert("Content-Range", value);
    }
    headers
}
