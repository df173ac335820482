use serde::Deserialize;

use crate::models::SortDirection;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Pagination defaults shared by every endpoint.
///
/// Deserializable so hosts can load it alongside the rest of their settings;
/// missing keys take the defaults below.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginateConfig {
    /// Page size used when a request names none (or a non-positive one).
    pub default_page_size: u64,
    /// Upper bound for requested page sizes.
    pub max_page_size: u64,
    /// Direction used when a request names none.
    pub default_sort_direction: SortDirection,
}

impl Default for PaginateConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            default_sort_direction: SortDirection::Desc,
        }
    }
}

impl PaginateConfig {
    /// Page size actually used: never zero, never above the maximum.
    #[must_use]
    pub fn effective_page_size(&self) -> u64 {
        self.default_page_size.clamp(1, self.max_page_size.max(1))
    }
}
