//! Record filters and pagination parameters
//!
//! Filters are passed through to the primary store untouched. Pagination is
//! applied either by the store (`skip`/`limit`) or, for cached listings, after
//! the full result has been decoded.

use crate::{UserId, VideoId};
use serde::{Deserialize, Serialize};

/// Default page size when none is requested.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Field filter for listing records from the primary store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordFilter {
    /// Only records owned by this user.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner: Option<UserId>,
    /// Only records attached to this video (comments).
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub video: Option<VideoId>,
}

impl RecordFilter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match records owned by `owner`.
    pub fn by_owner(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Match records attached to `video`.
    pub fn by_video(video: VideoId) -> Self {
        Self {
            video: Some(video),
            ..Self::default()
        }
    }
}

/// One-based page request.
///
/// Deserialized values pass through [`PageParams::new`], so `page` and
/// `limit` are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawPageParams")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PageParams {
    page: usize,
    limit: usize,
}

/// Wire shape of [`PageParams`] before clamping.
#[derive(Deserialize)]
struct RawPageParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl From<RawPageParams> for PageParams {
    fn from(raw: RawPageParams) -> Self {
        Self::new(raw.page, raw.limit)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageParams {
    /// Create page parameters. Zero values are clamped to 1.
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// A single page large enough to hold everything.
    pub fn unbounded() -> Self {
        Self {
            page: 1,
            limit: usize::MAX,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of records to skip before this page.
    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Slice a full result down to this page.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.skip()).take(self.limit).collect()
    }
}
