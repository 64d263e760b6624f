//! Core record structures
//!
//! Records are owned by the primary store. Anything held by the cache is a
//! disposable projection of one of these values.

use crate::{CommentId, Timestamp, TweetId, UserId, VideoId};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Video - an uploaded video with its publish state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Video {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub video_id: VideoId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner: UserId,
    /// URL of the stored media file.
    pub video_file: String,
    /// URL of the stored thumbnail image.
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration_ms: u64,
    pub views: u64,
    pub is_published: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Partial update for a video. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub is_published: Option<bool>,
    pub views: Option<u64>,
}

impl VideoPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Video {
    /// Apply a patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: &VideoPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(thumbnail) = &patch.thumbnail {
            self.thumbnail = thumbnail.clone();
        }
        if let Some(is_published) = patch.is_published {
            self.is_published = is_published;
        }
        if let Some(views) = patch.views {
            self.views = views;
        }
        self.updated_at = Utc::now();
    }
}

/// Tweet - a short text post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tweet {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tweet_id: TweetId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner: UserId,
    pub content: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Partial update for a tweet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TweetPatch {
    pub content: Option<String>,
}

impl Tweet {
    /// Apply a patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: &TweetPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Comment - a text comment attached to a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Comment {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub comment_id: CommentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub video: VideoId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner: UserId,
    pub content: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Partial update for a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPatch {
    pub content: Option<String>,
}

impl Comment {
    /// Apply a patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: &CommentPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        self.updated_at = Utc::now();
    }
}
