//! Enum types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cacheable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Video,
    Tweet,
    Comment,
}

impl EntityKind {
    /// All cacheable kinds.
    pub const ALL: [EntityKind; 3] = [EntityKind::Video, EntityKind::Tweet, EntityKind::Comment];

    /// Singular name, used as the prefix of single-record cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Video => "video",
            EntityKind::Tweet => "tweet",
            EntityKind::Comment => "comment",
        }
    }

    /// Plural name, used as the prefix of owner-scoped listing keys.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Video => "videos",
            EntityKind::Tweet => "tweets",
            EntityKind::Comment => "comments",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_distinct() {
        for a in EntityKind::ALL {
            for b in EntityKind::ALL {
                if a != b {
                    assert_ne!(a.as_str(), b.as_str());
                    assert_ne!(a.plural(), b.plural());
                }
                assert_ne!(a.as_str(), b.plural());
            }
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&EntityKind::Comment).expect("serialize should succeed");
        assert_eq!(json, "\"comment\"");
    }
}
