//! Cache keys and the canonical key builders for every resource.
//!
//! # Design
//! A `CacheKey` is an ordered tuple of string segments. Invalidation
//! matches by prefix: invalidating `["posts"]` also marks `["posts", "1"]`
//! stale. Query descriptors and mutation invalidation lists both call the
//! builders below, so a query and the mutations that affect it can never
//! disagree on spelling.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new key with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// True when `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment:?}")?;
        }
        f.write_str("]")
    }
}

pub mod posts {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["posts"])
    }

    pub fn detail(id: u64) -> CacheKey {
        all().child(id.to_string())
    }

    /// Posts written by one user. Kept under the posts prefix so that every
    /// post mutation reaches it.
    pub fn by_user(user_id: u64) -> CacheKey {
        all().child("userId").child(user_id.to_string())
    }
}

pub mod comments {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["comments"])
    }

    pub fn by_post(post_id: u64) -> CacheKey {
        all().child("postId").child(post_id.to_string())
    }
}

pub mod profiles {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["profiles"])
    }

    pub fn detail(id: u64) -> CacheKey {
        all().child(id.to_string())
    }

    pub fn albums(user_id: u64) -> CacheKey {
        detail(user_id).child("albums")
    }

    pub fn todos(user_id: u64) -> CacheKey {
        detail(user_id).child("todos")
    }
}

pub mod albums {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["albums"])
    }

    pub fn photos(album_id: u64) -> CacheKey {
        all().child(album_id.to_string()).child("photos")
    }
}

pub mod todos {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["todos"])
    }

    pub fn detail(id: u64) -> CacheKey {
        all().child(id.to_string())
    }
}

pub mod photos {
    use super::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new(["photos"])
    }

    pub fn detail(id: u64) -> CacheKey {
        all().child(id.to_string())
    }
}
