//! Engagement data models
//!
//! Likes, views and comments all reference a post by its slug. Posts live in
//! the CMS, not in this database, so the slug is an opaque string key with no
//! foreign key behind it.

use std::time::SystemTime;

use serde::Serialize;

use crate::user::User;

#[derive(Clone, Debug)]
pub struct Comment {
    pub id: usize,
    pub post_slug: String,
    pub user_id: usize,
    pub content: String,
    pub created: SystemTime,
    pub updated: Option<SystemTime>,
}

/// A comment joined with its author row.
#[derive(Clone, Debug)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: User,
}

#[derive(Clone, Debug)]
pub struct Like {
    pub id: usize,
    pub post_slug: String,
    pub user_id: usize,
    pub created: SystemTime,
}

/// One row per (post, user) pair; repeat visits bump last_seen only.
#[derive(Clone, Debug)]
pub struct PostView {
    pub id: usize,
    pub post_slug: String,
    pub user_id: usize,
    pub created: SystemTime,
    pub last_seen: SystemTime,
}

/// A user's like state on a post. Toggling flips between the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LikeState {
    Liked,
    Unliked,
}

impl LikeState {
    pub fn toggled(self) -> Self {
        match self {
            LikeState::Liked => LikeState::Unliked,
            LikeState::Unliked => LikeState::Liked,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PostStats {
    pub slug: String,
    pub like_count: u64,
    pub view_count: u64,
    pub liked_by_caller: bool,
}

/// Result of recording a view: the post's distinct-viewer count and whether
/// this call registered as a fresh or renewed view (false when anonymous or
/// suppressed by the dedup window).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
    pub view_count: u64,
    pub counted: bool,
}

/// A comment as returned over HTTP, with the author resolved to a display
/// name and optional profile image. Timestamps are unix seconds.
#[derive(Serialize, Debug, Clone)]
pub struct CommentView {
    pub id: usize,
    pub content: String,
    pub created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_image: Option<String>,
}

pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
