use std::time::SystemTime;

use anyhow::Result;

use super::models::{Comment, CommentRecord, Like, PostView};
use crate::user::UserStore;

/// Outcome of inserting a row guarded by the (post_slug, user_id) unique
/// constraint. A concurrent writer losing the race gets `AlreadyPresent`
/// instead of an error; the constraint is the only serialization mechanism
/// for same-pair writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairInsert {
    Inserted,
    AlreadyPresent,
}

/// Errors surfaced by engagement operations.
///
/// `Validation` and `Unauthenticated` are raised before any store access;
/// `Persistence` wraps unexpected database failures. Unique-constraint races
/// never map to an error, see [`PairInsert`].
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub trait EngagementStore: Send + Sync {
    /// Returns the like row for the pair, if any.
    fn find_like(&self, post_slug: &str, user_id: usize) -> Result<Option<Like>>;

    /// Inserts a like for the pair. Returns `AlreadyPresent` if the unique
    /// constraint rejected the row.
    fn insert_like(&self, post_slug: &str, user_id: usize, created: SystemTime)
        -> Result<PairInsert>;

    /// Deletes a like by id. Returns false if no row was deleted.
    fn delete_like(&self, like_id: usize) -> Result<bool>;

    /// Number of likes on the post.
    fn count_likes(&self, post_slug: &str) -> Result<u64>;

    /// Returns the view row for the pair, if any.
    fn find_view(&self, post_slug: &str, user_id: usize) -> Result<Option<PostView>>;

    /// Inserts a view row for the pair with created = last_seen = `now`.
    /// Returns `AlreadyPresent` if the unique constraint rejected the row.
    fn insert_view(&self, post_slug: &str, user_id: usize, now: SystemTime) -> Result<PairInsert>;

    /// Advances a view row's last_seen timestamp.
    fn touch_view(&self, view_id: usize, last_seen: SystemTime) -> Result<()>;

    /// Number of distinct users that have viewed the post.
    fn count_views(&self, post_slug: &str) -> Result<u64>;

    /// Inserts a comment and returns its id.
    fn insert_comment(
        &self,
        post_slug: &str,
        user_id: usize,
        content: &str,
        created: SystemTime,
    ) -> Result<usize>;

    /// Returns a comment by id.
    fn get_comment(&self, comment_id: usize) -> Result<Option<Comment>>;

    /// Replaces a comment's content and stamps the update time.
    fn update_comment_content(
        &self,
        comment_id: usize,
        content: &str,
        updated: SystemTime,
    ) -> Result<()>;

    /// Deletes a comment by id.
    fn delete_comment(&self, comment_id: usize) -> Result<()>;

    /// All comments on the post joined with their authors, newest first.
    fn comments_for_post(&self, post_slug: &str) -> Result<Vec<CommentRecord>>;
}

/// The one storage object the server holds: user identity plus engagement
/// rows live in the same database so account deletion cascades to comments,
/// likes and views.
pub trait FullStore: UserStore + EngagementStore {}

impl<T: UserStore + EngagementStore> FullStore for T {}
