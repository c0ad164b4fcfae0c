use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::models::{unix_seconds, CommentView, LikeState, PostStats, ViewOutcome};
use super::store::{EngagementError, FullStore, PairInsert};
use crate::user::{NewUser, User};

pub const MAX_COMMENT_LENGTH: usize = 1000;

/// Handle of the shared placeholder user that owns all anonymous comments.
/// Resolved lazily with a find-or-create guarded by the unique constraint on
/// user.handle, so concurrent first-comments agree on a single row.
const ANONYMOUS_HANDLE: &str = "anonymous";
const ANONYMOUS_EMAIL: &str = "anonymous@blog.local";
const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// The engagement operations: like toggling, view recording with a dedup
/// window, and comment authoring with anonymous fallback.
pub struct EngagementManager {
    store: Arc<dyn FullStore>,
    view_window: Duration,
}

impl EngagementManager {
    pub fn new(store: Arc<dyn FullStore>, view_window: Duration) -> Self {
        Self { store, view_window }
    }

    /// Flips the user's like state on a post. Requires an authenticated user;
    /// anonymous likes are rejected before touching the store.
    pub fn toggle_like(
        &self,
        post_slug: &str,
        user_id: Option<usize>,
    ) -> Result<LikeState, EngagementError> {
        let user_id = user_id.ok_or(EngagementError::Unauthenticated)?;

        match self.store.find_like(post_slug, user_id)? {
            Some(like) => {
                // A concurrent toggle may have deleted it already; either way
                // the pair ends up unliked.
                self.store.delete_like(like.id)?;
                Ok(LikeState::Unliked)
            }
            None => match self.store.insert_like(post_slug, user_id, SystemTime::now())? {
                PairInsert::Inserted => Ok(LikeState::Liked),
                PairInsert::AlreadyPresent => {
                    // Lost the insert race: another toggle created the row, so
                    // the pair is liked, which is the state this call wanted.
                    debug!("like insert lost race for ({}, {})", post_slug, user_id);
                    Ok(LikeState::Liked)
                }
            },
        }
    }

    /// Records a view for the post. Anonymous callers succeed without any
    /// persisted effect; identified users are deduplicated per pair within
    /// the configured window. The returned count is a distinct-viewer count.
    pub fn record_view(
        &self,
        post_slug: &str,
        user_id: Option<usize>,
    ) -> Result<ViewOutcome, EngagementError> {
        self.record_view_at(post_slug, user_id, SystemTime::now())
    }

    fn record_view_at(
        &self,
        post_slug: &str,
        user_id: Option<usize>,
        now: SystemTime,
    ) -> Result<ViewOutcome, EngagementError> {
        let Some(user_id) = user_id else {
            // Anonymous traffic is not deduplicable per user, so it is
            // excluded from tracking rather than approximated.
            return Ok(ViewOutcome {
                view_count: self.store.count_views(post_slug)?,
                counted: false,
            });
        };

        let counted = match self.store.find_view(post_slug, user_id)? {
            None => match self.store.insert_view(post_slug, user_id, now)? {
                PairInsert::Inserted => true,
                // A concurrent request just recorded this pair.
                PairInsert::AlreadyPresent => false,
            },
            Some(view) => {
                let elapsed = now.duration_since(view.last_seen).unwrap_or_default();
                if elapsed >= self.view_window {
                    self.store.touch_view(view.id, now)?;
                    true
                } else {
                    false
                }
            }
        };

        Ok(ViewOutcome {
            view_count: self.store.count_views(post_slug)?,
            counted,
        })
    }

    /// Creates a comment on a post. With no authenticated user the comment is
    /// attributed to the shared anonymous user; a display-name hint overrides
    /// the author name in this response only, never in the stored row.
    pub fn create_comment(
        &self,
        post_slug: &str,
        content: &str,
        author_name_hint: Option<&str>,
        user_id: Option<usize>,
    ) -> Result<CommentView, EngagementError> {
        let post_slug = post_slug.trim();
        if post_slug.is_empty() {
            return Err(EngagementError::Validation(
                "post reference must not be empty".to_string(),
            ));
        }
        let content = validated_content(content)?;

        let authenticated_author = match user_id {
            Some(id) => self.store.get_user(id)?,
            None => None,
        };
        let is_anonymous = authenticated_author.is_none();
        let author = match authenticated_author {
            Some(user) => user,
            None => self.anonymous_user()?,
        };

        let created = SystemTime::now();
        let comment_id = self
            .store
            .insert_comment(post_slug, author.id, content, created)?;

        let hint = author_name_hint.map(str::trim).filter(|h| !h.is_empty());
        let author_name = if is_anonymous {
            hint.unwrap_or(ANONYMOUS_DISPLAY_NAME).to_string()
        } else {
            author.display_label().to_string()
        };

        Ok(CommentView {
            id: comment_id,
            content: content.to_string(),
            created: unix_seconds(created),
            updated: None,
            author_name,
            author_image: author.profile_image,
        })
    }

    /// All comments on a post, newest first.
    pub fn list_comments(&self, post_slug: &str) -> Result<Vec<CommentView>, EngagementError> {
        let records = self.store.comments_for_post(post_slug)?;
        Ok(records
            .into_iter()
            .map(|record| CommentView {
                id: record.comment.id,
                content: record.comment.content,
                created: unix_seconds(record.comment.created),
                updated: record.comment.updated.map(unix_seconds),
                author_name: record.author.display_label().to_string(),
                author_image: record.author.profile_image,
            })
            .collect())
    }

    /// Replaces the content of the caller's own comment. Comments owned by
    /// other users are reported as not found rather than forbidden.
    pub fn edit_comment(
        &self,
        comment_id: usize,
        user_id: usize,
        content: &str,
    ) -> Result<CommentView, EngagementError> {
        let content = validated_content(content)?;

        let comment = self
            .store
            .get_comment(comment_id)?
            .ok_or(EngagementError::NotFound)?;
        if comment.user_id != user_id {
            return Err(EngagementError::NotFound);
        }

        let updated = SystemTime::now();
        self.store
            .update_comment_content(comment_id, content, updated)?;

        let author = self
            .store
            .get_user(comment.user_id)?
            .ok_or(EngagementError::NotFound)?;
        Ok(CommentView {
            id: comment.id,
            content: content.to_string(),
            created: unix_seconds(comment.created),
            updated: Some(unix_seconds(updated)),
            author_name: author.display_label().to_string(),
            author_image: author.profile_image,
        })
    }

    /// Deletes the caller's own comment.
    pub fn delete_comment(&self, comment_id: usize, user_id: usize) -> Result<(), EngagementError> {
        let comment = self
            .store
            .get_comment(comment_id)?
            .ok_or(EngagementError::NotFound)?;
        if comment.user_id != user_id {
            return Err(EngagementError::NotFound);
        }
        self.store.delete_comment(comment_id)?;
        Ok(())
    }

    /// Like and distinct-view counts for a post, plus whether the caller has
    /// liked it.
    pub fn post_stats(
        &self,
        post_slug: &str,
        caller: Option<usize>,
    ) -> Result<PostStats, EngagementError> {
        let liked_by_caller = match caller {
            Some(user_id) => self.store.find_like(post_slug, user_id)?.is_some(),
            None => false,
        };
        Ok(PostStats {
            slug: post_slug.to_string(),
            like_count: self.store.count_likes(post_slug)?,
            view_count: self.store.count_views(post_slug)?,
            liked_by_caller,
        })
    }

    fn anonymous_user(&self) -> Result<User, EngagementError> {
        if let Some(user) = self.store.get_user_by_handle(ANONYMOUS_HANDLE)? {
            return Ok(user);
        }

        let created = self.store.create_user(NewUser {
            handle: ANONYMOUS_HANDLE.to_string(),
            email: ANONYMOUS_EMAIL.to_string(),
            display_name: Some(ANONYMOUS_DISPLAY_NAME.to_string()),
            profile_image: None,
        });
        match created {
            Ok(id) => {
                debug!("created anonymous placeholder user with id {}", id);
                self.store
                    .get_user(id)?
                    .ok_or_else(|| anyhow::anyhow!("anonymous user vanished after insert").into())
            }
            // The unique constraint on handle is the race guard: if another
            // request created the row first, use that one.
            Err(create_err) => match self.store.get_user_by_handle(ANONYMOUS_HANDLE)? {
                Some(user) => Ok(user),
                None => Err(create_err.into()),
            },
        }
    }
}

fn validated_content(content: &str) -> Result<&str, EngagementError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(EngagementError::Validation(
            "comment content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(EngagementError::Validation(format!(
            "comment content must not exceed {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(content)
}
