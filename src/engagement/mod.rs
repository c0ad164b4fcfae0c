mod manager;
pub mod models;
mod store;

pub use manager::{EngagementManager, MAX_COMMENT_LENGTH};
pub use models::{Comment, CommentRecord, CommentView, Like, LikeState, PostStats, PostView, ViewOutcome};
pub use store::{EngagementError, EngagementStore, FullStore, PairInsert};
