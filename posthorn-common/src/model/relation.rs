use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

/// Outcome of flipping a follow edge.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct FollowState {
    pub following: bool,
    /// The followee's follower count after the flip.
    pub followers_count: u64,
}

/// Outcome of flipping a like edge.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: u64,
    pub author_total_likes: u64,
    pub author_id: Id<UserMarker>,
}
