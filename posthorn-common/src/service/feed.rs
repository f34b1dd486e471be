use crate::{
    feed::{FeedScope, Page, PageNumber},
    model::{
        Id,
        comment::Comment,
        post::{Post, PostMarker},
        user::{UserHandle, UserMarker, UserProfile},
    },
    service::{Result, ServiceError, require_actor},
    store::Store,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ProfileFeed {
    pub profile: UserProfile,
    pub posts: Page<Post>,
}

async fn fetch_page<S: Store + ?Sized>(
    store: &S,
    scope: FeedScope,
    viewer: Option<Id<UserMarker>>,
    page: PageNumber,
) -> Result<Page<Post>, S::Error> {
    store
        .fetch_feed(scope, viewer, page)
        .await
        .map_err(ServiceError::Store)
}

pub async fn global_feed<S: Store + ?Sized>(
    store: &S,
    viewer: Option<Id<UserMarker>>,
    page: PageNumber,
) -> Result<Page<Post>, S::Error> {
    fetch_page(store, FeedScope::Global, viewer, page).await
}

pub async fn profile_feed<S: Store + ?Sized>(
    store: &S,
    viewer: Option<Id<UserMarker>>,
    handle: &UserHandle,
    page: PageNumber,
) -> Result<ProfileFeed, S::Error> {
    let Some(user) = store
        .fetch_user_by_handle(handle)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::UserByHandleNotFound(handle.clone()));
    };

    let stats = store
        .user_stats(user.id)
        .await
        .map_err(ServiceError::Store)?;
    let viewer_follows = match viewer {
        Some(viewer) if viewer != user.id => Some(
            store
                .is_following(viewer, user.id)
                .await
                .map_err(ServiceError::Store)?,
        ),
        _ => None,
    };
    let posts = fetch_page(store, FeedScope::Author(user.id), viewer, page).await?;

    Ok(ProfileFeed {
        profile: UserProfile {
            user,
            stats,
            viewer_follows,
        },
        posts,
    })
}

pub async fn following_feed<S: Store + ?Sized>(
    store: &S,
    viewer: Option<Id<UserMarker>>,
    page: PageNumber,
) -> Result<Page<Post>, S::Error> {
    let viewer = require_actor(viewer)?;
    fetch_page(store, FeedScope::FollowedBy(viewer), Some(viewer), page).await
}

pub async fn post<S: Store + ?Sized>(
    store: &S,
    viewer: Option<Id<UserMarker>>,
    post_id: Id<PostMarker>,
) -> Result<Post, S::Error> {
    store
        .fetch_post(post_id, viewer)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::PostNotFound(post_id))
}

pub async fn comments<S: Store + ?Sized>(
    store: &S,
    post_id: Id<PostMarker>,
) -> Result<Vec<Comment>, S::Error> {
    store
        .fetch_comments(post_id)
        .await
        .map_err(ServiceError::Store)?
        .ok_or(ServiceError::PostNotFound(post_id))
}

#[cfg(test)]
mod tests {
    use crate::{
        feed::{PAGE_SIZE, PageNumber},
        model::user::UserHandle,
        service::{
            ServiceError,
            feed::{comments, following_feed, global_feed, profile_feed},
            memory::MemoryStore,
            relationship::{toggle_follow, toggle_like},
        },
    };
    use time::Duration;

    #[tokio::test]
    async fn global_feed_is_newest_first() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        let bob = store.user("bob").await;
        store.post(alice.id, "one").await;
        store.post(bob.id, "two").await;
        store.post(alice.id, "three").await;

        let page = global_feed(&store, None, PageNumber::FIRST).await.unwrap();
        let contents: Vec<_> = page.items.iter().map(|post| post.content.as_str()).collect();
        assert_eq!(contents, ["three", "two", "one"]);
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|post| post.liked.is_none()));
    }

    #[tokio::test]
    async fn same_timestamp_falls_back_to_id() {
        let store = MemoryStore::frozen_clock();
        let alice = store.user("alice").await;
        let first = store.post(alice.id, "first").await;
        let second = store.post(alice.id, "second").await;
        assert_eq!(first.created_at, second.created_at);

        let page = global_feed(&store, None, PageNumber::FIRST).await.unwrap();
        assert_eq!(page.items[0].id, second.id);
        assert_eq!(page.items[1].id, first.id);
    }

    #[tokio::test]
    async fn pages_hold_at_most_ten_and_clamp() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        for i in 0..23 {
            store.post(alice.id, &format!("post {i}")).await;
        }

        let first = global_feed(&store, None, PageNumber::FIRST).await.unwrap();
        assert_eq!(first.items.len() as u64, PAGE_SIZE);
        assert_eq!(first.items[0].content, "post 22");
        assert_eq!(first.num_pages, 3);

        let beyond = global_feed(&store, None, PageNumber::new(40)).await.unwrap();
        assert_eq!(beyond.number, 3);
        assert_eq!(beyond.items.len(), 3);
        assert_eq!(beyond.items[2].content, "post 0");
        assert!(!beyond.has_next);

        let below = global_feed(&store, None, PageNumber::parse(Some("-1")))
            .await
            .unwrap();
        assert_eq!(below.number, 1);
    }

    #[tokio::test]
    async fn profile_feed_filters_and_aggregates() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        let bob = store.user("bob").await;
        let liked = store.post(alice.id, "alice one").await;
        store.post(bob.id, "bob one").await;
        store.post(alice.id, "alice two").await;
        toggle_like(&store, Some(bob.id), liked.id).await.unwrap();
        toggle_follow(&store, Some(bob.id), alice.id).await.unwrap();

        let handle = UserHandle::new("alice".to_owned()).unwrap();
        let feed = profile_feed(&store, Some(bob.id), &handle, PageNumber::FIRST)
            .await
            .unwrap();

        assert_eq!(feed.profile.user, alice);
        assert_eq!(feed.profile.stats.total_posts, 2);
        assert_eq!(feed.profile.stats.total_likes, 1);
        assert_eq!(feed.profile.stats.followers_count, 1);
        assert_eq!(feed.profile.viewer_follows, Some(true));
        assert!(feed.posts.items.iter().all(|post| post.author == alice));
        assert_eq!(feed.posts.items[1].liked, Some(true));
        assert_eq!(feed.posts.items[0].liked, Some(false));

        let own = profile_feed(&store, Some(alice.id), &handle, PageNumber::FIRST)
            .await
            .unwrap();
        assert_eq!(own.profile.viewer_follows, None);
    }

    #[tokio::test]
    async fn profile_feed_of_unknown_user() {
        let store = MemoryStore::new();
        let handle = UserHandle::new("nobody".to_owned()).unwrap();

        assert!(matches!(
            profile_feed(&store, None, &handle, PageNumber::FIRST).await,
            Err(ServiceError::UserByHandleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn following_feed_only_shows_followed_authors() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        let bob = store.user("bob").await;
        let carol = store.user("carol").await;
        store.post(bob.id, "from bob").await;
        store.post(carol.id, "from carol").await;
        store.post(alice.id, "from alice").await;

        let empty = following_feed(&store, Some(alice.id), PageNumber::FIRST)
            .await
            .unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(empty.num_pages, 1);

        toggle_follow(&store, Some(alice.id), bob.id).await.unwrap();
        let feed = following_feed(&store, Some(alice.id), PageNumber::FIRST)
            .await
            .unwrap();
        let contents: Vec<_> = feed.items.iter().map(|post| post.content.as_str()).collect();
        assert_eq!(contents, ["from bob"]);

        assert!(matches!(
            following_feed(&store, None, PageNumber::FIRST).await,
            Err(ServiceError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn comments_are_newest_first() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        let post = store.post(alice.id, "post").await;
        for content in ["first", "second", "third"] {
            store.comment(alice.id, post.id, content).await;
        }

        let listed = comments(&store, post.id).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|comment| comment.content.as_str()).collect();
        assert_eq!(contents, ["third", "second", "first"]);
    }

    #[tokio::test]
    async fn comments_follow_timestamps_not_insertion_order() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        let post = store.post(alice.id, "post").await;
        store.comment(alice.id, post.id, "recent").await;
        store.rewind_clock(Duration::hours(1));
        store.comment(alice.id, post.id, "backdated").await;

        let listed = comments(&store, post.id).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|comment| comment.content.as_str()).collect();
        assert_eq!(contents, ["recent", "backdated"]);
        assert!(listed[0].created_at > listed[1].created_at);
    }

    #[tokio::test]
    async fn comments_with_same_timestamp_fall_back_to_id() {
        let store = MemoryStore::frozen_clock();
        let alice = store.user("alice").await;
        let post = store.post(alice.id, "post").await;
        let first = store.comment(alice.id, post.id, "first").await;
        let second = store.comment(alice.id, post.id, "second").await;

        let listed = comments(&store, post.id).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|comment| comment.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[tokio::test]
    async fn page_totals_agree_with_listed_posts() {
        let store = MemoryStore::new();
        let alice = store.user("alice").await;
        for i in 0..(PAGE_SIZE * 2 + 5) {
            store.post(alice.id, &format!("post {i}")).await;
        }

        let first = global_feed(&store, None, PageNumber::FIRST).await.unwrap();
        let mut listed = 0;
        for number in 1..=first.num_pages {
            let page = global_feed(&store, None, PageNumber::new(number))
                .await
                .unwrap();
            assert_eq!(page.total, first.total);
            listed += page.items.len() as u64;
        }
        assert_eq!(listed, first.total);
    }
}
