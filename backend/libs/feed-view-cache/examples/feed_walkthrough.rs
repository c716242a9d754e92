//! Feed walkthrough against an in-memory backend
//!
//! Run with: RUST_LOG=feed_view_cache=debug cargo run -p feed-view-cache --example feed_walkthrough

use async_trait::async_trait;
use chrono::{Duration, Utc};
use feed_view_cache::{
    Author, Cursor, FeedFilter, FeedSource, FeedViewCache, FetchedPage, PageRequest, Post,
    PostActions, PostId, SessionStatus, StaticSession, ToggleLikeResult, UserId, ViewCacheConfig,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Tiny backend: 25 posts by three authors, offset cursors
struct Backend {
    posts: Mutex<Vec<Post>>,
    likes: Mutex<HashSet<PostId>>,
    following: HashSet<UserId>,
}

impl Backend {
    fn new() -> Self {
        let authors = ["ada", "grace", "linus"];
        let now = Utc::now();
        let posts = (0..25)
            .map(|i| {
                let author = authors[i % authors.len()];
                Post {
                    id: PostId::new(format!("post-{}", i)),
                    content: format!("Post number {} by {}", i, author),
                    created_at: now - Duration::minutes(i as i64),
                    like_count: (i % 4) as u64,
                    liked_by_viewer: false,
                    author: Author {
                        id: UserId::from(author),
                        display_name: Some(author.to_string()),
                        avatar_ref: None,
                    },
                }
            })
            .collect();

        Self {
            posts: Mutex::new(posts),
            likes: Mutex::new(HashSet::new()),
            following: ["grace"].into_iter().map(UserId::from).collect(),
        }
    }
}

#[async_trait]
impl FeedSource for Backend {
    async fn fetch_page(&self, request: PageRequest<'_>) -> anyhow::Result<FetchedPage> {
        let offset: usize = match request.cursor {
            Some(cursor) => cursor.as_str().parse()?,
            None => 0,
        };
        let profile = request.key.profile();

        let posts = self.posts.lock();
        let matching: Vec<&Post> = posts
            .iter()
            .filter(|post| !request.key.only_following() || self.following.contains(&post.author.id))
            .filter(|post| profile.as_ref().map_or(true, |id| &post.author.id == id))
            .collect();

        let end = (offset + request.limit as usize).min(matching.len());
        let items = matching[offset.min(end)..end].iter().map(|post| (*post).clone()).collect();
        let next_cursor = (end < matching.len()).then(|| Cursor::new(end.to_string()));

        Ok(FetchedPage { items, next_cursor })
    }
}

#[async_trait]
impl PostActions for Backend {
    async fn toggle_like(&self, post_id: &PostId) -> anyhow::Result<ToggleLikeResult> {
        let mut likes = self.likes.lock();
        let added = likes.insert(post_id.clone());
        if !added {
            likes.remove(post_id);
        }
        Ok(ToggleLikeResult { added })
    }

    async fn create_post(&self, content: &str) -> anyhow::Result<Post> {
        let mut posts = self.posts.lock();
        let post = Post {
            id: PostId::new(format!("post-{}", posts.len())),
            content: content.to_string(),
            created_at: Utc::now(),
            like_count: 0,
            liked_by_viewer: false,
            author: Author {
                id: UserId::from("ada"),
                display_name: Some("ada".to_string()),
                avatar_ref: None,
            },
        };
        posts.insert(0, post.clone());
        Ok(post)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ViewCacheConfig::from_env()?;
    let backend = Arc::new(Backend::new());
    let session = Arc::new(StaticSession(SessionStatus::Authenticated {
        user_id: UserId::from("ada"),
    }));
    let cache = FeedViewCache::new(config, Arc::clone(&backend), Arc::clone(&backend), session);

    let global = cache.view(&FeedFilter::global())?;
    let following = cache.view(&FeedFilter::following())?;
    let grace = cache.view(&FeedFilter::profile("grace"))?;

    // Scroll the global feed to the end
    while global.projection().has_more {
        global.on_near_end().await?;
    }
    following.fetch_more().await?;
    grace.fetch_more().await?;

    let target = following
        .projection()
        .items
        .first()
        .map(|post| post.id.clone())
        .ok_or_else(|| anyhow::anyhow!("following feed is empty"))?;
    let outcome = cache.toggle_like(&target).await?;
    println!(
        "liked {} (added={}) in {} views",
        target, outcome.added, outcome.report.views_updated
    );

    let created = cache.create_post("Hello from the walkthrough").await?;
    println!("created {} at {}", created.id, created.created_at_label());

    for (name, view) in [("global", &global), ("following", &following), ("grace", &grace)] {
        let projection = view.projection();
        println!(
            "{:<10} {:>3} posts, status={}, state={:?}",
            name,
            projection.items.len(),
            projection.status,
            projection.render_state()
        );
    }

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    cache.teardown();
    Ok(())
}
