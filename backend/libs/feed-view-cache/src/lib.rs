//! Nova feed view cache
//!
//! Client-side cache for reverse-chronological feeds split into independently
//! paginated views (global, following-only, per profile) over one shared pool
//! of posts.
//!
//! # Architecture
//!
//! ```text
//! FeedSource ──fetch_page──> PaginationController ──append──┐
//!                                                             v
//!                                  ViewRegistry { ViewKey -> ViewEntry }
//!                                                             ^
//! PostActions ──toggle_like──> FeedMutations ──rewrite/insert─┘
//!                                  (MutationPropagator)
//! ```
//!
//! - Pages are only appended by the pagination controller, one fetch in flight per view.
//! - Items are only rewritten by the propagator, after the server confirmed the mutation.
//! - Every write publishes a [`ViewChange`] on the entry's watch channel.
//!
//! # Example
//!
//! ```no_run
//! use feed_view_cache::{FeedFilter, FeedSource, FeedViewCache, PostActions, StaticSession};
//! use feed_view_cache::{SessionStatus, UserId, ViewCacheConfig};
//! use std::sync::Arc;
//!
//! async fn scroll_and_like<S: FeedSource, A: PostActions>(source: Arc<S>, actions: Arc<A>) {
//!     let session = Arc::new(StaticSession(SessionStatus::Authenticated {
//!         user_id: UserId::from("u1"),
//!     }));
//!     let cache = FeedViewCache::new(ViewCacheConfig::default(), source, actions, session);
//!
//!     let feed = cache.view(&FeedFilter::global()).unwrap();
//!     feed.fetch_more().await.unwrap();
//!
//!     if let Some(post) = feed.projection().items.first() {
//!         cache.toggle_like(&post.id).await.unwrap();
//!     }
//! }
//! ```

mod cache;
mod config;
mod error;
mod keys;
mod model;
mod stats;

pub mod mutations;
pub mod pagination;
pub mod propagation;
pub mod registry;
pub mod session;
pub mod view;

pub use cache::FeedViewCache;
pub use config::{ViewCacheConfig, ENV_PREFIX};
pub use error::{Result, ViewCacheError};
pub use keys::{FalseFlagPolicy, FeedFilter, FilterValue, ViewKey, ONLY_FOLLOWING, USER_ID};
pub use model::{Author, Cursor, FetchStatus, FetchedPage, Page, Post, PostId, UserId};
pub use mutations::{FeedMutations, LikeOutcome, PostActions, ToggleLikeResult};
pub use pagination::{FeedSource, FetchOutcome, PageRequest, PaginationController};
pub use propagation::{like_delta, MutationPropagator, PropagationReport};
pub use registry::{ChangeKind, SkipReason, ViewChange, ViewEntry, ViewRegistry, ViewSnapshot};
pub use session::{SessionProvider, SessionStatus, StaticSession};
pub use stats::{StatsCollector, ViewCacheStats};
pub use view::{FeedView, RenderState, ViewProjection};
