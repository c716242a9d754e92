//! Session-scoped facade wiring registry, pagination and mutations together

use crate::config::ViewCacheConfig;
use crate::error::Result;
use crate::keys::{FeedFilter, ViewKey};
use crate::model::{Post, PostId};
use crate::mutations::{FeedMutations, LikeOutcome, PostActions};
use crate::pagination::{FeedSource, PaginationController};
use crate::registry::ViewRegistry;
use crate::session::SessionProvider;
use crate::stats::ViewCacheStats;
use crate::view::FeedView;
use std::sync::Arc;
use tracing::info;

/// One UI session's feed cache
pub struct FeedViewCache<S: ?Sized, A: ?Sized> {
    registry: Arc<ViewRegistry>,
    pagination: Arc<PaginationController<S>>,
    mutations: FeedMutations<A>,
}

impl<S, A> FeedViewCache<S, A>
where
    S: FeedSource + ?Sized,
    A: PostActions + ?Sized,
{
    pub fn new(
        config: ViewCacheConfig,
        source: Arc<S>,
        actions: Arc<A>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let registry = Arc::new(ViewRegistry::new(config));
        Self {
            pagination: Arc::new(PaginationController::new(Arc::clone(&registry), source)),
            mutations: FeedMutations::new(Arc::clone(&registry), actions, session),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    pub fn pagination(&self) -> &Arc<PaginationController<S>> {
        &self.pagination
    }

    pub fn mutations(&self) -> &FeedMutations<A> {
        &self.mutations
    }

    pub fn view(&self, filter: &FeedFilter) -> Result<FeedView<S>> {
        Ok(self.view_for_key(self.registry.key_for(filter)?))
    }

    pub fn view_for_key(&self, key: ViewKey) -> FeedView<S> {
        FeedView::new(key, Arc::clone(&self.pagination))
    }

    pub async fn toggle_like(&self, post_id: &PostId) -> Result<LikeOutcome> {
        self.mutations.toggle_like(post_id).await
    }

    pub async fn create_post(&self, content: &str) -> Result<Post> {
        self.mutations.create_post(content).await
    }

    /// Drop one view, e.g. when navigating away from a profile
    pub fn invalidate(&self, filter: &FeedFilter) -> Result<bool> {
        let key = self.registry.key_for(filter)?;
        Ok(self.registry.invalidate(&key).is_some())
    }

    pub fn stats(&self) -> ViewCacheStats {
        self.registry.stats().snapshot()
    }

    /// End of the UI session
    pub fn teardown(&self) {
        let stats = self.stats();
        self.registry.clear();
        info!(
            fetches = stats.fetches_issued,
            propagations = stats.propagations,
            "Feed view cache torn down"
        );
    }
}
