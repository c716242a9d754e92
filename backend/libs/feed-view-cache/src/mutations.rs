//! Mutation coordinator
//!
//! Runs a mutating action against the server first and touches the cache only
//! once the authoritative result is back. A failed action therefore needs no
//! rollback: nothing was written.

use crate::error::{Result, ViewCacheError};
use crate::keys::ViewKey;
use crate::model::{Post, PostId, UserId};
use crate::propagation::{like_delta, MutationPropagator, PropagationReport};
use crate::registry::ViewRegistry;
use crate::session::SessionProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Server answer to a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleLikeResult {
    /// `true` when the like was added, `false` when it was removed
    pub added: bool,
}

/// Mutating-action collaborator
#[async_trait]
pub trait PostActions: Send + Sync {
    async fn toggle_like(&self, post_id: &PostId) -> anyhow::Result<ToggleLikeResult>;

    async fn create_post(&self, content: &str) -> anyhow::Result<Post>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub added: bool,
    pub report: PropagationReport,
}

pub struct FeedMutations<A: ?Sized> {
    registry: Arc<ViewRegistry>,
    propagator: MutationPropagator,
    actions: Arc<A>,
    session: Arc<dyn SessionProvider>,
}

impl<A: PostActions + ?Sized> FeedMutations<A> {
    pub fn new(
        registry: Arc<ViewRegistry>,
        actions: Arc<A>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            propagator: MutationPropagator::new(Arc::clone(&registry)),
            registry,
            actions,
            session,
        }
    }

    pub fn propagator(&self) -> &MutationPropagator {
        &self.propagator
    }

    /// Toggle the viewer's like and propagate the confirmed delta to every view
    pub async fn toggle_like(&self, post_id: &PostId) -> Result<LikeOutcome> {
        self.require_session()?;

        let result = match self.actions.toggle_like(post_id).await {
            Ok(result) => result,
            Err(source) => {
                warn!(post_id = %post_id, error = %source, "Like toggle failed");
                self.registry.stats().record_mutation_error();
                return Err(ViewCacheError::MutationFailed {
                    action: "toggle_like",
                    post_id: Some(post_id.clone()),
                    source,
                });
            }
        };

        let report = self
            .propagator
            .apply_to_entity(post_id, None, like_delta(result.added));
        debug!(post_id = %post_id, added = result.added, "Like toggled");

        Ok(LikeOutcome {
            added: result.added,
            report,
        })
    }

    /// Publish a post and show it at the top of the loaded views it belongs to.
    ///
    /// Those are the global view and the author's profile view; the
    /// following-only view never lists the viewer's own posts.
    pub async fn create_post(&self, content: &str) -> Result<Post> {
        self.require_session()?;
        if content.trim().is_empty() {
            return Err(ViewCacheError::EmptyPost);
        }

        let post = match self.actions.create_post(content).await {
            Ok(post) => post,
            Err(source) => {
                warn!(error = %source, "Post creation failed");
                self.registry.stats().record_mutation_error();
                return Err(ViewCacheError::MutationFailed {
                    action: "create_post",
                    post_id: None,
                    source,
                });
            }
        };

        let mut inserted = 0;
        for entry in self.registry.entries() {
            if lists_new_post(entry.key(), &post.author.id) && entry.insert_head(&post) {
                inserted += 1;
            }
        }
        debug!(post_id = %post.id, views = inserted, "Created post");

        Ok(post)
    }

    fn require_session(&self) -> Result<()> {
        if self.session.status().is_authenticated() {
            Ok(())
        } else {
            Err(ViewCacheError::NotAuthenticated)
        }
    }
}

fn lists_new_post(key: &ViewKey, author: &UserId) -> bool {
    if key.only_following() {
        return false;
    }
    match key.profile() {
        Some(profile) => &profile == author,
        None => key.is_global(),
    }
}
