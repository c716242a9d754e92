//! Read-only projection of one view for the rendering layer

use crate::error::Result;
use crate::keys::ViewKey;
use crate::model::{FetchStatus, Post};
use crate::pagination::{FeedSource, FetchOutcome, PaginationController};
use crate::registry::{SkipReason, ViewChange};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// What the list should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    /// Nothing loaded yet
    Loading,
    /// Last fetch failed; show a retry affordance
    Error,
    /// Loaded, but the view has no posts
    Empty,
    Items,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewProjection {
    pub items: Vec<Post>,
    pub status: FetchStatus,
    pub has_more: bool,
    pub loaded_pages: usize,
}

impl ViewProjection {
    pub fn render_state(&self) -> RenderState {
        match self.status {
            FetchStatus::Error => RenderState::Error,
            _ if !self.items.is_empty() => RenderState::Items,
            FetchStatus::Idle | FetchStatus::Fetching if self.loaded_pages == 0 => {
                RenderState::Loading
            }
            _ => RenderState::Empty,
        }
    }
}

/// Handle bound to one view key.
///
/// Lookups go through the registry on every call, so after an invalidation the
/// handle transparently works against the fresh entry.
pub struct FeedView<S: ?Sized> {
    key: ViewKey,
    controller: Arc<PaginationController<S>>,
}

impl<S: ?Sized> Clone for FeedView<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<S: FeedSource + ?Sized> FeedView<S> {
    pub fn new(key: ViewKey, controller: Arc<PaginationController<S>>) -> Self {
        Self { key, controller }
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    /// Current state of the view. Reading never creates an entry; a view with
    /// no entry projects as idle with nothing loaded.
    pub fn projection(&self) -> ViewProjection {
        let Some(entry) = self.controller.registry().get(&self.key) else {
            return ViewProjection {
                items: Vec::new(),
                status: FetchStatus::Idle,
                has_more: true,
                loaded_pages: 0,
            };
        };
        let snapshot = entry.snapshot();
        ViewProjection {
            items: snapshot.items(),
            status: snapshot.status,
            has_more: snapshot.status != FetchStatus::Exhausted,
            loaded_pages: snapshot.pages.len(),
        }
    }

    /// Load the next page
    pub async fn fetch_more(&self) -> Result<FetchOutcome> {
        self.controller.request_next_page(&self.key).await
    }

    /// Scroll hook: the last rendered item is close to the viewport
    pub async fn on_near_end(&self) -> Result<FetchOutcome> {
        let status = self
            .controller
            .registry()
            .get(&self.key)
            .map(|entry| entry.status())
            .unwrap_or_default();
        if status == FetchStatus::Exhausted {
            return Ok(FetchOutcome::Skipped(SkipReason::Exhausted));
        }
        self.fetch_more().await
    }

    /// Change notifications for the current entry of this view.
    ///
    /// An `Invalidated` change means the entry was discarded; subscribe again.
    pub fn subscribe(&self) -> watch::Receiver<ViewChange> {
        self.controller
            .registry()
            .get_or_create(&self.key)
            .subscribe()
    }
}
