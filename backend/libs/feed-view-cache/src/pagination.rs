//! Pagination controller
//!
//! The only component that appends pages. Per view it enforces:
//! - at most one fetch in flight (the `Fetching` guard)
//! - no fetch once the cursor chain ended (`Exhausted`)
//! - failures keep pages and cursor, so a retry resumes from the same place
//! - results for an entry that was invalidated meanwhile are dropped

use crate::error::{Result, ViewCacheError};
use crate::keys::ViewKey;
use crate::model::{Cursor, FetchedPage, PostId};
use crate::registry::{SkipReason, ViewRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One page request handed to the data source
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub key: &'a ViewKey,
    /// `None` for the first page
    pub cursor: Option<&'a Cursor>,
    pub limit: u32,
}

/// Data-fetch collaborator.
///
/// Implementations return items in display order and a `next_cursor` that is
/// `None` exactly when no further items exist. Timeouts are the
/// implementation's concern; the controller surfaces whatever it resolves to.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, request: PageRequest<'_>) -> anyhow::Result<FetchedPage>;
}

/// What `request_next_page` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was appended
    Appended {
        items: usize,
        exhausted: bool,
        /// Ids already present on earlier pages; kept, flagged and logged
        duplicates: Vec<PostId>,
    },
    /// No fetch was issued
    Skipped(SkipReason),
    /// The view was discarded while the fetch was in flight; nothing was written
    Discarded,
}

pub struct PaginationController<S: ?Sized> {
    registry: Arc<ViewRegistry>,
    source: Arc<S>,
}

impl<S: FeedSource + ?Sized> PaginationController<S> {
    pub fn new(registry: Arc<ViewRegistry>, source: Arc<S>) -> Self {
        Self { registry, source }
    }

    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    /// Fetch and append the next page of `key`.
    ///
    /// Issues exactly one source call when the view is `Idle` or `Error`, none
    /// when it is `Fetching` or `Exhausted`. A failed fetch leaves the view in
    /// `Error` and returns [`ViewCacheError::FetchFailed`].
    pub async fn request_next_page(&self, key: &ViewKey) -> Result<FetchOutcome> {
        let entry = self.registry.get_or_create(key);
        let stats = self.registry.stats();

        let cursor = match entry.begin_fetch() {
            Ok(cursor) => cursor,
            Err(reason) => {
                debug!(view = %key, reason = ?reason, "Skipped page request");
                stats.record_skip();
                return Ok(FetchOutcome::Skipped(reason));
            }
        };

        debug!(view = %key, cursor = ?cursor, "Fetching next page");
        stats.record_fetch();

        let started = Instant::now();
        let result = self
            .source
            .fetch_page(PageRequest {
                key,
                cursor: cursor.as_ref(),
                limit: self.registry.config().page_size,
            })
            .await;
        stats.record_latency(started.elapsed());

        // The entry may have been invalidated (and maybe recreated) while we waited
        if !self.registry.is_current(&entry) {
            warn!(view = %key, "Dropped page for a discarded view");
            entry.abandon_fetch();
            stats.record_stale_commit();
            return Ok(FetchOutcome::Discarded);
        }

        match result {
            Ok(fetched) => {
                let commit = entry.commit_page(fetched.into());
                stats.record_page();

                if !commit.duplicates.is_empty() {
                    let violation = ViewCacheError::DuplicateItemAcrossPages {
                        key: key.clone(),
                        post_ids: commit.duplicates.clone(),
                    };
                    warn!(view = %key, error = %violation, "Pagination contract violated");
                    stats.record_duplicates(commit.duplicates.len());
                }

                debug!(
                    view = %key,
                    items = commit.items,
                    exhausted = commit.exhausted,
                    "Appended page"
                );
                Ok(FetchOutcome::Appended {
                    items: commit.items,
                    exhausted: commit.exhausted,
                    duplicates: commit.duplicates,
                })
            }
            Err(source) => {
                warn!(view = %key, error = %source, "Page fetch failed");
                entry.fail_fetch(&source);
                stats.record_fetch_error();
                Err(ViewCacheError::FetchFailed {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// Seed an empty view with a page fetched ahead of time (e.g. during
    /// server-side rendering). Returns `false` without touching the view when it
    /// already holds pages or has a fetch in flight.
    pub fn prime(&self, key: &ViewKey, page: FetchedPage) -> bool {
        let entry = self.registry.get_or_create(key);
        if !entry.begin_prime() {
            debug!(view = %key, "Skipped priming a loaded view");
            return false;
        }

        let commit = entry.commit_page(page.into());
        self.registry.stats().record_page();
        debug!(view = %key, items = commit.items, "Primed view");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, FetchStatus, Post, UserId};
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn post(id: &str) -> Post {
        Post {
            id: PostId::from(id),
            content: String::new(),
            created_at: Utc::now(),
            like_count: 0,
            liked_by_viewer: false,
            author: Author {
                id: UserId::from("u1"),
                display_name: None,
                avatar_ref: None,
            },
        }
    }

    /// Replays canned responses and records the cursors it was asked for
    #[derive(Default)]
    struct Scripted {
        responses: Mutex<VecDeque<anyhow::Result<FetchedPage>>>,
        cursors: Mutex<Vec<Option<Cursor>>>,
    }

    impl Scripted {
        fn push_page(&self, ids: &[&str], next: Option<&str>) {
            self.responses.lock().push_back(Ok(FetchedPage {
                items: ids.iter().map(|id| post(id)).collect(),
                next_cursor: next.map(Cursor::from),
            }));
        }

        fn push_error(&self, message: &str) {
            self.responses
                .lock()
                .push_back(Err(anyhow::anyhow!(message.to_string())));
        }
    }

    #[async_trait]
    impl FeedSource for Scripted {
        async fn fetch_page(&self, request: PageRequest<'_>) -> anyhow::Result<FetchedPage> {
            self.cursors.lock().push(request.cursor.cloned());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    fn controller(source: Arc<Scripted>) -> PaginationController<Scripted> {
        PaginationController::new(Arc::new(ViewRegistry::default()), source)
    }

    #[tokio::test]
    async fn test_first_page_uses_no_cursor() {
        let source = Arc::new(Scripted::default());
        source.push_page(&["p1"], Some("c1"));
        source.push_page(&["p2"], None);
        let controller = controller(Arc::clone(&source));
        let key = ViewKey::global();

        controller.request_next_page(&key).await.unwrap();
        controller.request_next_page(&key).await.unwrap();

        assert_eq!(
            *source.cursors.lock(),
            vec![None, Some(Cursor::from("c1"))]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_retries_from_same_cursor() {
        let source = Arc::new(Scripted::default());
        source.push_page(&["p1"], Some("c1"));
        source.push_error("502 bad gateway");
        source.push_page(&["p2"], None);
        let controller = controller(Arc::clone(&source));
        let key = ViewKey::global();

        controller.request_next_page(&key).await.unwrap();
        let err = controller.request_next_page(&key).await.unwrap_err();
        assert!(matches!(err, ViewCacheError::FetchFailed { .. }));

        let entry = controller.registry().get(&key).unwrap();
        assert_eq!(entry.status(), FetchStatus::Error);
        assert_eq!(entry.page_count(), 1);

        let outcome = controller.request_next_page(&key).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Appended { exhausted: true, .. }));
        assert_eq!(
            *source.cursors.lock(),
            vec![None, Some(Cursor::from("c1")), Some(Cursor::from("c1"))]
        );
        assert_eq!(controller.registry().stats().snapshot().fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_limit_comes_from_config() {
        struct LimitRecorder(Mutex<Option<u32>>);

        #[async_trait]
        impl FeedSource for LimitRecorder {
            async fn fetch_page(&self, request: PageRequest<'_>) -> anyhow::Result<FetchedPage> {
                *self.0.lock() = Some(request.limit);
                Ok(FetchedPage {
                    items: Vec::new(),
                    next_cursor: None,
                })
            }
        }

        let config = crate::config::ViewCacheConfig {
            page_size: 3,
            ..Default::default()
        };
        let recorder = Arc::new(LimitRecorder(Mutex::new(None)));
        let controller =
            PaginationController::new(Arc::new(ViewRegistry::new(config)), Arc::clone(&recorder));

        controller.request_next_page(&ViewKey::global()).await.unwrap();
        assert_eq!(*recorder.0.lock(), Some(3));
    }

    #[test]
    fn test_prime_only_fills_empty_views() {
        let source = Arc::new(Scripted::default());
        let controller = controller(Arc::clone(&source));
        let key = ViewKey::global();
        let prefetched = FetchedPage {
            items: vec![post("p1")],
            next_cursor: Some(Cursor::from("c1")),
        };

        assert!(controller.prime(&key, prefetched.clone()));
        assert!(!controller.prime(&key, prefetched));

        let snapshot = controller.registry().get(&key).unwrap().snapshot();
        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.last_cursor, Some(Cursor::from("c1")));
        assert_eq!(snapshot.status, FetchStatus::Idle);
        assert!(source.cursors.lock().is_empty());
    }
}
