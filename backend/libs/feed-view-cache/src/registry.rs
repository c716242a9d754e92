//! View registry
//!
//! Maps a [`ViewKey`] to the single shared [`ViewEntry`] for that view. Entries
//! are created lazily, live for the UI session, and are dropped on explicit
//! invalidation. Two writers own an entry:
//! - the pagination controller appends pages (and primes empty entries)
//! - the mutation propagator rewrites items already present
//!
//! Post creation is the single exception: the mutation coordinator inserts a
//! freshly created post at the head of page 0 of the views that list it
//! (`ViewEntry::insert_head`). It never touches the cursor or later pages.
//!
//! Every write happens under the entry's lock with no suspension point inside,
//! so readers see either the state before a write or the state after it.

use crate::config::ViewCacheConfig;
use crate::error::{Result, ViewCacheError};
use crate::keys::{FeedFilter, FilterValue, ViewKey};
use crate::model::{Cursor, FetchStatus, Page, Post, PostId};
use crate::stats::StatsCollector;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// What a write did to a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    FetchStarted,
    PageAppended { items: usize },
    FetchFailed,
    ItemsRewritten { items: usize },
    ItemInserted { post_id: PostId },
    Invalidated,
}

/// Change notification published on every write to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewChange {
    pub revision: u64,
    pub kind: ChangeKind,
}

/// Why a page request did not reach the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyFetching,
    Exhausted,
}

/// Point-in-time copy of one view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub key: ViewKey,
    pub pages: Vec<Page>,
    pub status: FetchStatus,
    pub last_cursor: Option<Cursor>,
    pub last_error: Option<String>,
    pub flagged_duplicates: Vec<PostId>,
    pub revision: u64,
}

impl ViewSnapshot {
    /// Flattened items in display order
    pub fn items(&self) -> Vec<Post> {
        self.pages
            .iter()
            .flat_map(|page| page.items.iter().cloned())
            .collect()
    }

    /// Fails when the server ever handed this view the same post on two pages
    pub fn integrity_check(&self) -> Result<()> {
        if self.flagged_duplicates.is_empty() {
            Ok(())
        } else {
            Err(ViewCacheError::DuplicateItemAcrossPages {
                key: self.key.clone(),
                post_ids: self.flagged_duplicates.clone(),
            })
        }
    }
}

#[derive(Debug, Default)]
struct ViewState {
    pages: Vec<Page>,
    status: FetchStatus,
    last_cursor: Option<Cursor>,
    last_error: Option<String>,
    flagged_duplicates: Vec<PostId>,
    revision: u64,
}

/// Outcome of committing one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageCommit {
    pub items: usize,
    pub exhausted: bool,
    pub duplicates: Vec<PostId>,
}

/// Cached state of one view
pub struct ViewEntry {
    key: ViewKey,
    state: RwLock<ViewState>,
    changes: watch::Sender<ViewChange>,
}

impl ViewEntry {
    fn new(key: ViewKey) -> Self {
        let (changes, _) = watch::channel(ViewChange {
            revision: 0,
            kind: ChangeKind::Created,
        });
        Self {
            key,
            state: RwLock::new(ViewState::default()),
            changes,
        }
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn status(&self) -> FetchStatus {
        self.state.read().status
    }

    pub fn page_count(&self) -> usize {
        self.state.read().pages.len()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.state.read().pages.iter().any(|page| page.contains(id))
    }

    /// Flattened items in display order
    pub fn items(&self) -> Vec<Post> {
        let state = self.state.read();
        state
            .pages
            .iter()
            .flat_map(|page| page.items.iter().cloned())
            .collect()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.read();
        ViewSnapshot {
            key: self.key.clone(),
            pages: state.pages.clone(),
            status: state.status,
            last_cursor: state.last_cursor.clone(),
            last_error: state.last_error.clone(),
            flagged_duplicates: state.flagged_duplicates.clone(),
            revision: state.revision,
        }
    }

    /// Receive a notification after every write to this entry
    pub fn subscribe(&self) -> watch::Receiver<ViewChange> {
        self.changes.subscribe()
    }

    /// Check-and-set the `Fetching` guard; returns the cursor to fetch from
    pub(crate) fn begin_fetch(&self) -> std::result::Result<Option<Cursor>, SkipReason> {
        let (cursor, revision) = {
            let mut state = self.state.write();
            match state.status {
                FetchStatus::Fetching => return Err(SkipReason::AlreadyFetching),
                FetchStatus::Exhausted => return Err(SkipReason::Exhausted),
                FetchStatus::Idle | FetchStatus::Error => {}
            }
            state.status = FetchStatus::Fetching;
            state.revision += 1;
            (state.last_cursor.clone(), state.revision)
        };
        self.notify(revision, ChangeKind::FetchStarted);
        Ok(cursor)
    }

    /// Append a page and advance the cursor chain
    pub(crate) fn commit_page(&self, page: Page) -> PageCommit {
        let (commit, revision) = {
            let mut state = self.state.write();

            let seen: HashSet<&PostId> = state
                .pages
                .iter()
                .flat_map(|page| page.items.iter().map(|post| &post.id))
                .collect();
            let duplicates: Vec<PostId> = page
                .items
                .iter()
                .filter(|post| seen.contains(&post.id))
                .map(|post| post.id.clone())
                .collect();

            let exhausted = page.cursor.is_none();
            let items = page.items.len();

            state.flagged_duplicates.extend(duplicates.iter().cloned());
            state.last_cursor = page.cursor.clone();
            state.pages.push(page);
            state.status = if exhausted {
                FetchStatus::Exhausted
            } else {
                FetchStatus::Idle
            };
            state.last_error = None;
            state.revision += 1;

            (
                PageCommit {
                    items,
                    exhausted,
                    duplicates,
                },
                state.revision,
            )
        };
        self.notify(revision, ChangeKind::PageAppended { items: commit.items });
        commit
    }

    /// Record a failed fetch; pages and cursor stay as they were
    pub(crate) fn fail_fetch(&self, error: &anyhow::Error) {
        let revision = {
            let mut state = self.state.write();
            state.status = FetchStatus::Error;
            state.last_error = Some(format!("{:#}", error));
            state.revision += 1;
            state.revision
        };
        self.notify(revision, ChangeKind::FetchFailed);
    }

    /// Release the `Fetching` guard of a detached entry without committing
    pub(crate) fn abandon_fetch(&self) {
        let mut state = self.state.write();
        if state.status == FetchStatus::Fetching {
            state.status = FetchStatus::Idle;
        }
    }

    /// Claim an empty, non-fetching entry for a prefetched first page
    pub(crate) fn begin_prime(&self) -> bool {
        let mut state = self.state.write();
        let claimable = matches!(state.status, FetchStatus::Idle | FetchStatus::Error);
        if !state.pages.is_empty() || !claimable {
            return false;
        }
        state.status = FetchStatus::Fetching;
        true
    }

    /// Replace every copy of `id` with `transform(copy)`; returns the number rewritten
    pub(crate) fn rewrite_items<F>(&self, id: &PostId, transform: F) -> usize
    where
        F: Fn(&Post) -> Post,
    {
        let (rewritten, revision) = {
            let mut state = self.state.write();
            let mut rewritten = 0;
            for page in state.pages.iter_mut() {
                for item in page.items.iter_mut().filter(|item| &item.id == id) {
                    let mut next = transform(&*item);
                    // Identity is not a mutable field
                    next.id = item.id.clone();
                    *item = next;
                    rewritten += 1;
                }
            }
            if rewritten == 0 {
                return 0;
            }
            state.revision += 1;
            (rewritten, state.revision)
        };
        self.notify(revision, ChangeKind::ItemsRewritten { items: rewritten });
        rewritten
    }

    /// Put a new post at the head of page 0; no-op without pages or if already present
    pub(crate) fn insert_head(&self, post: &Post) -> bool {
        let revision = {
            let mut state = self.state.write();
            if state.pages.iter().any(|page| page.contains(&post.id)) {
                return false;
            }
            let Some(first) = state.pages.first_mut() else {
                return false;
            };
            first.items.insert(0, post.clone());
            state.revision += 1;
            state.revision
        };
        self.notify(
            revision,
            ChangeKind::ItemInserted {
                post_id: post.id.clone(),
            },
        );
        true
    }

    fn mark_invalidated(&self) {
        let revision = {
            let mut state = self.state.write();
            state.revision += 1;
            state.revision
        };
        self.notify(revision, ChangeKind::Invalidated);
    }

    fn notify(&self, revision: u64, kind: ChangeKind) {
        self.changes.send_replace(ViewChange { revision, kind });
    }
}

impl std::fmt::Debug for ViewEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ViewEntry")
            .field("key", &self.key)
            .field("pages", &state.pages.len())
            .field("status", &state.status)
            .field("revision", &state.revision)
            .finish()
    }
}

/// Session-scoped map of view key to shared entry
pub struct ViewRegistry {
    views: DashMap<ViewKey, Arc<ViewEntry>>,
    config: ViewCacheConfig,
    stats: StatsCollector,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new(ViewCacheConfig::default())
    }
}

impl ViewRegistry {
    pub fn new(config: ViewCacheConfig) -> Self {
        let stats = StatsCollector::new(config.latency_samples);
        Self {
            views: DashMap::new(),
            config,
            stats,
        }
    }

    pub fn config(&self) -> &ViewCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    /// Normalize raw filter params with this registry's false-flag policy
    pub fn normalize<I, K, V>(&self, raw: I) -> Result<ViewKey>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        ViewKey::normalize(raw, self.config.false_flag_policy)
    }

    pub fn key_for(&self, filter: &FeedFilter) -> Result<ViewKey> {
        filter.key(self.config.false_flag_policy)
    }

    /// Entry for `key`, created empty on first use; equal keys share one instance
    pub fn get_or_create(&self, key: &ViewKey) -> Arc<ViewEntry> {
        if let Some(entry) = self.views.get(key) {
            return Arc::clone(entry.value());
        }
        let entry = self
            .views
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(view = %key, "Created view entry");
                Arc::new(ViewEntry::new(key.clone()))
            });
        Arc::clone(entry.value())
    }

    pub fn get(&self, key: &ViewKey) -> Option<Arc<ViewEntry>> {
        self.views.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `entry` is still the registered instance for its key
    pub fn is_current(&self, entry: &Arc<ViewEntry>) -> bool {
        self.views
            .get(entry.key())
            .map(|current| Arc::ptr_eq(current.value(), entry))
            .unwrap_or(false)
    }

    /// Discard the entry for `key`; a later request starts from an empty view
    pub fn invalidate(&self, key: &ViewKey) -> Option<Arc<ViewEntry>> {
        let (_, entry) = self.views.remove(key)?;
        if entry.status() == FetchStatus::Fetching {
            info!(view = %key, "Invalidated view with a fetch in flight");
        } else {
            info!(view = %key, "Invalidated view");
        }
        entry.mark_invalidated();
        Some(entry)
    }

    /// Discard every entry (session teardown)
    pub fn clear(&self) {
        let keys = self.keys();
        for key in &keys {
            if let Some((_, entry)) = self.views.remove(key) {
                entry.mark_invalidated();
            }
        }
        info!(views = keys.len(), "Cleared view registry");
    }

    pub fn keys(&self) -> Vec<ViewKey> {
        self.views.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Every registered entry, detached from the map so callers may lock them freely
    pub fn entries(&self) -> Vec<Arc<ViewEntry>> {
        self.views
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Deep copy of every view, ordered by key
    pub fn snapshot(&self) -> BTreeMap<ViewKey, ViewSnapshot> {
        self.entries()
            .into_iter()
            .map(|entry| (entry.key().clone(), entry.snapshot()))
            .collect()
    }
}
