//! Mutation propagator
//!
//! Rewrites one post inside every cached view that holds it. Propagation is
//! synchronous and never changes membership: a view without the post is left
//! untouched. Each entry commits under its own lock, so a reader sees either the
//! old or the new copy of that view.

use crate::keys::ViewKey;
use crate::model::{Post, PostId};
use crate::registry::ViewRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Summary of one propagation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub views_scanned: usize,
    pub views_updated: usize,
    pub items_rewritten: usize,
}

pub struct MutationPropagator {
    registry: Arc<ViewRegistry>,
}

impl MutationPropagator {
    pub fn new(registry: Arc<ViewRegistry>) -> Self {
        Self { registry }
    }

    /// Replace every cached copy of `id` with `transform(copy)` in each view whose
    /// key satisfies `predicate` (all views when `None`).
    ///
    /// `transform` receives the current cached copy and must be pure.
    pub fn apply_to_entity<F>(
        &self,
        id: &PostId,
        predicate: Option<&dyn Fn(&ViewKey) -> bool>,
        transform: F,
    ) -> PropagationReport
    where
        F: Fn(&Post) -> Post,
    {
        let mut report = PropagationReport::default();

        for entry in self.registry.entries() {
            if let Some(predicate) = predicate {
                if !predicate(entry.key()) {
                    continue;
                }
            }
            report.views_scanned += 1;

            let rewritten = entry.rewrite_items(id, &transform);
            if rewritten > 0 {
                report.views_updated += 1;
                report.items_rewritten += rewritten;
            }
        }

        self.registry
            .stats()
            .record_propagation(report.items_rewritten);
        debug!(
            post_id = %id,
            views_scanned = report.views_scanned,
            views_updated = report.views_updated,
            items = report.items_rewritten,
            "Propagated post mutation"
        );
        report
    }
}

/// Apply the authoritative result of a like toggle
pub fn like_delta(added: bool) -> impl Fn(&Post) -> Post {
    move |post| Post {
        liked_by_viewer: added,
        like_count: if added {
            post.like_count.saturating_add(1)
        } else {
            post.like_count.saturating_sub(1)
        },
        ..post.clone()
    }
}
