//! Error types for the feed view cache

use crate::keys::{FilterValue, ViewKey};
use crate::model::PostId;
use thiserror::Error;

/// Feed view cache errors
#[derive(Error, Debug)]
pub enum ViewCacheError {
    /// Page fetch failed; the view is left in `Error` status with its cursor intact
    #[error("Failed to fetch page for view {key}: {source}")]
    FetchFailed {
        key: ViewKey,
        #[source]
        source: anyhow::Error,
    },

    /// Mutating action failed; no cached view was touched
    #[error("Mutation '{action}' failed: {source}")]
    MutationFailed {
        action: &'static str,
        post_id: Option<PostId>,
        #[source]
        source: anyhow::Error,
    },

    /// Two raw parameter spellings normalized to the same name with different values
    #[error("View key collision on '{name}': {first} vs {second}")]
    ViewKeyCollision {
        name: String,
        first: FilterValue,
        second: FilterValue,
    },

    /// Server returned items already present on an earlier page of the same view
    #[error("View {key} holds items on more than one page: {}", join_ids(.post_ids))]
    DuplicateItemAcrossPages { key: ViewKey, post_ids: Vec<PostId> },

    #[error("Invalid view parameter '{name}': {reason}")]
    InvalidViewParam { name: String, reason: String },

    #[error("Session is not authenticated")]
    NotAuthenticated,

    #[error("Post content is empty")]
    EmptyPost,
}

pub type Result<T> = std::result::Result<T, ViewCacheError>;

fn join_ids(ids: &[PostId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
