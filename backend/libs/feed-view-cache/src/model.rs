//! Post entities and page containers shared by every cached view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Post identity; every other post field is a mutable copy
    PostId
);
string_id!(UserId);
string_id!(
    /// Opaque token requesting the page after the one it was returned with
    Cursor
);

/// Post author as embedded in every feed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: UserId,
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
}

/// Feed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub liked_by_viewer: bool,
    pub author: Author,
}

impl Post {
    /// Short date shown next to the author name (`DD/MM/YY`)
    pub fn created_at_label(&self) -> String {
        self.created_at.format("%d/%m/%y").to_string()
    }
}

/// One cursor-delimited slice of a view.
///
/// `cursor` requests the page after this one; `None` on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub cursor: Option<Cursor>,
    pub items: Vec<Post>,
}

impl Page {
    pub fn contains(&self, id: &PostId) -> bool {
        self.items.iter().any(|post| &post.id == id)
    }
}

/// Result of one data-fetch collaborator call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedPage {
    pub items: Vec<Post>,
    pub next_cursor: Option<Cursor>,
}

impl From<FetchedPage> for Page {
    fn from(fetched: FetchedPage) -> Self {
        Self {
            cursor: fetched.next_cursor,
            items: fetched.items,
        }
    }
}

/// Fetch state of a single view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
    Error,
    Exhausted,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "idle"),
            FetchStatus::Fetching => write!(f, "fetching"),
            FetchStatus::Error => write!(f, "error"),
            FetchStatus::Exhausted => write!(f, "exhausted"),
        }
    }
}
