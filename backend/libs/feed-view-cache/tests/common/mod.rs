//! Shared fixtures for feed view cache integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use feed_view_cache::{
    Author, Cursor, FeedSource, FetchedPage, PageRequest, Post, PostId, UserId, ViewKey,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Build a post; newer ids get older timestamps so feeds read newest first
pub fn post(id: &str, author: &str, like_count: u64, liked: bool) -> Post {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    Post {
        id: PostId::from(id),
        content: format!("content of {}", id),
        created_at: base - Duration::minutes(id.len() as i64),
        like_count,
        liked_by_viewer: liked,
        author: Author {
            id: UserId::from(author),
            display_name: Some(format!("User {}", author)),
            avatar_ref: None,
        },
    }
}

pub fn page(posts: Vec<Post>, next: Option<&str>) -> FetchedPage {
    FetchedPage {
        items: posts,
        next_cursor: next.map(Cursor::from),
    }
}

/// Data source answering from per-view scripts.
///
/// With a gate installed every fetch parks until the gate is released, which
/// lets tests observe the view while a fetch is in flight.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<ViewKey, VecDeque<anyhow::Result<FetchedPage>>>>,
    calls: Mutex<Vec<(ViewKey, Option<Cursor>)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, key: &ViewKey, response: FetchedPage) {
        self.scripts
            .lock()
            .entry(key.clone())
            .or_default()
            .push_back(Ok(response));
    }

    pub fn push_error(&self, key: &ViewKey, message: &str) {
        self.scripts
            .lock()
            .entry(key.clone())
            .or_default()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    /// Park every following fetch until the returned gate is notified
    pub fn install_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<(ViewKey, Option<Cursor>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> anyhow::Result<FetchedPage> {
        self.calls
            .lock()
            .push((request.key.clone(), request.cursor.cloned()));

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.scripts
            .lock()
            .get_mut(request.key)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted page for {}", request.key)))
    }
}
