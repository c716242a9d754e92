//! Viewer session state as exposed by the auth layer

use crate::model::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Authenticated { user_id: UserId },
    Unauthenticated,
}

impl SessionStatus {
    pub fn viewer(&self) -> Option<&UserId> {
        match self {
            SessionStatus::Authenticated { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer().is_some()
    }
}

/// Session collaborator
pub trait SessionProvider: Send + Sync {
    fn status(&self) -> SessionStatus;
}

/// Fixed session, handy for tests and server-side rendering
#[derive(Debug, Clone)]
pub struct StaticSession(pub SessionStatus);

impl SessionProvider for StaticSession {
    fn status(&self) -> SessionStatus {
        self.0.clone()
    }
}
