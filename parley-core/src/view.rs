//! Read model handed to the rendering layer
//!
//! Renderers only ever see a [`ViewProjection`]: the sidebar, the active
//! transcript and whether a reply is pending. It is recomputed after every
//! mutation and broadcast through a [`ViewPublisher`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::session::{Role, SessionId, SessionStore};

/// One sidebar row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarEntry {
    pub id: SessionId,
    pub title: String,
    pub is_active: bool,
}

/// One transcript row of the active session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of everything a renderer may show
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewProjection {
    /// Sessions, newest first
    pub sidebar: Vec<SidebarEntry>,
    /// Messages of the active session in chronological order
    pub transcript: Vec<TranscriptEntry>,
    /// True while a remote reply is awaited
    pub pending: bool,
}

impl ViewProjection {
    /// Compute the projection from the store
    pub fn compute(store: &SessionStore, pending: bool) -> Self {
        let active = store.active_id();
        let sidebar = store
            .list_sessions()
            .into_iter()
            .map(|summary| SidebarEntry {
                is_active: &summary.id == active,
                id: summary.id,
                title: summary.title,
            })
            .collect();
        let transcript = store
            .active()
            .messages()
            .iter()
            .map(|m| TranscriptEntry {
                role: m.role,
                content: m.content.clone(),
                timestamp: m.timestamp,
            })
            .collect();

        Self {
            sidebar,
            transcript,
            pending,
        }
    }

    /// The active sidebar entry
    pub fn active(&self) -> Option<&SidebarEntry> {
        self.sidebar.iter().find(|entry| entry.is_active)
    }
}

/// Broadcasts projections to any number of renderers
#[derive(Debug)]
pub struct ViewPublisher {
    tx: watch::Sender<ViewProjection>,
}

impl ViewPublisher {
    /// Create a publisher seeded with the store's current state
    pub fn new(store: &SessionStore) -> Self {
        let (tx, _rx) = watch::channel(ViewProjection::compute(store, false));
        Self { tx }
    }

    /// Recompute and broadcast
    pub fn publish(&self, store: &SessionStore, pending: bool) {
        self.tx.send_replace(ViewProjection::compute(store, pending));
    }

    /// Latest projection
    pub fn current(&self) -> ViewProjection {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<ViewProjection> {
        self.tx.subscribe()
    }
}
