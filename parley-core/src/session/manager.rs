//! Session store: the in-memory session collection and its persistence

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::{Message, Role, Session, SessionId};
use crate::storage::StorageAdapter;
use crate::Error;

/// Storage key holding the whole session collection
pub const STORAGE_KEY: &str = "parley_chats";

/// Persisted form of the collection, keyed in insertion order
type Collection = IndexMap<SessionId, Session>;

/// Owns every chat session and the active-session pointer
///
/// There is always at least one session and the active id always refers to
/// one of them. Every mutation rewrites the full collection to storage.
pub struct SessionStore {
    storage: Arc<dyn StorageAdapter>,
    sessions: Collection,
    active: SessionId,
    /// Highest millisecond stamp issued or seen, keeps ids unique
    last_millis: i64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("active", &self.active)
            .finish()
    }
}

impl SessionStore {
    /// Rebuild the store from storage
    ///
    /// A missing, empty or unreadable collection counts as "no sessions", in
    /// which case a fresh session is created and persisted. Otherwise the
    /// active session is the last entry in stored order.
    pub fn restore(storage: Arc<dyn StorageAdapter>) -> crate::Result<Self> {
        let sessions = read_collection(storage.as_ref())?;
        let last_millis = sessions
            .keys()
            .filter_map(SessionId::millis)
            .max()
            .unwrap_or(0);

        if let Some((active, _)) = sessions.last() {
            let active = active.clone();
            info!("Restored {} sessions, active {}", sessions.len(), active);
            return Ok(Self {
                storage,
                sessions,
                active,
                last_millis,
            });
        }

        info!("No stored sessions, starting a new chat");
        let mut store = Self {
            storage,
            sessions,
            active: SessionId::from_millis(0),
            last_millis,
        };
        store.create_session()?;
        Ok(store)
    }

    /// Create a new empty session, make it active and persist
    pub fn create_session(&mut self) -> crate::Result<SessionId> {
        let id = self.insert_new();
        self.active = id.clone();
        debug!("Created session {}", id);
        self.persist()?;
        Ok(id)
    }

    /// Sidebar listing: newest first, ties in reverse insertion order
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut entries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .rev()
            .map(|(id, session)| SessionSummary {
                id: id.clone(),
                title: session.title.clone(),
                created_at: session.created_at,
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Make `id` the active session
    ///
    /// Unknown ids leave the store untouched and return `None`.
    pub fn load_session(&mut self, id: &SessionId) -> Option<&Session> {
        if !self.sessions.contains_key(id) {
            debug!("Ignoring load of unknown session {}", id);
            return None;
        }
        self.active = id.clone();
        self.sessions.get(id)
    }

    /// Append a message to a session and persist
    pub fn append_message(
        &mut self,
        id: &SessionId,
        role: Role,
        content: impl Into<String>,
    ) -> crate::Result<()> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSession(id.to_string()))?;
        session.push(Message::new(role, content));
        debug!(
            "Appended {} message to {} ({} total)",
            role,
            id,
            session.messages().len()
        );
        self.persist()
    }

    /// Delete a session, replacing the active one if needed, and persist
    pub fn delete_session(&mut self, id: &SessionId) -> crate::Result<()> {
        if !self.sessions.contains_key(id) {
            return Err(Error::UnknownSession(id.to_string()));
        }
        if self.sessions.len() <= 1 {
            return Err(Error::LastSession);
        }

        self.sessions.shift_remove(id);
        if &self.active == id {
            self.active = self.insert_new();
            info!("Deleted active session {}, switched to {}", id, self.active);
        } else {
            info!("Deleted session {}", id);
        }
        self.persist()
    }

    /// Write the full collection to storage
    pub fn persist(&self) -> crate::Result<()> {
        let blob = serde_json::to_string(&self.sessions)?;
        self.storage.set(STORAGE_KEY, &blob).map_err(|e| {
            warn!("Failed to persist sessions: {}", e);
            e
        })
    }

    /// Id of the active session
    pub fn active_id(&self) -> &SessionId {
        &self.active
    }

    /// The active session
    pub fn active(&self) -> &Session {
        // The active id always references an existing session.
        &self.sessions[&self.active]
    }

    /// Look up a session by id
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// All sessions in insertion order
    pub fn sessions(&self) -> impl Iterator<Item = (&SessionId, &Session)> {
        self.sessions.iter()
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Always false: the store never holds zero sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn insert_new(&mut self) -> SessionId {
        let created_at = Utc::now();
        let millis = created_at.timestamp_millis().max(self.last_millis + 1);
        self.last_millis = millis;

        let id = SessionId::from_millis(millis);
        self.sessions.insert(id.clone(), Session::new(created_at));
        id
    }
}

/// Sidebar row for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

fn read_collection(storage: &dyn StorageAdapter) -> crate::Result<Collection> {
    let blob = match storage.get(STORAGE_KEY) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Ok(Collection::new()),
        Err(Error::Serialization(e)) => {
            warn!("Stored sessions are undecodable, starting fresh: {}", e);
            return Ok(Collection::new());
        }
        Err(e) => return Err(e),
    };
    if blob.trim().is_empty() {
        return Ok(Collection::new());
    }
    match serde_json::from_str::<Collection>(&blob) {
        Ok(sessions) => Ok(sessions),
        Err(e) => {
            warn!("Stored sessions are unreadable, starting fresh: {}", e);
            Ok(Collection::new())
        }
    }
}
