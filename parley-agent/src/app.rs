//! Chat application facade

use parking_lot::Mutex;
use parley_core::session::{SessionId, SessionStore};
use parley_core::storage::StorageAdapter;
use parley_core::view::{ViewProjection, ViewPublisher};
use parley_providers::ChatEndpoint;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::controller::{
    ConversationController, ConversationError, PendingReply, SendOutcome, SharedStore,
};

/// Everything a renderer needs: session actions, sending, and the projection
///
/// Every action republishes the [`ViewProjection`]. Actions other than
/// [`ChatApp::send`] stay available while a reply is pending. Clones share
/// the same sessions.
#[derive(Clone)]
pub struct ChatApp {
    store: SharedStore,
    controller: ConversationController,
    view: Arc<ViewPublisher>,
}

impl ChatApp {
    /// Restore sessions from `storage` and wire up the controller
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        endpoint: Arc<dyn ChatEndpoint>,
    ) -> parley_core::Result<Self> {
        let store = SessionStore::restore(storage)?;
        let view = Arc::new(ViewPublisher::new(&store));
        let store = Arc::new(Mutex::new(store));
        let controller = ConversationController::new(store.clone(), endpoint, view.clone());

        Ok(Self {
            store,
            controller,
            view,
        })
    }

    /// Start a new chat and make it active
    pub fn new_chat(&self) -> parley_core::Result<SessionId> {
        let mut store = self.store.lock();
        let id = store.create_session()?;
        info!("Started chat {}", id);
        self.publish(&store);
        Ok(id)
    }

    /// Switch to `id`; returns false and changes nothing if it does not exist
    pub fn open(&self, id: &SessionId) -> bool {
        let mut store = self.store.lock();
        if store.load_session(id).is_none() {
            return false;
        }
        self.publish(&store);
        true
    }

    /// Delete `id`
    ///
    /// Callers are expected to have confirmed the deletion with the user.
    pub fn delete(&self, id: &SessionId) -> parley_core::Result<()> {
        let mut store = self.store.lock();
        store.delete_session(id)?;
        self.publish(&store);
        Ok(())
    }

    /// Send a user message to the active chat and wait for the reply
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ConversationError> {
        self.controller.send(text).await
    }

    /// Send a user message to the active chat without waiting
    ///
    /// The user message is stored before this returns; the reply is recorded
    /// whenever it arrives. `None` means the input was blank.
    pub fn start(&self, text: &str) -> Result<Option<PendingReply>, ConversationError> {
        self.controller.start(text)
    }

    /// Latest projection
    pub fn view(&self) -> ViewProjection {
        self.view.current()
    }

    /// Receiver notified whenever the projection changes
    pub fn subscribe(&self) -> watch::Receiver<ViewProjection> {
        self.view.subscribe()
    }

    fn publish(&self, store: &SessionStore) {
        self.view.publish(store, self.controller.is_pending());
    }
}
