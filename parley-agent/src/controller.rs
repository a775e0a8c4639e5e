//! Conversation controller: one outstanding request at a time
//!
//! A send moves through `Idle -> Sending -> AwaitingResponse -> Idle`. The
//! user's message is stored before the request goes out and is never rolled
//! back; whatever the endpoint does, exactly one assistant message is
//! appended to the session the request was addressed to.

use parking_lot::Mutex;
use parley_core::session::{Role, SessionId, SessionStore};
use parley_core::view::ViewPublisher;
use parley_providers::{ChatEndpoint, EndpointError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reply stored when the endpoint answers without a usable `response`
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process your request.";

/// Reply stored when the endpoint cannot be reached or rejects the request
pub const CONNECTION_ERROR_REPLY: &str = "Error connecting to the server.";

/// Session store shared between the controller and the app facade
///
/// Never held across an `.await`.
pub type SharedStore = Arc<Mutex<SessionStore>>;

/// Where the controller is in an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Sending,
    AwaitingResponse { session_id: SessionId },
}

/// How a send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// The endpoint's reply was appended
    Replied,
    /// The endpoint answered without a usable reply; the fallback was appended
    Fallback,
    /// The endpoint could not be reached; the connection error was appended
    Failed,
    /// The target session was deleted while waiting; the reply was dropped
    Orphaned,
}

/// Errors surfaced by [`ConversationController::send`]
#[derive(Error, Debug)]
pub enum ConversationError {
    /// Another request is still in flight
    #[error("A reply is still pending, wait for it before sending again")]
    Busy,

    /// The request task ended without recording a reply
    #[error("Reply task ended unexpectedly: {0}")]
    Interrupted(String),

    #[error(transparent)]
    Core(#[from] parley_core::Error),
}

/// Sends user messages and reconciles replies into the session store
///
/// Clones share the same store, endpoint and state.
#[derive(Clone)]
pub struct ConversationController {
    store: SharedStore,
    endpoint: Arc<dyn ChatEndpoint>,
    view: Arc<ViewPublisher>,
    state: Arc<Mutex<ControllerState>>,
}

/// An in-flight request
///
/// The request runs on its own task: dropping the handle does not cancel it,
/// and the reply is still recorded when it arrives.
pub struct PendingReply {
    session_id: SessionId,
    task: JoinHandle<Result<SendOutcome, ConversationError>>,
    controller: ConversationController,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl PendingReply {
    /// Session the reply will be appended to
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Wait for the reply to be recorded
    ///
    /// Must not be called again once it has returned.
    pub async fn join(&mut self) -> Result<SendOutcome, ConversationError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Reply task for session {} died: {}", self.session_id, e);
                self.controller.reset();
                Err(ConversationError::Interrupted(e.to_string()))
            }
        }
    }
}

impl ConversationController {
    /// Create a controller in the `Idle` state
    pub fn new(
        store: SharedStore,
        endpoint: Arc<dyn ChatEndpoint>,
        view: Arc<ViewPublisher>,
    ) -> Self {
        Self {
            store,
            endpoint,
            view,
            state: Arc::new(Mutex::new(ControllerState::Idle)),
        }
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        self.state.lock().clone()
    }

    /// Whether a reply is being awaited
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), ControllerState::AwaitingResponse { .. })
    }

    /// Send `text` from the user to the active session and wait for the reply
    ///
    /// Blank input is ignored. While a request is in flight further sends
    /// are rejected with [`ConversationError::Busy`].
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ConversationError> {
        match self.start(text)? {
            Some(mut reply) => reply.join().await,
            None => Ok(SendOutcome::Ignored),
        }
    }

    /// Store the user message and put the request in flight
    ///
    /// Returns `None` for blank input. Must be called from within a tokio
    /// runtime.
    pub fn start(&self, text: &str) -> Result<Option<PendingReply>, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.begin()?;
        let session_id = self.record_user_message(text)?;

        info!("Awaiting reply for session {}", session_id);
        let controller = self.clone();
        let target = session_id.clone();
        let message = text.to_string();
        let task = tokio::spawn(async move {
            let result = controller.endpoint.send(&message).await;
            controller.record_reply(&target, result)
        });

        Ok(Some(PendingReply {
            session_id,
            task,
            controller: self.clone(),
        }))
    }

    /// Idle -> Sending
    fn begin(&self) -> Result<(), ConversationError> {
        let mut state = self.state.lock();
        if *state != ControllerState::Idle {
            debug!("Rejecting send while {:?}", *state);
            return Err(ConversationError::Busy);
        }
        *state = ControllerState::Sending;
        Ok(())
    }

    /// Sending -> AwaitingResponse, with the user message stored and shown
    fn record_user_message(&self, text: &str) -> Result<SessionId, ConversationError> {
        let mut store = self.store.lock();
        let session_id = store.active_id().clone();

        if let Err(e) = store.append_message(&session_id, Role::User, text) {
            *self.state.lock() = ControllerState::Idle;
            self.view.publish(&store, false);
            return Err(e.into());
        }

        *self.state.lock() = ControllerState::AwaitingResponse {
            session_id: session_id.clone(),
        };
        self.view.publish(&store, true);
        Ok(session_id)
    }

    /// AwaitingResponse -> Idle, with the reply (or its stand-in) stored
    fn record_reply(
        &self,
        session_id: &SessionId,
        result: Result<String, EndpointError>,
    ) -> Result<SendOutcome, ConversationError> {
        let (content, outcome) = match result {
            Ok(reply) => (reply, SendOutcome::Replied),
            Err(EndpointError::Protocol(reason)) => {
                warn!("Unusable reply for session {}: {}", session_id, reason);
                (FALLBACK_REPLY.to_string(), SendOutcome::Fallback)
            }
            Err(e) => {
                if e.is_transport() {
                    warn!("Endpoint unreachable for session {}: {}", session_id, e);
                } else {
                    warn!("Endpoint rejected request for session {}: {}", session_id, e);
                }
                (CONNECTION_ERROR_REPLY.to_string(), SendOutcome::Failed)
            }
        };

        let mut store = self.store.lock();
        let appended = store.append_message(session_id, Role::Assistant, content);
        *self.state.lock() = ControllerState::Idle;
        self.view.publish(&store, false);

        match appended {
            Ok(()) => Ok(outcome),
            Err(parley_core::Error::UnknownSession(_)) => {
                warn!("Session {} was deleted before its reply arrived", session_id);
                Ok(SendOutcome::Orphaned)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Back to `Idle` without a reply
    fn reset(&self) {
        let store = self.store.lock();
        *self.state.lock() = ControllerState::Idle;
        self.view.publish(&store, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::storage::MemoryStorage;
    use parley_providers::EndpointResult;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Endpoint answering every request with a fixed result
    struct ScriptedEndpoint {
        reply: fn() -> EndpointResult<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedEndpoint {
        fn new(reply: fn() -> EndpointResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatEndpoint for ScriptedEndpoint {
        async fn send(&self, message: &str) -> EndpointResult<String> {
            self.calls.lock().push(message.to_string());
            (self.reply)()
        }
    }

    /// Endpoint that holds every request until released
    struct GatedEndpoint {
        gate: Notify,
    }

    #[async_trait]
    impl ChatEndpoint for GatedEndpoint {
        async fn send(&self, message: &str) -> EndpointResult<String> {
            self.gate.notified().await;
            Ok(format!("echo: {}", message))
        }
    }

    fn controller(endpoint: Arc<dyn ChatEndpoint>) -> (SharedStore, ConversationController) {
        let store = SessionStore::restore(Arc::new(MemoryStorage::new())).unwrap();
        let view = Arc::new(ViewPublisher::new(&store));
        let store = Arc::new(Mutex::new(store));
        let controller = ConversationController::new(store.clone(), endpoint, view);
        (store, controller)
    }

    fn transcript(store: &SharedStore) -> Vec<(Role, String)> {
        store
            .lock()
            .active()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_reply_appended() {
        let endpoint = ScriptedEndpoint::new(|| Ok("Hello!".to_string()));
        let (store, controller) = controller(endpoint.clone());

        let outcome = controller.send("Hi").await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied);
        assert_eq!(
            transcript(&store),
            vec![
                (Role::User, "Hi".to_string()),
                (Role::Assistant, "Hello!".to_string())
            ]
        );
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(!controller.view.current().pending);
        assert_eq!(*endpoint.calls.lock(), vec!["Hi".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let endpoint = ScriptedEndpoint::new(|| Ok("unused".to_string()));
        let (store, controller) = controller(endpoint.clone());

        assert_eq!(controller.send("   \n\t").await.unwrap(), SendOutcome::Ignored);
        assert!(transcript(&store).is_empty());
        assert!(endpoint.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let endpoint = ScriptedEndpoint::new(|| Ok("ok".to_string()));
        let (store, controller) = controller(endpoint.clone());

        controller.send("  Hi  ").await.unwrap();

        assert_eq!(transcript(&store)[0].1, "Hi");
        assert_eq!(*endpoint.calls.lock(), vec!["Hi".to_string()]);
    }

    #[tokio::test]
    async fn test_transport_failure_appends_error_reply() {
        let endpoint =
            ScriptedEndpoint::new(|| Err(EndpointError::Transport("refused".to_string())));
        let (store, controller) = controller(endpoint);

        let outcome = controller.send("Hi").await.unwrap();

        assert_eq!(outcome, SendOutcome::Failed);
        assert_eq!(
            transcript(&store),
            vec![
                (Role::User, "Hi".to_string()),
                (Role::Assistant, CONNECTION_ERROR_REPLY.to_string())
            ]
        );
        assert!(!controller.is_pending());

        // Still usable afterwards.
        assert_eq!(controller.send("again").await.unwrap(), SendOutcome::Failed);
        assert_eq!(transcript(&store).len(), 4);
    }

    #[tokio::test]
    async fn test_error_status_appends_error_reply() {
        let endpoint = ScriptedEndpoint::new(|| {
            Err(EndpointError::Status {
                status: 500,
                body: String::new(),
            })
        });
        let (store, controller) = controller(endpoint);

        assert_eq!(controller.send("Hi").await.unwrap(), SendOutcome::Failed);
        assert_eq!(transcript(&store)[1].1, CONNECTION_ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_protocol_error_appends_fallback() {
        let endpoint =
            ScriptedEndpoint::new(|| Err(EndpointError::Protocol("missing".to_string())));
        let (store, controller) = controller(endpoint);

        assert_eq!(controller.send("Hi").await.unwrap(), SendOutcome::Fallback);
        assert_eq!(transcript(&store)[1], (Role::Assistant, FALLBACK_REPLY.to_string()));
    }

    #[tokio::test]
    async fn test_second_send_while_waiting_is_busy() {
        let endpoint = Arc::new(GatedEndpoint {
            gate: Notify::new(),
        });
        let (store, controller) = controller(endpoint.clone());

        let first = controller.send("one");
        tokio::pin!(first);

        // Drive the first send until it is parked on the gate.
        tokio::select! {
            _ = &mut first => panic!("first send finished early"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(controller.is_pending());
        assert!(controller.view.current().pending);

        let err = controller.send("two").await.unwrap_err();
        assert!(matches!(err, ConversationError::Busy));

        endpoint.gate.notify_one();
        assert_eq!(first.await.unwrap(), SendOutcome::Replied);
        assert_eq!(
            transcript(&store),
            vec![
                (Role::User, "one".to_string()),
                (Role::Assistant, "echo: one".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_reply_goes_to_original_session_after_switch() {
        let endpoint = Arc::new(GatedEndpoint {
            gate: Notify::new(),
        });
        let (store, controller) = controller(endpoint.clone());
        let original = store.lock().active_id().clone();

        let send = controller.send("question");
        tokio::pin!(send);
        tokio::select! {
            _ = &mut send => panic!("send finished early"),
            _ = tokio::task::yield_now() => {}
        }

        let other = store.lock().create_session().unwrap();
        endpoint.gate.notify_one();
        assert_eq!(send.await.unwrap(), SendOutcome::Replied);

        let store = store.lock();
        assert_eq!(store.active_id(), &other);
        assert!(store.get(&other).unwrap().messages().is_empty());
        let messages = store.get(&original).unwrap().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "echo: question");
    }

    #[tokio::test]
    async fn test_reply_for_deleted_session_is_dropped() {
        let endpoint = Arc::new(GatedEndpoint {
            gate: Notify::new(),
        });
        let (store, controller) = controller(endpoint.clone());
        let original = store.lock().active_id().clone();

        let send = controller.send("question");
        tokio::pin!(send);
        tokio::select! {
            _ = &mut send => panic!("send finished early"),
            _ = tokio::task::yield_now() => {}
        }

        {
            let mut store = store.lock();
            store.create_session().unwrap();
            store.delete_session(&original).unwrap();
        }
        endpoint.gate.notify_one();

        assert_eq!(send.await.unwrap(), SendOutcome::Orphaned);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(store.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_send_still_records_reply() {
        let endpoint = Arc::new(GatedEndpoint {
            gate: Notify::new(),
        });
        let (store, controller) = controller(endpoint.clone());
        let mut updates = controller.view.subscribe();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), controller.send("Hi")).await;
        assert!(timed_out.is_err());
        assert!(controller.is_pending());

        endpoint.gate.notify_one();
        updates.wait_for(|view| !view.pending).await.unwrap();

        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(
            transcript(&store),
            vec![
                (Role::User, "Hi".to_string()),
                (Role::Assistant, "echo: Hi".to_string())
            ]
        );

        endpoint.gate.notify_one();
        assert_eq!(controller.send("again").await.unwrap(), SendOutcome::Replied);
        assert_eq!(transcript(&store).len(), 4);
    }

    #[tokio::test]
    async fn test_start_returns_before_reply() {
        let endpoint = Arc::new(GatedEndpoint {
            gate: Notify::new(),
        });
        let (store, controller) = controller(endpoint.clone());
        let original = store.lock().active_id().clone();

        assert!(controller.start("  ").unwrap().is_none());

        let mut reply = controller.start("question").unwrap().unwrap();
        assert_eq!(reply.session_id(), &original);
        assert!(controller.is_pending());
        assert!(matches!(
            controller.start("another").unwrap_err(),
            ConversationError::Busy
        ));

        endpoint.gate.notify_one();
        assert_eq!(reply.join().await.unwrap(), SendOutcome::Replied);
        assert!(!controller.view.current().pending);
    }

    #[tokio::test]
    async fn test_storage_failure_on_user_message_returns_to_idle() {
        let store = SessionStore::restore(Arc::new(MemoryStorage::with_capacity(300))).unwrap();
        let view = Arc::new(ViewPublisher::new(&store));
        let store = Arc::new(Mutex::new(store));
        let endpoint = ScriptedEndpoint::new(|| Ok("unused".to_string()));
        let controller = ConversationController::new(store, endpoint.clone(), view);

        let err = controller.send(&"x".repeat(1_000)).await.unwrap_err();

        assert!(matches!(
            err,
            ConversationError::Core(parley_core::Error::Storage(_))
        ));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(endpoint.calls.lock().is_empty());
    }
}
