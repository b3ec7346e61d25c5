//! Per-session transport instances for the streamable HTTP binding

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::TransportError;
use crate::protocol::{McpMessage, RequestHandler};
use crate::tools::Dispatcher;

/// Request/response header carrying the session identifier
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

type Sessions = Mutex<HashMap<String, Arc<SessionTransport>>>;

/// The protocol connection owned by one session
pub struct SessionTransport {
    session_id: String,
    created_at: DateTime<Utc>,
    handler: tokio::sync::Mutex<RequestHandler>,
    closed: watch::Sender<bool>,
    table: Weak<Sessions>,
}

impl SessionTransport {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Handle one message. Messages of a session are processed in order.
    pub async fn handle(&self, message: McpMessage) -> Result<Option<McpMessage>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed(self.session_id.clone()));
        }
        Ok(self.handler.lock().await.handle(message).await)
    }

    /// Resolves once the session is closed
    pub async fn wait_closed(&self) {
        let mut receiver = self.closed.subscribe();
        // The sender lives as long as `self`, so this only fails if the flag never flips.
        let _ = receiver.wait_for(|closed| *closed).await;
    }

    /// Close the session and evict it from its table.
    ///
    /// Closing twice reports [`TransportError::Closed`].
    pub fn close(&self) -> Result<(), TransportError> {
        if self.closed.send_replace(true) {
            return Err(TransportError::Closed(self.session_id.clone()));
        }

        if let Some(table) = self.table.upgrade() {
            let mut sessions = lock(&table);
            let owned = sessions
                .get(&self.session_id)
                .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), self));
            if owned {
                sessions.remove(&self.session_id);
                debug!(session_id = %self.session_id, "Session closed and removed from active sessions");
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("session_id", &self.session_id)
            .field("created_at", &self.created_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn lock(sessions: &Sessions) -> MutexGuard<'_, HashMap<String, Arc<SessionTransport>>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live sessions keyed by identifier
#[derive(Clone)]
pub struct SessionTable {
    sessions: Arc<Sessions>,
    dispatcher: Arc<Dispatcher>,
}

impl SessionTable {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            dispatcher,
        }
    }

    /// Fresh unguessable session identifier
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Session for `session_id`, created on first use.
    ///
    /// Returns whether the session was created by this call.
    pub fn get_or_create(&self, session_id: &str) -> (Arc<SessionTransport>, bool) {
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(session_id) {
            return (existing.clone(), false);
        }

        let (closed, _) = watch::channel(false);
        let session = Arc::new(SessionTransport {
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            handler: tokio::sync::Mutex::new(RequestHandler::new(self.dispatcher.clone())),
            closed,
            table: Arc::downgrade(&self.sessions),
        });
        sessions.insert(session_id.to_string(), session.clone());
        info!(session_id = %session_id, "New MCP session initialized");

        (session, true)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionTransport>> {
        lock(&self.sessions).get(session_id).cloned()
    }

    /// Close and evict a session. Removing an absent session is a no-op.
    ///
    /// Returns whether a live session was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = lock(&self.sessions).remove(session_id);

        match removed {
            Some(session) => {
                if let Err(e) = session.close() {
                    debug!(session_id = %session_id, "Session already closed: {}", e);
                }
                info!(session_id = %session_id, "Session removed and transport closed");
                true
            }
            None => false,
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every session.
    ///
    /// Individual close failures are logged and collected; the sweep always
    /// visits every session and leaves the table empty.
    pub fn shutdown(&self) -> Vec<TransportError> {
        let drained: Vec<Arc<SessionTransport>> = lock(&self.sessions).drain().map(|(_, s)| s).collect();
        info!("Shutting down {} active sessions...", drained.len());

        let mut failures = Vec::new();
        for session in drained {
            if let Err(e) = session.close() {
                error!(session_id = %session.session_id(), "Error closing transport: {}", e);
                failures.push(e);
            }
        }

        failures
    }
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTable")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    fn table() -> SessionTable {
        SessionTable::new(Arc::new(Dispatcher::new(ToolRegistry::new())))
    }

    #[test]
    fn test_get_or_create_reuses_instance() {
        let table = table();
        let id = SessionTable::generate_id();

        let (first, created) = table.get_or_create(&id);
        assert!(created);
        let (second, created) = table.get_or_create(&id);
        assert!(!created);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(SessionTable::generate_id(), SessionTable::generate_id());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let table = table();
        let (session, _) = table.get_or_create("abc");

        assert!(table.remove("abc"));
        assert!(session.is_closed());
        assert!(table.is_empty());

        assert!(!table.remove("abc"));
        assert!(!table.remove("never-existed"));
    }

    #[test]
    fn test_self_close_evicts_entry() {
        let table = table();
        let (session, _) = table.get_or_create("abc");

        session.close().unwrap();
        assert!(table.get("abc").is_none());
        assert!(matches!(session.close(), Err(TransportError::Closed(_))));
    }

    #[test]
    fn test_stale_close_keeps_replacement() {
        let table = table();
        let (old, _) = table.get_or_create("abc");
        table.remove("abc");
        let (fresh, created) = table.get_or_create("abc");
        assert!(created);

        assert!(old.close().is_err());
        assert!(table.get("abc").is_some_and(|s| Arc::ptr_eq(&s, &fresh)));
    }

    #[test]
    fn test_shutdown_collects_failures_and_empties_table() {
        let table = table();
        let (already_closed, _) = table.get_or_create("a");
        table.get_or_create("b");
        table.get_or_create("c");

        // Flip the flag without evicting so the sweep meets a failing close.
        already_closed.closed.send_replace(true);

        let failures = table.shutdown();
        assert_eq!(failures.len(), 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_wait_closed_resolves_on_close() {
        let table = table();
        let (session, _) = table.get_or_create("abc");

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait_closed().await })
        };

        table.remove("abc");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_session_rejects_messages() {
        let table = table();
        let (session, _) = table.get_or_create("abc");
        session.close().unwrap();

        let result = session.handle(McpMessage::request(1, "ping", None)).await;
        assert!(matches!(result, Err(TransportError::Closed(_))));
    }
}
