//! Tracking for tool runs that outlive a single turn.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::result::ToolResult;
use crate::error::{AgentError, Result};

#[derive(Debug, Clone)]
struct Session {
    command: String,
    outcome: Option<ToolResult>,
}

/// Where a background session stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Still running `command`.
    Running { command: String },
    /// Finished. The session has been removed from the table.
    Finished(ToolResult),
    /// No such session, or its result was already collected.
    Unknown,
}

/// Registry of background tool sessions.
///
/// A tool that returns [`ToolResult::Pending`] registers here; whoever owns the
/// background work later calls [`complete`](Self::complete) with the terminal
/// result. The first read of a finished session hands its result over and
/// evicts it. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct PendingSessions {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl PendingSessions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `command` and return its session id.
    pub fn register(&self, command: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.lock().insert(
            id.clone(),
            Session {
                command: command.into(),
                outcome: None,
            },
        );
        id
    }

    /// Record the terminal result of a session.
    ///
    /// Rejects unknown ids and `Pending` results.
    pub fn complete(&self, session_id: &str, result: ToolResult) -> Result<()> {
        if result.is_pending() {
            return Err(AgentError::internal(format!(
                "session {} cannot complete with a pending result",
                session_id
            )));
        }

        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AgentError::internal(format!("unknown session {}", session_id)))?;
        session.outcome = Some(result);
        Ok(())
    }

    /// Check a session, collecting and evicting it if it has finished.
    pub fn poll(&self, session_id: &str) -> SessionStatus {
        let mut sessions = self.sessions.lock();
        match sessions.get(session_id) {
            None => SessionStatus::Unknown,
            Some(Session {
                command,
                outcome: None,
            }) => SessionStatus::Running {
                command: command.clone(),
            },
            Some(Session {
                outcome: Some(_), ..
            }) => match sessions.remove(session_id).and_then(|s| s.outcome) {
                Some(result) => SessionStatus::Finished(result),
                None => SessionStatus::Unknown,
            },
        }
    }

    /// Whether the session exists and has not completed.
    pub fn is_pending(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .get(session_id)
            .is_some_and(|s| s.outcome.is_none())
    }

    /// Ids of sessions still running.
    pub fn pending_ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, s)| s.outcome.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of sessions held, finished or not.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
