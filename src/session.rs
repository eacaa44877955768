//! In-memory conversation history, bounded per session.
//!
//! Sessions exist to give the model short-term memory across a handful of
//! turns, not to persist transcripts: state lives in a process-local map and
//! is gone on restart. Each session keeps at most `max_history` exchanges;
//! older ones fall off the front.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::ConversationExchange;

pub struct SessionStore {
    max_history: usize,
    sessions: Mutex<HashMap<String, VecDeque<ConversationExchange>>>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a fresh session id with no history.
    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.lock().insert(id.clone(), VecDeque::new());
        id
    }

    /// Record one completed exchange, creating the session if the id is
    /// unknown. The oldest exchanges are dropped once the bound is hit.
    pub fn add_exchange(&self, session_id: &str, user: String, assistant: String) {
        let mut sessions = self.sessions.lock();
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push_back(ConversationExchange { user, assistant });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Rendered history for a session, oldest exchange first. `None` for an
    /// unknown id, `Some("")` for a known session with no exchanges yet.
    pub fn history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.lock();
        let history = sessions.get(session_id)?;
        let lines: Vec<String> = history
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
            .collect();
        Some(lines.join("\n"))
    }
}
