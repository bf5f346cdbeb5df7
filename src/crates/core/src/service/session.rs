//! Backend session continuity
//!
//! Maps the client's token to the backend conversation id so follow-up turns reuse
//! backend-side memory. The only mutable state shared between requests.
//!
//! Entries live for the whole process unless the store reaches its capacity, at
//! which point the least recently used token is forgotten. A forgotten token simply
//! starts a new backend conversation on its next turn.

use dashmap::DashMap;
use log::debug;
use std::time::Instant;

pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct SessionEntry {
    session_id: String,
    last_used: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, token: &str) -> Option<String> {
        self.sessions.get_mut(token).map(|mut entry| {
            entry.last_used = Instant::now();
            entry.session_id.clone()
        })
    }

    /// An explicit session id from the request wins over the remembered one.
    pub fn resolve(&self, token: &str, explicit: Option<&str>) -> Option<String> {
        explicit
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.get(token))
    }

    pub fn remember(&self, token: &str, session_id: &str) {
        if !self.sessions.contains_key(token) && self.sessions.len() >= self.capacity {
            self.evict_least_recent();
        }

        let previous = self.sessions.insert(
            token.to_string(),
            SessionEntry {
                session_id: session_id.to_string(),
                last_used: Instant::now(),
            },
        );
        if previous.map(|entry| entry.session_id).as_deref() != Some(session_id) {
            debug!("Backend session recorded: session_id={}", session_id);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| entry.key().clone());
        if let Some(token) = oldest {
            self.sessions.remove(&token);
            debug!("Session store full ({}), forgot least recent token", self.capacity);
        }
    }
}
