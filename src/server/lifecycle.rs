use crate::server::{Action, DispatchId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Default number of events kept before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Outcome of one lifecycle action against one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Executable exited with status zero
    Succeeded,
    /// Executable could not run or exited non-zero
    Failed,
    /// Executable exceeded the configured timeout
    TimedOut,
}

/// Server lifecycle event
#[derive(Debug, Clone)]
pub struct ServerEvent {
    /// Dispatch that produced this event
    pub dispatch_id: DispatchId,
    /// Server name
    pub name: String,
    /// Action that was run
    pub action: Action,
    /// Event outcome
    pub outcome: EventOutcome,
    /// Event timestamp
    pub timestamp: Instant,
    /// Event details
    pub details: Option<String>,
}

/// Bounded history of lifecycle actions run through a supervisor
#[derive(Debug, Clone)]
pub struct ServerLifecycleManager {
    /// Server events, oldest first
    events: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// Maximum number of events kept
    limit: usize,
}

impl ServerLifecycleManager {
    /// Create a new server lifecycle manager
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create a manager keeping at most `limit` events
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            limit,
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated
    fn lock(&self) -> MutexGuard<'_, VecDeque<ServerEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a server event
    pub fn record_event(
        &self,
        dispatch_id: DispatchId,
        name: String,
        action: Action,
        outcome: EventOutcome,
        details: Option<String>,
    ) {
        let event = ServerEvent {
            dispatch_id,
            name,
            action,
            outcome,
            timestamp: Instant::now(),
            details,
        };

        let mut events = self.lock();
        events.push_back(event);

        // Limit event history
        while events.len() > self.limit {
            events.pop_front();
        }
    }

    /// Get recent events for a server, newest first
    pub fn get_server_events(&self, name: &str, limit: Option<usize>) -> Vec<ServerEvent> {
        self.lock()
            .iter()
            .rev()
            .filter(|e| e.name == name)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Get all events, newest first
    pub fn get_all_events(&self, limit: Option<usize>) -> Vec<ServerEvent> {
        self.lock()
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Outcome of the most recent action run against a server
    pub fn last_outcome(&self, name: &str) -> Option<EventOutcome> {
        self.lock()
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| e.outcome)
    }

    /// Number of events held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no event is held
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clear events
    pub fn clear_events(&self) {
        self.lock().clear();
    }
}

impl Default for ServerLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
