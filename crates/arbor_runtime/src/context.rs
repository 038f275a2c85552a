//! Execution context threaded through every node and task call

use std::any::Any;
use std::sync::Arc;

use arbor_types::Blackboard;
use wildmatch::WildMatch;

/// Opaque handle to the agent a graph acts on behalf of
///
/// Tasks that need the concrete agent downcast via
/// [`ExecContext::agent_as`].
pub type AgentRef = Arc<dyn Any + Send + Sync>;

/// Named one-shot events raised by tasks or the runner handle
///
/// An event stays queued until a condition consumes it. Patterns support
/// `*` and `?` wildcards, so `"enemy.*"` matches `"enemy.spotted"`.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<String>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a named event
    pub fn send(&mut self, name: impl Into<String>) {
        self.events.push(name.into());
    }

    /// True when any queued event matches the pattern, without consuming it
    pub fn peek(&self, pattern: &str) -> bool {
        let matcher = WildMatch::new(pattern);
        self.events.iter().any(|e| matcher.matches(e))
    }

    /// Consume the first queued event matching the pattern
    pub fn consume(&mut self, pattern: &str) -> bool {
        let matcher = WildMatch::new(pattern);
        match self.events.iter().position(|e| matcher.matches(e)) {
            Some(idx) => {
                self.events.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Everything a node or task can touch while executing
///
/// Built fresh for each step by whoever drives the graph: the runner, an
/// embedding game loop or a test.
pub struct ExecContext<'a> {
    /// Agent this graph acts for, absent when the graph runs detached
    pub agent: Option<&'a AgentRef>,
    pub blackboard: &'a mut Blackboard,
    pub events: &'a mut EventQueue,
    /// Seconds since the previous step
    pub delta: f64,
    /// Seconds since the graph started, maintained by the graph system
    pub elapsed: f64,
}

impl<'a> ExecContext<'a> {
    pub fn new(blackboard: &'a mut Blackboard, events: &'a mut EventQueue) -> Self {
        Self {
            agent: None,
            blackboard,
            events,
            delta: 0.0,
            elapsed: 0.0,
        }
    }

    pub fn with_agent(mut self, agent: &'a AgentRef) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Downcast the agent to its concrete type
    pub fn agent_as<T: 'static>(&self) -> Option<&T> {
        self.agent.and_then(|a| a.downcast_ref::<T>())
    }
}
