//! State node behaviours: action states, any-state links, concurrent states

use arbor_types::Status;

use crate::context::ExecContext;
use crate::graph::{Graph, NodeId};
use crate::node::NodeBehaviour;
use crate::task::ActionList;

/// Type name the machine uses to recognise any-state links
pub const ANY_STATE: &str = "any-state";
/// Type name the machine uses to recognise concurrent states
pub const CONCURRENT_STATE: &str = "concurrent-state";

// ─────────────────────────────────────────────────────────────────────────────
// ActionState
// ─────────────────────────────────────────────────────────────────────────────

/// A state that runs an action list while it is current
///
/// Entering the state starts the list from the top; each machine update
/// advances it. The state reports Running until the list concludes, and the
/// conclusion is what unguarded transitions wait for. Leaving the state
/// resets the list, interrupting whatever was still running.
pub struct ActionState {
    actions: ActionList,
}

impl ActionState {
    pub fn new(actions: ActionList) -> Self {
        Self { actions }
    }

    /// A state with nothing to do; finishes on its first update
    pub fn empty() -> Self {
        Self {
            actions: ActionList::parallel(),
        }
    }
}

impl NodeBehaviour for ActionState {
    fn type_name(&self) -> &'static str {
        "action-state"
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, ctx: &mut ExecContext<'_>) -> Status {
        self.actions.tick(ctx)
    }

    fn on_reset(&mut self) {
        self.actions.reset();
    }

    fn on_graph_paused(&mut self, paused: bool) {
        if paused {
            self.actions.pause();
        } else {
            self.actions.resume();
        }
    }

    fn on_graph_stopped(&mut self) {
        self.actions.reset();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AnyState
// ─────────────────────────────────────────────────────────────────────────────

/// Link whose guarded transitions are checked on every update, whatever
/// state is current
///
/// It is never entered and never executes; it only contributes outbound
/// guarded connections. Unguarded connections out of it never fire.
#[derive(Default)]
pub struct AnyState;

impl AnyState {
    pub fn new() -> Self {
        Self
    }
}

impl NodeBehaviour for AnyState {
    fn type_name(&self) -> &'static str {
        ANY_STATE
    }

    fn max_in_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn allow_as_prime(&self) -> bool {
        false
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, _: &mut ExecContext<'_>) -> Status {
        Status::Resting
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConcurrentState
// ─────────────────────────────────────────────────────────────────────────────

/// A state that runs alongside whichever state is current
///
/// Starts with the machine, ignores transitions entirely and keeps running
/// until the machine stops or its list concludes.
pub struct ConcurrentState {
    actions: ActionList,
}

impl ConcurrentState {
    pub fn new(actions: ActionList) -> Self {
        Self { actions }
    }
}

impl NodeBehaviour for ConcurrentState {
    fn type_name(&self) -> &'static str {
        CONCURRENT_STATE
    }

    fn max_in_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn allow_as_prime(&self) -> bool {
        false
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, ctx: &mut ExecContext<'_>) -> Status {
        self.actions.tick(ctx)
    }

    fn on_reset(&mut self) {
        self.actions.reset();
    }

    fn on_graph_paused(&mut self, paused: bool) {
        if paused {
            self.actions.pause();
        } else {
            self.actions.resume();
        }
    }

    fn on_graph_stopped(&mut self) {
        self.actions.reset();
    }
}
