//! The state machine wrapper: transition scanning and state switching

use arbor_types::Status;
use tracing::{debug, info};

use crate::context::ExecContext;
use crate::error::GraphError;
use crate::fsm::states::{ANY_STATE, CONCURRENT_STATE};
use crate::graph::{Graph, NodeId};

/// A graph driven as a finite state machine
///
/// One state is current at a time; states are nodes and transitions are
/// their guarded connections. Each update scans transitions before
/// advancing the current state: a guarded transition fires whenever its
/// condition holds, an unguarded one only once the state has finished.
/// Any-state links contribute guarded transitions that are scanned first,
/// whatever state is current.
pub struct StateMachine {
    graph: Graph,
    current: Option<NodeId>,
    last: Option<NodeId>,
    any_states: Vec<NodeId>,
    concurrent: Vec<NodeId>,
    done: bool,
}

impl StateMachine {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            current: None,
            last: None,
            any_states: Vec::new(),
            concurrent: Vec::new(),
            done: false,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn current_state(&self) -> Option<NodeId> {
        self.current
    }

    pub fn last_state(&self) -> Option<NodeId> {
        self.last
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.current.and_then(|id| self.graph.node_name(id))
    }

    pub fn last_state_name(&self) -> Option<&str> {
        self.last.and_then(|id| self.graph.node_name(id))
    }

    /// Status of the current state, `Resting` when none is current
    pub fn status(&self) -> Status {
        self.current
            .and_then(|id| self.graph.status(id))
            .unwrap_or_default()
    }

    /// True once the machine concluded by finishing a terminal state
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Start the machine and enter the prime state
    pub fn start(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), GraphError> {
        self.graph.start()?;
        self.done = false;
        self.current = None;
        self.last = None;
        self.any_states = self.special_nodes(ANY_STATE);
        self.concurrent = self.special_nodes(CONCURRENT_STATE);

        let prime = self.graph.prime().ok_or(GraphError::NoPrimeNode)?;
        self.enter(prime, ctx);
        for id in self.concurrent.clone() {
            self.graph.execute(id, ctx);
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), GraphError> {
        self.graph.stop()?;
        self.current = None;
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.graph.set_paused(paused);
    }

    fn special_nodes(&self, type_name: &str) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .into_iter()
            .filter(|id| self.graph.node_type_name(*id) == Some(type_name))
            .collect()
    }

    /// Switch to a state: reset the one being left, then execute the target
    fn enter(&mut self, target: NodeId, ctx: &mut ExecContext<'_>) {
        if let Some(current) = self.current {
            self.graph.reset_node(current, false);
        }
        debug!(
            graph = %self.graph.name(),
            from = %self.current.map(|id| self.graph.display_name(id)).unwrap_or_default(),
            to = %self.graph.display_name(target),
            "state transition"
        );
        self.last = self.current;
        self.current = Some(target);
        self.graph.execute(target, ctx);
    }

    /// Jump to a named state regardless of transitions
    pub fn trigger_state(
        &mut self,
        name: &str,
        ctx: &mut ExecContext<'_>,
    ) -> Result<(), GraphError> {
        let id = self
            .graph
            .node_with_name(name)
            .ok_or_else(|| GraphError::UnknownState(name.to_string()))?;
        let kind = self.graph.node_type_name(id);
        if kind == Some(ANY_STATE) || kind == Some(CONCURRENT_STATE) {
            return Err(GraphError::UnknownState(name.to_string()));
        }
        self.enter(id, ctx);
        Ok(())
    }

    /// Advance the machine by one frame
    pub fn update(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        if !self.graph.is_running() || self.graph.is_paused() {
            return self.status();
        }
        self.graph.advance(ctx.delta);
        ctx.elapsed = self.graph.elapsed();

        let entered = self.scan_any_states(ctx) || self.scan_current_transitions(ctx);

        for id in self.concurrent.clone() {
            if !self.graph.status(id).unwrap_or_default().is_finished() {
                self.graph.execute(id, ctx);
            }
        }

        if !entered {
            if let Some(current) = self.current {
                let status = self.graph.status(current).unwrap_or_default();
                if status.is_running() {
                    self.graph.execute(current, ctx);
                } else if status.is_finished() && self.graph.out_connections(current).is_empty() {
                    // terminal state concluded
                    info!(
                        graph = %self.graph.name(),
                        state = %self.graph.display_name(current),
                        status = %status,
                        "state machine concluded"
                    );
                    self.done = true;
                    let _ = self.graph.stop();
                }
            }
        }
        self.status()
    }

    fn scan_any_states(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        for any in self.any_states.clone() {
            for cid in self.graph.out_connections(any) {
                // unguarded links out of an any-state never fire
                if !self.graph.connection_has_condition(cid) {
                    continue;
                }
                if self.graph.check_connection_condition(cid, ctx) != Some(true) {
                    continue;
                }
                let Some(target) = self.graph.connection_target(cid) else {
                    continue;
                };
                // re-entering the current state every frame would starve it
                if Some(target) == self.current {
                    continue;
                }
                self.graph.set_connection_status(cid, Status::Success);
                self.enter(target, ctx);
                return true;
            }
        }
        false
    }

    fn scan_current_transitions(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let status = self.graph.status(current).unwrap_or_default();
        for cid in self.graph.out_connections(current) {
            let fire = if self.graph.connection_has_condition(cid) {
                self.graph.check_connection_condition(cid, ctx) == Some(true)
            } else {
                // unguarded transitions wait for the state to finish
                !status.is_running()
            };
            if fire {
                if let Some(target) = self.graph.connection_target(cid) {
                    self.graph.set_connection_status(cid, Status::Success);
                    self.enter(target, ctx);
                    return true;
                }
            }
        }
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Blackboard;
    use crate::context::EventQueue;
    use crate::fsm::states::{ActionState, AnyState, ConcurrentState};
    use crate::task::{ActionList, ActionTask, FnAction, FnCondition};

    fn long_running() -> ActionList {
        ActionList::parallel().with(Box::new(FnAction::new(|_| Status::Running)))
    }

    fn finishing_after(frames: usize) -> ActionList {
        let mut left = frames;
        ActionList::parallel().with(Box::new(FnAction::new(move |_| {
            if left == 0 {
                Status::Success
            } else {
                left -= 1;
                Status::Running
            }
        })))
    }

    struct TwoStateMachine {
        machine: StateMachine,
        bb: Blackboard,
        events: EventQueue,
    }

    /// patrol --"alert" guard--> attack
    fn guarded_machine() -> TwoStateMachine {
        let mut graph = Graph::new("fsm");
        let patrol = graph.add_node(Box::new(ActionState::new(long_running())));
        let attack = graph.add_node(Box::new(ActionState::new(long_running())));
        graph.set_node_name(patrol, "patrol").unwrap();
        graph.set_node_name(attack, "attack").unwrap();
        let cid = graph.connect(patrol, attack).unwrap();
        graph
            .set_connection_condition(
                cid,
                Some(Box::new(FnCondition::new(|ctx| {
                    ctx.blackboard.read::<bool>("alert").unwrap_or(false)
                }))),
            )
            .unwrap();

        TwoStateMachine {
            machine: StateMachine::new(graph),
            bb: Blackboard::new(),
            events: EventQueue::new(),
        }
    }

    #[test]
    fn test_enters_prime_on_start() {
        let mut fixture = guarded_machine();
        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.start(&mut ctx).unwrap();

        assert_eq!(fixture.machine.current_state_name(), Some("patrol"));
        assert_eq!(fixture.machine.status(), Status::Running);
    }

    #[test]
    fn test_guarded_transition_fires_while_running() {
        let mut fixture = guarded_machine();
        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.start(&mut ctx).unwrap();

        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.update(&mut ctx);
        assert_eq!(fixture.machine.current_state_name(), Some("patrol"));

        fixture.bb.set("alert", true);
        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.update(&mut ctx);
        assert_eq!(fixture.machine.current_state_name(), Some("attack"));
        assert_eq!(fixture.machine.last_state_name(), Some("patrol"));
    }

    #[test]
    fn test_unguarded_transition_waits_for_finish() {
        let mut graph = Graph::new("fsm");
        let first = graph.add_node(Box::new(ActionState::new(finishing_after(2))));
        let second = graph.add_node(Box::new(ActionState::new(long_running())));
        graph.set_node_name(first, "first").unwrap();
        graph.set_node_name(second, "second").unwrap();
        graph.connect(first, second).unwrap();

        let mut machine = StateMachine::new(graph);
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();

        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.start(&mut ctx).unwrap();

        for _ in 0..2 {
            let mut ctx = ExecContext::new(&mut bb, &mut events);
            machine.update(&mut ctx);
            assert_eq!(machine.current_state_name(), Some("first"));
        }
        // state finished on the previous update; the next scan follows the link
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);
        assert_eq!(machine.current_state_name(), Some("second"));
    }

    #[test]
    fn test_leaving_a_state_stops_its_actions() {
        struct Flagged {
            stopped: std::sync::Arc<std::sync::atomic::AtomicBool>,
        }

        impl ActionTask for Flagged {
            fn on_execute(&mut self, _: &mut ExecContext<'_>) -> Status {
                Status::Running
            }

            fn on_update(&mut self, _: &mut ExecContext<'_>) -> Status {
                Status::Running
            }

            fn on_stop(&mut self) {
                self.stopped.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let stopped = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut graph = Graph::new("fsm");
        let first = graph.add_node(Box::new(ActionState::new(
            ActionList::parallel().with(Box::new(Flagged {
                stopped: stopped.clone(),
            })),
        )));
        let second = graph.add_node(Box::new(ActionState::new(long_running())));
        graph.set_node_name(first, "first").unwrap();
        graph.set_node_name(second, "second").unwrap();
        let cid = graph.connect(first, second).unwrap();
        graph
            .set_connection_condition(cid, Some(Box::new(FnCondition::new(|_| true))))
            .unwrap();

        let mut machine = StateMachine::new(graph);
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.start(&mut ctx).unwrap();

        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);
        assert_eq!(machine.current_state_name(), Some("second"));
        assert!(stopped.load(std::sync::atomic::Ordering::Relaxed));
    }

    #[test]
    fn test_any_state_link() {
        let mut graph = Graph::new("fsm");
        let idle = graph.add_node(Box::new(ActionState::new(long_running())));
        let flee = graph.add_node(Box::new(ActionState::new(long_running())));
        let any = graph.add_node(Box::new(AnyState::new()));
        graph.set_node_name(idle, "idle").unwrap();
        graph.set_node_name(flee, "flee").unwrap();
        let cid = graph.connect(any, flee).unwrap();
        graph
            .set_connection_condition(
                cid,
                Some(Box::new(FnCondition::new(|ctx| ctx.events.consume("panic")))),
            )
            .unwrap();

        let mut machine = StateMachine::new(graph);
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.start(&mut ctx).unwrap();

        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);
        assert_eq!(machine.current_state_name(), Some("idle"));

        events.send("panic");
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);
        assert_eq!(machine.current_state_name(), Some("flee"));
    }

    #[test]
    fn test_concurrent_state_runs_alongside() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter2 = counter.clone();

        let mut graph = Graph::new("fsm");
        let idle = graph.add_node(Box::new(ActionState::new(long_running())));
        let watcher = graph.add_node(Box::new(ConcurrentState::new(
            ActionList::parallel().with(Box::new(FnAction::new(move |_| {
                counter2.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Status::Running
            }))),
        )));
        graph.set_node_name(idle, "idle").unwrap();
        graph.set_node_name(watcher, "watcher").unwrap();

        let mut machine = StateMachine::new(graph);
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.start(&mut ctx).unwrap();

        for _ in 0..3 {
            let mut ctx = ExecContext::new(&mut bb, &mut events);
            machine.update(&mut ctx);
        }
        // once at start plus once per update
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 4);
    }

    #[test]
    fn test_terminal_state_concludes_machine() {
        let mut graph = Graph::new("fsm");
        let only = graph.add_node(Box::new(ActionState::new(finishing_after(1))));
        graph.set_node_name(only, "only").unwrap();

        let mut machine = StateMachine::new(graph);
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.start(&mut ctx).unwrap();

        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        machine.update(&mut ctx);

        assert!(machine.is_done());
        assert!(!machine.graph().is_running());
    }

    #[test]
    fn test_trigger_state() {
        let mut fixture = guarded_machine();
        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.start(&mut ctx).unwrap();

        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        fixture.machine.trigger_state("attack", &mut ctx).unwrap();
        assert_eq!(fixture.machine.current_state_name(), Some("attack"));

        let mut ctx = ExecContext::new(&mut fixture.bb, &mut fixture.events);
        let err = fixture.machine.trigger_state("retreat", &mut ctx);
        assert!(matches!(err, Err(GraphError::UnknownState(_))));
    }
}
