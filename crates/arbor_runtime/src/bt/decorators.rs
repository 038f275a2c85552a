//! Decorator nodes: single-child wrappers that reshape a subtree's outcome

use arbor_types::{BbParam, Status};
use serde::{Deserialize, Serialize};

use crate::context::ExecContext;
use crate::graph::{ConnectionId, Graph, NodeId};
use crate::node::NodeBehaviour;
use crate::task::ConditionTask;

fn only_child(graph: &Graph, node: NodeId) -> Option<ConnectionId> {
    graph.out_connections(node).first().copied()
}

// ─────────────────────────────────────────────────────────────────────────────
// Inverter
// ─────────────────────────────────────────────────────────────────────────────

/// Swaps the child's Success and Failure, passing everything else through
#[derive(Default)]
pub struct Inverter;

impl Inverter {
    pub fn new() -> Self {
        Self
    }
}

impl NodeBehaviour for Inverter {
    fn type_name(&self) -> &'static str {
        "inverter"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(1)
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        match only_child(graph, node) {
            Some(cid) => graph.execute_connection(cid, ctx).inverted(),
            None => Status::Failure,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repeater
// ─────────────────────────────────────────────────────────────────────────────

/// When a [`Repeater`] stops re-running its child
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    /// A fixed number of completed runs
    Times,
    UntilSuccess,
    UntilFailure,
    Forever,
}

/// Re-runs its child, reporting Running between iterations
pub struct Repeater {
    mode: RepeatMode,
    times: BbParam<i64>,
    completed: i64,
}

impl Repeater {
    pub fn new(mode: RepeatMode) -> Self {
        Self {
            mode,
            times: BbParam::value(1),
            completed: 0,
        }
    }

    pub fn times(count: BbParam<i64>) -> Self {
        Self {
            mode: RepeatMode::Times,
            times: count,
            completed: 0,
        }
    }
}

impl NodeBehaviour for Repeater {
    fn type_name(&self) -> &'static str {
        "repeater"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(1)
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let Some(cid) = only_child(graph, node) else {
            return Status::Failure;
        };
        let status = graph.execute_connection(cid, ctx);
        if !status.is_finished() {
            return status;
        }

        let concluded = match self.mode {
            RepeatMode::Times => {
                self.completed += 1;
                self.completed >= self.times.read(ctx.blackboard).unwrap_or(1)
            }
            RepeatMode::UntilSuccess => status == Status::Success,
            RepeatMode::UntilFailure => status == Status::Failure,
            RepeatMode::Forever => false,
        };
        if concluded {
            return status;
        }
        graph.reset_connection(cid, true);
        Status::Running
    }

    fn on_reset(&mut self) {
        self.completed = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accessor
// ─────────────────────────────────────────────────────────────────────────────

/// Gate: the child only executes while the condition holds
///
/// A closing gate interrupts a running child. Without a condition the gate
/// is permanently closed, matching a condition node without a task.
pub struct Accessor {
    condition: Option<Box<dyn ConditionTask>>,
}

impl Accessor {
    pub fn new(condition: Box<dyn ConditionTask>) -> Self {
        Self {
            condition: Some(condition),
        }
    }

    pub fn empty() -> Self {
        Self { condition: None }
    }
}

impl NodeBehaviour for Accessor {
    fn type_name(&self) -> &'static str {
        "accessor"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(1)
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let Some(cid) = only_child(graph, node) else {
            return Status::Failure;
        };
        let open = match self.condition.as_mut() {
            Some(condition) => condition.check(ctx),
            None => false,
        };
        if open {
            return graph.execute_connection(cid, ctx);
        }
        let child_running = graph
            .connection_target(cid)
            .and_then(|t| graph.status(t))
            .unwrap_or_default()
            .is_running();
        if child_running {
            graph.reset_connection(cid, true);
        }
        Status::Failure
    }

    fn on_reset(&mut self) {
        if let Some(condition) = self.condition.as_mut() {
            condition.on_reset();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interruptor
// ─────────────────────────────────────────────────────────────────────────────

/// Inverse gate: a holding condition interrupts the child and fails
pub struct Interruptor {
    condition: Option<Box<dyn ConditionTask>>,
}

impl Interruptor {
    pub fn new(condition: Box<dyn ConditionTask>) -> Self {
        Self {
            condition: Some(condition),
        }
    }
}

impl NodeBehaviour for Interruptor {
    fn type_name(&self) -> &'static str {
        "interruptor"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(1)
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let Some(cid) = only_child(graph, node) else {
            return Status::Failure;
        };
        let interrupt = match self.condition.as_mut() {
            Some(condition) => condition.check(ctx),
            None => false,
        };
        if interrupt {
            graph.reset_connection(cid, true);
            return Status::Failure;
        }
        graph.execute_connection(cid, ctx)
    }

    fn on_reset(&mut self) {
        if let Some(condition) = self.condition.as_mut() {
            condition.on_reset();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Blackboard;
    use crate::bt::leafs::ActionNode;
    use crate::context::EventQueue;
    use crate::task::{FnAction, FnCondition};

    fn leaf(status: Status) -> Box<ActionNode> {
        Box::new(ActionNode::new(Box::new(FnAction::new(move |_| status))))
    }

    fn run_root(graph: &mut Graph, bb: &mut Blackboard) -> Status {
        let mut events = EventQueue::new();
        let prime = graph.prime().unwrap();
        let mut ctx = ExecContext::new(bb, &mut events);
        graph.execute(prime, &mut ctx)
    }

    #[test]
    fn test_inverter() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Inverter::new()));
        let child = graph.add_node(leaf(Status::Failure));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);
    }

    #[test]
    fn test_inverter_single_child_limit() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Inverter::new()));
        let a = graph.add_node(leaf(Status::Success));
        let b = graph.add_node(leaf(Status::Success));
        graph.connect(root, a).unwrap();
        assert!(graph.connect(root, b).is_err());
    }

    #[test]
    fn test_repeater_times() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Repeater::times(BbParam::value(3))));
        let runs = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let runs2 = runs.clone();
        let child = graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            move |_| {
                runs2.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Status::Success
            },
        )))));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 3);
    }

    #[test]
    fn test_repeater_until_success() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Repeater::new(RepeatMode::UntilSuccess)));
        let mut failures_left = 2;
        let child = graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            move |_| {
                if failures_left == 0 {
                    Status::Success
                } else {
                    failures_left -= 1;
                    Status::Failure
                }
            },
        )))));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);
    }

    #[test]
    fn test_accessor_gate() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Accessor::new(Box::new(FnCondition::new(
            |ctx| ctx.blackboard.read::<bool>("open").unwrap_or(false),
        )))));
        let child = graph.add_node(leaf(Status::Success));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        bb.set("open", false);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Failure);
        assert_eq!(graph.status(child), Some(Status::Resting));

        bb.set("open", true);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);
    }

    #[test]
    fn test_accessor_interrupts_running_child() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Accessor::new(Box::new(FnCondition::new(
            |ctx| ctx.blackboard.read::<bool>("open").unwrap_or(false),
        )))));
        let child = graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            |_| Status::Running,
        )))));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        bb.set("open", true);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(graph.status(child), Some(Status::Running));

        bb.set("open", false);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Failure);
        assert_eq!(graph.status(child), Some(Status::Resting));
    }

    #[test]
    fn test_interruptor() {
        let mut graph = Graph::new("t");
        let root = graph.add_node(Box::new(Interruptor::new(Box::new(FnCondition::new(
            |ctx| ctx.events.consume("abort"),
        )))));
        let child = graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            |_| Status::Running,
        )))));
        graph.connect(root, child).unwrap();

        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let prime = graph.prime().unwrap();

        let mut ctx = ExecContext::new(&mut bb, &mut events);
        assert_eq!(graph.execute(prime, &mut ctx), Status::Running);

        events.send("abort");
        let mut ctx = ExecContext::new(&mut bb, &mut events);
        assert_eq!(graph.execute(prime, &mut ctx), Status::Failure);
        assert_eq!(graph.status(child), Some(Status::Resting));
    }
}
