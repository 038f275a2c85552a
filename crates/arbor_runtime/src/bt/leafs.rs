//! Leaf nodes: where a tree touches tasks and nested trees

use arbor_types::Status;
use tracing::warn;

use crate::bt::tree::BehaviourTree;
use crate::context::ExecContext;
use crate::graph::{Graph, NodeId};
use crate::node::NodeBehaviour;
use crate::task::{ActionRunner, ActionTask, ConditionTask};

// ─────────────────────────────────────────────────────────────────────────────
// ActionNode
// ─────────────────────────────────────────────────────────────────────────────

/// Leaf that drives one action task
///
/// Without an action it succeeds immediately, so placeholder nodes never
/// block a tree.
pub struct ActionNode {
    runner: Option<ActionRunner>,
}

impl ActionNode {
    pub fn new(action: Box<dyn ActionTask>) -> Self {
        Self {
            runner: Some(ActionRunner::new(action)),
        }
    }

    pub fn empty() -> Self {
        Self { runner: None }
    }
}

impl NodeBehaviour for ActionNode {
    fn type_name(&self) -> &'static str {
        "action"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, ctx: &mut ExecContext<'_>) -> Status {
        match self.runner.as_mut() {
            Some(runner) => runner.tick(ctx),
            None => Status::Success,
        }
    }

    fn on_reset(&mut self) {
        if let Some(runner) = self.runner.as_mut() {
            runner.stop();
        }
    }

    fn on_graph_paused(&mut self, paused: bool) {
        if let Some(runner) = self.runner.as_mut() {
            if paused {
                runner.pause();
            } else {
                runner.resume();
            }
        }
    }

    fn on_graph_stopped(&mut self) {
        if let Some(runner) = self.runner.as_mut() {
            runner.stop();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConditionNode
// ─────────────────────────────────────────────────────────────────────────────

/// Leaf that answers a condition: Success when it holds, Failure otherwise
///
/// Without a condition it fails, the mirror of an empty action node.
pub struct ConditionNode {
    condition: Option<Box<dyn ConditionTask>>,
}

impl ConditionNode {
    pub fn new(condition: Box<dyn ConditionTask>) -> Self {
        Self {
            condition: Some(condition),
        }
    }

    pub fn empty() -> Self {
        Self { condition: None }
    }
}

impl NodeBehaviour for ConditionNode {
    fn type_name(&self) -> &'static str {
        "condition"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, ctx: &mut ExecContext<'_>) -> Status {
        match self.condition.as_mut() {
            Some(condition) => {
                if condition.check(ctx) {
                    Status::Success
                } else {
                    Status::Failure
                }
            }
            None => Status::Failure,
        }
    }

    fn on_reset(&mut self) {
        if let Some(condition) = self.condition.as_mut() {
            condition.on_reset();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SubTree
// ─────────────────────────────────────────────────────────────────────────────

/// Leaf that embeds a whole behaviour tree
///
/// The nested tree starts on first execution and is stopped whenever this
/// node resets, so an interrupted subtree never keeps running work alive.
pub struct SubTree {
    tree: BehaviourTree,
}

impl SubTree {
    pub fn new(tree: BehaviourTree) -> Self {
        Self {
            // subtrees conclude for their parent instead of looping
            tree: tree.run_forever(false),
        }
    }

    pub fn tree(&self) -> &BehaviourTree {
        &self.tree
    }
}

impl NodeBehaviour for SubTree {
    fn type_name(&self) -> &'static str {
        "sub-tree"
    }

    fn max_out_connections(&self) -> Option<usize> {
        Some(0)
    }

    fn on_execute(&mut self, _: NodeId, _: &mut Graph, ctx: &mut ExecContext<'_>) -> Status {
        if !self.tree.graph().is_running() {
            if let Err(err) = self.tree.start() {
                warn!(subtree = %self.tree.graph().name(), error = %err, "subtree failed to start");
                return Status::Error;
            }
        }
        let outer_elapsed = ctx.elapsed;
        let status = self.tree.tick(ctx);
        ctx.elapsed = outer_elapsed;
        status
    }

    fn on_reset(&mut self) {
        if self.tree.graph().is_running() {
            let _ = self.tree.stop();
        }
    }

    fn on_graph_paused(&mut self, paused: bool) {
        self.tree.set_paused(paused);
    }

    fn on_graph_stopped(&mut self) {
        if self.tree.graph().is_running() {
            let _ = self.tree.stop();
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
    use crate::context::EventQueue;
    use crate::task::{FnAction, FnCondition};

    fn run_root(graph: &mut Graph, bb: &mut Blackboard) -> Status {
        let mut events = EventQueue::new();
        let prime = graph.prime().unwrap();
        let mut ctx = ExecContext::new(bb, &mut events);
        graph.execute(prime, &mut ctx)
    }

    #[test]
    fn test_empty_leafs() {
        let mut bb = Blackboard::new();

        let mut graph = Graph::new("t");
        graph.add_node(Box::new(ActionNode::empty()));
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);

        let mut graph = Graph::new("t");
        graph.add_node(Box::new(ConditionNode::empty()));
        assert_eq!(run_root(&mut graph, &mut bb), Status::Failure);
    }

    #[test]
    fn test_condition_node_answers() {
        let mut bb = Blackboard::new();
        bb.set("armed", true);

        let mut graph = Graph::new("t");
        graph.add_node(Box::new(ConditionNode::new(Box::new(FnCondition::new(
            |ctx| ctx.blackboard.read::<bool>("armed").unwrap_or(false),
        )))));
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);

        bb.set("armed", false);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Failure);
    }

    #[test]
    fn test_subtree_runs_to_conclusion() {
        let mut inner = Graph::new("inner");
        let mut left = 1;
        inner.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            move |_| {
                if left == 0 {
                    Status::Success
                } else {
                    left -= 1;
                    Status::Running
                }
            },
        )))));

        let mut graph = Graph::new("outer");
        graph.add_node(Box::new(SubTree::new(BehaviourTree::new(inner))));

        let mut bb = Blackboard::new();
        assert_eq!(run_root(&mut graph, &mut bb), Status::Running);
        assert_eq!(run_root(&mut graph, &mut bb), Status::Success);
    }
}
