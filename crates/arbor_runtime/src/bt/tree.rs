//! The behaviour tree wrapper: repeated ticking of the prime node

use arbor_types::Status;
use tracing::{debug, info};

use crate::context::ExecContext;
use crate::error::GraphError;
use crate::graph::Graph;

/// A graph ticked as a behaviour tree
///
/// Each tick executes the prime node. A root that finished on the previous
/// tick is reset first, so by default the tree restarts every time it
/// concludes; `run_forever(false)` makes the first conclusion final.
pub struct BehaviourTree {
    graph: Graph,
    run_forever: bool,
    /// Minimum seconds between root executions; 0 ticks every step
    update_interval: f64,
    since_last: f64,
    last_root: Status,
    done: bool,
}

impl BehaviourTree {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            run_forever: true,
            update_interval: 0.0,
            since_last: 0.0,
            last_root: Status::Resting,
            done: false,
        }
    }

    pub fn run_forever(mut self, run_forever: bool) -> Self {
        self.run_forever = run_forever;
        self
    }

    pub fn update_interval(mut self, seconds: f64) -> Self {
        self.update_interval = seconds;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Last status the root reported
    pub fn root_status(&self) -> Status {
        self.last_root
    }

    /// True once a non-forever tree has concluded
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn start(&mut self) -> Result<(), GraphError> {
        self.graph.start()?;
        self.done = false;
        self.last_root = Status::Resting;
        // let the first tick execute immediately
        self.since_last = self.update_interval;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), GraphError> {
        self.graph.stop()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.graph.set_paused(paused);
    }

    /// Advance the tree by one frame
    pub fn tick(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        if !self.graph.is_running() || self.graph.is_paused() || self.done {
            return self.last_root;
        }
        self.graph.advance(ctx.delta);
        ctx.elapsed = self.graph.elapsed();

        self.since_last += ctx.delta;
        if self.update_interval > 0.0 && self.since_last < self.update_interval {
            return self.last_root;
        }
        self.since_last = 0.0;

        let Some(prime) = self.graph.prime() else {
            return Status::Resting;
        };
        if !self.graph.status(prime).unwrap_or_default().is_running() {
            self.graph.reset_node(prime, true);
        }
        let status = self.graph.execute(prime, ctx);
        self.last_root = status;

        if status.is_finished() && !self.run_forever {
            debug!(graph = %self.graph.name(), status = %status, "tree concluded");
            self.done = true;
            if let Err(err) = self.graph.stop() {
                info!(graph = %self.graph.name(), error = %err, "tree already stopped");
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Blackboard;
    use crate::context::EventQueue;
    use crate::graph::NodeId;
    use crate::node::NodeBehaviour;

    /// Counts how many times it executes, then keeps succeeding
    struct CountRuns {
        runs: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl NodeBehaviour for CountRuns {
        fn type_name(&self) -> &'static str {
            "count-runs"
        }

        fn on_execute(&mut self, _: NodeId, _: &mut Graph, _: &mut ExecContext<'_>) -> Status {
            self.runs.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Status::Success
        }
    }

    fn counting_tree() -> (BehaviourTree, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let runs = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut graph = Graph::new("tree");
        graph.add_node(Box::new(CountRuns { runs: runs.clone() }));
        (BehaviourTree::new(graph), runs)
    }

    #[test]
    fn test_forever_tree_restarts_after_success() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let (mut tree, runs) = counting_tree();

        tree.start().unwrap();
        for _ in 0..3 {
            let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.1);
            assert_eq!(tree.tick(&mut ctx), Status::Success);
        }
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 3);
        assert!(!tree.is_done());
    }

    #[test]
    fn test_one_shot_tree_concludes() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let (tree, runs) = counting_tree();
        let mut tree = tree.run_forever(false);

        tree.start().unwrap();
        for _ in 0..3 {
            let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.1);
            tree.tick(&mut ctx);
        }
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert!(tree.is_done());
        assert!(!tree.graph().is_running());
        assert_eq!(tree.root_status(), Status::Success);
    }

    #[test]
    fn test_update_interval_throttles_root() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let (tree, runs) = counting_tree();
        let mut tree = tree.update_interval(0.5);

        tree.start().unwrap();
        for _ in 0..10 {
            let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.1);
            tree.tick(&mut ctx);
        }
        // executes on the first tick and then every fifth
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[test]
    fn test_paused_tree_does_not_execute() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let (mut tree, runs) = counting_tree();

        tree.start().unwrap();
        tree.set_paused(true);
        let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.1);
        tree.tick(&mut ctx);
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(tree.graph().elapsed(), 0.0);
    }
}
