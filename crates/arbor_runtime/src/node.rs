//! Node behaviour trait implemented by composites, decorators, leafs and states

use arbor_types::Status;

use crate::context::ExecContext;
use crate::graph::{Graph, NodeId};

/// Behaviour executed when a graph node runs
///
/// Behaviours live inside graph slots. During `on_execute` the behaviour is
/// temporarily out of its slot, which is what lets the graph detect
/// re-entrant execution of the same node.
pub trait NodeBehaviour: Send {
    /// Kind name shown in logs and diagnostics
    fn type_name(&self) -> &'static str;

    /// Maximum inbound connections, `None` for unlimited
    fn max_in_connections(&self) -> Option<usize> {
        None
    }

    /// Maximum outbound connections, `None` for unlimited
    fn max_out_connections(&self) -> Option<usize> {
        None
    }

    /// Whether this behaviour may serve as the graph's prime node
    fn allow_as_prime(&self) -> bool {
        true
    }

    /// Execute one step
    ///
    /// `node` is this behaviour's own slot; child connections are reached
    /// through the graph.
    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status;

    /// Rewind internal state; running work must be interrupted
    fn on_reset(&mut self) {}

    fn on_graph_started(&mut self) {}

    fn on_graph_stopped(&mut self) {}

    fn on_graph_paused(&mut self, _paused: bool) {}
}
