//! Graph arena: node slots, guarded connections, prime node and lifecycle

use std::collections::{BTreeMap, HashMap, HashSet};

use arbor_types::Status;
use tracing::{debug, error};

use crate::context::ExecContext;
use crate::error::GraphError;
use crate::node::NodeBehaviour;
use crate::task::ConditionTask;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Stable handle to a node slot, unaffected by structural edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable handle to a connection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Slots
// ─────────────────────────────────────────────────────────────────────────────

/// Connection limits and flags, captured when the behaviour enters the graph
/// so they stay queryable while the behaviour is out of its slot
#[derive(Debug, Clone, Copy)]
struct NodeMeta {
    type_name: &'static str,
    max_in: Option<usize>,
    max_out: Option<usize>,
    allow_as_prime: bool,
}

struct NodeSlot {
    /// Absent exactly while the node is executing
    behaviour: Option<Box<dyn NodeBehaviour>>,
    meta: NodeMeta,
    status: Status,
    /// Pre-order position, 0 until assigned
    order: usize,
    name: Option<String>,
    tag: Option<String>,
    inbound: Vec<ConnectionId>,
    outbound: Vec<ConnectionId>,
}

struct ConnectionSlot {
    source: NodeId,
    target: NodeId,
    /// Guard: when present and false, the target is not executed
    condition: Option<Box<dyn ConditionTask>>,
    status: Status,
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────────────────

/// Arena of nodes and connections executed from a designated prime node
///
/// The graph is the shared substrate of both behaviour trees and state
/// machines; the tick or transition policy lives in the wrapping system.
pub struct Graph {
    name: String,
    nodes: BTreeMap<NodeId, NodeSlot>,
    connections: BTreeMap<ConnectionId, ConnectionSlot>,
    next_node: u32,
    next_connection: u32,
    prime: Option<NodeId>,
    running: bool,
    paused: bool,
    elapsed: f64,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            next_node: 0,
            next_connection: 0,
            prime: None,
            running: false,
            paused: false,
            elapsed: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds accumulated while running and unpaused
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a node; the first prime-eligible node becomes prime
    pub fn add_node(&mut self, behaviour: Box<dyn NodeBehaviour>) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;

        let meta = NodeMeta {
            type_name: behaviour.type_name(),
            max_in: behaviour.max_in_connections(),
            max_out: behaviour.max_out_connections(),
            allow_as_prime: behaviour.allow_as_prime(),
        };
        self.nodes.insert(
            id,
            NodeSlot {
                behaviour: Some(behaviour),
                meta,
                status: Status::Resting,
                order: 0,
                name: None,
                tag: None,
                inbound: Vec::new(),
                outbound: Vec::new(),
            },
        );

        if self.prime.is_none() && meta.allow_as_prime {
            self.prime = Some(id);
        }
        self.assign_orders();
        id
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let slot = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id.0))?;

        let mut severed: Vec<ConnectionId> = slot.inbound;
        severed.extend(slot.outbound);
        for cid in severed {
            if let Some(conn) = self.connections.remove(&cid) {
                let other = if conn.source == id { conn.target } else { conn.source };
                if let Some(other_slot) = self.nodes.get_mut(&other) {
                    other_slot.inbound.retain(|c| *c != cid);
                    other_slot.outbound.retain(|c| *c != cid);
                }
            }
        }

        if self.prime == Some(id) {
            self.prime = self
                .nodes
                .iter()
                .find(|(_, slot)| slot.meta.allow_as_prime)
                .map(|(nid, _)| *nid);
        }
        self.assign_orders();
        Ok(())
    }

    pub fn prime(&self) -> Option<NodeId> {
        self.prime
    }

    pub fn set_prime(&mut self, id: NodeId) -> Result<(), GraphError> {
        let slot = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id.0))?;
        if !slot.meta.allow_as_prime {
            return Err(GraphError::NotAllowedAsPrime(slot.meta.type_name));
        }
        self.prime = Some(id);
        self.assign_orders();
        Ok(())
    }

    /// Connect source to target, appending to the source's child list
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<ConnectionId, GraphError> {
        let index = self
            .nodes
            .get(&source)
            .map(|s| s.outbound.len())
            .unwrap_or(0);
        self.connect_at(source, index, target)
    }

    /// Connect source to target at a specific child index
    pub fn connect_at(
        &mut self,
        source: NodeId,
        index: usize,
        target: NodeId,
    ) -> Result<ConnectionId, GraphError> {
        self.check_new_connection(source, target)?;

        let cid = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(
            cid,
            ConnectionSlot {
                source,
                target,
                condition: None,
                status: Status::Resting,
            },
        );

        let source_slot = self.nodes.get_mut(&source).ok_or(GraphError::NodeNotFound(source.0))?;
        let index = index.min(source_slot.outbound.len());
        source_slot.outbound.insert(index, cid);
        let target_slot = self.nodes.get_mut(&target).ok_or(GraphError::NodeNotFound(target.0))?;
        target_slot.inbound.push(cid);

        self.assign_orders();
        Ok(cid)
    }

    fn check_new_connection(&self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfConnection);
        }
        let source_slot = self.nodes.get(&source).ok_or(GraphError::NodeNotFound(source.0))?;
        let target_slot = self.nodes.get(&target).ok_or(GraphError::NodeNotFound(target.0))?;

        let duplicate = source_slot.outbound.iter().any(|cid| {
            self.connections
                .get(cid)
                .is_some_and(|conn| conn.target == target)
        });
        if duplicate {
            return Err(GraphError::AlreadyConnected);
        }

        if let Some(max) = source_slot.meta.max_out {
            if source_slot.outbound.len() >= max {
                return Err(GraphError::MaxOutConnections {
                    node: self.display_name(source),
                    max,
                });
            }
        }

        let max_in = if self.prime == Some(target) {
            // the prime node never takes more than one inbound link
            Some(target_slot.meta.max_in.map_or(1, |m| m.min(1)))
        } else {
            target_slot.meta.max_in
        };
        if let Some(max) = max_in {
            if target_slot.inbound.len() >= max {
                return Err(GraphError::MaxInConnections {
                    node: self.display_name(target),
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn disconnect(&mut self, cid: ConnectionId) -> Result<(), GraphError> {
        let conn = self
            .connections
            .remove(&cid)
            .ok_or(GraphError::ConnectionNotFound(cid.0))?;
        if let Some(slot) = self.nodes.get_mut(&conn.source) {
            slot.outbound.retain(|c| *c != cid);
        }
        if let Some(slot) = self.nodes.get_mut(&conn.target) {
            slot.inbound.retain(|c| *c != cid);
        }
        self.assign_orders();
        Ok(())
    }

    /// Attach or replace the guard condition on a connection
    pub fn set_connection_condition(
        &mut self,
        cid: ConnectionId,
        condition: Option<Box<dyn ConditionTask>>,
    ) -> Result<(), GraphError> {
        let conn = self
            .connections
            .get_mut(&cid)
            .ok_or(GraphError::ConnectionNotFound(cid.0))?;
        conn.condition = condition;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_node_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        let slot = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id.0))?;
        slot.name = Some(name.into());
        Ok(())
    }

    pub fn set_node_tag(&mut self, id: NodeId, tag: impl Into<String>) -> Result<(), GraphError> {
        let slot = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id.0))?;
        slot.tag = Some(tag.into());
        Ok(())
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).and_then(|s| s.name.as_deref())
    }

    pub fn node_type_name(&self, id: NodeId) -> Option<&'static str> {
        self.nodes.get(&id).map(|s| s.meta.type_name)
    }

    /// Custom name when set, otherwise `type#order`
    pub fn display_name(&self, id: NodeId) -> String {
        match self.nodes.get(&id) {
            Some(slot) => slot
                .name
                .clone()
                .unwrap_or_else(|| format!("{}#{}", slot.meta.type_name, slot.order)),
            None => id.to_string(),
        }
    }

    pub fn status(&self, id: NodeId) -> Option<Status> {
        self.nodes.get(&id).map(|s| s.status)
    }

    pub fn order(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|s| s.order)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_with_order(&self, order: usize) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, slot)| slot.order == order)
            .map(|(id, _)| *id)
    }

    pub fn node_with_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, slot)| slot.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    pub fn nodes_with_tag(&self, tag: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, slot)| slot.tag.as_deref() == Some(tag))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Outbound connections in declaration order
    pub fn out_connections(&self, id: NodeId) -> Vec<ConnectionId> {
        self.nodes
            .get(&id)
            .map(|s| s.outbound.clone())
            .unwrap_or_default()
    }

    pub fn in_connections(&self, id: NodeId) -> Vec<ConnectionId> {
        self.nodes
            .get(&id)
            .map(|s| s.inbound.clone())
            .unwrap_or_default()
    }

    pub fn connection_source(&self, cid: ConnectionId) -> Option<NodeId> {
        self.connections.get(&cid).map(|c| c.source)
    }

    pub fn connection_target(&self, cid: ConnectionId) -> Option<NodeId> {
        self.connections.get(&cid).map(|c| c.target)
    }

    pub fn connection_status(&self, cid: ConnectionId) -> Option<Status> {
        self.connections.get(&cid).map(|c| c.status)
    }

    pub fn connection_has_condition(&self, cid: ConnectionId) -> bool {
        self.connections
            .get(&cid)
            .is_some_and(|c| c.condition.is_some())
    }

    pub(crate) fn set_connection_status(&mut self, cid: ConnectionId, status: Status) {
        if let Some(conn) = self.connections.get_mut(&cid) {
            conn.status = status;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ordering
    // ─────────────────────────────────────────────────────────────────────────

    /// Recompute pre-order positions: prime's subtree first, then any
    /// unconnected root subtrees in id order
    fn assign_orders(&mut self) {
        let children: HashMap<NodeId, Vec<NodeId>> = self
            .nodes
            .iter()
            .map(|(id, slot)| {
                let targets = slot
                    .outbound
                    .iter()
                    .filter_map(|cid| self.connections.get(cid).map(|c| c.target))
                    .collect();
                (*id, targets)
            })
            .collect();

        for slot in self.nodes.values_mut() {
            slot.order = 0;
        }

        let mut counter = 0usize;
        let mut visited = HashSet::new();
        if let Some(prime) = self.prime {
            self.order_subtree(prime, &children, &mut counter, &mut visited);
        }
        let roots: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(id, slot)| slot.inbound.is_empty() && !visited.contains(*id))
            .map(|(id, _)| *id)
            .collect();
        for root in roots {
            self.order_subtree(root, &children, &mut counter, &mut visited);
        }
    }

    fn order_subtree(
        &mut self,
        root: NodeId,
        children: &HashMap<NodeId, Vec<NodeId>>,
        counter: &mut usize,
        visited: &mut HashSet<NodeId>,
    ) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            *counter += 1;
            if let Some(slot) = self.nodes.get_mut(&id) {
                slot.order = *counter;
            }
            if let Some(kids) = children.get(&id) {
                for kid in kids.iter().rev() {
                    if !visited.contains(kid) {
                        stack.push(*kid);
                    }
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Execute one node
    ///
    /// Re-entering a node that is currently executing is reported as an
    /// infinite loop: the nested call logs, marks the node `Error` and
    /// returns `Error` without executing anything.
    pub fn execute(&mut self, id: NodeId, ctx: &mut ExecContext<'_>) -> Status {
        let Some(slot) = self.nodes.get_mut(&id) else {
            error!(graph = %self.name, node = %id, "executed a node that is not in the graph");
            return Status::Error;
        };
        let Some(mut behaviour) = slot.behaviour.take() else {
            let order = slot.order;
            slot.status = Status::Error;
            error!(
                graph = %self.name,
                node = %self.display_name(id),
                order = order,
                "infinite loop detected: node is already executing"
            );
            return Status::Error;
        };

        let status = behaviour.on_execute(id, self, ctx);

        if let Some(slot) = self.nodes.get_mut(&id) {
            slot.behaviour = Some(behaviour);
            slot.status = status;
        }
        status
    }

    /// Execute a connection: evaluate the guard, then the target
    ///
    /// The connection's status mirrors the outcome; a closed guard reports
    /// `Failure` without touching the target.
    pub fn execute_connection(&mut self, cid: ConnectionId, ctx: &mut ExecContext<'_>) -> Status {
        let Some(conn) = self.connections.get_mut(&cid) else {
            error!(graph = %self.name, connection = %cid, "executed a connection that is not in the graph");
            return Status::Error;
        };
        let target = conn.target;

        if let Some(mut condition) = conn.condition.take() {
            let open = condition.check(ctx);
            if let Some(conn) = self.connections.get_mut(&cid) {
                conn.condition = Some(condition);
                if !open {
                    conn.status = Status::Failure;
                    return Status::Failure;
                }
            }
        }

        let status = self.execute(target, ctx);
        self.set_connection_status(cid, status);
        status
    }

    /// Evaluate a connection's guard without executing the target
    ///
    /// `None` when the connection has no guard.
    pub fn check_connection_condition(
        &mut self,
        cid: ConnectionId,
        ctx: &mut ExecContext<'_>,
    ) -> Option<bool> {
        let conn = self.connections.get_mut(&cid)?;
        let mut condition = conn.condition.take()?;
        let open = condition.check(ctx);
        if let Some(conn) = self.connections.get_mut(&cid) {
            conn.condition = Some(condition);
        }
        Some(open)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Rewind a node to `Resting`, recursing into its subtree when asked
    pub fn reset_node(&mut self, id: NodeId, recursive: bool) {
        let mut visited = HashSet::new();
        self.reset_node_visit(id, recursive, &mut visited);
    }

    fn reset_node_visit(&mut self, id: NodeId, recursive: bool, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let outbound = {
            let Some(slot) = self.nodes.get_mut(&id) else {
                return;
            };
            if let Some(behaviour) = slot.behaviour.as_mut() {
                behaviour.on_reset();
            }
            slot.status = Status::Resting;
            if recursive { slot.outbound.clone() } else { Vec::new() }
        };
        for cid in outbound {
            self.reset_connection_visit(cid, true, visited);
        }
    }

    /// Rewind a connection and, when asked, the subtree behind it
    pub fn reset_connection(&mut self, cid: ConnectionId, recursive: bool) {
        let mut visited = HashSet::new();
        self.reset_connection_visit(cid, recursive, &mut visited);
    }

    fn reset_connection_visit(
        &mut self,
        cid: ConnectionId,
        recursive: bool,
        visited: &mut HashSet<NodeId>,
    ) {
        let Some(conn) = self.connections.get_mut(&cid) else {
            return;
        };
        conn.status = Status::Resting;
        if let Some(condition) = conn.condition.as_mut() {
            condition.on_reset();
        }
        let target = conn.target;
        if recursive {
            self.reset_node_visit(target, true, visited);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start the graph: reset everything, notify behaviours, begin timing
    pub fn start(&mut self) -> Result<(), GraphError> {
        if self.running {
            return Err(GraphError::AlreadyRunning);
        }
        if self.prime.is_none() {
            return Err(GraphError::NoPrimeNode);
        }
        self.reset_all();
        self.running = true;
        self.paused = false;
        self.elapsed = 0.0;
        self.notify(|b| b.on_graph_started());
        debug!(graph = %self.name, nodes = self.nodes.len(), "graph started");
        Ok(())
    }

    /// Stop the graph: notify behaviours, then reset everything
    pub fn stop(&mut self) -> Result<(), GraphError> {
        if !self.running {
            return Err(GraphError::NotRunning);
        }
        self.running = false;
        self.paused = false;
        self.notify(|b| b.on_graph_stopped());
        self.reset_all();
        debug!(graph = %self.name, elapsed = self.elapsed, "graph stopped");
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        if !self.running || self.paused == paused {
            return;
        }
        self.paused = paused;
        self.notify(|b| b.on_graph_paused(paused));
        debug!(graph = %self.name, paused = paused, "graph pause toggled");
    }

    /// Advance the clock by one frame
    pub fn advance(&mut self, delta: f64) {
        if self.running && !self.paused {
            self.elapsed += delta;
        }
    }

    fn reset_all(&mut self) {
        for conn in self.connections.values_mut() {
            conn.status = Status::Resting;
            if let Some(condition) = conn.condition.as_mut() {
                condition.on_reset();
            }
        }
        for slot in self.nodes.values_mut() {
            if let Some(behaviour) = slot.behaviour.as_mut() {
                behaviour.on_reset();
            }
            slot.status = Status::Resting;
        }
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn NodeBehaviour)) {
        for slot in self.nodes.values_mut() {
            if let Some(behaviour) = slot.behaviour.as_mut() {
                f(behaviour.as_mut());
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
