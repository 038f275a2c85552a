//! Serde graph documents: the persisted form of trees and machines

use std::collections::HashMap;
use std::path::Path;

use arbor_types::{Blackboard, Variant};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bt::BehaviourTree;
use crate::error::DocumentError;
use crate::fsm::StateMachine;
use crate::graph::{Graph, NodeId};
use crate::registry::KindRegistry;

fn default_true() -> bool {
    true
}

/// Which system a document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Tree,
    Machine,
}

/// A task reference inside a document: kind name plus its config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDoc {
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

/// One node of a graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDoc {
    /// Document-local id, referenced by connections and `prime`
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

/// One connection of a graph document, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDoc {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TaskDoc>,
}

/// The persisted form of a graph: nodes, connections, seed variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    pub name: String,
    pub kind: GraphKind,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
    /// Document id of the prime node; defaults to the first eligible node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, Variant>,
    /// Tree only: restart after each conclusion
    #[serde(default = "default_true")]
    pub run_forever: bool,
    /// Tree only: minimum seconds between root executions
    #[serde(default)]
    pub update_interval: f64,
}

/// A built document, ready to start
pub enum LoadedGraph {
    Tree(BehaviourTree),
    Machine(StateMachine),
}

impl GraphDoc {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Blackboard seeded with the document's variables
    pub fn seed_blackboard(&self) -> Blackboard {
        let mut bb = Blackboard::named(self.name.clone());
        for (name, value) in &self.variables {
            bb.set(name.clone(), value.clone());
        }
        bb
    }

    /// Build the live system this document describes
    pub fn build(&self, registry: &KindRegistry) -> Result<LoadedGraph, DocumentError> {
        let mut graph = Graph::new(self.name.clone());
        let mut ids: HashMap<&str, NodeId> = HashMap::new();

        for node in &self.nodes {
            if ids.contains_key(node.id.as_str()) {
                return Err(DocumentError::DuplicateNodeId(node.id.clone()));
            }
            let behaviour = registry.build_node(&node.kind, &node.config)?;
            let id = graph.add_node(behaviour);
            if let Some(name) = &node.name {
                graph.set_node_name(id, name.clone())?;
            }
            if let Some(tag) = &node.tag {
                graph.set_node_tag(id, tag.clone())?;
            }
            ids.insert(node.id.as_str(), id);
        }

        for conn in &self.connections {
            let from = *ids
                .get(conn.from.as_str())
                .ok_or_else(|| DocumentError::UnknownNodeId(conn.from.clone()))?;
            let to = *ids
                .get(conn.to.as_str())
                .ok_or_else(|| DocumentError::UnknownNodeId(conn.to.clone()))?;
            let cid = graph.connect(from, to)?;
            if let Some(task) = &conn.condition {
                graph.set_connection_condition(cid, Some(registry.build_condition(task)?))?;
            }
        }

        if let Some(prime) = &self.prime {
            let id = *ids
                .get(prime.as_str())
                .ok_or_else(|| DocumentError::UnknownNodeId(prime.clone()))?;
            graph.set_prime(id)?;
        }

        debug!(
            graph = %self.name,
            nodes = graph.node_count(),
            connections = graph.connection_count(),
            "graph document built"
        );

        Ok(match self.kind {
            GraphKind::Tree => LoadedGraph::Tree(
                BehaviourTree::new(graph)
                    .run_forever(self.run_forever)
                    .update_interval(self.update_interval),
            ),
            GraphKind::Machine => LoadedGraph::Machine(StateMachine::new(graph)),
        })
    }

    /// Build, insisting on a behaviour tree document
    pub fn build_tree(&self, registry: &KindRegistry) -> Result<BehaviourTree, DocumentError> {
        match self.build(registry)? {
            LoadedGraph::Tree(tree) => Ok(tree),
            LoadedGraph::Machine(_) => Err(DocumentError::WrongGraphKind { expected: "tree" }),
        }
    }

    /// Build, insisting on a state machine document
    pub fn build_machine(&self, registry: &KindRegistry) -> Result<StateMachine, DocumentError> {
        match self.build(registry)? {
            LoadedGraph::Machine(machine) => Ok(machine),
            LoadedGraph::Tree(_) => Err(DocumentError::WrongGraphKind { expected: "machine" }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
