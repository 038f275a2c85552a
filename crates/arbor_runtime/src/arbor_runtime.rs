//! Arbor Runtime - Graph execution engine
//!
//! This crate hosts the live side of arbor: the node graph with its
//! ordering, connection and lifecycle rules, the behaviour tree and state
//! machine systems built on top of it, the task model (actions and
//! conditions), the builtin task library, serde graph documents with a
//! kind registry to build them, and an async runner that drives a graph
//! on a fixed-rate tokio task.

pub mod bt;
pub mod fsm;

mod context;
mod document;
mod error;
mod graph;
mod node;
mod registry;
mod runner;
mod task;
mod tasks;

pub use context::{AgentRef, EventQueue, ExecContext};
pub use document::{ConnectionDoc, GraphDoc, GraphKind, LoadedGraph, NodeDoc, TaskDoc};
pub use error::{DocumentError, GraphError, RunnerError};
pub use graph::{ConnectionId, Graph, NodeId};
pub use node::NodeBehaviour;
pub use registry::KindRegistry;
pub use runner::{FrameConfig, GraphRunner, GraphSystem, RunnerHandle, RunnerState};
pub use task::{
    ActionList, ActionRunner, ActionTask, ConditionList, ConditionPolicy, ConditionTask, FnAction,
    FnCondition,
};
pub use tasks::{
    AlwaysTrue, CheckBool, CheckEvent, CheckNumber, CheckString, CompareOp, Log, SendEvent,
    SetVariable, Timeout, Wait,
};

pub use arbor_types::{BbParam, Blackboard, Status, Variant, VariantKind};
