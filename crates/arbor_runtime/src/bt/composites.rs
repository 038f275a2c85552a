//! Composite nodes: sequence, selector, parallel and switch

use arbor_types::{BbParam, Status};
use serde::{Deserialize, Serialize};

use crate::context::ExecContext;
use crate::graph::{Graph, NodeId};
use crate::node::NodeBehaviour;

// ─────────────────────────────────────────────────────────────────────────────
// Sequence
// ─────────────────────────────────────────────────────────────────────────────

/// Executes children left to right; fails on the first failure
///
/// Remembers the running child between ticks so earlier children are not
/// re-executed while a later one is in flight. No children means Success.
#[derive(Default)]
pub struct Sequence {
    last_running: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeBehaviour for Sequence {
    fn type_name(&self) -> &'static str {
        "sequence"
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let children = graph.out_connections(node);
        for i in self.last_running..children.len() {
            match graph.execute_connection(children[i], ctx) {
                Status::Running => {
                    self.last_running = i;
                    return Status::Running;
                }
                Status::Failure => {
                    self.last_running = 0;
                    return Status::Failure;
                }
                Status::Error => return Status::Error,
                _ => {}
            }
        }
        self.last_running = 0;
        Status::Success
    }

    fn on_reset(&mut self) {
        self.last_running = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────────────────

/// Executes children left to right; succeeds on the first success
///
/// No children means Failure.
#[derive(Default)]
pub struct Selector {
    last_running: usize,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeBehaviour for Selector {
    fn type_name(&self) -> &'static str {
        "selector"
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let children = graph.out_connections(node);
        for i in self.last_running..children.len() {
            match graph.execute_connection(children[i], ctx) {
                Status::Running => {
                    self.last_running = i;
                    return Status::Running;
                }
                Status::Success => {
                    self.last_running = 0;
                    return Status::Success;
                }
                Status::Error => return Status::Error,
                _ => {}
            }
        }
        self.last_running = 0;
        Status::Failure
    }

    fn on_reset(&mut self) {
        self.last_running = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parallel
// ─────────────────────────────────────────────────────────────────────────────

/// What concludes a [`Parallel`] composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelPolicy {
    /// Fail as soon as any child fails; succeed when all children finish
    FirstFailure,
    /// Succeed as soon as any child succeeds; fail when all children finish
    FirstSuccess,
}

/// Ticks every child each step until the policy concludes
pub struct Parallel {
    policy: ParallelPolicy,
    finished: Vec<Status>,
}

impl Parallel {
    pub fn new(policy: ParallelPolicy) -> Self {
        Self {
            policy,
            finished: Vec::new(),
        }
    }
}

impl NodeBehaviour for Parallel {
    fn type_name(&self) -> &'static str {
        "parallel"
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let children = graph.out_connections(node);
        if self.finished.len() != children.len() {
            self.finished = vec![Status::Resting; children.len()];
        }

        let mut all_done = true;
        for (i, cid) in children.iter().enumerate() {
            if self.finished[i].is_finished() {
                continue;
            }
            match graph.execute_connection(*cid, ctx) {
                Status::Running => all_done = false,
                Status::Error => return Status::Error,
                status => {
                    self.finished[i] = status;
                    match (self.policy, status) {
                        (ParallelPolicy::FirstFailure, Status::Failure) => {
                            return Status::Failure;
                        }
                        (ParallelPolicy::FirstSuccess, Status::Success) => {
                            return Status::Success;
                        }
                        _ => {}
                    }
                }
            }
        }

        if all_done {
            match self.policy {
                ParallelPolicy::FirstFailure => Status::Success,
                ParallelPolicy::FirstSuccess => Status::Failure,
            }
        } else {
            Status::Running
        }
    }

    fn on_reset(&mut self) {
        self.finished.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Switch
// ─────────────────────────────────────────────────────────────────────────────

/// How [`Switch`] treats an index beyond its child count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfRangeMode {
    ReturnFailure,
    WrapIndex,
}

/// Executes the single child picked by an index parameter
///
/// When the index moves away from a running child, that child is reset
/// before the new one executes.
pub struct Switch {
    index: BbParam<i64>,
    out_of_range: OutOfRangeMode,
    current: Option<usize>,
}

impl Switch {
    pub fn new(index: BbParam<i64>, out_of_range: OutOfRangeMode) -> Self {
        Self {
            index,
            out_of_range,
            current: None,
        }
    }
}

impl NodeBehaviour for Switch {
    fn type_name(&self) -> &'static str {
        "switch"
    }

    fn on_execute(
        &mut self,
        node: NodeId,
        graph: &mut Graph,
        ctx: &mut ExecContext<'_>,
    ) -> Status {
        let children = graph.out_connections(node);
        if children.is_empty() {
            return Status::Failure;
        }

        let raw = self.index.read(ctx.blackboard).unwrap_or(0);
        let len = children.len() as i64;
        let idx = match self.out_of_range {
            OutOfRangeMode::WrapIndex => raw.rem_euclid(len) as usize,
            OutOfRangeMode::ReturnFailure => {
                if raw < 0 || raw >= len {
                    return Status::Failure;
                }
                raw as usize
            }
        };

        if let Some(prev) = self.current {
            if prev != idx && prev < children.len() {
                graph.reset_connection(children[prev], true);
            }
        }
        self.current = Some(idx);
        graph.execute_connection(children[idx], ctx)
    }

    fn on_reset(&mut self) {
        self.current = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
