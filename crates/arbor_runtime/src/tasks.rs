//! Built-in actions and conditions
//!
//! Everything here is serde-configurable so documents can reference these
//! tasks by kind name through the [`crate::registry::KindRegistry`].

use arbor_types::{BbParam, Status, Variant};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::ExecContext;
use crate::task::{ActionTask, ConditionTask};

fn default_true() -> bool {
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// Succeeds after a number of seconds has passed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wait {
    pub seconds: BbParam<f64>,
    #[serde(skip)]
    target: f64,
    #[serde(skip)]
    waited: f64,
}

impl Wait {
    pub fn new(seconds: BbParam<f64>) -> Self {
        Self {
            seconds,
            target: 0.0,
            waited: 0.0,
        }
    }
}

impl ActionTask for Wait {
    fn name(&self) -> &str {
        "wait"
    }

    fn on_execute(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        self.target = self.seconds.read(ctx.blackboard).unwrap_or(0.0);
        self.waited = 0.0;
        if self.target <= 0.0 {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn on_update(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        self.waited += ctx.delta;
        if self.waited >= self.target {
            Status::Success
        } else {
            Status::Running
        }
    }
}

/// Writes a value into the blackboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetVariable {
    pub variable: String,
    pub value: Variant,
}

impl SetVariable {
    pub fn new(variable: impl Into<String>, value: impl Into<Variant>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

impl ActionTask for SetVariable {
    fn name(&self) -> &str {
        "set-variable"
    }

    fn on_execute(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        ctx.blackboard.set(self.variable.clone(), self.value.clone());
        Status::Success
    }
}

/// Emits a log line and succeeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub message: String,
}

impl Log {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ActionTask for Log {
    fn name(&self) -> &str {
        "log"
    }

    fn on_execute(&mut self, _: &mut ExecContext<'_>) -> Status {
        info!(message = %self.message, "graph log");
        Status::Success
    }
}

/// Raises a named event and succeeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEvent {
    pub event: String,
}

impl SendEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
        }
    }
}

impl ActionTask for SendEvent {
    fn name(&self) -> &str {
        "send-event"
    }

    fn on_execute(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        ctx.events.send(self.event.clone());
        Status::Success
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conditions
// ─────────────────────────────────────────────────────────────────────────────

/// Holds when a boolean parameter matches the expected value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckBool {
    pub value: BbParam<bool>,
    #[serde(default = "default_true")]
    pub expected: bool,
}

impl CheckBool {
    pub fn new(value: BbParam<bool>, expected: bool) -> Self {
        Self { value, expected }
    }
}

impl ConditionTask for CheckBool {
    fn name(&self) -> &str {
        "check-bool"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        self.value.read(ctx.blackboard) == Some(self.expected)
    }
}

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        }
    }
}

/// Compares two numeric parameters; an unresolvable operand never holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckNumber {
    pub a: BbParam<f64>,
    pub op: CompareOp,
    pub b: BbParam<f64>,
}

impl CheckNumber {
    pub fn new(a: BbParam<f64>, op: CompareOp, b: BbParam<f64>) -> Self {
        Self { a, op, b }
    }
}

impl ConditionTask for CheckNumber {
    fn name(&self) -> &str {
        "check-number"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        match (self.a.read(ctx.blackboard), self.b.read(ctx.blackboard)) {
            (Some(a), Some(b)) => self.op.apply(a, b),
            _ => false,
        }
    }
}

/// Holds when two string parameters are equal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckString {
    pub a: BbParam<String>,
    pub b: BbParam<String>,
}

impl CheckString {
    pub fn new(a: BbParam<String>, b: BbParam<String>) -> Self {
        Self { a, b }
    }
}

impl ConditionTask for CheckString {
    fn name(&self) -> &str {
        "check-string"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        match (self.a.read(ctx.blackboard), self.b.read(ctx.blackboard)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Consumes a queued event matching the pattern; wildcards allowed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEvent {
    pub event: String,
}

impl CheckEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
        }
    }
}

impl ConditionTask for CheckEvent {
    fn name(&self) -> &str {
        "check-event"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        ctx.events.consume(&self.event)
    }
}

/// Holds once enough seconds have accumulated since the last reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeout {
    pub seconds: BbParam<f64>,
    #[serde(skip)]
    waited: f64,
}

impl Timeout {
    pub fn new(seconds: BbParam<f64>) -> Self {
        Self {
            seconds,
            waited: 0.0,
        }
    }
}

impl ConditionTask for Timeout {
    fn name(&self) -> &str {
        "timeout"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        self.waited += ctx.delta;
        self.waited >= self.seconds.read(ctx.blackboard).unwrap_or(0.0)
    }

    fn on_reset(&mut self) {
        self.waited = 0.0;
    }
}

/// Always holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlwaysTrue;

impl ConditionTask for AlwaysTrue {
    fn name(&self) -> &str {
        "always-true"
    }

    fn check(&mut self, _: &mut ExecContext<'_>) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
