//! Poll-based tasks: the leaf-level work a graph actually performs
//!
//! Actions run over multiple steps and report [`Status`]; conditions answer
//! a boolean each time they are checked. [`ActionRunner`] owns the
//! start/update/stop lifecycle so nodes and states never drive a raw task.

use arbor_types::Status;

use crate::context::ExecContext;

// ─────────────────────────────────────────────────────────────────────────────
// Task Traits
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of work executed by an action node or state
///
/// `on_execute` runs on the first step of each run. While it reports
/// `Running`, `on_update` runs once per subsequent step until it reports a
/// finished status. `on_stop` fires whenever a run ends, including
/// interruption.
pub trait ActionTask: Send {
    fn name(&self) -> &str {
        "action"
    }

    fn on_execute(&mut self, ctx: &mut ExecContext<'_>) -> Status;

    fn on_update(&mut self, _ctx: &mut ExecContext<'_>) -> Status {
        Status::Success
    }

    fn on_stop(&mut self) {}

    fn on_pause(&mut self) {}
}

/// A boolean check used by condition nodes, guards and decorators
pub trait ConditionTask: Send {
    fn name(&self) -> &str {
        "condition"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool;

    fn on_reset(&mut self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Closure Adapters
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap a closure as an [`ActionTask`]
///
/// The closure runs on execute and every update until it stops reporting
/// `Running`.
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F>
where
    F: FnMut(&mut ExecContext<'_>) -> Status + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ActionTask for FnAction<F>
where
    F: FnMut(&mut ExecContext<'_>) -> Status + Send,
{
    fn name(&self) -> &str {
        "fn-action"
    }

    fn on_execute(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        (self.f)(ctx)
    }

    fn on_update(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a [`ConditionTask`]
pub struct FnCondition<F> {
    f: F,
}

impl<F> FnCondition<F>
where
    F: FnMut(&mut ExecContext<'_>) -> bool + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ConditionTask for FnCondition<F>
where
    F: FnMut(&mut ExecContext<'_>) -> bool + Send,
{
    fn name(&self) -> &str {
        "fn-condition"
    }

    fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        (self.f)(ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ActionRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one action through its lifecycle
///
/// Tracks whether a run is in flight, per-run elapsed time and the last
/// reported status. A finished runner starts a fresh run on the next tick.
pub struct ActionRunner {
    action: Box<dyn ActionTask>,
    running: bool,
    paused: bool,
    elapsed: f64,
    last: Status,
}

impl ActionRunner {
    pub fn new(action: Box<dyn ActionTask>) -> Self {
        Self {
            action,
            running: false,
            paused: false,
            elapsed: 0.0,
            last: Status::Resting,
        }
    }

    pub fn name(&self) -> &str {
        self.action.name()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds since the current run started
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn last_status(&self) -> Status {
        self.last
    }

    /// Advance the action by one step
    pub fn tick(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        if self.paused {
            return self.last;
        }
        if !self.running {
            self.running = true;
            self.elapsed = 0.0;
            let status = self.action.on_execute(ctx);
            return self.conclude(status);
        }
        self.elapsed += ctx.delta;
        let status = self.action.on_update(ctx);
        self.conclude(status)
    }

    fn conclude(&mut self, status: Status) -> Status {
        if !status.is_running() {
            self.running = false;
            self.action.on_stop();
        }
        self.last = status;
        status
    }

    /// Force-finish the current run with the given outcome
    pub fn end(&mut self, success: bool) -> Status {
        if self.running {
            self.running = false;
            self.action.on_stop();
        }
        self.last = if success { Status::Success } else { Status::Failure };
        self.last
    }

    /// Interrupt and forget the current run
    pub fn stop(&mut self) {
        if self.running {
            self.action.on_stop();
        }
        self.running = false;
        self.paused = false;
        self.elapsed = 0.0;
        self.last = Status::Resting;
    }

    pub fn pause(&mut self) {
        if self.running && !self.paused {
            self.paused = true;
            self.action.on_pause();
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ActionList
// ─────────────────────────────────────────────────────────────────────────────

/// Several actions run as one: all at once, or one after another
///
/// Succeeds when every action has succeeded; fails as soon as any action
/// fails, stopping the rest. An empty list succeeds immediately.
pub struct ActionList {
    runners: Vec<ActionRunner>,
    parallel: bool,
    finished: Vec<Status>,
    current: usize,
}

impl ActionList {
    pub fn new(parallel: bool) -> Self {
        Self {
            runners: Vec::new(),
            parallel,
            finished: Vec::new(),
            current: 0,
        }
    }

    pub fn parallel() -> Self {
        Self::new(true)
    }

    pub fn sequential() -> Self {
        Self::new(false)
    }

    pub fn push(&mut self, action: Box<dyn ActionTask>) {
        self.runners.push(ActionRunner::new(action));
        self.finished.push(Status::Resting);
    }

    pub fn with(mut self, action: Box<dyn ActionTask>) -> Self {
        self.push(action);
        self
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn tick(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        if self.parallel {
            self.tick_parallel(ctx)
        } else {
            self.tick_sequential(ctx)
        }
    }

    fn tick_parallel(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        let mut all_done = true;
        for i in 0..self.runners.len() {
            if self.finished[i].is_finished() {
                continue;
            }
            match self.runners[i].tick(ctx) {
                Status::Running => all_done = false,
                Status::Failure => {
                    self.finished[i] = Status::Failure;
                    self.stop_unfinished();
                    return Status::Failure;
                }
                status => self.finished[i] = status,
            }
        }
        if all_done {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn tick_sequential(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        while self.current < self.runners.len() {
            match self.runners[self.current].tick(ctx) {
                Status::Running => return Status::Running,
                Status::Failure => return Status::Failure,
                _ => self.current += 1,
            }
        }
        Status::Success
    }

    fn stop_unfinished(&mut self) {
        for i in 0..self.runners.len() {
            if !self.finished[i].is_finished() {
                self.runners[i].stop();
            }
        }
    }

    /// Interrupt every running action and rewind
    pub fn reset(&mut self) {
        for runner in &mut self.runners {
            runner.stop();
        }
        for slot in &mut self.finished {
            *slot = Status::Resting;
        }
        self.current = 0;
    }

    pub fn pause(&mut self) {
        for runner in &mut self.runners {
            runner.pause();
        }
    }

    pub fn resume(&mut self) {
        for runner in &mut self.runners {
            runner.resume();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConditionList
// ─────────────────────────────────────────────────────────────────────────────

/// How a [`ConditionList`] combines its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionPolicy {
    /// Every condition must hold
    All,
    /// At least one condition must hold
    Any,
}

/// Several conditions checked as one
///
/// Empty lists follow the policy's identity: `All` holds, `Any` does not.
pub struct ConditionList {
    conditions: Vec<Box<dyn ConditionTask>>,
    policy: ConditionPolicy,
}

impl ConditionList {
    pub fn new(policy: ConditionPolicy) -> Self {
        Self {
            conditions: Vec::new(),
            policy,
        }
    }

    pub fn push(&mut self, condition: Box<dyn ConditionTask>) {
        self.conditions.push(condition);
    }

    pub fn with(mut self, condition: Box<dyn ConditionTask>) -> Self {
        self.push(condition);
        self
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn check(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        match self.policy {
            ConditionPolicy::All => self.conditions.iter_mut().all(|c| c.check(ctx)),
            ConditionPolicy::Any => self.conditions.iter_mut().any(|c| c.check(ctx)),
        }
    }

    pub fn reset(&mut self) {
        for condition in &mut self.conditions {
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
    use crate::context::EventQueue;

    fn counting_action(frames: usize) -> Box<dyn ActionTask> {
        let mut left = frames;
        Box::new(FnAction::new(move |_ctx| {
            if left == 0 {
                Status::Success
            } else {
                left -= 1;
                Status::Running
            }
        }))
    }

    #[test]
    fn test_runner_lifecycle() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.1);

        let mut runner = ActionRunner::new(counting_action(2));
        assert_eq!(runner.tick(&mut ctx), Status::Running);
        assert!(runner.is_running());
        assert_eq!(runner.tick(&mut ctx), Status::Running);
        assert_eq!(runner.tick(&mut ctx), Status::Success);
        assert!(!runner.is_running());
    }

    #[test]
    fn test_runner_elapsed_resets_per_run() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events).with_delta(0.5);

        let mut runner = ActionRunner::new(counting_action(1));
        runner.tick(&mut ctx);
        runner.tick(&mut ctx);
        assert_eq!(runner.elapsed(), 0.5);

        // next tick starts a fresh run
        runner.tick(&mut ctx);
        assert_eq!(runner.elapsed(), 0.0);
    }

    #[test]
    fn test_runner_end_and_pause() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        let mut runner = ActionRunner::new(counting_action(100));
        assert_eq!(runner.tick(&mut ctx), Status::Running);

        runner.pause();
        assert_eq!(runner.tick(&mut ctx), Status::Running);
        assert!(runner.is_paused());

        runner.resume();
        assert_eq!(runner.end(false), Status::Failure);
        assert!(!runner.is_running());
    }

    #[test]
    fn test_sequential_list_fails_fast() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        let mut list = ActionList::sequential()
            .with(counting_action(0))
            .with(Box::new(FnAction::new(|_| Status::Failure)))
            .with(counting_action(0));

        assert_eq!(list.tick(&mut ctx), Status::Failure);
    }

    #[test]
    fn test_parallel_list_waits_for_all() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        let mut list = ActionList::parallel()
            .with(counting_action(0))
            .with(counting_action(2));

        assert_eq!(list.tick(&mut ctx), Status::Running);
        assert_eq!(list.tick(&mut ctx), Status::Running);
        assert_eq!(list.tick(&mut ctx), Status::Success);
    }

    #[test]
    fn test_empty_action_list_succeeds() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        assert_eq!(ActionList::parallel().tick(&mut ctx), Status::Success);
        assert_eq!(ActionList::sequential().tick(&mut ctx), Status::Success);
    }

    #[test]
    fn test_condition_list_policies() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        let mut all = ConditionList::new(ConditionPolicy::All)
            .with(Box::new(FnCondition::new(|_| true)))
            .with(Box::new(FnCondition::new(|_| false)));
        assert!(!all.check(&mut ctx));

        let mut any = ConditionList::new(ConditionPolicy::Any)
            .with(Box::new(FnCondition::new(|_| true)))
            .with(Box::new(FnCondition::new(|_| false)));
        assert!(any.check(&mut ctx));
    }

    #[test]
    fn test_empty_condition_list_identity() {
        let mut bb = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ExecContext::new(&mut bb, &mut events);

        assert!(ConditionList::new(ConditionPolicy::All).check(&mut ctx));
        assert!(!ConditionList::new(ConditionPolicy::Any).check(&mut ctx));
    }
}
