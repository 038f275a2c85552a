//! Async graph runner: owns a graph system and ticks it on a frame interval

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use arbor_types::{Blackboard, Status};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::bt::BehaviourTree;
use crate::context::{AgentRef, EventQueue, ExecContext};
use crate::error::{GraphError, RunnerError};
use crate::fsm::StateMachine;

// ─────────────────────────────────────────────────────────────────────────────
// GraphSystem
// ─────────────────────────────────────────────────────────────────────────────

/// What the runner needs from a graph system
///
/// Behaviour trees and state machines both drive a [`crate::graph::Graph`];
/// this is the surface they share.
pub trait GraphSystem: Send + 'static {
    fn name(&self) -> &str;

    fn start(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), GraphError>;

    /// Advance by one frame, returning the system's current status
    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Status;

    fn stop(&mut self) -> Result<(), GraphError>;

    fn set_paused(&mut self, paused: bool);

    /// True once the system concluded on its own
    fn is_done(&self) -> bool;

    fn status(&self) -> Status;
}

impl GraphSystem for BehaviourTree {
    fn name(&self) -> &str {
        self.graph().name()
    }

    fn start(&mut self, _ctx: &mut ExecContext<'_>) -> Result<(), GraphError> {
        BehaviourTree::start(self)
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        self.tick(ctx)
    }

    fn stop(&mut self) -> Result<(), GraphError> {
        BehaviourTree::stop(self)
    }

    fn set_paused(&mut self, paused: bool) {
        BehaviourTree::set_paused(self, paused);
    }

    fn is_done(&self) -> bool {
        BehaviourTree::is_done(self)
    }

    fn status(&self) -> Status {
        self.root_status()
    }
}

impl GraphSystem for StateMachine {
    fn name(&self) -> &str {
        self.graph().name()
    }

    fn start(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), GraphError> {
        StateMachine::start(self, ctx)
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) -> Status {
        self.update(ctx)
    }

    fn stop(&mut self) -> Result<(), GraphError> {
        StateMachine::stop(self)
    }

    fn set_paused(&mut self, paused: bool) {
        StateMachine::set_paused(self, paused);
    }

    fn is_done(&self) -> bool {
        StateMachine::is_done(self)
    }

    fn status(&self) -> Status {
        StateMachine::status(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner State & Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a spawned runner, shared with its handle through an atomic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Stopped = 3,
}

impl RunnerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => RunnerState::Idle,
            1 => RunnerState::Running,
            2 => RunnerState::Paused,
            _ => RunnerState::Stopped,
        }
    }
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunnerState::Idle => "idle",
            RunnerState::Running => "running",
            RunnerState::Paused => "paused",
            RunnerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

enum RunnerCommand {
    Pause,
    Resume,
    SendEvent(String),
    GetStatus(oneshot::Sender<Status>),
    Stop,
}

/// Frame pacing for a spawned runner
#[derive(Debug, Clone, Copy)]
pub struct FrameConfig {
    pub fps: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { fps: 60.0 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GraphRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns graph systems onto the tokio runtime
pub struct GraphRunner;

impl GraphRunner {
    /// Spawn a system with its blackboard and optional agent
    ///
    /// The spawned task ticks the system at the configured frame rate until
    /// it concludes or the handle stops it. The blackboard travels with the
    /// task and comes back from [`RunnerHandle::stop`].
    pub fn spawn<S: GraphSystem>(
        mut system: S,
        mut blackboard: Blackboard,
        agent: Option<AgentRef>,
        config: FrameConfig,
    ) -> RunnerHandle {
        let name = system.name().to_string();
        let (tx, mut rx) = mpsc::channel::<RunnerCommand>(32);
        let state = Arc::new(AtomicU8::new(RunnerState::Idle as u8));
        let task_state = state.clone();
        let task_name = name.clone();

        let join = tokio::spawn(async move {
            let mut events = EventQueue::new();

            {
                let mut ctx = ExecContext::new(&mut blackboard, &mut events);
                if let Some(agent) = agent.as_ref() {
                    ctx = ctx.with_agent(agent);
                }
                if let Err(err) = system.start(&mut ctx) {
                    error!(graph = %task_name, error = %err, "graph failed to start");
                    task_state.store(RunnerState::Stopped as u8, Ordering::SeqCst);
                    return blackboard;
                }
            }
            task_state.store(RunnerState::Running as u8, Ordering::SeqCst);
            info!(graph = %task_name, "graph runner started");

            let period = Duration::from_secs_f64(1.0 / config.fps.max(1.0));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    cmd = rx.recv() => {
                        match cmd {
                            Some(RunnerCommand::Pause) => {
                                system.set_paused(true);
                                task_state.store(RunnerState::Paused as u8, Ordering::SeqCst);
                            }
                            Some(RunnerCommand::Resume) => {
                                system.set_paused(false);
                                // the pause gap must not count as frame time
                                last = Instant::now();
                                task_state.store(RunnerState::Running as u8, Ordering::SeqCst);
                            }
                            Some(RunnerCommand::SendEvent(event)) => {
                                debug!(graph = %task_name, event = %event, "event raised");
                                events.send(event);
                            }
                            Some(RunnerCommand::GetStatus(reply)) => {
                                let _ = reply.send(system.status());
                            }
                            Some(RunnerCommand::Stop) | None => break,
                        }
                    }
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let delta = (now - last).as_secs_f64();
                        last = now;

                        let mut ctx = ExecContext::new(&mut blackboard, &mut events)
                            .with_delta(delta);
                        if let Some(agent) = agent.as_ref() {
                            ctx = ctx.with_agent(agent);
                        }
                        system.step(&mut ctx);
                        if system.is_done() {
                            info!(graph = %task_name, status = %system.status(), "graph concluded");
                            break;
                        }
                    }
                }
            }

            if let Err(err) = system.stop() {
                debug!(graph = %task_name, error = %err, "graph already stopped");
            }
            task_state.store(RunnerState::Stopped as u8, Ordering::SeqCst);
            info!(graph = %task_name, "graph runner stopped");
            blackboard
        });

        RunnerHandle {
            name,
            tx,
            state,
            join,
        }
    }
}

/// Control surface for a spawned runner
pub struct RunnerHandle {
    name: String,
    tx: mpsc::Sender<RunnerCommand>,
    state: Arc<AtomicU8>,
    join: tokio::task::JoinHandle<Blackboard>,
}

impl RunnerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub async fn pause(&self) -> Result<(), RunnerError> {
        self.send(RunnerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RunnerError> {
        self.send(RunnerCommand::Resume).await
    }

    /// Raise a named event inside the running graph
    pub async fn send_event(&self, event: impl Into<String>) -> Result<(), RunnerError> {
        self.send(RunnerCommand::SendEvent(event.into())).await
    }

    /// Ask the running system for its current status
    pub async fn status(&self) -> Result<Status, RunnerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RunnerCommand::GetStatus(reply_tx)).await?;
        reply_rx.await.map_err(|_| RunnerError::ChannelClosed)
    }

    /// Stop the runner and take the blackboard back
    ///
    /// Also the way to join a runner that concluded on its own.
    pub async fn stop(self) -> Result<Blackboard, RunnerError> {
        let _ = self.tx.send(RunnerCommand::Stop).await;
        self.join.await.map_err(|_| RunnerError::TaskPanicked)
    }

    async fn send(&self, cmd: RunnerCommand) -> Result<(), RunnerError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| RunnerError::ChannelClosed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bt::ActionNode;
    use crate::graph::Graph;
    use crate::task::FnAction;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("arbor_runtime=debug")
            .with_test_writer()
            .try_init();
    }

    fn one_shot_tree(writes: &str) -> BehaviourTree {
        let key = writes.to_string();
        let mut graph = Graph::new("runner-tree");
        graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            move |ctx| {
                ctx.blackboard.set(key.clone(), true);
                Status::Success
            },
        )))));
        BehaviourTree::new(graph).run_forever(false)
    }

    #[tokio::test]
    async fn test_runner_concludes_and_returns_blackboard() {
        init_tracing();
        let handle = GraphRunner::spawn(
            one_shot_tree("ran"),
            Blackboard::new(),
            None,
            FrameConfig { fps: 200.0 },
        );

        // give the tree a few frames to conclude
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), RunnerState::Stopped);

        let blackboard = handle.stop().await.unwrap();
        assert_eq!(blackboard.read::<bool>("ran"), Some(true));
    }

    #[tokio::test]
    async fn test_runner_pause_and_status() {
        init_tracing();
        let mut graph = Graph::new("forever");
        graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            |_| Status::Running,
        )))));
        let tree = BehaviourTree::new(graph);

        let handle = GraphRunner::spawn(tree, Blackboard::new(), None, FrameConfig::default());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(handle.state(), RunnerState::Running);
        assert_eq!(handle.status().await.unwrap(), Status::Running);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.state(), RunnerState::Paused);

        handle.resume().await.unwrap();
        let _ = handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_runner_event_reaches_graph() {
        init_tracing();
        let mut graph = Graph::new("eventful");
        graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            |ctx| {
                if ctx.events.consume("go") {
                    ctx.blackboard.set("saw-event", true);
                    Status::Success
                } else {
                    Status::Running
                }
            },
        )))));
        let tree = BehaviourTree::new(graph).run_forever(false);

        let handle = GraphRunner::spawn(
            tree,
            Blackboard::new(),
            None,
            FrameConfig { fps: 200.0 },
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.send_event("go").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let blackboard = handle.stop().await.unwrap();
        assert_eq!(blackboard.read::<bool>("saw-event"), Some(true));
    }

    #[tokio::test]
    async fn test_runner_with_agent() {
        init_tracing();
        struct Npc {
            name: &'static str,
        }

        let mut graph = Graph::new("agent-tree");
        graph.add_node(Box::new(ActionNode::new(Box::new(FnAction::new(
            |ctx| match ctx.agent_as::<Npc>() {
                Some(npc) => {
                    ctx.blackboard.set("who", npc.name);
                    Status::Success
                }
                None => Status::Failure,
            },
        )))));
        let tree = BehaviourTree::new(graph).run_forever(false);

        let agent: AgentRef = Arc::new(Npc { name: "guard" });
        let handle = GraphRunner::spawn(
            tree,
            Blackboard::new(),
            Some(agent),
            FrameConfig { fps: 200.0 },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let blackboard = handle.stop().await.unwrap();
        assert_eq!(blackboard.read::<String>("who").as_deref(), Some("guard"));
    }
}
