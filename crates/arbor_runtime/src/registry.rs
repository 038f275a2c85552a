//! Kind registry: maps node and task kind names to factories
//!
//! Documents reference behaviours and tasks by string kind; the registry
//! turns those references into live objects. Embedders add their own kinds
//! next to the built-ins with the `register_*` methods.

use std::collections::HashMap;

use arbor_types::BbParam;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::bt::{
    Accessor, ActionNode, ConditionNode, Interruptor, Inverter, OutOfRangeMode, Parallel,
    ParallelPolicy, RepeatMode, Repeater, Selector, Sequence, SubTree, Switch,
};
use crate::document::{GraphDoc, LoadedGraph, TaskDoc};
use crate::error::DocumentError;
use crate::fsm::{ActionState, AnyState, ConcurrentState};
use crate::node::NodeBehaviour;
use crate::task::{ActionList, ActionTask, ConditionTask};
use crate::tasks::{
    AlwaysTrue, CheckBool, CheckEvent, CheckNumber, CheckString, Log, SendEvent, SetVariable,
    Timeout, Wait,
};

type NodeFactory = Box<
    dyn Fn(&serde_json::Value, &KindRegistry) -> Result<Box<dyn NodeBehaviour>, DocumentError>
        + Send
        + Sync,
>;
type ActionFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn ActionTask>, DocumentError> + Send + Sync>;
type ConditionFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn ConditionTask>, DocumentError> + Send + Sync>;

fn parse_config<T: DeserializeOwned>(
    kind: &str,
    config: &serde_json::Value,
) -> Result<T, DocumentError> {
    let value = if config.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        config.clone()
    };
    serde_json::from_value(value).map_err(|e| DocumentError::BadConfig {
        kind: kind.to_string(),
        source: e,
    })
}

/// Factory table for node and task kinds
pub struct KindRegistry {
    nodes: HashMap<String, NodeFactory>,
    actions: HashMap<String, ActionFactory>,
    conditions: HashMap<String, ConditionFactory>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            actions: HashMap::new(),
            conditions: HashMap::new(),
        }
    }

    /// Registry preloaded with every built-in node and task kind
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_nodes(&mut registry);
        register_builtin_tasks(&mut registry);
        registry
    }

    pub fn register_node<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value, &KindRegistry) -> Result<Box<dyn NodeBehaviour>, DocumentError>
            + Send
            + Sync
            + 'static,
    {
        self.nodes.insert(kind.into(), Box::new(factory));
    }

    pub fn register_action<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn ActionTask>, DocumentError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(kind.into(), Box::new(factory));
    }

    pub fn register_condition<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn ConditionTask>, DocumentError>
            + Send
            + Sync
            + 'static,
    {
        self.conditions.insert(kind.into(), Box::new(factory));
    }

    pub fn has_node(&self, kind: &str) -> bool {
        self.nodes.contains_key(kind)
    }

    pub fn build_node(
        &self,
        kind: &str,
        config: &serde_json::Value,
    ) -> Result<Box<dyn NodeBehaviour>, DocumentError> {
        let factory = self
            .nodes
            .get(kind)
            .ok_or_else(|| DocumentError::UnknownNodeKind(kind.to_string()))?;
        factory(config, self)
    }

    pub fn build_action(&self, task: &TaskDoc) -> Result<Box<dyn ActionTask>, DocumentError> {
        let factory = self
            .actions
            .get(task.kind.as_str())
            .ok_or_else(|| DocumentError::UnknownTaskKind(task.kind.clone()))?;
        factory(&task.config)
    }

    pub fn build_condition(
        &self,
        task: &TaskDoc,
    ) -> Result<Box<dyn ConditionTask>, DocumentError> {
        let factory = self
            .conditions
            .get(task.kind.as_str())
            .ok_or_else(|| DocumentError::UnknownTaskKind(task.kind.clone()))?;
        factory(&task.config)
    }

    /// Build an action list from task docs
    pub fn build_action_list(
        &self,
        tasks: &[TaskDoc],
        parallel: bool,
    ) -> Result<ActionList, DocumentError> {
        let mut list = ActionList::new(parallel);
        for task in tasks {
            list.push(self.build_action(task)?);
        }
        Ok(list)
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builtin Nodes
// ─────────────────────────────────────────────────────────────────────────────

fn default_parallel_policy() -> ParallelPolicy {
    ParallelPolicy::FirstFailure
}

fn default_out_of_range() -> OutOfRangeMode {
    OutOfRangeMode::ReturnFailure
}

fn default_repeat_mode() -> RepeatMode {
    RepeatMode::Times
}

fn default_times() -> BbParam<i64> {
    BbParam::value(1)
}

fn default_run_in_parallel() -> bool {
    true
}

#[derive(Deserialize)]
struct ParallelConfig {
    #[serde(default = "default_parallel_policy")]
    policy: ParallelPolicy,
}

#[derive(Deserialize)]
struct SwitchConfig {
    #[serde(default)]
    index: BbParam<i64>,
    #[serde(default = "default_out_of_range")]
    out_of_range: OutOfRangeMode,
}

#[derive(Deserialize)]
struct RepeaterConfig {
    #[serde(default = "default_repeat_mode")]
    mode: RepeatMode,
    #[serde(default = "default_times")]
    times: BbParam<i64>,
}

#[derive(Deserialize)]
struct GuardConfig {
    condition: TaskDoc,
}

#[derive(Deserialize)]
struct ActionNodeConfig {
    #[serde(default)]
    action: Option<TaskDoc>,
}

#[derive(Deserialize)]
struct ConditionNodeConfig {
    #[serde(default)]
    condition: Option<TaskDoc>,
}

#[derive(Deserialize)]
struct SubTreeConfig {
    graph: GraphDoc,
}

#[derive(Deserialize)]
struct StateConfig {
    #[serde(default)]
    actions: Vec<TaskDoc>,
    #[serde(default = "default_run_in_parallel")]
    parallel: bool,
}

fn register_builtin_nodes(registry: &mut KindRegistry) {
    registry.register_node("bt/sequence", |_, _| Ok(Box::new(Sequence::new())));
    registry.register_node("bt/selector", |_, _| Ok(Box::new(Selector::new())));
    registry.register_node("bt/parallel", |config, _| {
        let cfg: ParallelConfig = parse_config("bt/parallel", config)?;
        Ok(Box::new(Parallel::new(cfg.policy)))
    });
    registry.register_node("bt/switch", |config, _| {
        let cfg: SwitchConfig = parse_config("bt/switch", config)?;
        Ok(Box::new(Switch::new(cfg.index, cfg.out_of_range)))
    });
    registry.register_node("bt/inverter", |_, _| Ok(Box::new(Inverter::new())));
    registry.register_node("bt/repeater", |config, _| {
        let cfg: RepeaterConfig = parse_config("bt/repeater", config)?;
        Ok(match cfg.mode {
            RepeatMode::Times => Box::new(Repeater::times(cfg.times)),
            mode => Box::new(Repeater::new(mode)),
        })
    });
    registry.register_node("bt/accessor", |config, registry| {
        let cfg: GuardConfig = parse_config("bt/accessor", config)?;
        Ok(Box::new(Accessor::new(registry.build_condition(&cfg.condition)?)))
    });
    registry.register_node("bt/interruptor", |config, registry| {
        let cfg: GuardConfig = parse_config("bt/interruptor", config)?;
        Ok(Box::new(Interruptor::new(
            registry.build_condition(&cfg.condition)?,
        )))
    });
    registry.register_node("bt/action", |config, registry| {
        let cfg: ActionNodeConfig = parse_config("bt/action", config)?;
        Ok(match cfg.action {
            Some(task) => Box::new(ActionNode::new(registry.build_action(&task)?)),
            None => Box::new(ActionNode::empty()),
        })
    });
    registry.register_node("bt/condition", |config, registry| {
        let cfg: ConditionNodeConfig = parse_config("bt/condition", config)?;
        Ok(match cfg.condition {
            Some(task) => Box::new(ConditionNode::new(registry.build_condition(&task)?)),
            None => Box::new(ConditionNode::empty()),
        })
    });
    registry.register_node("bt/subtree", |config, registry| {
        let cfg: SubTreeConfig = parse_config("bt/subtree", config)?;
        match cfg.graph.build(registry)? {
            LoadedGraph::Tree(tree) => Ok(Box::new(SubTree::new(tree))),
            LoadedGraph::Machine(_) => Err(DocumentError::WrongGraphKind { expected: "tree" }),
        }
    });
    registry.register_node("fsm/state", |config, registry| {
        let cfg: StateConfig = parse_config("fsm/state", config)?;
        let actions = registry.build_action_list(&cfg.actions, cfg.parallel)?;
        Ok(Box::new(ActionState::new(actions)))
    });
    registry.register_node("fsm/any", |_, _| Ok(Box::new(AnyState::new())));
    registry.register_node("fsm/concurrent", |config, registry| {
        let cfg: StateConfig = parse_config("fsm/concurrent", config)?;
        let actions = registry.build_action_list(&cfg.actions, cfg.parallel)?;
        Ok(Box::new(ConcurrentState::new(actions)))
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Builtin Tasks
// ─────────────────────────────────────────────────────────────────────────────

fn register_builtin_tasks(registry: &mut KindRegistry) {
    registry.register_action("wait", |config| {
        let task: Wait = parse_config("wait", config)?;
        Ok(Box::new(task))
    });
    registry.register_action("set-variable", |config| {
        let task: SetVariable = parse_config("set-variable", config)?;
        Ok(Box::new(task))
    });
    registry.register_action("log", |config| {
        let task: Log = parse_config("log", config)?;
        Ok(Box::new(task))
    });
    registry.register_action("send-event", |config| {
        let task: SendEvent = parse_config("send-event", config)?;
        Ok(Box::new(task))
    });

    registry.register_condition("check-bool", |config| {
        let task: CheckBool = parse_config("check-bool", config)?;
        Ok(Box::new(task))
    });
    registry.register_condition("check-number", |config| {
        let task: CheckNumber = parse_config("check-number", config)?;
        Ok(Box::new(task))
    });
    registry.register_condition("check-string", |config| {
        let task: CheckString = parse_config("check-string", config)?;
        Ok(Box::new(task))
    });
    registry.register_condition("check-event", |config| {
        let task: CheckEvent = parse_config("check-event", config)?;
        Ok(Box::new(task))
    });
    registry.register_condition("timeout", |config| {
        let task: Timeout = parse_config("timeout", config)?;
        Ok(Box::new(task))
    });
    registry.register_condition("always-true", |_| Ok(Box::new(AlwaysTrue)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_kinds_present() {
        let registry = KindRegistry::with_builtins();
        for kind in [
            "bt/sequence",
            "bt/selector",
            "bt/parallel",
            "bt/switch",
            "bt/inverter",
            "bt/repeater",
            "bt/accessor",
            "bt/interruptor",
            "bt/action",
            "bt/condition",
            "bt/subtree",
            "fsm/state",
            "fsm/any",
            "fsm/concurrent",
        ] {
            assert!(registry.has_node(kind), "missing node kind {kind}");
        }
    }

    #[test]
    fn test_unknown_kinds_error() {
        let registry = KindRegistry::with_builtins();
        assert!(matches!(
            registry.build_node("bt/nope", &serde_json::Value::Null),
            Err(DocumentError::UnknownNodeKind(_))
        ));
        let task = TaskDoc {
            kind: "nope".to_string(),
            config: serde_json::Value::Null,
        };
        assert!(matches!(
            registry.build_action(&task),
            Err(DocumentError::UnknownTaskKind(_))
        ));
    }

    #[test]
    fn test_null_config_uses_defaults() {
        let registry = KindRegistry::with_builtins();
        let node = registry
            .build_node("bt/switch", &serde_json::Value::Null)
            .unwrap();
        assert_eq!(node.type_name(), "switch");
    }

    #[test]
    fn test_bad_config_is_structured() {
        let registry = KindRegistry::with_builtins();
        let task = TaskDoc {
            kind: "check-number".to_string(),
            config: json!({"a": 1.0, "op": "between", "b": 2.0}),
        };
        assert!(matches!(
            registry.build_condition(&task),
            Err(DocumentError::BadConfig { .. })
        ));
    }

    #[test]
    fn test_builds_configured_task() {
        let registry = KindRegistry::with_builtins();
        let task = TaskDoc {
            kind: "wait".to_string(),
            config: json!({"seconds": {"$var": "pause"}}),
        };
        let action = registry.build_action(&task).unwrap();
        assert_eq!(action.name(), "wait");
    }
}
