//! Error types for graph construction, documents and the runner

use thiserror::Error;

/// Errors raised while building or driving a graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0} not found in graph")]
    NodeNotFound(u32),

    #[error("connection {0} not found in graph")]
    ConnectionNotFound(u32),

    #[error("a node cannot connect to itself")]
    SelfConnection,

    #[error("nodes are already connected")]
    AlreadyConnected,

    #[error("source node '{node}' is at its limit of {max} outbound connections")]
    MaxOutConnections { node: String, max: usize },

    #[error("target node '{node}' is at its limit of {max} inbound connections")]
    MaxInConnections { node: String, max: usize },

    #[error("node type '{0}' cannot be the prime node")]
    NotAllowedAsPrime(&'static str),

    #[error("graph has no prime node")]
    NoPrimeNode,

    #[error("graph is already running")]
    AlreadyRunning,

    #[error("graph is not running")]
    NotRunning,

    #[error("no state named '{0}' in the state machine")]
    UnknownState(String),
}

/// Errors raised while loading or building a graph document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    #[error("unknown task kind '{0}'")]
    UnknownTaskKind(String),

    #[error("bad config for kind '{kind}'")]
    BadConfig {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate node id '{0}' in document")]
    DuplicateNodeId(String),

    #[error("connection references unknown node id '{0}'")]
    UnknownNodeId(String),

    #[error("expected a '{expected}' graph document")]
    WrongGraphKind { expected: &'static str },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the async graph runner
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner command channel is closed")]
    ChannelClosed,

    #[error("runner task panicked")]
    TaskPanicked,
}
