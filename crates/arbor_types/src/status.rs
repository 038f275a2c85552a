//! Execution status shared by nodes, connections and whole graphs

use serde::{Deserialize, Serialize};

/// Outcome of executing a node, connection or graph step
///
/// `Resting` is the state of anything that has not executed since its last
/// reset. `Error` is terminal and is reported when execution re-enters a
/// node that is already executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    Failure = 0,
    Success = 1,
    Running = 2,
    Resting = 3,
    Error = 4,
}

impl Status {
    /// Convert from the wire representation
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Status::Failure),
            1 => Some(Status::Success),
            2 => Some(Status::Running),
            3 => Some(Status::Resting),
            4 => Some(Status::Error),
            _ => None,
        }
    }

    /// True while execution is still in flight
    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running)
    }

    /// True once execution has concluded with a definite outcome
    pub fn is_finished(&self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    /// Invert success and failure, leaving every other state untouched
    pub fn inverted(self) -> Self {
        match self {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            other => other,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Resting
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Failure => "failure",
            Status::Success => "success",
            Status::Running => "running",
            Status::Resting => "resting",
            Status::Error => "error",
        };
        write!(f, "{}", s)
    }
}
