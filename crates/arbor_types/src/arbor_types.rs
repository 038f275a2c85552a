//! Arbor Types - Core type definitions for the graph execution engine
//!
//! This crate contains the pure data types shared by every graph system:
//! execution status, the variant value model, the blackboard variable store
//! and blackboard-bindable task parameters.

mod blackboard;
mod param;
mod status;
mod value;

pub use blackboard::*;
pub use param::*;
pub use status::*;
pub use value::*;
