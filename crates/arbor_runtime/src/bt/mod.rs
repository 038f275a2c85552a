//! Behaviour trees: tick-driven execution of a graph from its prime node

mod composites;
mod decorators;
mod leafs;
mod tree;

pub use composites::*;
pub use decorators::*;
pub use leafs::*;
pub use tree::*;
