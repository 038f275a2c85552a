//! Finite state machines: event-driven switching between states

mod machine;
mod states;

pub use machine::*;
pub use states::*;
