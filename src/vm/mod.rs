//! Typed instruction set, program loader and interpreter threads.

pub mod builtins;
pub mod instruction;
pub mod loader;
mod ops;
pub mod program;
pub mod thread;
