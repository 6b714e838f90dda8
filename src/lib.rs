#![forbid(unsafe_code)]

//! Miniscript core – the bytecode loader and interpreter behind script modifiers.
//!
//! The crate exposes the building blocks a host title runtime needs to run
//! compiled miniscript:
//!
//! * [`bytecode`] – the binary instruction-stream format, its endian-aware reader
//!   and the closed opcode table.
//! * [`vm`] – the typed instruction set, the [`Program`](vm::program::Program)
//!   produced by [`parse`](vm::loader::parse), and the per-message
//!   [`MiniscriptThread`](vm::thread::MiniscriptThread) interpreter.
//! * [`references`] – symbolic object references discovered at parse time and the
//!   linking pass that resolves them against a host lookup scope.
//! * [`host`] – the object-graph and runtime contracts a host implements.
//! * [`concurrency`] – the cooperative task stack threads are scheduled on.
//! * [`integration`] – observer hooks for script diagnostics.
//! * [`modifier`] – script owners that start threads for incoming messages.
//!
//! Programs and reference tables are immutable once built and are shared
//! between threads through `Arc`; every thread owns its own operand stack.

pub mod bytecode;
pub mod concurrency;
pub mod host;
pub mod integration;
pub mod memory;
pub mod message;
pub mod modifier;
pub mod references;
pub mod value;
pub mod vm;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::bytecode::{Endianness, ParseError};
pub use crate::concurrency::vthread::{TickResult, VThread};
pub use crate::host::{ObjectGraph, ObjectId, ObjectKind, ObjectRef, ScriptHost, ScriptVThread};
pub use crate::integration::{RuntimeHooks, ScriptDiagnostic, Severity, ThreadEvent};
pub use crate::message::{Event, MessageContext, MessageDispatch, MessageFlags};
pub use crate::modifier::{ConditionalMessenger, ScriptModifier, SendSpec};
pub use crate::references::{LinkingScope, LocalRef, ObjectLinkingScope, ReferenceTable};
pub use crate::value::{AngleMagVector, DynamicValue, IntRange, Label, Point};
pub use crate::vm::loader::{parse, ProgramSource};
pub use crate::vm::program::{Attribute, Program};
pub use crate::vm::thread::{
    InstructionOutcome, MiniscriptThread, ScriptOwner, SharedThread, StackEntry, StackEntryKind,
    ThreadId, ThreadState,
};

/// Result type used across the miniscript core.
pub type MiniscriptResult<T> = std::result::Result<T, MiniscriptError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MiniscriptError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("{message}")]
    Execution { message: String },
    #[error("unexpected runtime state: {0}")]
    Internal(String),
}

impl MiniscriptError {
    pub(crate) fn execution(message: impl Into<String>) -> Self {
        MiniscriptError::Execution {
            message: message.into(),
        }
    }
}

/// Configuration shared by the threads a host creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Instructions a thread may execute in one resume before yielding.
    pub max_steps_per_resume: Option<u64>,
    /// Emit a trace event for every executed instruction.
    pub trace_instructions: bool,
    /// Byte order used by [`RuntimeConfig::source`].
    pub default_endianness: Endianness,
}

impl RuntimeConfig {
    /// Wraps a stream declared in the configured byte order.
    pub fn source(&self, bytecode: Vec<u8>, instruction_count: usize) -> ProgramSource {
        ProgramSource::new(bytecode, instruction_count, self.default_endianness)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps_per_resume: None,
            trace_instructions: false,
            default_endianness: Endianness::Little,
        }
    }
}
