//! Messages scripts receive and send.

use serde::{Deserialize, Serialize};

use crate::bytecode::{ParseError, StreamReader};
use crate::host::{ObjectId, ObjectRef};
use crate::value::DynamicValue;

/// Event descriptor carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u32,
    pub event_info: u32,
}

impl Event {
    pub const fn new(event_id: u32, event_info: u32) -> Self {
        Self {
            event_id,
            event_info,
        }
    }

    pub(crate) fn read(reader: &mut StreamReader<'_>) -> Result<Self, ParseError> {
        let event_id = reader.read_u32()?;
        let event_info = reader.read_u32()?;
        Ok(Self::new(event_id, event_info))
    }
}

/// Delivery options of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFlags {
    /// Deliver before the sender continues rather than after current work.
    pub immediate: bool,
    /// Propagate to the target's children.
    pub cascade: bool,
    /// Keep delivering after the first consumer.
    pub relay: bool,
}

impl MessageFlags {
    /// Decodes send-instruction flags, where a set bit disables the option.
    pub fn from_instruction_flags(flags: u16) -> Self {
        Self {
            immediate: flags & 0x04 == 0,
            cascade: flags & 0x08 == 0,
            relay: flags & 0x10 == 0,
        }
    }
}

impl Default for MessageFlags {
    fn default() -> Self {
        Self::from_instruction_flags(0)
    }
}

/// The message that triggered a script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContext {
    pub event: Event,
    pub payload: DynamicValue,
    pub source: ObjectRef,
}

impl MessageContext {
    pub fn new(event: Event, payload: DynamicValue, source: ObjectRef) -> Self {
        Self {
            event,
            payload,
            source,
        }
    }
}

/// A message on its way to a target.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDispatch {
    pub message: MessageContext,
    pub target: ObjectId,
    pub cascade: bool,
    pub relay: bool,
}
