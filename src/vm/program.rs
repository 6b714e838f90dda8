use crate::memory::Arena;
use crate::vm::instruction::Instruction;

/// Named attribute referenced by child-access instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Immutable compiled script shared by every thread that runs it.
#[derive(Debug, Default)]
pub struct Program {
    instructions: Arena<Instruction>,
    attributes: Vec<Attribute>,
}

impl Program {
    pub(crate) fn new(instructions: Arena<Instruction>, attributes: Vec<Attribute>) -> Self {
        Self {
            instructions,
            attributes,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        self.instructions.as_slice()
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.as_slice().get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, index: u32) -> Option<&Attribute> {
        self.attributes.get(index as usize)
    }
}
