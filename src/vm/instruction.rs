use std::convert::TryFrom;

use crate::bytecode::Opcode;
use crate::message::{Event, MessageFlags};
use crate::value::Label;
use crate::vm::builtins::BuiltinFunction;

/// Binary operators producing a number (or a point for point operands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    DivInt,
    Modulo,
}

/// Comparison operators producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessOrEqual,
    Less,
    GreaterOrEqual,
    Greater,
}

impl CompareOp {
    pub fn is_ordered(self) -> bool {
        !matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

/// Literal operand of a push-value instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Null,
    Double(f64),
    Bool(bool),
    /// Index into the reference table.
    LocalRef(u32),
    GlobalRef(u32),
    Label(Label),
}

impl Literal {
    pub const TAG_NULL: u16 = 0x00;
    pub const TAG_DOUBLE: u16 = 0x15;
    pub const TAG_LABEL: u16 = 0x1d;
    pub const TAG_BOOL: u16 = 0x1a;
    pub const TAG_LOCAL_REF: u16 = 0x1f9;
    pub const TAG_GLOBAL_REF: u16 = 0x1fa;
}

/// Well-known objects addressable by push-global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalRef {
    Element,
    Section,
    Scene,
    Project,
    IncomingData,
    Source,
    Mouse,
    Ticks,
    Modifier,
    SharedScene,
    ActiveScene,
}

impl TryFrom<u32> for GlobalRef {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use GlobalRef::*;
        Ok(match value {
            1 => Element,
            2 => Section,
            3 => Scene,
            4 => Project,
            5 => IncomingData,
            6 => Source,
            7 => Mouse,
            8 => Ticks,
            9 => Modifier,
            10 => SharedScene,
            11 => ActiveScene,
            other => return Err(other),
        })
    }
}

/// One decoded instruction.
///
/// Instructions are plain values: they never point at one another, and jumps
/// address their target by distance within the owning program.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Set,
    Send {
        event: Event,
        flags: MessageFlags,
    },
    Arithmetic(ArithmeticOp),
    Compare(CompareOp),
    And,
    Or,
    Neg,
    Not,
    BuiltinFunc(BuiltinFunction),
    StrConcat,
    PointCreate,
    RangeCreate,
    /// Decodes, but is not executable.
    VectorCreate,
    GetChild {
        attribute: u32,
        lvalue: bool,
        indexed: bool,
    },
    ListAppend,
    ListCreate,
    PushValue {
        literal: Literal,
        lvalue: bool,
    },
    PushGlobal {
        global: u32,
        lvalue: bool,
    },
    PushString(String),
    Jump {
        offset: u32,
        conditional: bool,
    },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Set => Opcode::Set,
            Instruction::Send { .. } => Opcode::Send,
            Instruction::Arithmetic(op) => match op {
                ArithmeticOp::Add => Opcode::Add,
                ArithmeticOp::Sub => Opcode::Sub,
                ArithmeticOp::Mul => Opcode::Mul,
                ArithmeticOp::Div => Opcode::Div,
                ArithmeticOp::Pow => Opcode::Pow,
                ArithmeticOp::DivInt => Opcode::DivInt,
                ArithmeticOp::Modulo => Opcode::Modulo,
            },
            Instruction::Compare(op) => match op {
                CompareOp::Equal => Opcode::CmpEqual,
                CompareOp::NotEqual => Opcode::CmpNotEqual,
                CompareOp::LessOrEqual => Opcode::CmpLessOrEqual,
                CompareOp::Less => Opcode::CmpLess,
                CompareOp::GreaterOrEqual => Opcode::CmpGreaterOrEqual,
                CompareOp::Greater => Opcode::CmpGreater,
            },
            Instruction::And => Opcode::And,
            Instruction::Or => Opcode::Or,
            Instruction::Neg => Opcode::Neg,
            Instruction::Not => Opcode::Not,
            Instruction::BuiltinFunc(_) => Opcode::BuiltinFunc,
            Instruction::StrConcat => Opcode::StrConcat,
            Instruction::PointCreate => Opcode::PointCreate,
            Instruction::RangeCreate => Opcode::RangeCreate,
            Instruction::VectorCreate => Opcode::VectorCreate,
            Instruction::GetChild { .. } => Opcode::GetChild,
            Instruction::ListAppend => Opcode::ListAppend,
            Instruction::ListCreate => Opcode::ListCreate,
            Instruction::PushValue { .. } => Opcode::PushValue,
            Instruction::PushGlobal { .. } => Opcode::PushGlobal,
            Instruction::PushString(_) => Opcode::PushString,
            Instruction::Jump { .. } => Opcode::Jump,
        }
    }

    /// Absolute jump target for a jump at position `index`.
    pub fn jump_target(&self, index: usize) -> Option<usize> {
        match self {
            Instruction::Jump { offset, .. } => index.checked_add(*offset as usize),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_variants_keep_their_opcodes() {
        assert_eq!(
            Instruction::Arithmetic(ArithmeticOp::Modulo).opcode(),
            Opcode::Modulo
        );
        assert_eq!(
            Instruction::Compare(CompareOp::GreaterOrEqual).opcode(),
            Opcode::CmpGreaterOrEqual
        );
        assert!(CompareOp::Less.is_ordered());
        assert!(!CompareOp::NotEqual.is_ordered());
    }

    #[test]
    fn jump_targets_are_relative_to_the_jump() {
        let jump = Instruction::Jump {
            offset: 3,
            conditional: false,
        };
        assert_eq!(jump.jump_target(4), Some(7));
        assert_eq!(Instruction::Not.jump_target(4), None);
    }

    #[test]
    fn global_ids_map_to_kinds() {
        assert_eq!(GlobalRef::try_from(1), Ok(GlobalRef::Element));
        assert_eq!(GlobalRef::try_from(11), Ok(GlobalRef::ActiveScene));
        assert_eq!(GlobalRef::try_from(0), Err(0));
        assert_eq!(GlobalRef::try_from(12), Err(12));
    }
}
