use std::convert::TryFrom;
use std::fmt;

/// Opcodes understood by the miniscript loader.
///
/// The table is closed: any other value makes the whole stream invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Add = 0x0c9,
    Sub = 0x0ca,
    Mul = 0x0cb,
    Div = 0x0cc,
    Pow = 0x0cd,
    And = 0x0ce,
    Or = 0x0cf,
    Neg = 0x0d0,
    Not = 0x0d1,
    CmpEqual = 0x0d2,
    CmpNotEqual = 0x0d3,
    CmpLessOrEqual = 0x0d4,
    CmpLess = 0x0d5,
    CmpGreaterOrEqual = 0x0d6,
    CmpGreater = 0x0d7,
    BuiltinFunc = 0x0d8,
    DivInt = 0x0d9,
    Modulo = 0x0da,
    StrConcat = 0x0db,
    PointCreate = 0x12f,
    RangeCreate = 0x130,
    VectorCreate = 0x131,
    GetChild = 0x135,
    ListAppend = 0x136,
    ListCreate = 0x137,
    PushValue = 0x191,
    PushGlobal = 0x192,
    PushString = 0x193,
    Jump = 0x7d3,
    Set = 0x834,
    Send = 0x898,
}

impl Opcode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Pow => "pow",
            And => "and",
            Or => "or",
            Neg => "neg",
            Not => "not",
            CmpEqual => "cmp_eq",
            CmpNotEqual => "cmp_neq",
            CmpLessOrEqual => "cmp_le",
            CmpLess => "cmp_lt",
            CmpGreaterOrEqual => "cmp_ge",
            CmpGreater => "cmp_gt",
            BuiltinFunc => "builtin_func",
            DivInt => "div_int",
            Modulo => "mod",
            StrConcat => "str_concat",
            PointCreate => "point_create",
            RangeCreate => "range_create",
            VectorCreate => "vector_create",
            GetChild => "get_child",
            ListAppend => "list_append",
            ListCreate => "list_create",
            PushValue => "push_value",
            PushGlobal => "push_global",
            PushString => "push_string",
            Jump => "jump",
            Set => "set",
            Send => "send",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use Opcode::*;
        let opcode = match value {
            0x0c9 => Add,
            0x0ca => Sub,
            0x0cb => Mul,
            0x0cc => Div,
            0x0cd => Pow,
            0x0ce => And,
            0x0cf => Or,
            0x0d0 => Neg,
            0x0d1 => Not,
            0x0d2 => CmpEqual,
            0x0d3 => CmpNotEqual,
            0x0d4 => CmpLessOrEqual,
            0x0d5 => CmpLess,
            0x0d6 => CmpGreaterOrEqual,
            0x0d7 => CmpGreater,
            0x0d8 => BuiltinFunc,
            0x0d9 => DivInt,
            0x0da => Modulo,
            0x0db => StrConcat,
            0x12f => PointCreate,
            0x130 => RangeCreate,
            0x131 => VectorCreate,
            0x135 => GetChild,
            0x136 => ListAppend,
            0x137 => ListCreate,
            0x191 => PushValue,
            0x192 => PushGlobal,
            0x193 => PushString,
            0x7d3 => Jump,
            0x834 => Set,
            0x898 => Send,
            other => return Err(other),
        };
        Ok(opcode)
    }
}
