//! Decodes instruction streams into programs.

use std::convert::TryFrom;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::bytecode::{Endianness, Opcode, ParseError, StreamReader, HEADER_SIZE};
use crate::memory::Arena;
use crate::message::{Event, MessageFlags};
use crate::references::{LocalRef, ReferenceTable};
use crate::value::Label;
use crate::vm::builtins::BuiltinFunction;
use crate::vm::instruction::{ArithmeticOp, CompareOp, Instruction, Literal};
use crate::vm::program::{Attribute, Program};

const FLAG_LVALUE: u16 = 0x01;
const FLAG_INDEXED: u16 = 0x20;

const JUMP_UNCONDITIONAL: u32 = 1;
const JUMP_CONDITIONAL: u32 = 2;

/// Everything the host serialization layer supplies for one script.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub bytecode: Vec<u8>,
    pub instruction_count: usize,
    pub endianness: Endianness,
    pub local_refs: Vec<LocalRef>,
    pub attributes: Vec<String>,
}

impl ProgramSource {
    pub fn new(bytecode: Vec<u8>, instruction_count: usize, endianness: Endianness) -> Self {
        Self {
            bytecode,
            instruction_count,
            endianness,
            local_refs: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_local_refs(mut self, local_refs: Vec<LocalRef>) -> Self {
        self.local_refs = local_refs;
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }
}

struct RawInstruction<'a> {
    opcode: u16,
    flags: u16,
    payload: &'a [u8],
}

/// Parses `source` into a shared program and an unlinked reference table.
///
/// Either every declared instruction decodes or the whole stream is rejected;
/// a failed parse leaves nothing behind. Jumps must land inside the program or
/// exactly at its end.
#[instrument(skip_all, fields(instructions = source.instruction_count, bytes = source.bytecode.len()))]
pub fn parse(source: &ProgramSource) -> Result<(Arc<Program>, ReferenceTable), ParseError> {
    if source.bytecode.is_empty() || source.instruction_count == 0 {
        debug!("empty miniscript program");
        return Ok((Arc::new(Program::empty()), ReferenceTable::default()));
    }

    let mut reader = StreamReader::new(&source.bytecode, source.endianness);
    let mut raw = Vec::with_capacity(source.instruction_count);
    for index in 0..source.instruction_count {
        raw.push(read_record(&mut reader, index)?);
    }

    let opcodes = raw
        .iter()
        .enumerate()
        .map(|(index, record)| {
            Opcode::try_from(record.opcode)
                .map_err(|opcode| ParseError::UnknownOpcode { index, opcode })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut instructions = Arena::with_capacity(raw.len());
    for (index, (record, opcode)) in raw.iter().zip(opcodes).enumerate() {
        let mut payload = StreamReader::new(record.payload, source.endianness);
        let instruction = decode_payload(index, opcode, record.flags, &mut payload).map_err(
            |err| match err {
                ParseError::UnexpectedEof { .. } => ParseError::TruncatedPayload { index, opcode },
                other => other,
            },
        )?;
        instructions.allocate(instruction);
    }
    check_jump_targets(instructions.as_slice())?;

    let attributes = source
        .attributes
        .iter()
        .map(|name| Attribute::new(name.clone()))
        .collect::<Vec<_>>();
    let references = ReferenceTable::new(source.local_refs.clone());
    debug!(
        attributes = attributes.len(),
        references = references.len(),
        trailing = reader.remaining(),
        "parsed miniscript program"
    );
    Ok((
        Arc::new(Program::new(instructions, attributes)),
        references,
    ))
}

fn read_record<'a>(
    reader: &mut StreamReader<'a>,
    index: usize,
) -> Result<RawInstruction<'a>, ParseError> {
    let opcode = reader.read_u16()?;
    let flags = reader.read_u16()?;
    let size = reader.read_u16()?;
    if size < HEADER_SIZE {
        return Err(ParseError::InstructionTooSmall { index, size });
    }
    let payload = reader.read_bytes(usize::from(size - HEADER_SIZE))?;
    Ok(RawInstruction {
        opcode,
        flags,
        payload,
    })
}

fn decode_payload(
    index: usize,
    opcode: Opcode,
    flags: u16,
    reader: &mut StreamReader<'_>,
) -> Result<Instruction, ParseError> {
    let instruction = match opcode {
        Opcode::Set => Instruction::Set,
        Opcode::Send => Instruction::Send {
            event: Event::read(reader)?,
            flags: MessageFlags::from_instruction_flags(flags),
        },
        Opcode::Add => Instruction::Arithmetic(ArithmeticOp::Add),
        Opcode::Sub => Instruction::Arithmetic(ArithmeticOp::Sub),
        Opcode::Mul => Instruction::Arithmetic(ArithmeticOp::Mul),
        Opcode::Div => Instruction::Arithmetic(ArithmeticOp::Div),
        Opcode::Pow => Instruction::Arithmetic(ArithmeticOp::Pow),
        Opcode::DivInt => Instruction::Arithmetic(ArithmeticOp::DivInt),
        Opcode::Modulo => Instruction::Arithmetic(ArithmeticOp::Modulo),
        Opcode::CmpEqual => Instruction::Compare(CompareOp::Equal),
        Opcode::CmpNotEqual => Instruction::Compare(CompareOp::NotEqual),
        Opcode::CmpLessOrEqual => Instruction::Compare(CompareOp::LessOrEqual),
        Opcode::CmpLess => Instruction::Compare(CompareOp::Less),
        Opcode::CmpGreaterOrEqual => Instruction::Compare(CompareOp::GreaterOrEqual),
        Opcode::CmpGreater => Instruction::Compare(CompareOp::Greater),
        Opcode::And => Instruction::And,
        Opcode::Or => Instruction::Or,
        Opcode::Neg => Instruction::Neg,
        Opcode::Not => Instruction::Not,
        Opcode::BuiltinFunc => {
            let id = reader.read_u32()?;
            let function = BuiltinFunction::try_from(id)
                .map_err(|id| ParseError::InvalidBuiltin { index, id })?;
            Instruction::BuiltinFunc(function)
        }
        Opcode::StrConcat => Instruction::StrConcat,
        Opcode::PointCreate => Instruction::PointCreate,
        Opcode::RangeCreate => Instruction::RangeCreate,
        Opcode::VectorCreate => Instruction::VectorCreate,
        Opcode::GetChild => Instruction::GetChild {
            attribute: reader.read_u32()?,
            lvalue: flags & FLAG_LVALUE != 0,
            indexed: flags & FLAG_INDEXED != 0,
        },
        Opcode::ListAppend => Instruction::ListAppend,
        Opcode::ListCreate => Instruction::ListCreate,
        Opcode::PushValue => decode_literal(index, flags, reader)?,
        Opcode::PushGlobal => Instruction::PushGlobal {
            global: reader.read_u32()?,
            lvalue: flags & FLAG_LVALUE != 0,
        },
        Opcode::PushString => {
            let len = usize::from(reader.read_u16()?);
            // The length excludes the terminator.
            match reader.read_terminated_str(len + 1)? {
                Some(text) => Instruction::PushString(text),
                None => return Err(ParseError::UnterminatedString { index }),
            }
        }
        Opcode::Jump => {
            let jump_flags = reader.read_u32()?;
            let _unused = reader.read_u32()?;
            let offset = reader.read_u32()?;
            let conditional = match jump_flags {
                JUMP_UNCONDITIONAL => false,
                JUMP_CONDITIONAL => true,
                flags => return Err(ParseError::InvalidJumpFlags { index, flags }),
            };
            if offset == 0 {
                return Err(ParseError::ZeroJumpOffset { index });
            }
            Instruction::Jump {
                offset,
                conditional,
            }
        }
    };
    Ok(instruction)
}

fn decode_literal(
    index: usize,
    flags: u16,
    reader: &mut StreamReader<'_>,
) -> Result<Instruction, ParseError> {
    let tag = reader.read_u16()?;
    let literal = match tag {
        Literal::TAG_NULL => Literal::Null,
        Literal::TAG_DOUBLE => Literal::Double(reader.read_f64()?),
        Literal::TAG_BOOL => Literal::Bool(reader.read_u8()? != 0),
        Literal::TAG_LOCAL_REF => Literal::LocalRef(reader.read_u32()?),
        Literal::TAG_GLOBAL_REF => Literal::GlobalRef(reader.read_u32()?),
        Literal::TAG_LABEL => {
            let super_group = reader.read_u32()?;
            let id = reader.read_u32()?;
            Literal::Label(Label { super_group, id })
        }
        tag => return Err(ParseError::InvalidLiteralTag { index, tag }),
    };
    let lvalue = matches!(literal, Literal::LocalRef(_) | Literal::GlobalRef(_))
        && flags & FLAG_LVALUE != 0;
    Ok(Instruction::PushValue { literal, lvalue })
}

fn check_jump_targets(instructions: &[Instruction]) -> Result<(), ParseError> {
    let count = instructions.len();
    for (index, instruction) in instructions.iter().enumerate() {
        if let Some(target) = instruction.jump_target(index) {
            if target > count {
                return Err(ParseError::JumpOutOfRange {
                    index,
                    target,
                    count,
                });
            }
        }
    }
    Ok(())
}
