//! Execution of individual instructions.

use std::sync::Arc;

use crate::host::{AttributeAccess, ObjectId, ObjectKind, ObjectRef, ScriptHost, ScriptVThread};
use crate::message::{Event, MessageContext, MessageDispatch, MessageFlags};
use crate::value::{list_index, DynamicValue, IntRange, Point};
use crate::vm::builtins::BuiltinFunction;
use crate::vm::instruction::{ArithmeticOp, CompareOp, GlobalRef, Instruction, Literal};
use crate::vm::thread::{InstructionOutcome, MiniscriptThread, StackEntry, StackEntryKind};
use crate::{MiniscriptError, MiniscriptResult};

type OpResult = MiniscriptResult<InstructionOutcome>;

const CONTINUE: OpResult = Ok(InstructionOutcome::Continue);

impl MiniscriptThread {
    /// Executes the instruction at `index`; the program counter already points past it.
    pub(crate) fn execute(
        &mut self,
        instruction: &Instruction,
        index: usize,
        host: &mut dyn ScriptHost,
        vthread: &mut ScriptVThread,
    ) -> OpResult {
        match instruction {
            Instruction::Set => self.exec_set(host),
            Instruction::Send { event, flags } => self.exec_send(*event, *flags, host, vthread),
            Instruction::Arithmetic(op) => self.binary(host, |left, right| arithmetic(*op, left, right)),
            Instruction::Compare(op) => self.binary(host, |left, right| compare(*op, left, right)),
            Instruction::And => self.binary(host, |left, right| {
                Ok(DynamicValue::Boolean(left.is_truthy() && right.is_truthy()))
            }),
            Instruction::Or => self.binary(host, |left, right| {
                Ok(DynamicValue::Boolean(left.is_truthy() || right.is_truthy()))
            }),
            Instruction::Neg => self.unary(host, negate),
            Instruction::Not => self.unary(host, |value| Ok(DynamicValue::Boolean(!value.is_truthy()))),
            Instruction::BuiltinFunc(function) => self.exec_builtin(*function, host),
            Instruction::StrConcat => self.binary(host, concat),
            Instruction::PointCreate => self.binary(host, |x, y| {
                let x = integer_coordinate(&x)?;
                let y = integer_coordinate(&y)?;
                Ok(DynamicValue::Point(Point::new(x as i16, y as i16)))
            }),
            Instruction::RangeCreate => self.binary(host, |start, end| {
                let start = integer_coordinate(&start)?;
                let end = integer_coordinate(&end)?;
                Ok(DynamicValue::IntRange(IntRange::new(start, end)))
            }),
            Instruction::VectorCreate => Err(MiniscriptError::execution("Unimplemented instruction")),
            Instruction::GetChild {
                attribute,
                lvalue,
                indexed,
            } => self.exec_get_child(*attribute, *lvalue, *indexed, host),
            Instruction::ListAppend => self.binary(host, |list, value| match list {
                DynamicValue::List(mut items) => {
                    Arc::make_mut(&mut items).push(value);
                    Ok(DynamicValue::List(items))
                }
                _ => Err(MiniscriptError::execution(
                    "Expected list on left side of list_append",
                )),
            }),
            Instruction::ListCreate => {
                self.binary(host, |left, right| Ok(DynamicValue::list(vec![left, right])))
            }
            Instruction::PushValue { literal, lvalue } => self.exec_push_value(literal, *lvalue),
            Instruction::PushGlobal { global, lvalue } => self.exec_push_global(*global, *lvalue, host),
            Instruction::PushString(text) => {
                self.push(StackEntry::rvalue(DynamicValue::String(text.clone())));
                CONTINUE
            }
            Instruction::Jump {
                offset,
                conditional,
            } => self.exec_jump(index, *offset, *conditional, host),
        }
    }

    /// Pops two operands and pushes `op(left, right)` in their place.
    fn binary<F>(&mut self, host: &dyn ScriptHost, op: F) -> OpResult
    where
        F: FnOnce(DynamicValue, DynamicValue) -> MiniscriptResult<DynamicValue>,
    {
        self.require(2)?;
        self.deref_rvalue(0, false, host)?;
        self.deref_rvalue(1, false, host)?;
        let right = self.pop()?.value;
        let left = self.pop()?.value;
        self.push(StackEntry::rvalue(op(left, right)?));
        CONTINUE
    }

    fn unary<F>(&mut self, host: &dyn ScriptHost, op: F) -> OpResult
    where
        F: FnOnce(DynamicValue) -> MiniscriptResult<DynamicValue>,
    {
        self.require(1)?;
        self.deref_rvalue(0, false, host)?;
        let value = self.pop()?.value;
        self.push(StackEntry::rvalue(op(value)?));
        CONTINUE
    }

    fn exec_builtin(&mut self, function: BuiltinFunction, host: &mut dyn ScriptHost) -> OpResult {
        self.require(1)?;
        self.deref_rvalue(0, false, host)?;
        let result = function
            .invoke(&self.top(0)?.value, host)
            .map_err(MiniscriptError::execution)?;
        self.top_mut(0)?.value = result;
        CONTINUE
    }

    fn exec_set(&mut self, host: &mut dyn ScriptHost) -> OpResult {
        if self.stack.len() != 2 {
            return Err(MiniscriptError::execution(
                "Invalid stack state for set instruction",
            ));
        }
        self.deref_rvalue(0, true, host)?;
        let value = self.pop()?.value;
        let target = self.pop()?;

        match target.kind {
            StackEntryKind::LValueAttrib => {
                let id = target
                    .value
                    .as_object()
                    .and_then(|object| object.id())
                    .filter(|id| host.is_alive(*id))
                    .ok_or_else(|| {
                        MiniscriptError::execution("Failed to assign value to proxy")
                    })?;
                host.write_attribute(id, &target.path, value).map_err(|err| {
                    MiniscriptError::execution(format!("Failed to assign value to proxy: {err}"))
                })?;
            }
            StackEntryKind::IncomingData => self.message.payload = value,
            StackEntryKind::RValue | StackEntryKind::LValue => {
                let variable = target
                    .value
                    .as_object()
                    .and_then(|object| host.resolve(object))
                    .filter(|(_, kind)| *kind == ObjectKind::Variable);
                let Some((id, _)) = variable else {
                    return Err(MiniscriptError::execution("Can't assign to rvalue"));
                };
                host.set_variable(id, value).map_err(|err| {
                    MiniscriptError::execution(format!(
                        "Couldn't assign value to variable, probably wrong type: {err}"
                    ))
                })?;
            }
        }
        CONTINUE
    }

    fn exec_send(
        &mut self,
        event: Event,
        flags: MessageFlags,
        host: &mut dyn ScriptHost,
        vthread: &mut ScriptVThread,
    ) -> OpResult {
        if self.stack.len() != 2 {
            return Err(MiniscriptError::execution(
                "Invalid stack state for send instruction",
            ));
        }
        self.deref_rvalue(0, false, host)?;
        self.deref_rvalue(1, true, host)?;
        let target = self.pop()?.value;
        let payload = self.pop()?.value;

        let Some(object) = target.as_object() else {
            self.warn("Invalid message destination (target isn't an object reference)", host);
            return CONTINUE;
        };
        let Some((target, _)) = host.resolve(object) else {
            self.warn("Invalid message destination (target object is invalid)", host);
            return CONTINUE;
        };

        let dispatch = MessageDispatch {
            message: MessageContext::new(event, payload, ObjectRef::new(self.owner.object)),
            target,
            cascade: flags.cascade,
            relay: flags.relay,
        };
        if flags.immediate {
            host.send_message_on_vthread(dispatch, vthread);
            Ok(InstructionOutcome::Yield)
        } else {
            host.queue_message(dispatch);
            CONTINUE
        }
    }

    fn exec_get_child(
        &mut self,
        attribute: u32,
        lvalue: bool,
        indexed: bool,
        host: &dyn ScriptHost,
    ) -> OpResult {
        let name = self
            .program()
            .attribute(attribute)
            .map(|attribute| attribute.name.clone())
            .ok_or_else(|| MiniscriptError::execution("Invalid attribute index"))?;

        let index = if indexed {
            self.require(2)?;
            self.deref_rvalue(0, false, host)?;
            Some(self.pop()?.value)
        } else {
            self.require(1)?;
            None
        };

        let entry = self.top_mut(0)?;
        if lvalue {
            let access = AttributeAccess {
                attribute_index: attribute,
                name,
                index,
            };
            match entry.kind {
                StackEntryKind::LValueAttrib => entry.path.push(access),
                StackEntryKind::IncomingData => {
                    return Err(MiniscriptError::execution(
                        "Tried to l-value index something that was not writeable",
                    ))
                }
                StackEntryKind::RValue | StackEntryKind::LValue => {
                    let Some(object) = entry.value.as_object() else {
                        return Err(MiniscriptError::execution(
                            "Tried to l-value index something that was not writeable",
                        ));
                    };
                    if host.resolve(object).is_none() {
                        return Err(MiniscriptError::execution(format!(
                            "Tried to indirect '{}' using an invalid object reference",
                            access.name
                        )));
                    }
                    entry.kind = StackEntryKind::LValueAttrib;
                    entry.path = vec![access];
                }
            }
            return CONTINUE;
        }

        if matches!(
            entry.kind,
            StackEntryKind::LValueAttrib | StackEntryKind::IncomingData
        ) {
            return Err(MiniscriptError::execution(format!(
                "Unable to read attribute '{name}' from rvalue"
            )));
        }
        let value = match &index {
            Some(index) => read_attribute_indexed(&entry.value, &name, index, host)?,
            None => read_attribute(&entry.value, &name, host)?,
        };
        *entry = StackEntry::rvalue(value);
        CONTINUE
    }

    fn exec_push_value(&mut self, literal: &Literal, lvalue: bool) -> OpResult {
        let value = match literal {
            Literal::Null => DynamicValue::Null,
            Literal::Double(value) => DynamicValue::Float(*value),
            Literal::Bool(value) => DynamicValue::Boolean(*value),
            Literal::LocalRef(index) => {
                let object = self.references().get_ref_by_index(*index as usize);
                let value = DynamicValue::Object(object);
                if lvalue {
                    self.push(StackEntry::lvalue(value));
                    return CONTINUE;
                }
                value
            }
            Literal::GlobalRef(_) => {
                return Err(MiniscriptError::execution(
                    "Global references are not implemented",
                ))
            }
            Literal::Label(label) => DynamicValue::Label(*label),
        };
        self.push(StackEntry::rvalue(value));
        CONTINUE
    }

    fn exec_push_global(&mut self, global: u32, lvalue: bool, host: &dyn ScriptHost) -> OpResult {
        let global = GlobalRef::try_from(global)
            .map_err(|id| MiniscriptError::execution(format!("Unknown global ref type {id}")))?;

        let value = match global {
            GlobalRef::Element | GlobalRef::Section | GlobalRef::Scene | GlobalRef::Project => {
                DynamicValue::Object(self.find_filtered_parent(global, host))
            }
            GlobalRef::Modifier => DynamicValue::Object(ObjectRef::new(self.owner.object)),
            GlobalRef::IncomingData if lvalue => {
                self.push(StackEntry::incoming_data());
                return CONTINUE;
            }
            GlobalRef::IncomingData => self.message.payload.clone(),
            GlobalRef::Source => DynamicValue::Object(self.message.source),
            GlobalRef::Mouse => DynamicValue::Point(host.mouse_position()),
            GlobalRef::Ticks => {
                let ticks = host.play_time_ms().saturating_mul(60) / 1000;
                DynamicValue::Integer(ticks as i32)
            }
            GlobalRef::SharedScene => DynamicValue::Object(host.active_shared_scene().into()),
            GlobalRef::ActiveScene => DynamicValue::Object(host.active_main_scene().into()),
        };
        self.push(StackEntry::rvalue(value));
        CONTINUE
    }

    /// Walks up from the owning modifier to the nearest object matching `global`.
    fn find_filtered_parent(&self, global: GlobalRef, host: &dyn ScriptHost) -> ObjectRef {
        let mut current = Some(self.owner.object);
        while let Some(id) = current {
            let Some(kind) = host.kind(id) else {
                return ObjectRef::empty();
            };
            let matched = match global {
                GlobalRef::Element => kind.is_structural(),
                GlobalRef::Section => kind == ObjectKind::Section,
                GlobalRef::Scene => kind == ObjectKind::Element && parent_is_subsection(id, host),
                GlobalRef::Project => kind == ObjectKind::Project,
                _ => false,
            };
            if matched {
                return ObjectRef::new(id);
            }
            current = host.parent(id);
        }
        ObjectRef::empty()
    }

    fn exec_jump(
        &mut self,
        index: usize,
        offset: u32,
        conditional: bool,
        host: &dyn ScriptHost,
    ) -> OpResult {
        if conditional {
            self.require(1)?;
            self.deref_rvalue(0, false, host)?;
            let condition = self.pop()?.value.is_truthy();
            if condition {
                return CONTINUE;
            }
        }
        let target = index.saturating_add(offset as usize);
        if target > self.program().len() {
            return Err(MiniscriptError::Internal(format!(
                "jump target {target} is outside the program"
            )));
        }
        self.pc = target;
        CONTINUE
    }
}

fn parent_is_subsection(id: ObjectId, host: &dyn ScriptHost) -> bool {
    host.parent(id)
        .and_then(|parent| host.kind(parent))
        .is_some_and(|kind| kind == ObjectKind::Subsection)
}

fn arithmetic(op: ArithmeticOp, left: DynamicValue, right: DynamicValue) -> MiniscriptResult<DynamicValue> {
    if let (DynamicValue::Point(a), DynamicValue::Point(b)) = (&left, &right) {
        let x = apply_arithmetic(op, f64::from(a.x), f64::from(b.x))?;
        let y = apply_arithmetic(op, f64::from(a.y), f64::from(b.y))?;
        return Ok(DynamicValue::Point(Point::new(
            x.round() as i16,
            y.round() as i16,
        )));
    }
    let left = left.as_number().ok_or_else(|| {
        MiniscriptError::execution("Invalid left-side type for binary arithmetic operator")
    })?;
    let right = right.as_number().ok_or_else(|| {
        MiniscriptError::execution("Invalid right-side type for binary arithmetic operator")
    })?;
    apply_arithmetic(op, left, right).map(DynamicValue::Float)
}

fn apply_arithmetic(op: ArithmeticOp, left: f64, right: f64) -> MiniscriptResult<f64> {
    let result = match op {
        ArithmeticOp::Add => left + right,
        ArithmeticOp::Sub => left - right,
        ArithmeticOp::Mul => left * right,
        ArithmeticOp::Div => {
            if right == 0.0 {
                return Err(MiniscriptError::execution("Arithmetic error: Division by zero"));
            }
            left / right
        }
        ArithmeticOp::Pow => {
            if left < 0.0 && right != right.floor() {
                return Err(MiniscriptError::execution(
                    "Arithmetic error: Left side is negative but right side is not an integer",
                ));
            }
            left.powf(right)
        }
        ArithmeticOp::DivInt => {
            if right == 0.0 {
                return Err(MiniscriptError::execution(
                    "Arithmetic error: Integer division by zero",
                ));
            }
            (left / right).floor()
        }
        ArithmeticOp::Modulo => {
            if right == 0.0 {
                return Err(MiniscriptError::execution(
                    "Arithmetic error: Modulo division by zero",
                ));
            }
            left % right
        }
    };
    Ok(result)
}

fn compare(op: CompareOp, left: DynamicValue, right: DynamicValue) -> MiniscriptResult<DynamicValue> {
    if !op.is_ordered() {
        let equal = loose_equality(&left, &right);
        let result = match op {
            CompareOp::NotEqual => equal == Some(false),
            _ => equal == Some(true),
        };
        return Ok(DynamicValue::Boolean(result));
    }

    let left = ordered_operand(&left)
        .ok_or_else(|| MiniscriptError::execution("Left-side value is invalid for comparison"))?;
    let right = ordered_operand(&right)
        .ok_or_else(|| MiniscriptError::execution("Right-side value is invalid for comparison"))?;
    let result = match op {
        CompareOp::LessOrEqual => left <= right,
        CompareOp::Less => left < right,
        CompareOp::GreaterOrEqual => left >= right,
        CompareOp::Greater => left > right,
        CompareOp::Equal | CompareOp::NotEqual => false,
    };
    Ok(DynamicValue::Boolean(result))
}

fn ordered_operand(value: &DynamicValue) -> Option<f64> {
    match value {
        DynamicValue::Integer(i) => Some(f64::from(*i)),
        DynamicValue::Float(f) => Some(*f),
        _ => None,
    }
}

/// Script equality. `None` when a NaN operand makes the comparison undefined,
/// in which case both `=` and `<>` are false.
pub(crate) fn loose_equality(left: &DynamicValue, right: &DynamicValue) -> Option<bool> {
    use DynamicValue as V;

    let bit = |b: bool| if b { 1.0 } else { 0.0 };
    match (left, right) {
        (V::String(a), V::String(b)) => Some(a.eq_ignore_ascii_case(b)),
        (V::String(_), _) => Some(false),
        (V::Boolean(a), V::Integer(b)) => Some(f64::from(*b) == bit(*a)),
        (V::Boolean(a), V::Float(b)) => Some(*b == bit(*a)),
        (V::Boolean(a), V::Boolean(b)) => Some(a == b),
        (V::Boolean(a), _) => Some(!a),
        (V::Float(a), _) if a.is_nan() => None,
        (V::Float(_) | V::Integer(_), V::Float(b)) if b.is_nan() => None,
        (V::Float(a), V::Integer(b)) => Some(*a == f64::from(*b)),
        (V::Float(a), V::Float(b)) => Some(a == b),
        (V::Float(a), V::Boolean(b)) => Some(*a == bit(*b)),
        (V::Integer(a), V::Integer(b)) => Some(a == b),
        (V::Integer(a), V::Float(b)) => Some(f64::from(*a) == *b),
        (V::Integer(a), V::Boolean(b)) => Some(f64::from(*a) == bit(*b)),
        (V::Float(_) | V::Integer(_), _) => Some(false),
        (V::Label(_), V::Boolean(b)) => Some(!b),
        (a, b) => Some(a == b),
    }
}

fn negate(value: DynamicValue) -> MiniscriptResult<DynamicValue> {
    match value {
        DynamicValue::Float(f) => Ok(DynamicValue::Float(-f)),
        DynamicValue::Integer(i32::MIN) => Ok(DynamicValue::Float(-f64::from(i32::MIN))),
        DynamicValue::Integer(i) => Ok(DynamicValue::Integer(-i)),
        _ => Err(MiniscriptError::execution(
            "Couldn't negate a value of a non-numeric type",
        )),
    }
}

fn concat(left: DynamicValue, right: DynamicValue) -> MiniscriptResult<DynamicValue> {
    match (left, right) {
        (DynamicValue::String(mut left), DynamicValue::String(right)) => {
            left.push_str(&right);
            Ok(DynamicValue::String(left))
        }
        (DynamicValue::String(_), _) => Err(MiniscriptError::execution(
            "String concat right side was not a string",
        )),
        _ => Err(MiniscriptError::execution(
            "String concat left side was not a string",
        )),
    }
}

/// Integer coordinate for point and range construction.
///
/// A one-element list stands for its element.
fn integer_coordinate(value: &DynamicValue) -> MiniscriptResult<i32> {
    let value = match value {
        DynamicValue::List(items) if items.len() == 1 => &items[0],
        DynamicValue::List(_) => {
            return Err(MiniscriptError::execution("Can't convert list to integer"))
        }
        other => other,
    };
    match value {
        DynamicValue::Float(f) => Ok((f + 0.5).floor() as i32),
        DynamicValue::Integer(i) => Ok(*i),
        DynamicValue::Boolean(b) => Ok(i32::from(*b)),
        _ => Err(MiniscriptError::execution("Invalid input for point creation")),
    }
}

fn read_attribute(value: &DynamicValue, name: &str, host: &dyn ScriptHost) -> MiniscriptResult<DynamicValue> {
    // Value-type attribute names are matched without regard to case, like object attributes.
    let attribute = name.to_ascii_lowercase();
    let missing = |owner: &str| {
        MiniscriptError::execution(format!("{owner} has no attribute '{name}'"))
    };
    match value {
        DynamicValue::Point(point) => match attribute.as_str() {
            "x" => Ok(DynamicValue::Integer(i32::from(point.x))),
            "y" => Ok(DynamicValue::Integer(i32::from(point.y))),
            _ => Err(missing("Point")),
        },
        DynamicValue::IntRange(range) => match attribute.as_str() {
            "start" => Ok(DynamicValue::Integer(range.start)),
            "end" => Ok(DynamicValue::Integer(range.end)),
            _ => Err(missing("Integer range")),
        },
        DynamicValue::Vector(vector) => match attribute.as_str() {
            "angle" => Ok(DynamicValue::Float(vector.angle_degrees)),
            "magnitude" => Ok(DynamicValue::Float(vector.magnitude)),
            _ => Err(missing("Vector")),
        },
        DynamicValue::List(items) => match attribute.as_str() {
            "count" => Ok(DynamicValue::Integer(
                i32::try_from(items.len()).unwrap_or(i32::MAX),
            )),
            _ => Err(MiniscriptError::execution(format!(
                "Unable to read list attribute '{name}'"
            ))),
        },
        DynamicValue::Object(object) => {
            let (id, _) = host.resolve(*object).ok_or_else(|| {
                MiniscriptError::execution(format!(
                    "Unable to read object attribute '{name}' from invalid object"
                ))
            })?;
            host.read_attribute(id, name).map_err(|err| {
                MiniscriptError::execution(format!(
                    "Unable to read object attribute '{name}': {err}"
                ))
            })
        }
        other => Err(MiniscriptError::execution(format!(
            "Unable to read attribute '{name}' from {}",
            other.type_name()
        ))),
    }
}

fn read_attribute_indexed(
    value: &DynamicValue,
    name: &str,
    index: &DynamicValue,
    host: &dyn ScriptHost,
) -> MiniscriptResult<DynamicValue> {
    match value {
        DynamicValue::List(items) => {
            if !name.eq_ignore_ascii_case("value") {
                return Err(MiniscriptError::execution(format!(
                    "Unable to read list attribute '{name}'"
                )));
            }
            let position = list_index(index)
                .ok_or_else(|| MiniscriptError::execution("Unable to list value at specified index"))?;
            items
                .get(position)
                .cloned()
                .ok_or_else(|| MiniscriptError::execution("List read index out of bounds"))
        }
        DynamicValue::Object(object) => {
            let (id, _) = host.resolve(*object).ok_or_else(|| {
                MiniscriptError::execution(format!(
                    "Unable to read object indexed attribute '{name}' from invalid object"
                ))
            })?;
            host.read_attribute_indexed(id, name, index).map_err(|err| {
                MiniscriptError::execution(format!(
                    "Unable to read object indexed attribute '{name}': {err}"
                ))
            })
        }
        other => Err(MiniscriptError::execution(format!(
            "Unable to read indexed {} attribute '{name}'",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Label;

    fn num(value: f64) -> DynamicValue {
        DynamicValue::Float(value)
    }

    #[test]
    fn arithmetic_promotes_to_float() {
        let sum = arithmetic(ArithmeticOp::Add, DynamicValue::Integer(2), DynamicValue::Boolean(true))
            .expect("add");
        assert_eq!(sum, num(3.0));
        let floored = arithmetic(ArithmeticOp::DivInt, num(-7.0), num(2.0)).expect("div int");
        assert_eq!(floored, num(-4.0));
        let rem = arithmetic(ArithmeticOp::Modulo, num(-7.0), num(2.0)).expect("modulo");
        assert_eq!(rem, num(-1.0));
    }

    #[test]
    fn division_by_zero_fails() {
        for op in [ArithmeticOp::Div, ArithmeticOp::DivInt, ArithmeticOp::Modulo] {
            assert!(arithmetic(op, num(1.0), num(0.0)).is_err());
        }
        assert!(arithmetic(ArithmeticOp::Pow, num(-8.0), num(0.5)).is_err());
        assert_eq!(
            arithmetic(ArithmeticOp::Pow, num(-2.0), num(3.0)).expect("integral exponent"),
            num(-8.0)
        );
    }

    #[test]
    fn points_combine_per_component() {
        let result = arithmetic(
            ArithmeticOp::Div,
            DynamicValue::Point(Point::new(10, 7)),
            DynamicValue::Point(Point::new(4, 2)),
        )
        .expect("point division");
        assert_eq!(result, DynamicValue::Point(Point::new(3, 4)));
        assert!(arithmetic(ArithmeticOp::Add, DynamicValue::Point(Point::new(1, 1)), num(1.0)).is_err());
    }

    #[test]
    fn equality_is_loose() {
        assert_eq!(loose_equality(&"Hello".into(), &"hELLO".into()), Some(true));
        assert_eq!(loose_equality(&"1".into(), &num(1.0)), Some(false));
        assert_eq!(loose_equality(&true.into(), &DynamicValue::Integer(1)), Some(true));
        assert_eq!(loose_equality(&false.into(), &DynamicValue::Null), Some(true));
        assert_eq!(loose_equality(&DynamicValue::Integer(2), &num(2.0)), Some(true));
        assert_eq!(loose_equality(&num(f64::NAN), &num(f64::NAN)), None);
        assert_eq!(loose_equality(&DynamicValue::Integer(1), &num(f64::NAN)), None);
        let label = DynamicValue::Label(Label { super_group: 1, id: 2 });
        assert_eq!(loose_equality(&label, &false.into()), Some(true));
        assert_eq!(loose_equality(&label, &true.into()), Some(false));
    }

    #[test]
    fn undefined_equality_is_false_both_ways() {
        let equal = compare(CompareOp::Equal, num(f64::NAN), num(1.0)).expect("equal");
        let not_equal = compare(CompareOp::NotEqual, num(f64::NAN), num(1.0)).expect("not equal");
        assert_eq!(equal, DynamicValue::Boolean(false));
        assert_eq!(not_equal, DynamicValue::Boolean(false));
    }

    #[test]
    fn ordered_comparison_requires_numbers() {
        let less = compare(CompareOp::Less, DynamicValue::Integer(1), num(1.5)).expect("less");
        assert_eq!(less, DynamicValue::Boolean(true));
        let at_most = compare(CompareOp::LessOrEqual, num(2.0), DynamicValue::Integer(2)).expect("le");
        assert_eq!(at_most, DynamicValue::Boolean(true));
        let at_least = compare(CompareOp::GreaterOrEqual, num(1.0), num(2.0)).expect("ge");
        assert_eq!(at_least, DynamicValue::Boolean(false));
        assert!(compare(CompareOp::Greater, DynamicValue::Boolean(true), num(0.0)).is_err());
    }

    #[test]
    fn negating_the_minimum_integer_widens() {
        assert_eq!(
            negate(DynamicValue::Integer(i32::MIN)).expect("negate"),
            num(2_147_483_648.0)
        );
        assert_eq!(negate(DynamicValue::Integer(5)).expect("negate"), DynamicValue::Integer(-5));
        assert!(negate("x".into()).is_err());
    }

    #[test]
    fn coordinates_round_half_up_and_unwrap_singletons() {
        assert_eq!(integer_coordinate(&num(2.5)).expect("float"), 3);
        assert_eq!(integer_coordinate(&num(-2.5)).expect("float"), -2);
        assert_eq!(integer_coordinate(&true.into()).expect("bool"), 1);
        let single = DynamicValue::list(vec![DynamicValue::Integer(9)]);
        assert_eq!(integer_coordinate(&single).expect("list"), 9);
        let pair = DynamicValue::list(vec![DynamicValue::Integer(1), DynamicValue::Integer(2)]);
        assert!(integer_coordinate(&pair).is_err());
    }

    #[test]
    fn concat_requires_strings() {
        assert_eq!(concat("ab".into(), "cd".into()).expect("concat"), DynamicValue::from("abcd"));
        assert!(concat("ab".into(), num(1.0)).is_err());
    }
}
