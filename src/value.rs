//! Values manipulated by miniscript threads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::host::ObjectRef;

/// Compound `{super group, id}` identifier addressing a named location in content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Label {
    pub super_group: u32,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntRange {
    pub start: i32,
    pub end: i32,
}

impl IntRange {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }
}

/// Polar vector; the angle is kept in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngleMagVector {
    pub angle_degrees: f64,
    pub magnitude: f64,
}

impl AngleMagVector {
    pub fn from_radians(angle: f64, magnitude: f64) -> Self {
        Self {
            angle_degrees: angle.to_degrees(),
            magnitude,
        }
    }
}

/// Tagged value flowing through an operand stack.
///
/// Object handles never keep their target alive; they are looked up through
/// the host graph each time they are used. Lists are shared until written,
/// at which point the writer takes a private copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DynamicValue {
    #[default]
    Null,
    Integer(i32),
    Float(f64),
    Boolean(bool),
    Label(Label),
    Object(ObjectRef),
    String(String),
    Point(Point),
    IntRange(IntRange),
    Vector(AngleMagVector),
    List(Arc<Vec<DynamicValue>>),
}

impl DynamicValue {
    pub fn list(values: Vec<DynamicValue>) -> Self {
        DynamicValue::List(Arc::new(values))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DynamicValue::Null => "null",
            DynamicValue::Integer(_) => "integer",
            DynamicValue::Float(_) => "float",
            DynamicValue::Boolean(_) => "boolean",
            DynamicValue::Label(_) => "label",
            DynamicValue::Object(_) => "object",
            DynamicValue::String(_) => "string",
            DynamicValue::Point(_) => "point",
            DynamicValue::IntRange(_) => "integer range",
            DynamicValue::Vector(_) => "vector",
            DynamicValue::List(_) => "list",
        }
    }

    /// Condition semantics: any non-zero number is true, non-numeric values are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            DynamicValue::Boolean(b) => *b,
            DynamicValue::Integer(i) => *i != 0,
            DynamicValue::Float(f) => *f != 0.0,
            _ => false,
        }
    }

    /// Numeric view used by arithmetic; booleans count as 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DynamicValue::Integer(i) => Some(f64::from(*i)),
            DynamicValue::Float(f) => Some(*f),
            DynamicValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            DynamicValue::Object(object) => Some(*object),
            _ => None,
        }
    }

    /// Replaces a shared list with a private copy of its contents.
    pub(crate) fn detach_list(&mut self) {
        if let DynamicValue::List(list) = self {
            *list = Arc::new(list.as_ref().clone());
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        DynamicValue::Boolean(value)
    }
}

impl From<i32> for DynamicValue {
    fn from(value: i32) -> Self {
        DynamicValue::Integer(value)
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        DynamicValue::Float(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        DynamicValue::String(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        DynamicValue::String(value)
    }
}

impl From<Point> for DynamicValue {
    fn from(value: Point) -> Self {
        DynamicValue::Point(value)
    }
}

impl From<ObjectRef> for DynamicValue {
    fn from(value: ObjectRef) -> Self {
        DynamicValue::Object(value)
    }
}

/// Converts a 1-based list index into a 0-based position.
///
/// Floats are rounded to the nearest integer; non-numeric and non-positive
/// indices are rejected.
pub fn list_index(index: &DynamicValue) -> Option<usize> {
    match index {
        DynamicValue::Integer(i) if *i >= 1 => usize::try_from(*i - 1).ok(),
        DynamicValue::Float(f) => {
            let rounded = (f + 0.5).floor();
            if !rounded.is_finite() || rounded < 1.0 || rounded > f64::from(u32::MAX) {
                return None;
            }
            Some(rounded as usize - 1)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_only_accepts_numbers() {
        assert!(DynamicValue::Boolean(true).is_truthy());
        assert!(DynamicValue::Integer(-3).is_truthy());
        assert!(DynamicValue::Float(0.25).is_truthy());
        assert!(!DynamicValue::Float(0.0).is_truthy());
        assert!(!DynamicValue::from("true").is_truthy());
        assert!(!DynamicValue::Null.is_truthy());
        assert!(!DynamicValue::Point(Point::new(1, 1)).is_truthy());
    }

    #[test]
    fn list_indices_are_one_based() {
        assert_eq!(list_index(&DynamicValue::Integer(1)), Some(0));
        assert_eq!(list_index(&DynamicValue::Float(2.6)), Some(2));
        assert_eq!(list_index(&DynamicValue::Integer(0)), None);
        assert_eq!(list_index(&DynamicValue::Float(0.2)), None);
        assert_eq!(list_index(&DynamicValue::Float(f64::NAN)), None);
        assert_eq!(list_index(&DynamicValue::from("1")), None);
    }

    #[test]
    fn detached_lists_stop_sharing_storage() {
        let original = DynamicValue::list(vec![DynamicValue::Integer(1)]);
        let mut copy = original.clone();
        copy.detach_list();
        match (&original, &copy) {
            (DynamicValue::List(a), DynamicValue::List(b)) => {
                assert!(!Arc::ptr_eq(a, b));
                assert_eq!(a, b);
            }
            _ => panic!("expected lists"),
        }
    }

    #[test]
    fn vectors_store_degrees() {
        let vector = AngleMagVector::from_radians(std::f64::consts::PI, 2.0);
        assert!((vector.angle_degrees - 180.0).abs() < 1e-9);
        assert_eq!(vector.magnitude, 2.0);
    }
}
