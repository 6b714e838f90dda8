//! The fixed builtin function namespace, addressed by ids 1 through 20.

use std::convert::TryFrom;

use crate::host::ScriptHost;
use crate::value::{AngleMagVector, DynamicValue, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BuiltinFunction {
    Sin = 1,
    Cos = 2,
    Random = 3,
    Sqrt = 4,
    Tan = 5,
    Abs = 6,
    Sign = 7,
    Arctangent = 8,
    Exp = 9,
    Ln = 10,
    Log = 11,
    CosH = 12,
    SinH = 13,
    TanH = 14,
    Rect2Polar = 15,
    Polar2Rect = 16,
    Trunc = 17,
    Round = 18,
    Num2Str = 19,
    Str2Num = 20,
}

impl TryFrom<u32> for BuiltinFunction {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use BuiltinFunction::*;
        Ok(match value {
            1 => Sin,
            2 => Cos,
            3 => Random,
            4 => Sqrt,
            5 => Tan,
            6 => Abs,
            7 => Sign,
            8 => Arctangent,
            9 => Exp,
            10 => Ln,
            11 => Log,
            12 => CosH,
            13 => SinH,
            14 => TanH,
            15 => Rect2Polar,
            16 => Polar2Rect,
            17 => Trunc,
            18 => Round,
            19 => Num2Str,
            20 => Str2Num,
            other => return Err(other),
        })
    }
}

impl BuiltinFunction {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Applies the function to an already dereferenced argument.
    pub fn invoke(
        self,
        input: &DynamicValue,
        host: &mut dyn ScriptHost,
    ) -> Result<DynamicValue, String> {
        match self {
            BuiltinFunction::Rect2Polar => builtin_rect_to_polar(input),
            BuiltinFunction::Polar2Rect => builtin_polar_to_rect(input),
            BuiltinFunction::Num2Str => builtin_num2str(input),
            BuiltinFunction::Str2Num => builtin_str2num(input),
            numeric => {
                let value = match input {
                    DynamicValue::Integer(i) => f64::from(*i),
                    DynamicValue::Float(f) => *f,
                    _ => return Err("Invalid numeric function input type".to_string()),
                };
                Ok(DynamicValue::Float(builtin_numeric(numeric, value, host)))
            }
        }
    }
}

fn builtin_numeric(function: BuiltinFunction, input: f64, host: &mut dyn ScriptHost) -> f64 {
    use BuiltinFunction::*;
    match function {
        Sin => input.to_radians().sin(),
        Cos => input.to_radians().cos(),
        Tan => input.to_radians().tan(),
        CosH => input.to_radians().cosh(),
        SinH => input.to_radians().sinh(),
        TanH => input.to_radians().tanh(),
        Arctangent => input.atan().to_degrees(),
        Random => {
            if input < 1.5 {
                0.0
            } else {
                let max = ((input + 0.5).floor() as u32).saturating_sub(1);
                f64::from(host.random_number(max))
            }
        }
        Sqrt => input.sqrt(),
        Abs => input.abs(),
        Sign => {
            if input < 0.0 {
                -1.0
            } else if input > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Exp => input.exp(),
        Ln => input.ln(),
        Log => input.log10(),
        Trunc => input.trunc(),
        Round => input.round(),
        Rect2Polar | Polar2Rect | Num2Str | Str2Num => input,
    }
}

fn builtin_rect_to_polar(input: &DynamicValue) -> Result<DynamicValue, String> {
    let DynamicValue::Point(point) = input else {
        return Err("Rect to polar input must be a point".to_string());
    };
    let (x, y) = (f64::from(point.x), f64::from(point.y));
    Ok(DynamicValue::Vector(AngleMagVector::from_radians(
        y.atan2(x),
        (x * x + y * y).sqrt(),
    )))
}

fn builtin_polar_to_rect(input: &DynamicValue) -> Result<DynamicValue, String> {
    let DynamicValue::Vector(vector) = input else {
        return Err("Polar to rect input must be a vector".to_string());
    };
    let angle = vector.angle_degrees.to_radians();
    let x = angle.cos() * vector.magnitude;
    let y = angle.sin() * vector.magnitude;
    Ok(DynamicValue::Point(Point::new(
        x.round() as i16,
        y.round() as i16,
    )))
}

fn builtin_num2str(input: &DynamicValue) -> Result<DynamicValue, String> {
    match input {
        DynamicValue::Integer(i) => Ok(DynamicValue::String(i.to_string())),
        DynamicValue::Float(f) => Ok(DynamicValue::String(format_general(*f))),
        _ => Err("Invalid input value to num2str".to_string()),
    }
}

fn builtin_str2num(input: &DynamicValue) -> Result<DynamicValue, String> {
    let DynamicValue::String(text) = input else {
        return Err("Invalid input value to str2num".to_string());
    };
    if text.is_empty() {
        return Ok(DynamicValue::Float(0.0));
    }
    parse_leading_number(text)
        .map(DynamicValue::Float)
        .ok_or_else(|| format!("Couldn't parse number from '{text}'"))
}

/// Formats like C's `%g`: six significant digits, trailing zeros dropped,
/// scientific notation outside `1e-4 ..< 1e6`.
pub(crate) fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{value:.5e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parses the longest numeric prefix after leading whitespace, like `%lf`.
fn parse_leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        let frac_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        digits += end - frac_start;
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse().ok()
}
