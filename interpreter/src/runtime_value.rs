use std::cmp::Ordering;
use std::fmt;

use crate::error::RuntimeError;

/// Largest list or string (in items or bytes) a template may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Fail before allocating a sequence of `len` items past the limit.
pub(crate) fn check_size(len: u128) -> Result<(), RuntimeError> {
    if len > MAX_SEQUENCE_LEN as u128 {
        Err(RuntimeError::TooLarge(len))
    } else {
        Ok(())
    }
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RuntimeValue>),
    Tuple(Vec<RuntimeValue>),
    /// Insertion-ordered key/value pairs; keys are unique under `==`.
    Dict(Vec<(RuntimeValue, RuntimeValue)>),
    Range { start: i64, stop: i64, step: i64 },
}

impl RuntimeValue {
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_falsy(&self) -> bool {
        match self {
            RuntimeValue::None => true,
            RuntimeValue::Bool(b) => !b,
            RuntimeValue::Int(n) => *n == 0,
            RuntimeValue::Float(n) => *n == 0.0,
            RuntimeValue::Str(s) => s.is_empty(),
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => items.is_empty(),
            RuntimeValue::Dict(entries) => entries.is_empty(),
            RuntimeValue::Range { .. } => self.range_len() == 0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::None => "NoneType",
            RuntimeValue::Bool(_) => "bool",
            RuntimeValue::Int(_) => "int",
            RuntimeValue::Float(_) => "float",
            RuntimeValue::Str(_) => "str",
            RuntimeValue::List(_) => "list",
            RuntimeValue::Tuple(_) => "tuple",
            RuntimeValue::Dict(_) => "dict",
            RuntimeValue::Range { .. } => "range",
        }
    }

    /// Number of elements of a range value; zero for anything else.
    /// Computed in `i128` so that ranges spanning all of `i64` do not overflow.
    pub(crate) fn range_len(&self) -> u128 {
        let RuntimeValue::Range { start, stop, step } = *self else {
            return 0;
        };
        let (start, stop, step) = (start as i128, stop as i128, step as i128);
        let distance = if step > 0 { stop - start } else { start - stop };
        if step == 0 || distance <= 0 {
            0
        } else {
            ((distance - 1) / step.abs() + 1) as u128
        }
    }

    /// Element `index` of a range, Python-style negative indices included.
    pub(crate) fn range_item(&self, index: i64) -> Result<RuntimeValue, RuntimeError> {
        let RuntimeValue::Range { start, step, .. } = *self else {
            return Err(RuntimeError::type_error("a range", self.type_name()));
        };
        let len = self.range_len() as i128;
        let resolved = if index < 0 { index as i128 + len } else { index as i128 };
        if resolved < 0 || resolved >= len {
            return Err(RuntimeError::IndexOutOfRange {
                index,
                len: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }
        // In bounds, so the element lies between start and stop.
        Ok(RuntimeValue::Int((start as i128 + resolved * step as i128) as i64))
    }

    /// Membership test for ranges without walking them.
    pub(crate) fn range_contains(&self, item: &RuntimeValue) -> bool {
        let RuntimeValue::Range { start, stop, step } = *self else {
            return false;
        };
        let value = match item {
            RuntimeValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => *f as i64,
            RuntimeValue::Float(_) => return false,
            other => match other.as_int() {
                Some(n) => n,
                None => return false,
            },
        };
        let (value, start, stop, step) =
            (value as i128, start as i128, stop as i128, step as i128);
        let in_bounds = if step == 0 {
            false
        } else if step > 0 {
            start <= value && value < stop
        } else {
            stop < value && value <= start
        };
        in_bounds && (value - start) % step == 0
    }

    /// Integer view of bools and ints.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RuntimeValue::Bool(b) => Some(*b as i64),
            RuntimeValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float view of any numeric value.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RuntimeValue::Float(n) => Some(*n),
            other => other.as_int().map(|n| n as f64),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            RuntimeValue::Bool(_) | RuntimeValue::Int(_) | RuntimeValue::Float(_)
        )
    }

    /// Elements of an iterable value, produced one at a time. Ranges are
    /// stepped lazily; strings yield their characters, dicts their keys.
    pub fn elements(&self) -> Result<Elements, RuntimeError> {
        let items = match self {
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => items.clone(),
            RuntimeValue::Str(s) => s.chars().map(|c| RuntimeValue::Str(c.to_string())).collect(),
            RuntimeValue::Dict(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
            RuntimeValue::Range { start, step, .. } => {
                return Ok(Elements::Range {
                    next: *start as i128,
                    step: *step as i128,
                    remaining: self.range_len(),
                });
            }
            other => return Err(RuntimeError::type_error("an iterable", other.type_name())),
        };
        Ok(Elements::Items(items.into_iter()))
    }

    /// Materialize the elements of an iterable value.
    pub fn iterate(&self) -> Result<Vec<RuntimeValue>, RuntimeError> {
        check_size(self.range_len())?;
        Ok(self.elements()?.collect())
    }

    pub fn len(&self) -> Result<usize, RuntimeError> {
        match self {
            RuntimeValue::Str(s) => Ok(s.chars().count()),
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items.len()),
            RuntimeValue::Dict(entries) => Ok(entries.len()),
            RuntimeValue::Range { .. } => {
                let len = self.range_len();
                if len > i64::MAX as u128 {
                    return Err(RuntimeError::Overflow);
                }
                usize::try_from(len).map_err(|_| RuntimeError::Overflow)
            }
            other => Err(RuntimeError::type_error("a sized value", other.type_name())),
        }
    }

    pub fn dict_get(&self, key: &RuntimeValue) -> Option<&RuntimeValue> {
        match self {
            RuntimeValue::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Python `repr()`: like `str()`, but strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            RuntimeValue::Str(s) => {
                let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
                let mut out = String::with_capacity(s.len() + 2);
                out.push(quote);
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c if c == quote => {
                            out.push('\\');
                            out.push(c);
                        }
                        c => out.push(c),
                    }
                }
                out.push(quote);
                out
            }
            other => other.to_string(),
        }
    }
}

/// Iterator returned by [`RuntimeValue::elements`].
pub enum Elements {
    Range { next: i128, step: i128, remaining: u128 },
    Items(std::vec::IntoIter<RuntimeValue>),
}

impl Iterator for Elements {
    type Item = RuntimeValue;

    fn next(&mut self) -> Option<RuntimeValue> {
        match self {
            Elements::Range {
                next,
                step,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next as i64;
                *remaining -= 1;
                *next += *step;
                Some(RuntimeValue::Int(value))
            }
            Elements::Items(items) => items.next(),
        }
    }
}

fn format_float(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = n.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Python switches to exponent notation outside this window.
        let text = format!("{:e}", n);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        };
    }
    if n.fract() == 0.0 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

fn write_sequence(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[RuntimeValue],
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    write!(f, "{}", close)
}

/// Python `str()` rendering.
impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::None => write!(f, "None"),
            RuntimeValue::Bool(true) => write!(f, "True"),
            RuntimeValue::Bool(false) => write!(f, "False"),
            RuntimeValue::Int(n) => write!(f, "{}", n),
            RuntimeValue::Float(n) => write!(f, "{}", format_float(*n)),
            RuntimeValue::Str(s) => write!(f, "{}", s),
            RuntimeValue::List(items) => write_sequence(f, "[", items, "]"),
            RuntimeValue::Tuple(items) if items.len() == 1 => {
                write!(f, "({},)", items[0].repr())
            }
            RuntimeValue::Tuple(items) => write_sequence(f, "(", items, ")"),
            RuntimeValue::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key.repr(), value.repr())?;
                }
                write!(f, "}}")
            }
            RuntimeValue::Range { start, stop, step } if *step == 1 => {
                write!(f, "range({}, {})", start, stop)
            }
            RuntimeValue::Range { start, stop, step } => {
                write!(f, "range({}, {}, {})", start, stop, step)
            }
        }
    }
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeValue::None, RuntimeValue::None) => true,
            (RuntimeValue::Str(a), RuntimeValue::Str(b)) => a == b,
            (RuntimeValue::List(a), RuntimeValue::List(b))
            | (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => a == b,
            (RuntimeValue::Dict(a), RuntimeValue::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| other.dict_get(k) == Some(v))
                    && b.iter().all(|(k, _)| self.dict_get(k).is_some())
            }
            // Equal when they produce the same sequence.
            (
                RuntimeValue::Range { start: a, step: a_step, .. },
                RuntimeValue::Range { start: b, step: b_step, .. },
            ) => {
                let len = self.range_len();
                len == other.range_len()
                    && (len == 0 || (a == b && (len == 1 || a_step == b_step)))
            }
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => x == y, // NaN != NaN per IEEE 754
                    _ => false,
                },
            },
        }
    }
}

/// Ordering for `<`, `sorted`, `min` and `max`.
pub fn compare(left: &RuntimeValue, right: &RuntimeValue) -> Result<Ordering, RuntimeError> {
    match (left, right) {
        (RuntimeValue::Str(a), RuntimeValue::Str(b)) => Ok(a.cmp(b)),
        (RuntimeValue::List(a), RuntimeValue::List(b))
        | (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    unequal => return Ok(unequal),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        (a, b) => {
            if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                return Ok(x.cmp(&y));
            }
            match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                    RuntimeError::ValueError("cannot order NaN".to_string())
                }),
                _ => Err(RuntimeError::type_error(
                    "comparable values",
                    format!("{} and {}", a.type_name(), b.type_name()),
                )),
            }
        }
    }
}
