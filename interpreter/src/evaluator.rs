use std::cmp::Ordering;

use spool::instruction::template_string::{TemplateString, TemplateStringPart};
use spool::instruction::value::{BinaryOperator, UnaryOperator, Value};

use crate::builtins;
use crate::environment::Environment;
use crate::error::{DiagnosticError, RuntimeError};
use crate::executor::RenderContext;
use crate::runtime_value::{RuntimeValue, check_size, compare};

pub const MAX_DEPTH: usize = 256;

/// Evaluate a Value AST node to produce a RuntimeValue.
pub fn evaluate(
    value: &Value,
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
    depth: usize,
) -> Result<RuntimeValue, DiagnosticError> {
    if depth > MAX_DEPTH {
        return Err(RuntimeError::StackOverflow.into());
    }

    match value {
        // --- Literals ---
        Value::NoneLiteral => Ok(RuntimeValue::None),
        Value::BooleanLiteral(b) => Ok(RuntimeValue::Bool(*b)),
        Value::IntegerLiteral(n) => Ok(RuntimeValue::Int(*n)),
        Value::FloatLiteral(n) => Ok(RuntimeValue::Float(*n)),
        Value::StringLiteral(s) => Ok(RuntimeValue::Str(s.clone())),

        // --- Displays ---
        Value::List(items) => Ok(RuntimeValue::List(evaluate_all(items, env, ctx, depth + 1)?)),
        Value::Tuple(items) => Ok(RuntimeValue::Tuple(evaluate_all(items, env, ctx, depth + 1)?)),
        Value::Dict(pairs) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                let key = evaluate(key, env, ctx, depth + 1)?;
                let value = evaluate(value, env, ctx, depth + 1)?;
                dict_insert(&mut entries, key, value);
            }
            Ok(RuntimeValue::Dict(entries))
        }

        // --- References ---
        Value::VariableReference(name) => env
            .get_variable(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()).into()),

        // --- Operations ---
        Value::UnaryOperation { operator, operand } => {
            let val = evaluate(operand, env, ctx, depth + 1)?;
            Ok(eval_unary_op(operator, &val)?)
        }

        // `and`/`or` short-circuit and yield one of their operands.
        Value::BinaryOperation {
            operator: BinaryOperator::LogicalAnd,
            left,
            right,
        } => {
            let l = evaluate(left, env, ctx, depth + 1)?;
            if l.is_falsy() {
                Ok(l)
            } else {
                evaluate(right, env, ctx, depth + 1)
            }
        }
        Value::BinaryOperation {
            operator: BinaryOperator::LogicalOr,
            left,
            right,
        } => {
            let l = evaluate(left, env, ctx, depth + 1)?;
            if l.is_truthy() {
                Ok(l)
            } else {
                evaluate(right, env, ctx, depth + 1)
            }
        }

        Value::BinaryOperation {
            operator,
            left,
            right,
        } => {
            let l = evaluate(left, env, ctx, depth + 1)?;
            let r = evaluate(right, env, ctx, depth + 1)?;
            Ok(eval_binary_op(operator, &l, &r)?)
        }

        // --- Conditional ---
        Value::Conditional {
            condition,
            true_branch,
            false_branch,
        } => {
            let cond_val = evaluate(condition, env, ctx, depth + 1)?;
            if cond_val.is_truthy() {
                evaluate(true_branch, env, ctx, depth + 1)
            } else {
                evaluate(false_branch, env, ctx, depth + 1)
            }
        }

        // --- Calls ---
        Value::Call {
            function,
            arguments,
        } => {
            let args = evaluate_all(arguments, env, ctx, depth + 1)?;
            builtins::call_function(function, args, ctx)
        }

        Value::MethodCall {
            receiver,
            method,
            arguments,
        } => {
            // `append` mutates the list bound to the receiver name in place.
            if method == "append"
                && let Value::VariableReference(name) = receiver.as_ref()
            {
                let args = evaluate_all(arguments, env, ctx, depth + 1)?;
                return Ok(append_to(name, args, env)?);
            }
            let receiver = evaluate(receiver, env, ctx, depth + 1)?;
            let args = evaluate_all(arguments, env, ctx, depth + 1)?;
            Ok(builtins::call_method(&receiver, method, args)?)
        }

        Value::Index { target, index } => {
            let target = evaluate(target, env, ctx, depth + 1)?;
            let index = evaluate(index, env, ctx, depth + 1)?;
            Ok(index_value(&target, &index)?)
        }
    }
}

fn evaluate_all(
    values: &[Value],
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
    depth: usize,
) -> Result<Vec<RuntimeValue>, DiagnosticError> {
    values
        .iter()
        .map(|v| evaluate(v, env, ctx, depth))
        .collect()
}

/// Render a literal line: literal parts verbatim, expressions through `str()`.
pub fn eval_template_string(
    ts: &TemplateString,
    env: &mut Environment,
    ctx: &mut RenderContext<'_>,
    depth: usize,
) -> Result<String, DiagnosticError> {
    let mut result = String::new();
    for part in &ts.parts {
        match part {
            TemplateStringPart::Literal(s) => result.push_str(s),
            TemplateStringPart::Expression(expr) => {
                let val = evaluate(expr, env, ctx, depth)?;
                result.push_str(&val.to_string());
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn append_to(
    name: &str,
    mut args: Vec<RuntimeValue>,
    env: &mut Environment,
) -> Result<RuntimeValue, RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::ArgumentCount {
            function: "append".to_string(),
            expected: "1".to_string(),
            got: args.len(),
        });
    }
    match env.get_variable_mut(name) {
        Some(RuntimeValue::List(items)) => {
            items.append(&mut args);
            Ok(RuntimeValue::None)
        }
        Some(other) => Err(RuntimeError::UnknownMethod {
            type_name: other.type_name().to_string(),
            method: "append".to_string(),
        }),
        None => Err(RuntimeError::UndefinedVariable(name.to_string())),
    }
}

/// Insert or replace `key` keeping first-insertion order.
pub(crate) fn dict_insert(
    entries: &mut Vec<(RuntimeValue, RuntimeValue)>,
    key: RuntimeValue,
    value: RuntimeValue,
) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Resolve a possibly negative index against `len`.
pub(crate) fn normalize_index(index: &RuntimeValue, len: usize) -> Result<usize, RuntimeError> {
    let i = index
        .as_int()
        .ok_or_else(|| RuntimeError::type_error("an integer index", index.type_name()))?;
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::IndexOutOfRange { index: i, len });
    }
    Ok(resolved as usize)
}

fn index_value(target: &RuntimeValue, index: &RuntimeValue) -> Result<RuntimeValue, RuntimeError> {
    match target {
        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => {
            Ok(items[normalize_index(index, items.len())?].clone())
        }
        RuntimeValue::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(index, chars.len())?;
            Ok(RuntimeValue::Str(chars[i].to_string()))
        }
        RuntimeValue::Range { .. } => {
            let i = index
                .as_int()
                .ok_or_else(|| RuntimeError::type_error("an integer index", index.type_name()))?;
            target.range_item(i)
        }
        RuntimeValue::Dict(_) => target
            .dict_get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::KeyError(index.repr())),
        other => Err(RuntimeError::type_error("a subscriptable value", other.type_name())),
    }
}

fn eval_unary_op(op: &UnaryOperator, val: &RuntimeValue) -> Result<RuntimeValue, RuntimeError> {
    match (op, val) {
        (UnaryOperator::LogicalNot, v) => Ok(RuntimeValue::Bool(v.is_falsy())),
        (UnaryOperator::Negation, RuntimeValue::Float(n)) => Ok(RuntimeValue::Float(-n)),
        (UnaryOperator::Identity, RuntimeValue::Float(n)) => Ok(RuntimeValue::Float(*n)),
        (UnaryOperator::Negation, v) => match v.as_int() {
            Some(n) => n.checked_neg().map(RuntimeValue::Int).ok_or(RuntimeError::Overflow),
            None => Err(RuntimeError::type_error("a number", v.type_name())),
        },
        (UnaryOperator::Identity, v) => v
            .as_int()
            .map(RuntimeValue::Int)
            .ok_or_else(|| RuntimeError::type_error("a number", v.type_name())),
    }
}

fn operand_error(op: &BinaryOperator, left: &RuntimeValue, right: &RuntimeValue) -> RuntimeError {
    RuntimeError::type_error(
        format!("operands supported by '{}'", op.symbol()),
        format!("{} {} {}", left.type_name(), op.symbol(), right.type_name()),
    )
}

fn arith(
    op: &BinaryOperator,
    left: &RuntimeValue,
    right: &RuntimeValue,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_op(a, b).map(RuntimeValue::Int).ok_or(RuntimeError::Overflow);
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(RuntimeValue::Float(float_op(a, b))),
        _ => Err(operand_error(op, left, right)),
    }
}

/// Repeat count for `seq * n`, checked against the size limit for a
/// sequence of `len` items.
fn repeat_count(len: usize, times: i64) -> Result<usize, RuntimeError> {
    let times = usize::try_from(times.max(0)).map_err(|_| RuntimeError::Overflow)?;
    let total = (len as u128) * (times as u128);
    check_size(total)?;
    Ok(if total == 0 { 0 } else { times })
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, RuntimeError> {
    let times = repeat_count(items.len(), times)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn python_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn python_fmod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
}

fn is_zero(value: &RuntimeValue) -> bool {
    value.as_float() == Some(0.0)
}

fn contains(container: &RuntimeValue, item: &RuntimeValue) -> Result<bool, RuntimeError> {
    match container {
        RuntimeValue::Str(haystack) => match item {
            RuntimeValue::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(RuntimeError::type_error("str on the left of 'in'", other.type_name())),
        },
        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items.contains(item)),
        RuntimeValue::Dict(_) => Ok(container.dict_get(item).is_some()),
        RuntimeValue::Range { .. } => Ok(container.range_contains(item)),
        other => Err(RuntimeError::type_error("a container", other.type_name())),
    }
}

pub fn eval_binary_op(
    op: &BinaryOperator,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> Result<RuntimeValue, RuntimeError> {
    match op {
        BinaryOperator::Addition => match (left, right) {
            (RuntimeValue::Str(a), RuntimeValue::Str(b)) => {
                Ok(RuntimeValue::Str(format!("{}{}", a, b)))
            }
            (RuntimeValue::List(a), RuntimeValue::List(b)) => {
                Ok(RuntimeValue::List([a.as_slice(), b.as_slice()].concat()))
            }
            (RuntimeValue::Tuple(a), RuntimeValue::Tuple(b)) => {
                Ok(RuntimeValue::Tuple([a.as_slice(), b.as_slice()].concat()))
            }
            _ => arith(op, left, right, i64::checked_add, |a, b| a + b),
        },
        BinaryOperator::Subtraction => arith(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOperator::Multiplication => match (left, right) {
            (RuntimeValue::Str(s), n) | (n, RuntimeValue::Str(s)) if n.as_int().is_some() => {
                let times = repeat_count(s.len(), n.as_int().unwrap_or(0))?;
                Ok(RuntimeValue::Str(s.repeat(times)))
            }
            (RuntimeValue::List(items), n) | (n, RuntimeValue::List(items))
                if n.as_int().is_some() =>
            {
                Ok(RuntimeValue::List(repeat(items, n.as_int().unwrap_or(0))?))
            }
            _ => arith(op, left, right, i64::checked_mul, |a, b| a * b),
        },
        BinaryOperator::Division => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(operand_error(op, left, right));
            };
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(RuntimeValue::Float(a / b))
        }
        BinaryOperator::FloorDivision => {
            if left.is_numeric() && is_zero(right) {
                return Err(RuntimeError::DivisionByZero);
            }
            arith(op, left, right, floor_div, |a, b| (a / b).floor())
        }
        BinaryOperator::Modulo => {
            if left.is_numeric() && is_zero(right) {
                return Err(RuntimeError::DivisionByZero);
            }
            arith(op, left, right, python_mod, python_fmod)
        }
        BinaryOperator::Power => {
            if let (Some(base), Some(exp)) = (left.as_int(), right.as_int()) {
                if exp >= 0 {
                    let exp = u32::try_from(exp).map_err(|_| RuntimeError::Overflow)?;
                    return base
                        .checked_pow(exp)
                        .map(RuntimeValue::Int)
                        .ok_or(RuntimeError::Overflow);
                }
                if base == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
            }
            match (left.as_float(), right.as_float()) {
                (Some(a), Some(b)) => Ok(RuntimeValue::Float(a.powf(b))),
                _ => Err(operand_error(op, left, right)),
            }
        }
        BinaryOperator::Equality => Ok(RuntimeValue::Bool(left == right)),
        BinaryOperator::Inequality => Ok(RuntimeValue::Bool(left != right)),
        BinaryOperator::GreaterThan => {
            Ok(RuntimeValue::Bool(compare(left, right)? == Ordering::Greater))
        }
        BinaryOperator::LessThan => Ok(RuntimeValue::Bool(compare(left, right)? == Ordering::Less)),
        BinaryOperator::GreaterThanOrEqual => {
            Ok(RuntimeValue::Bool(compare(left, right)? != Ordering::Less))
        }
        BinaryOperator::LessThanOrEqual => {
            Ok(RuntimeValue::Bool(compare(left, right)? != Ordering::Greater))
        }
        BinaryOperator::In => Ok(RuntimeValue::Bool(contains(right, left)?)),
        BinaryOperator::NotIn => Ok(RuntimeValue::Bool(!contains(right, left)?)),
        BinaryOperator::LogicalAnd => Ok(if left.is_falsy() {
            left.clone()
        } else {
            right.clone()
        }),
        BinaryOperator::LogicalOr => Ok(if left.is_truthy() {
            left.clone()
        } else {
            right.clone()
        }),
    }
}
