use std::cmp::Ordering;
use std::ops::RangeInclusive;

use crate::error::{DiagnosticError, RuntimeError};
use crate::executor::RenderContext;
use crate::include;
use crate::runtime_value::{RuntimeValue, compare};

fn check_arity(
    function: &str,
    args: &[RuntimeValue],
    allowed: RangeInclusive<usize>,
) -> Result<(), RuntimeError> {
    if allowed.contains(&args.len()) {
        return Ok(());
    }
    let expected = if allowed.start() == allowed.end() {
        allowed.start().to_string()
    } else {
        format!("{} to {}", allowed.start(), allowed.end())
    };
    Err(RuntimeError::ArgumentCount {
        function: function.to_string(),
        expected,
        got: args.len(),
    })
}

fn int_arg(function: &str, value: &RuntimeValue) -> Result<i64, RuntimeError> {
    value.as_int().ok_or_else(|| {
        RuntimeError::type_error(format!("int argument to {}()", function), value.type_name())
    })
}

fn str_arg<'a>(function: &str, value: &'a RuntimeValue) -> Result<&'a str, RuntimeError> {
    match value {
        RuntimeValue::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(
            format!("str argument to {}()", function),
            other.type_name(),
        )),
    }
}

/// Sort with the template ordering, reporting the first incomparable pair.
pub fn sort_values(items: &mut [RuntimeValue]) -> Result<(), RuntimeError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        compare(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn extreme(
    function: &str,
    args: Vec<RuntimeValue>,
    keep: Ordering,
) -> Result<RuntimeValue, RuntimeError> {
    let items = match args.as_slice() {
        [single] => single.iterate()?,
        _ => args,
    };
    let mut iter = items.into_iter();
    let mut best = iter.next().ok_or_else(|| {
        RuntimeError::ValueError(format!("{}() arg is an empty sequence", function))
    })?;
    for item in iter {
        if compare(&item, &best)? == keep {
            best = item;
        }
    }
    Ok(best)
}

/// Call a builtin function with evaluated arguments.
pub fn call_function(
    name: &str,
    args: Vec<RuntimeValue>,
    ctx: &mut RenderContext<'_>,
) -> Result<RuntimeValue, DiagnosticError> {
    let value = match name {
        "range" => {
            let ints = args
                .iter()
                .map(|a| int_arg(name, a))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => {
                    check_arity(name, &args, 1..=3)?;
                    return Ok(RuntimeValue::None);
                }
            };
            if step == 0 {
                let message = "range() arg 3 must not be zero".to_string();
                return Err(RuntimeError::ValueError(message).into());
            }
            RuntimeValue::Range { start, stop, step }
        }

        "len" => {
            check_arity(name, &args, 1..=1)?;
            RuntimeValue::Int(args[0].len()? as i64)
        }

        "str" => {
            check_arity(name, &args, 0..=1)?;
            RuntimeValue::Str(args.first().map(|a| a.to_string()).unwrap_or_default())
        }

        "int" => {
            check_arity(name, &args, 0..=1)?;
            match args.first() {
                None => RuntimeValue::Int(0),
                Some(RuntimeValue::Float(n)) if n.is_finite() => {
                    RuntimeValue::Int(n.trunc() as i64)
                }
                Some(RuntimeValue::Str(s)) => {
                    RuntimeValue::Int(s.trim().parse::<i64>().map_err(|_| {
                        RuntimeError::ValueError(format!("invalid literal for int(): '{}'", s))
                    })?)
                }
                Some(other) => RuntimeValue::Int(int_arg(name, other)?),
            }
        }

        "float" => {
            check_arity(name, &args, 0..=1)?;
            match args.first() {
                None => RuntimeValue::Float(0.0),
                Some(RuntimeValue::Str(s)) => {
                    RuntimeValue::Float(s.trim().parse::<f64>().map_err(|_| {
                        let message = format!("could not convert string to float: '{}'", s);
                        RuntimeError::ValueError(message)
                    })?)
                }
                Some(other) => RuntimeValue::Float(other.as_float().ok_or_else(|| {
                    RuntimeError::type_error("a number or string", other.type_name())
                })?),
            }
        }

        "bool" => {
            check_arity(name, &args, 0..=1)?;
            RuntimeValue::Bool(args.first().is_some_and(|a| a.is_truthy()))
        }

        "list" => {
            check_arity(name, &args, 0..=1)?;
            match args.first() {
                None => RuntimeValue::List(Vec::new()),
                Some(iterable) => RuntimeValue::List(iterable.iterate()?),
            }
        }

        "sorted" => {
            check_arity(name, &args, 1..=1)?;
            let mut items = args[0].iterate()?;
            sort_values(&mut items)?;
            RuntimeValue::List(items)
        }

        "enumerate" => {
            check_arity(name, &args, 1..=2)?;
            let start = match args.get(1) {
                Some(start) => int_arg(name, start)?,
                None => 0,
            };
            RuntimeValue::List(
                args[0]
                    .iterate()?
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| RuntimeValue::Tuple(vec![RuntimeValue::Int(i), item]))
                    .collect(),
            )
        }

        "min" | "max" => {
            if args.is_empty() {
                return Err(RuntimeError::ArgumentCount {
                    function: name.to_string(),
                    expected: "at least 1".to_string(),
                    got: 0,
                }
                .into());
            }
            let keep = if name == "min" { Ordering::Less } else { Ordering::Greater };
            extreme(name, args, keep)?
        }

        "abs" => {
            check_arity(name, &args, 1..=1)?;
            match &args[0] {
                RuntimeValue::Float(n) => RuntimeValue::Float(n.abs()),
                other => RuntimeValue::Int(
                    int_arg(name, other)?
                        .checked_abs()
                        .ok_or(RuntimeError::Overflow)?,
                ),
            }
        }

        "output" => {
            check_arity(name, &args, 1..=1)?;
            ctx.sink.push(args[0].to_string());
            RuntimeValue::None
        }

        "include" => {
            check_arity(name, &args, 1..=1)?;
            let path = str_arg(name, &args[0])?;
            include::include(path, ctx)?;
            RuntimeValue::None
        }

        other => return Err(RuntimeError::UndefinedFunction(other.to_string()).into()),
    };
    Ok(value)
}

/// Call a non-mutating method on an evaluated receiver.
pub fn call_method(
    receiver: &RuntimeValue,
    method: &str,
    args: Vec<RuntimeValue>,
) -> Result<RuntimeValue, RuntimeError> {
    let unknown = || RuntimeError::UnknownMethod {
        type_name: receiver.type_name().to_string(),
        method: method.to_string(),
    };

    match receiver {
        RuntimeValue::Str(s) => string_method(s, method, &args).unwrap_or_else(|| Err(unknown())),

        RuntimeValue::Dict(entries) => match method {
            "items" => {
                check_arity(method, &args, 0..=0)?;
                Ok(RuntimeValue::List(
                    entries
                        .iter()
                        .map(|(k, v)| RuntimeValue::Tuple(vec![k.clone(), v.clone()]))
                        .collect(),
                ))
            }
            "keys" => {
                check_arity(method, &args, 0..=0)?;
                Ok(RuntimeValue::List(entries.iter().map(|(k, _)| k.clone()).collect()))
            }
            "values" => {
                check_arity(method, &args, 0..=0)?;
                Ok(RuntimeValue::List(entries.iter().map(|(_, v)| v.clone()).collect()))
            }
            "get" => {
                check_arity(method, &args, 1..=2)?;
                Ok(receiver
                    .dict_get(&args[0])
                    .or(args.get(1))
                    .cloned()
                    .unwrap_or(RuntimeValue::None))
            }
            _ => Err(unknown()),
        },

        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => match method {
            "index" => {
                check_arity(method, &args, 1..=1)?;
                items
                    .iter()
                    .position(|item| *item == args[0])
                    .map(|i| RuntimeValue::Int(i as i64))
                    .ok_or_else(|| {
                        let message =
                            format!("{} is not in {}", args[0].repr(), receiver.type_name());
                        RuntimeError::ValueError(message)
                    })
            }
            "append" => Err(RuntimeError::type_error(
                "a list bound to a name",
                "a temporary list",
            )),
            _ => Err(unknown()),
        },

        _ => Err(unknown()),
    }
}

fn string_method(
    s: &str,
    method: &str,
    args: &[RuntimeValue],
) -> Option<Result<RuntimeValue, RuntimeError>> {
    let result = match method {
        "upper" => check_arity(method, args, 0..=0).map(|_| RuntimeValue::Str(s.to_uppercase())),
        "lower" => check_arity(method, args, 0..=0).map(|_| RuntimeValue::Str(s.to_lowercase())),
        "title" => check_arity(method, args, 0..=0).map(|_| RuntimeValue::Str(title_case(s))),
        "strip" => check_arity(method, args, 0..=1).and_then(|_| match args.first() {
            None => Ok(RuntimeValue::Str(s.trim().to_string())),
            Some(chars) => {
                let chars = str_arg(method, chars)?;
                Ok(RuntimeValue::Str(
                    s.trim_matches(|c| chars.contains(c)).to_string(),
                ))
            }
        }),
        "replace" => check_arity(method, args, 2..=2).and_then(|_| {
            let old = str_arg(method, &args[0])?;
            let new = str_arg(method, &args[1])?;
            Ok(RuntimeValue::Str(s.replace(old, new)))
        }),
        "split" => check_arity(method, args, 0..=1).and_then(|_| {
            let parts: Vec<RuntimeValue> = match args.first() {
                None | Some(RuntimeValue::None) => s
                    .split_whitespace()
                    .map(|p| RuntimeValue::Str(p.to_string()))
                    .collect(),
                Some(sep) => {
                    let sep = str_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::ValueError("empty separator".into()));
                    }
                    s.split(sep).map(|p| RuntimeValue::Str(p.to_string())).collect()
                }
            };
            Ok(RuntimeValue::List(parts))
        }),
        "join" => check_arity(method, args, 1..=1).and_then(|_| {
            let pieces = args[0]
                .iterate()?
                .iter()
                .map(|item| str_arg(method, item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RuntimeValue::Str(pieces.join(s)))
        }),
        "startswith" => check_arity(method, args, 1..=1)
            .and_then(|_| Ok(RuntimeValue::Bool(s.starts_with(str_arg(method, &args[0])?)))),
        "endswith" => check_arity(method, args, 1..=1)
            .and_then(|_| Ok(RuntimeValue::Bool(s.ends_with(str_arg(method, &args[0])?)))),
        "format" => format_string(s, args).map(RuntimeValue::Str),
        _ => return None,
    };
    Some(result)
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// `str.format` with positional fields: `{}`, `{0}`, `{{` and `}}`.
fn format_string(template: &str, args: &[RuntimeValue]) -> Result<String, RuntimeError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(RuntimeError::ValueError(
                                "single '{' encountered in format string".into(),
                            ));
                        }
                    }
                }
                let index = if field.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    field
                        .parse::<usize>()
                        .map_err(|_| RuntimeError::KeyError(field.clone()))?
                };
                let value = args.get(index).ok_or(RuntimeError::IndexOutOfRange {
                    index: index as i64,
                    len: args.len(),
                })?;
                out.push_str(&value.to_string());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(RuntimeError::ValueError(
                    "single '}' encountered in format string".into(),
                ));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> RuntimeValue {
        RuntimeValue::Str(text.to_string())
    }

    #[test]
    fn string_methods() {
        assert_eq!(call_method(&s("hello world"), "title", vec![]).unwrap(), s("Hello World"));
        assert_eq!(call_method(&s("  x "), "strip", vec![]).unwrap(), s("x"));
        assert_eq!(call_method(&s("xxaxx"), "strip", vec![s("x")]).unwrap(), s("a"));
        assert_eq!(
            call_method(&s("a,b"), "split", vec![s(",")]).unwrap(),
            RuntimeValue::List(vec![s("a"), s("b")])
        );
        assert_eq!(
            call_method(&s(", "), "join", vec![RuntimeValue::List(vec![s("a"), s("b")])]).unwrap(),
            s("a, b")
        );
        assert_eq!(
            call_method(&s("{} = {{{}}}"), "format", vec![s("k"), RuntimeValue::Int(1)]).unwrap(),
            s("k = {1}")
        );
        assert!(call_method(&s("x"), "frobnicate", vec![]).is_err());
    }

    #[test]
    fn dict_methods() {
        let d = RuntimeValue::Dict(vec![(s("a"), RuntimeValue::Int(1))]);
        assert_eq!(
            call_method(&d, "items", vec![]).unwrap(),
            RuntimeValue::List(vec![RuntimeValue::Tuple(vec![s("a"), RuntimeValue::Int(1)])])
        );
        assert_eq!(
            call_method(&d, "get", vec![s("z"), RuntimeValue::Int(9)]).unwrap(),
            RuntimeValue::Int(9)
        );
        assert_eq!(call_method(&d, "get", vec![s("z")]).unwrap(), RuntimeValue::None);
    }

    #[test]
    fn arity_is_checked() {
        let err = call_method(&s("x"), "upper", vec![s("y")]).unwrap_err();
        assert_eq!(err.to_string(), "upper() takes 0 argument(s), got 1");
    }

    #[test]
    fn sorting_reports_incomparable_values() {
        let mut items = vec![RuntimeValue::Int(2), RuntimeValue::Int(1)];
        sort_values(&mut items).unwrap();
        assert_eq!(items, vec![RuntimeValue::Int(1), RuntimeValue::Int(2)]);
        let mut mixed = vec![RuntimeValue::Int(2), s("a")];
        assert!(sort_values(&mut mixed).is_err());
    }
}
