use std::path::Path;

use interpreter::{Params, RuntimeValue};

/// Convert a TOML value into the runtime value a template sees.
pub fn toml_to_runtime(value: &toml::Value) -> RuntimeValue {
    match value {
        toml::Value::String(s) => RuntimeValue::Str(s.clone()),
        toml::Value::Integer(n) => RuntimeValue::Int(*n),
        toml::Value::Float(f) => RuntimeValue::Float(*f),
        toml::Value::Boolean(b) => RuntimeValue::Bool(*b),
        toml::Value::Datetime(d) => RuntimeValue::Str(d.to_string()),
        toml::Value::Array(items) => {
            RuntimeValue::List(items.iter().map(toml_to_runtime).collect())
        }
        toml::Value::Table(table) => RuntimeValue::Dict(
            table
                .iter()
                .map(|(k, v)| (RuntimeValue::Str(k.clone()), toml_to_runtime(v)))
                .collect(),
        ),
    }
}

pub fn params_from_table(table: &toml::Table) -> Params {
    table
        .iter()
        .map(|(k, v)| (k.clone(), toml_to_runtime(v)))
        .collect()
}

/// Read a TOML file whose top-level table is the parameter map.
pub fn load_params_file(path: &Path) -> Result<Params, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let table: toml::Table = toml::from_str(&text)
        .map_err(|e| format!("invalid parameter file '{}': {}", path.display(), e))?;
    Ok(params_from_table(&table))
}

/// Split a `key=value` command-line parameter. Values are always strings.
pub fn parse_param(arg: &str) -> Result<(String, RuntimeValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("parameter '{}' is not of the form key=value", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("parameter '{}' has an empty name", arg));
    }
    Ok((key.to_string(), RuntimeValue::Str(value.to_string())))
}
