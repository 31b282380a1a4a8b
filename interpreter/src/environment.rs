use std::collections::{BTreeMap, HashMap};

use crate::runtime_value::RuntimeValue;

/// Template parameters: string keys, read-only for the whole run.
pub type Params = BTreeMap<String, RuntimeValue>;

/// Name under which the whole parameter map is bound.
pub const PARAMS_BINDING: &str = "params";

/// The variables of one run. Templates have a single flat namespace;
/// loop targets and assignments inside blocks stay visible afterwards.
#[derive(Debug, Default)]
pub struct Environment {
    variables: HashMap<String, RuntimeValue>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// Seed a fresh namespace: every parameter as a top-level name, plus
    /// the `params` dictionary.
    pub fn with_params(params: &Params) -> Self {
        let mut variables: HashMap<String, RuntimeValue> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let dict = params
            .iter()
            .map(|(k, v)| (RuntimeValue::Str(k.clone()), v.clone()))
            .collect();
        variables.insert(PARAMS_BINDING.to_string(), RuntimeValue::Dict(dict));
        Environment { variables }
    }

    pub fn get_variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.variables.get(name)
    }

    pub fn get_variable_mut(&mut self, name: &str) -> Option<&mut RuntimeValue> {
        self.variables.get_mut(name)
    }

    pub fn set_variable(&mut self, name: &str, value: RuntimeValue) {
        self.variables.insert(name.to_string(), value);
    }
}
