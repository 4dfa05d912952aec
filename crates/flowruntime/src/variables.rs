//! Variable context and `{{name}}` placeholder resolution.
//!
//! A leaf string that is exactly one placeholder is replaced by the native
//! value; placeholders embedded in longer text are replaced by the value's
//! display form. Resolution is a single pass: substituted text is never
//! scanned again.

use flowcore::{
    display_value, json_kind, GraphValidationError, ResolutionError, ValidationReport, Value,
    ValueType, Variable,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;
use std::collections::{BTreeSet, HashMap, HashSet};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("name pattern is valid"));

/// Node ids a `{{<nodeId>.<port>}}` placeholder can spell.
static NODE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("id pattern is valid"));

/// Anything placeholders can be looked up in.
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Immutable name → value map built once per run.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    values: HashMap<String, Value>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context, coercing each value to its declared type. Every
    /// duplicate name and uncoercible value is reported.
    pub fn from_variables(variables: &[Variable]) -> Result<Self, ValidationReport> {
        let mut report = ValidationReport::new();
        let mut values = HashMap::with_capacity(variables.len());
        let mut seen = HashSet::with_capacity(variables.len());

        for variable in variables {
            if !VARIABLE_NAME.is_match(&variable.name) {
                report.push(GraphValidationError::InvalidVariable {
                    name: variable.name.clone(),
                    reason: "names must start with a letter or underscore and contain only \
                             letters, digits, '_' or '-'"
                        .to_string(),
                });
                continue;
            }
            if !seen.insert(variable.name.as_str()) {
                report.push(GraphValidationError::DuplicateVariable {
                    name: variable.name.clone(),
                });
                continue;
            }
            match coerce(variable.var_type, &variable.value) {
                Ok(value) => {
                    values.insert(variable.name.clone(), value);
                }
                Err(reason) => report.push(GraphValidationError::InvalidVariable {
                    name: variable.name.clone(),
                    reason,
                }),
            }
        }

        report.into_result()?;
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl VariableLookup for VariableContext {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// The run's variables layered with one node's upstream outputs, which are
/// addressed as `<nodeId>.<port>`. Variables win on a name clash.
pub struct ResolutionScope<'a> {
    variables: &'a VariableContext,
    upstream: HashMap<String, Value>,
}

impl<'a> ResolutionScope<'a> {
    pub fn new(variables: &'a VariableContext) -> Self {
        Self {
            variables,
            upstream: HashMap::new(),
        }
    }

    /// Expose `node_id`'s `port`. Ids outside the placeholder grammar (see
    /// [`is_referenceable`]) are stored but can never be looked up.
    pub fn with_output(&mut self, node_id: &str, port: &str, value: Value) {
        self.upstream.insert(format!("{}.{}", node_id, port), value);
    }
}

impl VariableLookup for ResolutionScope<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables
            .lookup(name)
            .or_else(|| self.upstream.get(name))
    }
}

/// Whether placeholders can address this node's outputs. Ids must start
/// with a letter, digit or '_' and contain only those, '.' and '-'; a node
/// with any other id still runs but cannot be referenced.
pub fn is_referenceable(node_id: &str) -> bool {
    NODE_REFERENCE.is_match(node_id)
}

fn coerce(var_type: ValueType, value: &Value) -> Result<Value, String> {
    if var_type.accepts(value) {
        return Ok(value.clone());
    }
    match (var_type, value) {
        (ValueType::Text, Value::Number(_) | Value::Bool(_)) => {
            Ok(Value::String(display_value(value)))
        }
        (ValueType::Number, Value::String(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::from(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a number", s))
        }
        (ValueType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        _ => Err(format!(
            "expected {} value, got {}",
            var_type,
            json_kind(value)
        )),
    }
}

/// Resolve every placeholder in `value`, walking objects and arrays.
/// All unknown names across the whole value are reported together.
pub fn resolve(value: &Value, scope: &dyn VariableLookup) -> Result<Value, ResolutionError> {
    let mut missing = BTreeSet::new();
    let resolved = resolve_inner(value, scope, &mut missing);
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(ResolutionError::MissingVariables {
            names: missing.into_iter().collect(),
        })
    }
}

/// [`resolve`] over a node's data map.
pub fn resolve_map(
    data: &Map<String, Value>,
    scope: &dyn VariableLookup,
) -> Result<Map<String, Value>, ResolutionError> {
    let mut missing = BTreeSet::new();
    let resolved: Map<String, Value> = data
        .iter()
        .map(|(k, v)| (k.clone(), resolve_inner(v, scope, &mut missing)))
        .collect();
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(ResolutionError::MissingVariables {
            names: missing.into_iter().collect(),
        })
    }
}

/// Names referenced by placeholders anywhere in `value`.
pub fn referenced_names(value: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_names(value, &mut names);
    names
}

fn collect_names(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in PLACEHOLDER.captures_iter(s) {
                names.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_names(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_names(v, names)),
        _ => {}
    }
}

fn resolve_inner(
    value: &Value,
    scope: &dyn VariableLookup,
    missing: &mut BTreeSet<String>,
) -> Value {
    match value {
        Value::String(s) => resolve_str(s, scope, missing),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_inner(v, scope, missing))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_inner(v, scope, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_str(s: &str, scope: &dyn VariableLookup, missing: &mut BTreeSet<String>) -> Value {
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    // A lone placeholder keeps the variable's native type.
    if let Some(caps) = PLACEHOLDER.captures(s) {
        if let Some(whole) = caps.get(0) {
            if whole.start() == 0 && whole.end() == s.len() {
                let name = &caps[1];
                return match scope.lookup(name) {
                    Some(v) => v.clone(),
                    None => {
                        missing.insert(name.to_string());
                        Value::String(s.to_string())
                    }
                };
            }
        }
    }

    let replaced = PLACEHOLDER.replace_all(s, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match scope.lookup(name) {
            Some(v) => display_value(v),
            None => {
                missing.insert(name.to_string());
                caps[0].to_string()
            }
        }
    });
    Value::String(replaced.into_owned())
}
