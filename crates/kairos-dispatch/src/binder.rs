//! Parameter binding.
//!
//! [`bind`] turns a method's declared parameters and a parsed JSON body into
//! [`BoundArguments`], or a [`BindingError`] naming what went wrong.
//!
//! Binding rules, applied in declaration order:
//!
//! 1. Injected parameters are skipped and never read from the body.
//! 2. Body keys match parameter names case-insensitively (Unicode
//!    lowercase mapping), an exact match winning over a case-folded one.
//! 3. An absent parameter takes its default. Without a default, binding
//!    stops at that parameter and reports it alone.
//! 4. Complex values are deserialized and validated; every message for that
//!    parameter is reported together.
//! 5. Primitive values are checked for shape and copied.
//!
//! An empty body (or `{}`) reports every parameter without a default in a
//! single error.

use kairos_core::{FieldErrors, KairosError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::params::{ParamKind, ParameterDescriptor};

/// Errors produced while binding a request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The body is not a JSON object.
    #[error("request body must be a JSON object")]
    MalformedBody {
        /// Parser diagnostic.
        reason: String,
    },

    /// One or more required parameters are absent.
    #[error("missing required parameter{}: {}", if .parameters.len() == 1 { "" } else { "s" }, .parameters.join(", "))]
    Missing {
        /// Names of the missing parameters, in declaration order.
        parameters: Vec<String>,
    },

    /// A present value failed deserialization or validation.
    #[error("invalid parameter: {parameter}")]
    Invalid {
        /// The offending parameter.
        parameter: String,
        /// Every failure for that parameter, keyed by field path.
        errors: FieldErrors,
    },
}

impl BindingError {
    fn invalid(parameter: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(parameter, message);
        Self::Invalid {
            parameter: parameter.to_string(),
            errors,
        }
    }

    /// Returns the parameters this error names.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        match self {
            Self::MalformedBody { .. } => Vec::new(),
            Self::Missing { parameters } => parameters.iter().map(String::as_str).collect(),
            Self::Invalid { parameter, .. } => vec![parameter.as_str()],
        }
    }

    /// Returns the field-level detail of this error.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::MalformedBody { reason } => {
                let mut errors = FieldErrors::new();
                errors.add("body", reason.clone());
                errors
            }
            Self::Missing { parameters } => {
                let mut errors = FieldErrors::new();
                for name in parameters {
                    errors.add(name.clone(), "is required");
                }
                errors
            }
            Self::Invalid { errors, .. } => errors.clone(),
        }
    }
}

impl From<BindingError> for KairosError {
    fn from(err: BindingError) -> Self {
        let fields = err.field_errors();
        KairosError::validation_with_fields(err.to_string(), fields)
    }
}

/// A bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// A value taken from the body or a default.
    Value(Value),
    /// Placeholder for an injected dependency.
    Injected,
}

/// Arguments bound for one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<(&'static str, BoundValue)>,
}

impl BoundArguments {
    /// Returns the number of bound parameters, injected ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &BoundValue)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Returns the raw JSON bound for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.iter().find_map(|(n, v)| match v {
            BoundValue::Value(value) if *n == name => Some(value),
            _ => None,
        })
    }

    /// Deserializes the argument bound for `name`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, KairosError> {
        let value = self.value(name).ok_or_else(|| {
            KairosError::internal(format!("parameter '{name}' was not bound"))
        })?;
        T::deserialize(value).map_err(|e| {
            let mut errors = FieldErrors::new();
            errors.add(name, e.to_string());
            KairosError::validation_with_fields(format!("invalid parameter: {name}"), errors)
        })
    }

    /// Deserializes an optional argument; `null` becomes `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, KairosError> {
        match self.value(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }
}

/// Parses a raw request body into a JSON object.
///
/// An empty or whitespace-only body is treated as `{}`.
pub fn parse_body(raw: &[u8]) -> Result<Map<String, Value>, BindingError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BindingError::MalformedBody {
            reason: format!("expected a JSON object, found {}", json_type(&other)),
        }),
        Err(e) => Err(BindingError::MalformedBody {
            reason: e.to_string(),
        }),
    }
}

/// Binds declared parameters against a parsed body.
///
/// The body is only read, never modified.
pub fn bind(
    parameters: &[ParameterDescriptor],
    body: &Map<String, Value>,
) -> Result<BoundArguments, BindingError> {
    if body.is_empty() {
        let missing: Vec<String> = parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BindingError::Missing {
                parameters: missing,
            });
        }
    }

    let mut bound = BoundArguments::default();

    for param in parameters {
        if param.is_injected() {
            bound.values.push((param.name(), BoundValue::Injected));
            continue;
        }

        let value = match lookup(body, param.name()) {
            Some(value) => value,
            None => match param.default_value() {
                Some(default) => {
                    bound
                        .values
                        .push((param.name(), BoundValue::Value(default.clone())));
                    continue;
                }
                None => {
                    return Err(BindingError::Missing {
                        parameters: vec![param.name().to_string()],
                    })
                }
            },
        };

        if value.is_null() && param.accepts_null() {
            bound.values.push((param.name(), BoundValue::Value(Value::Null)));
            continue;
        }

        match param.kind() {
            ParamKind::Injected => {}
            ParamKind::Primitive(kind) => {
                if !kind.accepts(value) {
                    return Err(BindingError::invalid(
                        param.name(),
                        format!("expected {}, found {}", kind.as_str(), json_type(value)),
                    ));
                }
            }
            ParamKind::Complex { check, .. } => {
                if let Err(errors) = check(value) {
                    return Err(BindingError::Invalid {
                        parameter: param.name().to_string(),
                        errors: prefix_fields(param.name(), errors),
                    });
                }
            }
        }

        bound
            .values
            .push((param.name(), BoundValue::Value(value.clone())));
    }

    Ok(bound)
}

fn lookup<'a>(body: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    body.get(name).or_else(|| {
        body.iter()
            .find(|(key, _)| eq_case_folded(key, name))
            .map(|(_, value)| value)
    })
}

/// Compares two names under Unicode lowercase mapping.
fn eq_case_folded(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn prefix_fields(parameter: &str, errors: FieldErrors) -> FieldErrors {
    let mut prefixed = FieldErrors::new();
    for (field, messages) in errors.fields {
        let path = if field.is_empty() {
            parameter.to_string()
        } else {
            format!("{parameter}.{field}")
        };
        for message in messages {
            prefixed.add(path.clone(), message);
        }
    }
    prefixed
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
