//! Declared parameter schemas.
//!
//! Each registered method declares its parameters up front as a list of
//! [`ParameterDescriptor`]s. The binder consumes these descriptors; nothing
//! is discovered at request time.

use std::fmt;
use std::sync::Arc;

use kairos_core::FieldErrors;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::validate::Validate;

/// Checks a JSON value against a complex parameter's shape.
pub type ComplexCheck = Arc<dyn Fn(&Value) -> Result<(), FieldErrors> + Send + Sync>;

/// JSON shape expected for a primitive parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// A JSON string.
    String,
    /// A JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// Any JSON value, passed through untouched.
    Any,
}

impl PrimitiveKind {
    /// Returns `true` if `value` has this shape.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
        }
    }

    /// Returns the name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Any => "any",
        }
    }
}

/// How a parameter is supplied.
#[derive(Clone)]
pub enum ParamKind {
    /// A scalar read directly from the body.
    Primitive(PrimitiveKind),
    /// An object read from the body, deserialized and validated.
    Complex {
        /// Name of the target type, for diagnostics.
        type_name: &'static str,
        /// Deserialization and validation check.
        check: ComplexCheck,
    },
    /// A dependency supplied by the container or request context.
    ///
    /// Never looked up in the body.
    Injected,
}

impl fmt::Debug for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => f.debug_tuple("Primitive").field(kind).finish(),
            Self::Complex { type_name, .. } => {
                f.debug_struct("Complex").field("type_name", type_name).finish()
            }
            Self::Injected => f.write_str("Injected"),
        }
    }
}

/// One declared parameter of a service method.
///
/// # Example
///
/// ```
/// use kairos_dispatch::{ParameterDescriptor, PrimitiveKind};
///
/// let page = ParameterDescriptor::integer("page").with_default(1);
/// assert_eq!(page.name(), "page");
/// assert!(page.has_default());
///
/// let repo = ParameterDescriptor::injected("repository");
/// assert!(repo.is_injected());
/// ```
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    name: &'static str,
    kind: ParamKind,
    default: Option<Value>,
}

impl ParameterDescriptor {
    /// Creates a primitive parameter of the given kind.
    #[must_use]
    pub fn primitive(name: &'static str, kind: PrimitiveKind) -> Self {
        Self {
            name,
            kind: ParamKind::Primitive(kind),
            default: None,
        }
    }

    /// Creates a required string parameter.
    #[must_use]
    pub fn string(name: &'static str) -> Self {
        Self::primitive(name, PrimitiveKind::String)
    }

    /// Creates a required integer parameter.
    #[must_use]
    pub fn integer(name: &'static str) -> Self {
        Self::primitive(name, PrimitiveKind::Integer)
    }

    /// Creates a required numeric parameter.
    #[must_use]
    pub fn number(name: &'static str) -> Self {
        Self::primitive(name, PrimitiveKind::Number)
    }

    /// Creates a required boolean parameter.
    #[must_use]
    pub fn boolean(name: &'static str) -> Self {
        Self::primitive(name, PrimitiveKind::Boolean)
    }

    /// Creates a complex parameter bound to `T`.
    ///
    /// The body value is deserialized into `T` and then validated; all
    /// failures for this parameter are collected together.
    #[must_use]
    pub fn complex<T>(name: &'static str) -> Self
    where
        T: DeserializeOwned + Validate + 'static,
    {
        let check: ComplexCheck = Arc::new(|value: &Value| {
            // Deserialize from a borrowed value so the caller's body is untouched.
            let parsed = T::deserialize(value).map_err(|e| {
                let mut errors = FieldErrors::new();
                errors.add("", e.to_string());
                errors
            })?;
            parsed.validate()
        });

        Self {
            name,
            kind: ParamKind::Complex {
                type_name: std::any::type_name::<T>(),
                check,
            },
            default: None,
        }
    }

    /// Creates an injected dependency parameter.
    #[must_use]
    pub fn injected(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Injected,
            default: None,
        }
    }

    /// Declares a default used when the body omits this parameter.
    ///
    /// A `null` default also lets the body send an explicit `null`.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Declares the parameter optional: absent or `null` binds `null`.
    #[must_use]
    pub fn optional(self) -> Self {
        self.with_default(Value::Null)
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns how the parameter is supplied.
    #[must_use]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// Returns the declared default.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns `true` if a default is declared.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Returns `true` for injected dependencies.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        matches!(self.kind, ParamKind::Injected)
    }

    /// Returns `true` if the body must supply this parameter.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.is_injected() && !self.has_default()
    }

    /// Returns `true` if an explicit `null` is accepted.
    #[must_use]
    pub fn accepts_null(&self) -> bool {
        matches!(self.default, Some(Value::Null))
    }
}
