//! Tagged parameter schemas for tools.
//!
//! Each tool declares its parameters as a static list of [`ParamSpec`]s. The
//! same declaration renders the JSON Schema advertised in `tools/list` and
//! validates incoming arguments before a call is dispatched, so the two can
//! never drift apart.

use serde_json::{json, Map, Value};

use super::error::ValidationError;

/// Argument map as it travels between the protocol layer and the upstream.
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String {
        max_length: Option<usize>,
    },
    Integer {
        minimum: i64,
        maximum: i64,
        default: Option<i64>,
    },
    Enum {
        values: &'static [&'static str],
        default: Option<&'static str>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Required string parameter.
    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::String { max_length: None },
        }
    }

    /// Required string parameter capped at `max_length` characters.
    pub const fn text(name: &'static str, description: &'static str, max_length: usize) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::String {
                max_length: Some(max_length),
            },
        }
    }

    /// Optional bounded integer with a default.
    pub const fn integer(
        name: &'static str,
        description: &'static str,
        minimum: i64,
        maximum: i64,
        default: i64,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Integer {
                minimum,
                maximum,
                default: Some(default),
            },
        }
    }

    /// Optional string restricted to `values`, falling back to `default`.
    pub const fn one_of(
        name: &'static str,
        description: &'static str,
        values: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Enum {
                values,
                default: Some(default),
            },
        }
    }

    pub const fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }

    fn json_schema(&self) -> Value {
        match self.kind {
            ParamKind::String { max_length } => {
                let mut s = json!({ "type": "string", "description": self.description });
                if let Some(max) = max_length {
                    s["maxLength"] = json!(max);
                }
                s
            }
            ParamKind::Integer {
                minimum,
                maximum,
                default,
            } => {
                let mut s = json!({
                    "type": "integer",
                    "description": self.description,
                    "minimum": minimum,
                    "maximum": maximum,
                });
                if let Some(d) = default {
                    s["default"] = json!(d);
                }
                s
            }
            ParamKind::Enum { values, default } => {
                let mut s = json!({
                    "type": "string",
                    "description": self.description,
                    "enum": values,
                });
                if let Some(d) = default {
                    s["default"] = json!(d);
                }
                s
            }
        }
    }

    fn default_value(&self) -> Option<Value> {
        match self.kind {
            ParamKind::String { .. } => None,
            ParamKind::Integer { default, .. } => default.map(Value::from),
            ParamKind::Enum { default, .. } => default.map(Value::from),
        }
    }

    fn check(&self, value: &Value) -> Result<Value, ValidationError> {
        match self.kind {
            ParamKind::String { max_length } => {
                let s = value.as_str().ok_or(ValidationError::WrongType {
                    name: self.name,
                    expected: "a string",
                })?;
                if let Some(max) = max_length {
                    if s.chars().count() > max {
                        return Err(ValidationError::TooLong {
                            name: self.name,
                            max,
                        });
                    }
                }
                Ok(value.clone())
            }
            ParamKind::Integer {
                minimum, maximum, ..
            } => {
                let n = value.as_i64().ok_or(ValidationError::WrongType {
                    name: self.name,
                    expected: "an integer",
                })?;
                if n < minimum || n > maximum {
                    return Err(ValidationError::OutOfRange {
                        name: self.name,
                        min: minimum,
                        max: maximum,
                    });
                }
                Ok(Value::from(n))
            }
            ParamKind::Enum { values, .. } => {
                let s = value.as_str().ok_or(ValidationError::WrongType {
                    name: self.name,
                    expected: "a string",
                })?;
                if !values.contains(&s) {
                    return Err(ValidationError::NotAllowed {
                        name: self.name,
                        allowed: values,
                    });
                }
                Ok(value.clone())
            }
        }
    }
}

/// Static description of one tool: its name, the upstream operation it
/// maps to, and its declared parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub operation: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// Render the `inputSchema` object. `extra` params (credentials) are
    /// appended after the tool's own.
    pub fn input_schema(&self, extra: &[ParamSpec]) -> Params {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in self.params.iter().chain(extra) {
            properties.insert(p.name.to_string(), p.json_schema());
            if p.required {
                required.push(Value::from(p.name));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), Value::Array(required));
        schema
    }

    /// Check `args` against the declared params. The result holds only
    /// declared params, with defaults filled in; anything else is dropped.
    pub fn validate(&self, args: &Params) -> Result<Params, ValidationError> {
        let mut out = Params::new();
        for p in self.params {
            match args.get(p.name) {
                Some(Value::Null) | None => {
                    if let Some(d) = p.default_value() {
                        out.insert(p.name.to_string(), d);
                    } else if p.required {
                        return Err(ValidationError::Missing(p.name));
                    }
                }
                Some(v) => {
                    out.insert(p.name.to_string(), p.check(v)?);
                }
            }
        }
        Ok(out)
    }
}
