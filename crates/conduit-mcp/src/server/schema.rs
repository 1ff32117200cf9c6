//! Object Schema Builder and Argument Validation
//!
//! A minimal emitter for `{"type": "object", ...}` input schemas and the
//! best-effort validation the dispatcher applies to `tools/call`
//! arguments. Validation is intentionally shallow: declared property
//! types are checked with friendly coercions (numeric strings to
//! numbers, scalars to strings), required properties must be present,
//! and everything the schema does not mention passes through untouched.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::{json, Map, Value};

/// Builder for object input schemas
///
/// # Examples
///
/// ```rust
/// use conduit_mcp::server::schema::ObjectSchema;
///
/// let schema = ObjectSchema::new()
///     .number("a", "First operand")
///     .number("b", "Second operand")
///     .build();
///
/// assert_eq!(schema["type"], "object");
/// assert_eq!(schema["required"], serde_json::json!(["a", "b"]));
/// ```
#[derive(Debug, Default)]
pub struct ObjectSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ObjectSchema {
    /// Empty object schema
    pub fn new() -> Self {
        Self::default()
    }

    fn add(
        mut self,
        name: &str,
        type_name: &str,
        description: &str,
        required: bool,
    ) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({"type": type_name, "description": description}),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Required number property
    pub fn number(self, name: &str, description: &str) -> Self {
        self.add(name, "number", description, true)
    }

    /// Required integer property
    pub fn integer(self, name: &str, description: &str) -> Self {
        self.add(name, "integer", description, true)
    }

    /// Required string property
    pub fn string(self, name: &str, description: &str) -> Self {
        self.add(name, "string", description, true)
    }

    /// Required boolean property
    pub fn boolean(self, name: &str, description: &str) -> Self {
        self.add(name, "boolean", description, true)
    }

    /// Optional property with an explicit type name
    pub fn optional(self, name: &str, type_name: &str, description: &str) -> Self {
        self.add(name, type_name, description, false)
    }

    /// Raw property schema, for shapes the helpers do not cover
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Emit the JSON Schema value
    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}

/// Validate tool arguments against an input schema, best effort
///
/// Returns the (possibly coerced) arguments on success, or a
/// human-readable violation on failure. Schemas that are not object
/// schemas pass everything through.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<Value, String> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(arguments.clone());
    };

    let mut object = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => return Err(format!("arguments must be an object, got {other}")),
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                return Err(format!("missing required parameter '{name}'"));
            }
        }
    }

    for (name, property) in properties {
        let Some(value) = object.get(name) else {
            continue;
        };
        let Some(type_name) = property.get("type").and_then(Value::as_str) else {
            continue;
        };
        let coerced = coerce(value, type_name)
            .ok_or_else(|| format!("parameter '{name}' must be of type {type_name}"))?;
        object.insert(name.clone(), coerced);
    }

    Ok(Value::Object(object))
}

fn coerce(value: &Value, type_name: &str) -> Option<Value> {
    match type_name {
        "number" => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        "integer" => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        "string" => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        "boolean" => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        "array" => value.is_array().then(|| value.clone()),
        "object" => value.is_object().then(|| value.clone()),
        _ => Some(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_schema() -> Value {
        ObjectSchema::new()
            .number("a", "First operand")
            .number("b", "Second operand")
            .build()
    }

    #[test]
    fn builder_emits_object_schema() {
        let schema = add_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "number");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn optional_properties_are_not_required() {
        let schema = ObjectSchema::new()
            .string("name", "Name")
            .optional("nickname", "string", "Nickname")
            .build();
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["nickname"]["type"], "string");
    }

    #[test]
    fn valid_arguments_pass_through() {
        let args = json!({"a": 5, "b": 3});
        let validated = validate_arguments(&add_schema(), &args).unwrap();
        assert_eq!(validated, args);
    }

    #[test]
    fn missing_required_parameter_fails() {
        let err = validate_arguments(&add_schema(), &json!({"a": 5})).unwrap_err();
        assert!(err.contains("'b'"));
    }

    #[test]
    fn numeric_strings_coerce_to_numbers() {
        let validated = validate_arguments(&add_schema(), &json!({"a": "5", "b": "3.5"})).unwrap();
        assert_eq!(validated["a"], json!(5.0));
        assert_eq!(validated["b"], json!(3.5));
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = validate_arguments(&add_schema(), &json!({"a": true, "b": 3})).unwrap_err();
        assert!(err.contains("'a'"));
    }

    #[test]
    fn non_object_arguments_are_rejected_for_object_schemas() {
        let err = validate_arguments(&add_schema(), &json!([1, 2])).unwrap_err();
        assert!(err.contains("must be an object"));
    }

    #[test]
    fn schema_without_properties_passes_anything() {
        let schema = json!({"type": "object"});
        let args = json!({"whatever": [1, 2, 3]});
        assert_eq!(validate_arguments(&schema, &args).unwrap(), args);
    }

    #[test]
    fn null_arguments_with_no_required_fields_become_empty_object() {
        let schema = ObjectSchema::new()
            .optional("x", "number", "Optional")
            .build();
        let validated = validate_arguments(&schema, &Value::Null).unwrap();
        assert_eq!(validated, json!({}));
    }

    #[test]
    fn extra_undeclared_properties_pass_through() {
        let validated =
            validate_arguments(&add_schema(), &json!({"a": 1, "b": 2, "c": "extra"})).unwrap();
        assert_eq!(validated["c"], "extra");
    }
}
