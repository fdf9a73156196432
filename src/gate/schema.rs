//! Declarative request body shapes.
//!
//! A [`Shape`] is checked against a decoded JSON object. Validation never
//! stops at the first bad field: every failure is collected under its dotted
//! path (`items.0.lat`) so the caller gets the whole picture in one response.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    /// Accepts integers as well and widens them.
    Float,
    Boolean,
    Object(Shape),
    List(Box<FieldKind>),
}

impl FieldKind {
    pub fn list_of(item: FieldKind) -> Self {
        FieldKind::List(Box::new(item))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    min: Option<f64>,
    max: Option<f64>,
    max_length: Option<usize>,
}

impl Field {
    /// A required field. Use [`Field::optional`] or [`Field::default_value`]
    /// to relax it.
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            min: None,
            max: None,
            max_length: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value substituted when the key is absent or null. Implies optional.
    pub fn default_value(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    /// Character limit for strings, element limit for lists.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn check_bounds(&self, value: &Value, path: &str, errors: &mut BTreeMap<String, String>) -> bool {
        if let Some(number) = value.as_f64() {
            if let Some(min) = self.min {
                if number < min {
                    errors.insert(
                        path.to_string(),
                        format!("{} is less than minimum value {}", value, min),
                    );
                    return false;
                }
            }
            if let Some(max) = self.max {
                if number > max {
                    errors.insert(
                        path.to_string(),
                        format!("{} is greater than maximum value {}", value, max),
                    );
                    return false;
                }
            }
        }

        if let Some(limit) = self.max_length {
            let length = match value {
                Value::String(s) => Some(s.chars().count()),
                Value::Array(items) => Some(items.len()),
                _ => None,
            };
            if length.is_some_and(|length| length > limit) {
                errors.insert(path.to_string(), format!("Longer than maximum length {}", limit));
                return false;
            }
        }

        true
    }
}

/// Ordered set of fields describing a JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    fields: Vec<Field>,
}

/// Validation failed for at least one field.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaInvalid {
    /// The fields that did validate.
    pub partial: Map<String, Value>,
    /// Failure message per dotted field path.
    pub errors: BTreeMap<String, String>,
}

impl SchemaInvalid {
    pub fn description(&self) -> Value {
        Value::Object(
            self.errors
                .iter()
                .map(|(path, message)| (path.clone(), Value::String(message.clone())))
                .collect(),
        )
    }
}

impl fmt::Display for SchemaInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(path, message)| format!("{}: {}", path, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for SchemaInvalid {}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks `data` against the shape. Keys the shape does not declare are
    /// dropped from the result.
    pub fn validate(&self, data: &Map<String, Value>) -> Result<Map<String, Value>, SchemaInvalid> {
        let mut errors = BTreeMap::new();
        let partial = self.validate_object(data, "", &mut errors);

        if errors.is_empty() {
            Ok(partial)
        } else {
            Err(SchemaInvalid { partial, errors })
        }
    }

    fn validate_object(
        &self,
        data: &Map<String, Value>,
        prefix: &str,
        errors: &mut BTreeMap<String, String>,
    ) -> Map<String, Value> {
        let mut validated = Map::new();

        for field in &self.fields {
            let path = join_path(prefix, &field.name);
            match data.get(&field.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        validated.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        errors.insert(path, "Required".to_string());
                    }
                }
                Some(value) => {
                    if let Some(value) = validate_value(&field.kind, value, &path, errors) {
                        if field.check_bounds(&value, &path, errors) {
                            validated.insert(field.name.clone(), value);
                        }
                    }
                }
            }
        }

        validated
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_value(
    kind: &FieldKind,
    value: &Value,
    path: &str,
    errors: &mut BTreeMap<String, String>,
) -> Option<Value> {
    let mismatch = |errors: &mut BTreeMap<String, String>, message: &str| {
        errors.insert(path.to_string(), format!("{} {}", value, message));
        None
    };

    match kind {
        FieldKind::String => match value {
            Value::String(_) => Some(value.clone()),
            _ => mismatch(errors, "is not a string"),
        },
        FieldKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(_) => mismatch(errors, "is not an integer"),
            _ => mismatch(errors, "is not a number"),
        },
        FieldKind::Float => match value.as_f64() {
            Some(number) => serde_json::Number::from_f64(number).map(Value::Number),
            None => mismatch(errors, "is not a number"),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            _ => mismatch(errors, "is not a boolean"),
        },
        FieldKind::Object(shape) => match value {
            Value::Object(map) => {
                let before = errors.len();
                let nested = shape.validate_object(map, path, errors);
                (errors.len() == before).then_some(Value::Object(nested))
            }
            _ => mismatch(errors, "is not a mapping type"),
        },
        FieldKind::List(item_kind) => match value {
            Value::Array(items) => {
                let before = errors.len();
                let validated: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        validate_value(item_kind, item, &join_path(path, &index.to_string()), errors)
                    })
                    .collect();
                (errors.len() == before).then_some(Value::Array(validated))
            }
            _ => mismatch(errors, "is not iterable"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn position_shape() -> Shape {
        Shape::new()
            .field(
                Field::new(
                    "items",
                    FieldKind::list_of(FieldKind::Object(
                        Shape::new()
                            .field(Field::new("lat", FieldKind::Float).range(-90.0, 90.0))
                            .field(Field::new("lon", FieldKind::Float).range(-180.0, 180.0)),
                    )),
                )
                .max_length(3),
            )
            .field(Field::new("source", FieldKind::String).default_value(json!("gps")))
    }

    #[test]
    fn test_valid_data_drops_unknown_keys_and_applies_defaults() {
        let data = object(json!({
            "items": [{"lat": 51, "lon": -0.12, "extra": true}],
            "unknown": 1,
        }));

        let validated = position_shape().validate(&data).unwrap();

        assert_eq!(
            Value::Object(validated),
            json!({"items": [{"lat": 51.0, "lon": -0.12}], "source": "gps"})
        );
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let data = object(json!({
            "items": [{"lat": 91.5, "lon": "west"}, {"lon": 0}],
            "source": 7,
        }));

        let err = position_shape().validate(&data).unwrap_err();

        assert_eq!(err.errors.len(), 4);
        assert_eq!(err.errors["items.0.lat"], "91.5 is greater than maximum value 90");
        assert_eq!(err.errors["items.0.lon"], "\"west\" is not a number");
        assert_eq!(err.errors["items.1.lat"], "Required");
        assert_eq!(err.errors["source"], "7 is not a string");
        assert!(err.partial.is_empty());
    }

    #[test]
    fn test_partial_data_keeps_valid_fields() {
        let shape = Shape::new()
            .field(Field::new("name", FieldKind::String))
            .field(Field::new("count", FieldKind::Integer).min(1.0));
        let data = object(json!({"name": "cell", "count": 0}));

        let err = shape.validate(&data).unwrap_err();

        assert_eq!(Value::Object(err.partial.clone()), json!({"name": "cell"}));
        assert_eq!(err.description(), json!({"count": "0 is less than minimum value 1"}));
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let shape = Shape::new().field(Field::new("age", FieldKind::Integer));
        let err = shape.validate(&object(json!({"age": 1.5}))).unwrap_err();
        assert_eq!(err.errors["age"], "1.5 is not an integer");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let shape = Shape::new()
            .field(Field::new("required", FieldKind::Boolean))
            .field(Field::new("maybe", FieldKind::Boolean).optional());
        let err = shape
            .validate(&object(json!({"required": null, "maybe": null})))
            .unwrap_err();

        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors["required"], "Required");
    }

    #[test]
    fn test_max_length_applies_to_strings_and_lists() {
        let shape = Shape::new()
            .field(Field::new("message", FieldKind::String).max_length(4).optional())
            .field(Field::new("tags", FieldKind::list_of(FieldKind::String)).max_length(1).optional());

        let err = shape
            .validate(&object(json!({"message": "hello", "tags": ["a", "b"]})))
            .unwrap_err();

        assert_eq!(err.errors["message"], "Longer than maximum length 4");
        assert_eq!(err.errors["tags"], "Longer than maximum length 1");
    }

    #[test]
    fn test_empty_shape_accepts_anything() {
        let validated = Shape::new().validate(&object(json!({"a": 1}))).unwrap();
        assert!(validated.is_empty());
    }
}
