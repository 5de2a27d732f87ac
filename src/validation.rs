//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` against a [`Schema`], checking presence,
//! types, nested block counts and attribute [`Constraint`]s.
//!
//! # Example
//!
//! ```
//! use genesyscloud_provider::schema::{Attribute, Constraint, Schema};
//! use genesyscloud_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "token_pool_size",
//!         Attribute::optional_int64().with_constraint(Constraint::IntRange { min: 1, max: 20 }),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "sg", "token_pool_size": 5})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "sg", "token_pool_size": 50}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("token_pool_size".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, Constraint, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema,
};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Attribute types must match the schema
/// - Scalar values must satisfy the attribute's [`Constraint`]
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Check a single scalar against a constraint, returning the failure detail.
pub fn check_constraint(constraint: &Constraint, value: &Value) -> Option<String> {
    match constraint {
        Constraint::OneOf {
            values,
            ignore_case,
        } => {
            let s = value.as_str()?;
            let found = values.iter().any(|v| {
                if *ignore_case {
                    v.eq_ignore_ascii_case(s)
                } else {
                    v == s
                }
            });
            if found {
                None
            } else {
                Some(format!(
                    "expected one of [{}], got \"{}\"",
                    values.join(", "),
                    s
                ))
            }
        },
        Constraint::IntRange { min, max } => {
            let n = value.as_i64()?;
            if n < *min || n > *max {
                Some(format!("expected to be in the range ({} - {}), got {}", min, max, n))
            } else {
                None
            }
        },
        Constraint::NotBlank => {
            let s = value.as_str()?;
            if s.trim().is_empty() {
                Some("must not be empty or only whitespace".to_string())
            } else {
                None
            }
        },
        Constraint::Suffix { suffix } => {
            let s = value.as_str()?;
            if s.ends_with(suffix.as_str()) {
                None
            } else {
                Some(format!("must end with \"{}\", got \"{}\"", suffix, s))
            }
        },
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            // constraints only make sense once the type is right
            if diagnostics.len() == before {
                if let Some(constraint) = &attr.constraint {
                    if let Some(detail) = check_constraint(constraint, v) {
                        diagnostics.push(
                            Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                                .with_detail(detail)
                                .with_attribute(path),
                        );
                    }
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        // blocks of every nesting mode arrive as a list from the engine;
        // a bare object is accepted for single blocks
        Some(v @ Value::Object(_)) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "Support"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_validate_string_list() {
        let schema =
            Schema::v0().with_attribute("member_division_ids", Attribute::optional_string_list());

        assert!(validate(&schema, &json!({"member_division_ids": ["d1", "d2"]})).is_empty());
        assert!(validate(&schema, &json!({"member_division_ids": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"member_division_ids": ["d1", 7]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("member_division_ids.1".to_string())
        );

        let diagnostics = validate(&schema, &json!({"member_division_ids": "d1"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("count", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        assert!(validate(&schema, &json!({"count": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"count": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"count": "42"})).len(), 1);
    }

    #[test]
    fn test_constraint_one_of_ignore_case() {
        let schema = Schema::v0().with_attribute(
            "aws_region",
            Attribute::optional_string().with_constraint(Constraint::OneOf {
                values: vec!["us-east-1".to_string(), "eu-west-1".to_string()],
                ignore_case: true,
            }),
        );

        assert!(validate(&schema, &json!({"aws_region": "US-EAST-1"})).is_empty());

        let diagnostics = validate(&schema, &json!({"aws_region": "mars-1"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_ref().unwrap().contains("mars-1"));
    }

    #[test]
    fn test_constraint_one_of_case_sensitive() {
        let constraint = Constraint::OneOf {
            values: vec!["Text".to_string(), "Json".to_string()],
            ignore_case: false,
        };
        assert!(check_constraint(&constraint, &json!("Json")).is_none());
        assert!(check_constraint(&constraint, &json!("json")).is_some());
    }

    #[test]
    fn test_constraint_int_range() {
        let constraint = Constraint::IntRange { min: 1, max: 20 };
        assert!(check_constraint(&constraint, &json!(1)).is_none());
        assert!(check_constraint(&constraint, &json!(20)).is_none());
        assert!(check_constraint(&constraint, &json!(0)).is_some());
        assert!(check_constraint(&constraint, &json!(21)).is_some());
    }

    #[test]
    fn test_constraint_not_blank_and_suffix() {
        assert!(check_constraint(&Constraint::NotBlank, &json!("   ")).is_some());
        assert!(check_constraint(&Constraint::NotBlank, &json!("sdk_debug.log")).is_none());

        let suffix = Constraint::Suffix {
            suffix: ".log".to_string(),
        };
        assert!(check_constraint(&suffix, &json!("traces.log")).is_none());
        assert!(check_constraint(&suffix, &json!("traces.txt")).is_some());
    }

    #[test]
    fn test_wrong_type_skips_constraint() {
        let schema = Schema::v0().with_attribute(
            "token_pool_size",
            Attribute::optional_int64().with_constraint(Constraint::IntRange { min: 1, max: 20 }),
        );

        let diagnostics = validate(&schema, &json!({"token_pool_size": "ten"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_nested_block_set() {
        let schema = Schema::v0().with_block(
            "proxy",
            NestedBlock::set(
                Block::new()
                    .with_attribute("host", Attribute::optional_string())
                    .with_block(
                        "auth",
                        NestedBlock::set(
                            Block::new().with_attribute("username", Attribute::optional_string()),
                        )
                        .with_max_items(1),
                    ),
            )
            .with_max_items(1),
        );

        assert!(validate(&schema, &json!({"proxy": [{"host": "proxy.local"}]})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"proxy": [{"host": "a"}, {"host": "b"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));

        let diagnostics = validate(
            &schema,
            &json!({"proxy": [{"host": "a", "auth": [{"username": 5}]}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("proxy.0.auth.0.username".to_string())
        );
    }

    #[test]
    fn test_validate_block_min_items() {
        let schema = Schema::v0().with_block(
            "path_params",
            NestedBlock::list(Block::new().with_attribute("path_name", Attribute::required_string()))
                .with_min_items(1),
        );

        let diagnostics = validate(&schema, &json!({"path_params": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));
    }

    #[test]
    fn test_validate_result_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "test"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
