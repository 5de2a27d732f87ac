//! Plan and import types exchanged with the orchestration engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{DiffSuppress, Schema};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Diff `proposed` against `prior` attribute by attribute.
    ///
    /// Computed attributes the configuration leaves unset keep their prior
    /// value. Attributes carrying [`DiffSuppress::EquivalentJson`] only count
    /// as changed when the decoded documents differ, in which case the prior
    /// text is kept in the planned state.
    pub fn diff(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> Self {
        let mut planned = match proposed {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        let mut changes = Vec::new();
        let mut requires_replace = false;

        let mut names: Vec<&String> = schema.block.attributes.keys().collect();
        names.sort();

        for name in names {
            let attr = &schema.block.attributes[name];
            let before = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
            let mut after = planned.get(name.as_str()).filter(|v| !v.is_null()).cloned();

            if after.is_none() && attr.flags.computed {
                if let Some(b) = before {
                    planned.insert(name.clone(), b.clone());
                }
                continue;
            }

            if let (Some(DiffSuppress::EquivalentJson), Some(b), Some(a)) =
                (attr.diff_suppress, before, after.as_ref())
            {
                if equivalent_json(b, a) {
                    planned.insert(name.clone(), b.clone());
                    after = Some(b.clone());
                }
            }

            let change = match (before, after) {
                (None, None) => None,
                (None, Some(a)) => Some(AttributeChange::added(name.clone(), a)),
                (Some(b), None) => Some(AttributeChange::removed(name.clone(), b.clone())),
                (Some(b), Some(a)) if *b != a => {
                    Some(AttributeChange::modified(name.clone(), b.clone(), a))
                },
                _ => None,
            };

            if let Some(change) = change {
                if attr.force_new && prior.is_some() {
                    requires_replace = true;
                }
                changes.push(change);
            }
        }

        Self::with_changes(Value::Object(planned), changes, requires_replace)
    }
}

/// Whether two JSON-encoded strings decode to the same document.
pub fn equivalent_json(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => {
            match (
                serde_json::from_str::<Value>(a),
                serde_json::from_str::<Value>(b),
            ) {
                (Ok(x), Ok(y)) => x == y,
                _ => a == b,
            }
        },
        _ => a == b,
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: which resource and data source types it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}
