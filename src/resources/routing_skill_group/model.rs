//! Skill group API models and the typed desired state.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::models::EntityRef;
use crate::error::{ProviderError, Result};

use super::RESOURCE_NAME;

/// Wildcard standing for every division in the org.
pub const ALL_DIVISIONS: &str = "*";

/// A skill group as returned by the platform.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SkillGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_conditions: Option<Vec<Value>>,
    #[serde(default, skip_serializing)]
    pub member_count: Option<u64>,
}

/// Request body of `POST routing/skillgroups/{id}/members/divisions`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberDivisionsUpdate {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_division_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_division_ids: Vec<String>,
}

/// Response of `GET routing/skillgroups/{id}/members/divisions`.
#[derive(Deserialize, Debug, Default)]
pub struct MemberDivisionListing {
    #[serde(default)]
    pub entities: Vec<EntityRef>,
}

/// One page of `GET routing/skillgroups`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SkillGroupListing {
    #[serde(default)]
    pub entities: Vec<SkillGroup>,
    #[serde(default)]
    pub next_uri: Option<String>,
}

impl SkillGroupListing {
    /// The `after` cursor of the next page, if there is one.
    pub fn next_cursor(&self) -> Option<String> {
        let uri = self.next_uri.as_deref()?;
        let query = uri.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "after")
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|v| v.into_owned())
            .filter(|v| !v.is_empty())
    }
}

/// Which divisions the skill group should have as members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberDivisions {
    /// `member_division_ids` is not configured; membership is left alone.
    Unmanaged,
    /// `["*"]`: every division in the org.
    All,
    /// An explicit list, possibly empty. Empty removes every member.
    Specific(Vec<String>),
}

impl MemberDivisions {
    /// Validate a configured id list.
    pub fn from_ids(ids: Vec<String>) -> Result<Self> {
        if ids.iter().any(|id| id == ALL_DIVISIONS) {
            if ids.len() > 1 {
                return Err(ProviderError::Validation(format!(
                    "member_division_ids should not contain more than one item when the value of an item is \"{}\"",
                    ALL_DIVISIONS
                )));
            }
            return Ok(Self::All);
        }

        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Ok(Self::Specific(unique))
    }
}

/// Desired state of a skill group, decoded from the engine's JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillGroupConfig {
    pub name: String,
    pub description: Option<String>,
    pub division_id: Option<String>,
    pub skill_conditions: Option<Vec<Value>>,
    pub member_divisions: MemberDivisions,
}

fn optional_string(state: &Value, key: &str) -> Result<Option<String>> {
    match state.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ProviderError::Validation(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

impl SkillGroupConfig {
    /// Decode and validate the desired state.
    pub fn from_state(state: &Value) -> Result<Self> {
        let name = optional_string(state, "name")?
            .ok_or_else(|| ProviderError::Validation("name is required".to_string()))?;

        let skill_conditions = match optional_string(state, "skill_conditions")? {
            None => None,
            Some(raw) => {
                let parsed: Value = serde_json::from_str(&raw).map_err(|e| {
                    ProviderError::Validation(format!(
                        "Failed to unmarshal the JSON payload while creating/updating the skill group {}: {}",
                        name, e
                    ))
                })?;
                match parsed {
                    Value::Array(items) => Some(items),
                    Value::Null => None,
                    other => {
                        return Err(ProviderError::Validation(format!(
                            "skill_conditions must be a JSON array, got {}",
                            other
                        )))
                    },
                }
            },
        };

        let member_divisions = match state.get("member_division_ids") {
            None | Some(Value::Null) => MemberDivisions::Unmanaged,
            Some(Value::Array(items)) => {
                let ids = items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            ProviderError::Validation(format!(
                                "member_division_ids must contain strings, got {}",
                                v
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                MemberDivisions::from_ids(ids)?
            },
            Some(other) => {
                return Err(ProviderError::Validation(format!(
                    "member_division_ids must be a list, got {}",
                    other
                )))
            },
        };

        Ok(Self {
            name,
            description: optional_string(state, "description")?,
            division_id: optional_string(state, "division_id")?,
            skill_conditions,
            member_divisions,
        })
    }

    /// Body for create and update calls.
    pub fn to_request(&self) -> SkillGroup {
        SkillGroup {
            id: None,
            name: self.name.clone(),
            description: Some(self.description.clone().unwrap_or_default()),
            division: self.division_id.as_ref().map(|id| EntityRef {
                id: id.clone(),
                name: None,
            }),
            skill_conditions: self.skill_conditions.clone(),
            member_count: None,
        }
    }
}

/// Flatten a platform skill group into resource state.
///
/// `member_division_ids` is not returned by the API, so it is carried over
/// from `desired` unchanged.
pub fn to_state(group: &SkillGroup, id: &str, desired: &Value) -> Value {
    let conditions = group.skill_conditions.clone().unwrap_or_default();
    let mut state = json!({
        "id": group.id.clone().unwrap_or_else(|| id.to_string()),
        "name": group.name,
        "description": group.description,
        "division_id": group.division.as_ref().map(|d| d.id.clone()),
        "skill_conditions": Value::Array(conditions).to_string(),
        "member_division_ids": Value::Null,
    });
    if let Some(ids) = desired.get("member_division_ids") {
        state["member_division_ids"] = ids.clone();
    }
    state
}

/// Error for a skill group that was expected to exist.
pub fn not_found(id: &str) -> ProviderError {
    ProviderError::NotFound(format!("{} {}", RESOURCE_NAME, id))
}
