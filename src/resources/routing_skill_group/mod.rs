//! `genesyscloud_routing_skill_group` resource and data source.

pub mod data_source;
pub mod divisions;
#[allow(missing_docs)]
pub mod model;
pub mod proxy;
pub mod resource;

#[cfg(test)]
mod testing;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::consistency::ConsistencyCheck;
use crate::error::{ProviderError, Result};
use crate::provider::ProviderMeta;
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, Diagnostic, DiffSuppress, Schema};

use self::model::SkillGroupConfig;
use self::resource::{group_id, SkillGroupTimeouts};
use super::{DataSource, Resource};

/// Type name of both the resource and the data source.
pub const RESOURCE_NAME: &str = "genesyscloud_routing_skill_group";

/// Schema of the skill group resource.
pub fn resource_schema() -> Schema {
    Schema::v0()
        .with_description("Genesys Cloud Skill Group")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("The ID of the skill group."),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The group name."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_description("Description of the skill group."),
        )
        .with_attribute(
            "division_id",
            Attribute::optional_computed_string()
                .with_description("The division to which this entity belongs."),
        )
        .with_attribute(
            "skill_conditions",
            Attribute::required_string()
                .with_diff_suppress(DiffSuppress::EquivalentJson)
                .with_description("JSON encoded array of rules that will be used to determine group membership."),
        )
        .with_attribute(
            "member_division_ids",
            Attribute::optional_string_list().with_description(
                "The IDs of member divisions to add or remove for this skill group. An empty array means all divisions will be removed, '*' means all divisions will be added.",
            ),
        )
}

/// Schema of the skill group data source.
pub fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Data source for Genesys Cloud Skill Groups. Select a skill group by name.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Skill group name."),
        )
}

/// The skill group resource.
#[derive(Debug, Clone, Default)]
pub struct SkillGroupResource {
    timeouts: SkillGroupTimeouts,
}

impl SkillGroupResource {
    /// Resource with custom retry budgets.
    pub fn with_timeouts(timeouts: SkillGroupTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait::async_trait]
impl Resource for SkillGroupResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_NAME
    }

    fn schema(&self) -> Schema {
        resource_schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match SkillGroupConfig::from_state(config) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_diagnostic()],
        }
    }

    async fn create(&self, meta: &ProviderMeta, planned: &Value) -> Result<Value> {
        resource::create(meta.client.as_ref(), &self.timeouts, planned).await
    }

    async fn read(&self, meta: &ProviderMeta, state: &Value) -> Result<Option<Value>> {
        let id = group_id(state)?;
        resource::read(
            meta.client.as_ref(),
            &self.timeouts,
            id,
            state,
            &ConsistencyCheck::disabled(),
            false,
        )
        .await
    }

    async fn update(&self, meta: &ProviderMeta, prior: &Value, planned: &Value) -> Result<Value> {
        resource::update(meta.client.as_ref(), &self.timeouts, prior, planned).await
    }

    async fn delete(&self, meta: &ProviderMeta, state: &Value) -> Result<()> {
        resource::delete(meta.client.as_ref(), &self.timeouts, group_id(state)?).await
    }

    async fn import(&self, meta: &ProviderMeta, id: &str) -> Result<Value> {
        resource::import(meta.client.as_ref(), &self.timeouts, id).await
    }

    async fn export(&self, meta: &ProviderMeta) -> Result<BTreeMap<String, String>> {
        resource::export(meta.client.as_ref()).await
    }
}

/// The skill group data source.
#[derive(Debug, Clone)]
pub struct SkillGroupDataSource {
    policy: RetryPolicy,
}

impl Default for SkillGroupDataSource {
    fn default() -> Self {
        Self {
            policy: data_source::lookup_policy(),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for SkillGroupDataSource {
    fn type_name(&self) -> &'static str {
        RESOURCE_NAME
    }

    fn schema(&self) -> Schema {
        data_source_schema()
    }

    async fn read(&self, meta: &ProviderMeta, config: &Value) -> Result<Value> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Validation("name is required".to_string()))?;
        data_source::read(meta.client.as_ref(), &self.policy, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_schema_shape() {
        let schema = resource_schema();
        assert!(schema.attribute("id").unwrap().flags.computed);
        assert!(schema.attribute("name").unwrap().flags.required);
        assert!(schema.attribute("division_id").unwrap().flags.computed);
        assert_eq!(
            schema.attribute("skill_conditions").unwrap().diff_suppress,
            Some(DiffSuppress::EquivalentJson)
        );
    }

    #[test]
    fn test_schema_validates_config() {
        let schema = resource_schema();
        let ok = json!({"name": "Support", "skill_conditions": "[]", "member_division_ids": ["*"]});
        assert!(validate(&schema, &ok).is_empty());

        let missing = json!({"description": "no name"});
        let diagnostics = validate(&schema, &missing);
        assert!(diagnostics.iter().any(|d| d.summary.contains("name")));
    }

    #[test]
    fn test_validate_rejects_mixed_wildcard() {
        let resource = SkillGroupResource::default();
        let diagnostics = resource.validate(&json!({
            "name": "Support",
            "skill_conditions": "[]",
            "member_division_ids": ["*", "d1"]
        }));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("more than one item"));

        let diagnostics = resource.validate(&json!({
            "name": "Support",
            "skill_conditions": "not json"
        }));
        assert_eq!(diagnostics.len(), 1);
    }
}
