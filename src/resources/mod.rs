//! Resource and data source implementations.
//!
//! Every resource type implements [`Resource`] and every data source
//! [`DataSource`]. The [`Registry`] maps type names to implementations so
//! the provider can dispatch lifecycle calls without knowing the types.

pub mod routing_skill_group;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::provider::ProviderMeta;
use crate::schema::{Diagnostic, ProviderSchema, Schema};

/// Lifecycle of one managed resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `genesyscloud_routing_skill_group`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Checks beyond the schema, run before planning.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the resource and return its state.
    ///
    /// A failure after the remote object exists is reported as
    /// [`ProviderError::PartiallyCreated`](crate::error::ProviderError::PartiallyCreated).
    async fn create(&self, meta: &ProviderMeta, planned: &Value) -> Result<Value>;

    /// Refresh state. `None` means the resource no longer exists.
    async fn read(&self, meta: &ProviderMeta, state: &Value) -> Result<Option<Value>>;

    /// Apply a change and return the new state.
    async fn update(&self, meta: &ProviderMeta, prior: &Value, planned: &Value) -> Result<Value>;

    /// Delete the resource.
    async fn delete(&self, meta: &ProviderMeta, state: &Value) -> Result<()>;

    /// State of an existing object adopted by id.
    async fn import(&self, meta: &ProviderMeta, id: &str) -> Result<Value>;

    /// Every existing object of this type as id to display name.
    async fn export(&self, meta: &ProviderMeta) -> Result<BTreeMap<String, String>>;
}

/// A read-only lookup.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Type name.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Resolve the configuration into state.
    async fn read(&self, meta: &ProviderMeta, config: &Value) -> Result<Value>;
}

/// Resource and data source implementations by type name.
#[derive(Clone)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
            .with_resource(routing_skill_group::SkillGroupResource::default())
            .with_data_source(routing_skill_group::SkillGroupDataSource::default())
    }
}

impl Registry {
    /// Registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }

    /// Register a resource, replacing any previous one of the same type.
    pub fn with_resource<R: Resource + 'static>(mut self, resource: R) -> Self {
        self.resources.insert(resource.type_name(), Arc::new(resource));
        self
    }

    /// Register a data source, replacing any previous one of the same type.
    pub fn with_data_source<D: DataSource + 'static>(mut self, data_source: D) -> Self {
        self.data_sources
            .insert(data_source.type_name(), Arc::new(data_source));
        self
    }

    /// The resource registered under `type_name`.
    pub fn resource(&self, type_name: &str) -> Result<&dyn Resource> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| {
                ProviderError::UnknownResource(format!("Unknown resource type: {}", type_name))
            })
    }

    /// The data source registered under `type_name`.
    pub fn data_source(&self, type_name: &str) -> Result<&dyn DataSource> {
        self.data_sources
            .get(type_name)
            .map(|d| d.as_ref())
            .ok_or_else(|| {
                ProviderError::UnknownResource(format!("Unknown data source type: {}", type_name))
            })
    }

    /// Registered resources in type name order.
    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.resources.values().map(|r| r.as_ref())
    }

    /// Schemas of everything registered, plus the provider configuration.
    pub fn provider_schema(&self, provider: Schema) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider);
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = Registry::default();
        assert!(registry.resource(routing_skill_group::RESOURCE_NAME).is_ok());
        assert!(registry.data_source(routing_skill_group::RESOURCE_NAME).is_ok());

        let err = registry.resource("genesyscloud_unknown").err().unwrap();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[test]
    fn test_provider_schema_lists_everything() {
        let schema = Registry::default().provider_schema(Schema::v0());
        assert!(schema
            .resources
            .contains_key(routing_skill_group::RESOURCE_NAME));
        assert!(schema
            .data_sources
            .contains_key(routing_skill_group::RESOURCE_NAME));
    }
}
