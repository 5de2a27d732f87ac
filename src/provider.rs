//! The Genesys Cloud provider.
//!
//! [`GenesysCloudProvider`] implements [`ProviderService`]: it resolves the
//! provider configuration, connects to the platform, and dispatches resource
//! and data source calls through the [`Registry`]. Everything a call needs
//! from configuration travels in an explicit [`ProviderMeta`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::GenesysClient;
use crate::config::{provider_config_schema, ProviderConfig};
use crate::error::{ProviderError, Result};
use crate::logging::sdk_debug_sink;
use crate::panic_recovery::{recover, PanicRecovery};
use crate::resources::Registry;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Everything resource calls need from the configured provider.
#[derive(Debug)]
pub struct ProviderMeta {
    /// Provider version, sent in the User-Agent.
    pub version: String,
    /// Authenticated platform client.
    pub client: Arc<GenesysClient>,
    /// Platform domain of the configured region.
    pub domain: String,
    /// Id of the organization the credentials belong to.
    pub organization_id: String,
    /// Default country code of the organization.
    pub default_country_code: Option<String>,
    /// Panic recovery, when `log_stack_traces` is on.
    pub recovery: Option<PanicRecovery>,
    /// The resolved configuration.
    pub config: ProviderConfig,
}

/// Genesys Cloud implementation of [`ProviderService`].
#[derive(Debug)]
pub struct GenesysCloudProvider {
    version: String,
    registry: Registry,
    meta: RwLock<Option<Arc<ProviderMeta>>>,
}

impl Default for GenesysCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GenesysCloudProvider {
    /// Provider with every built-in resource and data source.
    pub fn new() -> Self {
        Self::with_registry(Registry::default())
    }

    /// Provider serving the given resources.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry,
            meta: RwLock::new(None),
        }
    }

    /// Override the reported version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The configured context, or an error before `configure` succeeded.
    pub async fn meta(&self) -> Result<Arc<ProviderMeta>> {
        self.meta.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    /// Connect with an already resolved configuration.
    #[instrument(skip_all, fields(region = %config.region))]
    pub async fn connect(&self, config: ProviderConfig) -> Result<Arc<ProviderMeta>> {
        sdk_debug_sink().install(&config.sdk_debug)?;
        if config.sdk_debug.enabled {
            info!(path = %config.sdk_debug.file_path.display(), "SDK debug logging enabled");
        }

        let client = Arc::new(GenesysClient::new(&config, &self.version)?);
        let organization = client.organization_me().await?;
        info!(
            organization = %organization.id,
            name = organization.name.as_deref().unwrap_or_default(),
            "connected to organization"
        );

        let meta = Arc::new(ProviderMeta {
            version: self.version.clone(),
            client,
            domain: config.domain().to_string(),
            organization_id: organization.id,
            default_country_code: organization.default_country_code,
            recovery: PanicRecovery::from_config(&config),
            config,
        });
        *self.meta.write().await = Some(Arc::clone(&meta));
        Ok(meta)
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[async_trait::async_trait]
impl ProviderService for GenesysCloudProvider {
    fn schema(&self) -> ProviderSchema {
        self.registry.provider_schema(provider_config_schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>> {
        Ok(match ProviderConfig::from_value(&config) {
            Ok(_) => Vec::new(),
            Err(diagnostics) => diagnostics,
        })
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>> {
        debug!("Configure called");
        let resolved = match ProviderConfig::from_value(&config) {
            Ok(resolved) => resolved,
            Err(diagnostics) => {
                warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
                return Ok(diagnostics);
            },
        };

        match self.connect(resolved).await {
            Ok(_) => {
                info!("Configure completed successfully");
                Ok(Vec::new())
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                Err(e)
            },
        }
    }

    async fn stop(&self) -> Result<()> {
        info!("Stop called");
        *self.meta.write().await = None;
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let resource = self.registry.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(resource.validate(&config));
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult> {
        let resource = self.registry.resource(resource_type)?;
        let plan = PlanResult::diff(&resource.schema(), prior_state.as_ref(), &proposed_state);
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Plan completed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        let result = recover(
            meta.recovery.as_ref(),
            "create",
            resource.create(&meta, &planned_state),
        )
        .await;
        let state = match result {
            Ok(state) => state,
            Err(err) => {
                if let Some(partial) = err.partial_state() {
                    let id = partial
                        .get("id")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default();
                    warn!(id = %id, error = %err, "Create failed after the object was created");
                }
                return Err(err);
            },
        };
        let id = state.get("id").and_then(serde_json::Value::as_str).unwrap_or_default();
        info!(id = %id, "Create completed");
        Ok(state)
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        recover(
            meta.recovery.as_ref(),
            "read",
            resource.read(&meta, &current_state),
        )
        .await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        recover(
            meta.recovery.as_ref(),
            "update",
            resource.update(&meta, &prior_state, &planned_state),
        )
        .await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        recover(
            meta.recovery.as_ref(),
            "delete",
            resource.delete(&meta, &current_state),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        let state = recover(meta.recovery.as_ref(), "import", resource.import(&meta, id)).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self))]
    async fn export_resources(&self, resource_type: &str) -> Result<BTreeMap<String, String>> {
        let resource = self.registry.resource(resource_type)?;
        let meta = self.meta().await?;
        let exported = resource.export(&meta).await?;
        info!(count = exported.len(), "Export completed");
        Ok(exported)
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let data_source = self.registry.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value> {
        let data_source = self.registry.data_source(data_source_type)?;
        let diagnostics = validate(&data_source.schema(), &config);
        if let Some(first) = diagnostics.into_iter().find(Diagnostic::is_error) {
            return Err(ProviderError::Validation(first.summary));
        }
        let meta = self.meta().await?;
        recover(
            meta.recovery.as_ref(),
            "read_data_source",
            data_source.read(&meta, &config),
        )
        .await
    }
}
