//! Provider configuration.
//!
//! The engine hands the provider block over as loosely typed JSON. It is
//! resolved here, once, into a [`ProviderConfig`]: unset attributes fall back
//! to their environment variable, then to their schema default, and the
//! result is validated against [`provider_config_schema`] before being
//! decoded into typed structs.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::schema::{
    Attribute, AttributeType, Block, Constraint, Diagnostic, NestedBlock, Schema,
};
use crate::validation::validate;

/// Region name to platform domain.
pub const REGIONS: &[(&str, &str)] = &[
    ("dca", "inindca.com"),
    ("tca", "inintca.com"),
    ("us-east-1", "mypurecloud.com"),
    ("us-east-2", "use2.us-gov-pure.cloud"),
    ("us-west-2", "usw2.pure.cloud"),
    ("eu-west-1", "mypurecloud.ie"),
    ("eu-west-2", "euw2.pure.cloud"),
    ("ap-southeast-2", "mypurecloud.com.au"),
    ("ap-northeast-1", "mypurecloud.jp"),
    ("eu-central-1", "mypurecloud.de"),
    ("ca-central-1", "cac1.pure.cloud"),
    ("ap-northeast-2", "apne2.pure.cloud"),
    ("ap-south-1", "aps1.pure.cloud"),
    ("sa-east-1", "sae1.pure.cloud"),
    ("ap-northeast-3", "apne3.pure.cloud"),
    ("eu-central-2", "euc2.pure.cloud"),
    ("me-central-1", "mec1.pure.cloud"),
];

/// Environment variable names read by the provider.
pub mod env {
    /// OAuth access token.
    pub const ACCESS_TOKEN: &str = "GENESYSCLOUD_ACCESS_TOKEN";
    /// OAuth client id.
    pub const OAUTHCLIENT_ID: &str = "GENESYSCLOUD_OAUTHCLIENT_ID";
    /// OAuth client secret.
    pub const OAUTHCLIENT_SECRET: &str = "GENESYSCLOUD_OAUTHCLIENT_SECRET";
    /// Region of the org.
    pub const REGION: &str = "GENESYSCLOUD_REGION";
    /// SDK debug switch.
    pub const SDK_DEBUG: &str = "GENESYSCLOUD_SDK_DEBUG";
    /// SDK debug log format.
    pub const SDK_DEBUG_FORMAT: &str = "GENESYSCLOUD_SDK_DEBUG_FORMAT";
    /// SDK debug log path.
    pub const SDK_DEBUG_FILE_PATH: &str = "GENESYSCLOUD_SDK_DEBUG_FILE_PATH";
    /// Request concurrency bound.
    pub const TOKEN_POOL_SIZE: &str = "GENESYSCLOUD_TOKEN_POOL_SIZE";
    /// Panic recovery switch.
    pub const LOG_STACK_TRACES: &str = "GENESYSCLOUD_LOG_STACK_TRACES";
    /// Panic recovery log path.
    pub const LOG_STACK_TRACES_FILE_PATH: &str = "GENESYSCLOUD_LOG_STACK_TRACES_FILE_PATH";
}

/// Look up the platform domain for a region name (case-insensitive).
pub fn region_domain(region: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(region))
        .map(|(_, domain)| *domain)
}

/// Base URL of the public API for a region.
pub fn region_base_path(region: &str) -> Option<String> {
    region_domain(region).map(|d| format!("https://api.{}", d))
}

/// How the provider authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Use a pre-issued access token as is.
    AccessToken(String),
    /// Exchange client credentials for tokens, refreshing when they expire.
    ClientCredentials {
        /// OAuth client id.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
    },
}

/// Format of the SDK debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum DebugFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// SDK debug logging of every request and response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkDebugConfig {
    /// Whether request/response logging is on.
    pub enabled: bool,
    /// Log format.
    pub format: DebugFormat,
    /// Destination file.
    pub file_path: PathBuf,
}

/// Username/password pair for a proxy or gateway.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct BasicAuth {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Outbound HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: String,
    /// `http` or `https`.
    pub protocol: String,
    /// Optional proxy credentials.
    pub auth: Option<BasicAuth>,
}

impl ProxyConfig {
    /// The proxy URL, e.g. `http://proxy.local:3128`.
    pub fn url(&self) -> String {
        join_origin(&self.protocol, &self.host, &self.port)
    }
}

/// A path prefix substitution applied when routing through a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathParam {
    /// `api` or `login`.
    pub path_name: String,
    /// Prefix inserted before the original path.
    pub path_value: String,
}

/// API gateway that requests are routed through instead of the region hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: String,
    /// `http` or `https`.
    pub protocol: String,
    /// Path prefixes per target (`api`, `login`).
    pub path_params: Vec<PathParam>,
    /// Optional gateway credentials.
    pub auth: Option<BasicAuth>,
}

impl GatewayConfig {
    /// Base URL for a target (`api` or `login`) behind the gateway.
    pub fn base_url(&self, target: &str) -> String {
        let origin = join_origin(&self.protocol, &self.host, &self.port);
        match self.path_params.iter().find(|p| p.path_name == target) {
            Some(p) => format!("{}/{}", origin, p.path_value.trim_matches('/')),
            None => origin,
        }
    }
}

fn join_origin(protocol: &str, host: &str, port: &str) -> String {
    let protocol = if protocol.is_empty() { "https" } else { protocol };
    if port.is_empty() {
        format!("{}://{}", protocol, host)
    } else {
        format!("{}://{}:{}", protocol, host, port)
    }
}

/// Fully resolved provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Authentication mode.
    pub auth: AuthConfig,
    /// Region name, lower-cased.
    pub region: String,
    /// SDK debug logging.
    pub sdk_debug: SdkDebugConfig,
    /// Maximum number of concurrent authenticated requests.
    pub token_pool_size: u32,
    /// Log panics to a file instead of crashing.
    pub log_stack_traces: bool,
    /// Destination of panic logs.
    pub log_stack_traces_file_path: PathBuf,
    /// Optional outbound proxy.
    pub proxy: Option<ProxyConfig>,
    /// Optional API gateway.
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    access_token: Option<String>,
    oauthclient_id: Option<String>,
    oauthclient_secret: Option<String>,
    aws_region: Option<String>,
    #[serde(default)]
    sdk_debug: bool,
    #[serde(default)]
    sdk_debug_format: DebugFormat,
    sdk_debug_file_path: String,
    token_pool_size: u32,
    #[serde(default)]
    log_stack_traces: bool,
    log_stack_traces_file_path: String,
    #[serde(default)]
    proxy: Vec<RawEndpoint>,
    #[serde(default)]
    gateway: Vec<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    path_params: Vec<PathParam>,
    #[serde(default)]
    auth: Vec<BasicAuth>,
}

impl ProviderConfig {
    /// Resolve configuration, falling back to the process environment.
    pub fn from_value(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve(config, |var| std::env::var(var).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve<E>(config: &Value, env: E) -> Result<Self, Vec<Diagnostic>>
    where
        E: Fn(&str) -> Option<String>,
    {
        let schema = provider_config_schema();
        let mut effective = match config {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(vec![Diagnostic::error("Provider configuration must be an object")]),
        };
        apply_defaults(&schema.block, &mut effective, &env);
        let effective = Value::Object(effective);

        let diagnostics = validate(&schema, &effective);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let raw: RawConfig = serde_json::from_value(effective).map_err(|e| {
            vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
        })?;
        raw.into_config()
    }

    /// Base URL for API requests, honoring a configured gateway.
    pub fn api_base_url(&self) -> String {
        match &self.gateway {
            Some(gateway) => gateway.base_url("api"),
            None => format!("https://api.{}", self.domain()),
        }
    }

    /// Base URL for OAuth requests, honoring a configured gateway.
    pub fn login_base_url(&self) -> String {
        match &self.gateway {
            Some(gateway) => gateway.base_url("login"),
            None => format!("https://login.{}", self.domain()),
        }
    }

    /// The platform domain of the configured region.
    pub fn domain(&self) -> &'static str {
        // region was checked against REGIONS during resolution
        region_domain(&self.region).unwrap_or("mypurecloud.com")
    }
}

impl RawConfig {
    fn into_config(self) -> Result<ProviderConfig, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let auth = match (
            non_empty(self.access_token),
            non_empty(self.oauthclient_id),
            non_empty(self.oauthclient_secret),
        ) {
            (Some(token), _, _) => Some(AuthConfig::AccessToken(token)),
            (None, Some(client_id), Some(client_secret)) => Some(AuthConfig::ClientCredentials {
                client_id,
                client_secret,
            }),
            _ => {
                diagnostics.push(
                    Diagnostic::error("Missing credentials")
                        .with_detail(format!(
                            "Set access_token ({}) or both oauthclient_id ({}) and oauthclient_secret ({})",
                            env::ACCESS_TOKEN,
                            env::OAUTHCLIENT_ID,
                            env::OAUTHCLIENT_SECRET
                        )),
                );
                None
            },
        };

        let region = match non_empty(self.aws_region) {
            Some(region) => Some(region.to_ascii_lowercase()),
            None => {
                diagnostics.push(
                    Diagnostic::error("Missing required attribute 'aws_region'")
                        .with_detail(format!("Set aws_region or {}", env::REGION))
                        .with_attribute("aws_region"),
                );
                None
            },
        };

        let (Some(auth), Some(region)) = (auth, region) else {
            return Err(diagnostics);
        };

        let proxy = self.proxy.into_iter().next().map(|p| ProxyConfig {
            host: p.host.unwrap_or_default(),
            port: p.port.unwrap_or_default(),
            protocol: p.protocol.unwrap_or_default(),
            auth: p.auth.into_iter().next(),
        });
        let gateway = self.gateway.into_iter().next().map(|g| GatewayConfig {
            host: g.host.unwrap_or_default(),
            port: g.port.unwrap_or_default(),
            protocol: g.protocol.unwrap_or_default(),
            path_params: g.path_params,
            auth: g.auth.into_iter().next(),
        });

        Ok(ProviderConfig {
            auth,
            region,
            sdk_debug: SdkDebugConfig {
                enabled: self.sdk_debug,
                format: self.sdk_debug_format,
                file_path: PathBuf::from(self.sdk_debug_file_path),
            },
            token_pool_size: self.token_pool_size,
            log_stack_traces: self.log_stack_traces,
            log_stack_traces_file_path: PathBuf::from(self.log_stack_traces_file_path),
            proxy,
            gateway,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Fill unset attributes from the environment, then from schema defaults.
fn apply_defaults<E>(block: &Block, values: &mut Map<String, Value>, env: &E)
where
    E: Fn(&str) -> Option<String>,
{
    for (name, attr) in &block.attributes {
        if values.get(name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let from_env = attr
            .env_default
            .as_deref()
            .and_then(|var| env(var))
            .map(|raw| env_value(&attr.attr_type, raw));
        if let Some(value) = from_env.or_else(|| attr.default.clone()) {
            values.insert(name.clone(), value);
        }
    }

    for (name, nested) in &block.blocks {
        match values.get_mut(name) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        apply_defaults(&nested.block, obj, env);
                    }
                }
            },
            Some(Value::Object(obj)) => apply_defaults(&nested.block, obj, env),
            _ => {},
        }
    }
}

fn env_value(attr_type: &AttributeType, raw: String) -> Value {
    match attr_type {
        AttributeType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" | "" => Value::Bool(false),
            _ => Value::String(raw),
        },
        AttributeType::Int64 => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(raw)),
        _ => Value::String(raw),
    }
}

fn endpoint_block(kind: &str, with_path_params: bool) -> Block {
    let upper = kind.to_ascii_uppercase();
    let mut block = Block::new()
        .with_attribute(
            "host",
            Attribute::optional_string()
                .with_description(format!(
                    "Host for the {} can be set with the `GENESYSCLOUD_{}_HOST` environment variable.",
                    kind, upper
                ))
                .with_env_default(format!("GENESYSCLOUD_{}_HOST", upper)),
        )
        .with_attribute(
            "port",
            Attribute::optional_string()
                .with_description(format!(
                    "Port for the {} can be set with the `GENESYSCLOUD_{}_PORT` environment variable.",
                    kind, upper
                ))
                .with_env_default(format!("GENESYSCLOUD_{}_PORT", upper)),
        )
        .with_attribute(
            "protocol",
            Attribute::optional_string()
                .with_description(format!(
                    "Protocol for the {} can be set with the `GENESYSCLOUD_{}_PROTOCOL` environment variable.",
                    kind, upper
                ))
                .with_env_default(format!("GENESYSCLOUD_{}_PROTOCOL", upper)),
        )
        .with_block(
            "auth",
            NestedBlock::set(
                Block::new()
                    .with_attribute(
                        "username",
                        Attribute::optional_string()
                            .with_env_default(format!("GENESYSCLOUD_{}_AUTH_USERNAME", upper)),
                    )
                    .with_attribute(
                        "password",
                        Attribute::optional_string()
                            .sensitive()
                            .with_env_default(format!("GENESYSCLOUD_{}_AUTH_PASSWORD", upper)),
                    ),
            )
            .with_max_items(1),
        );

    if with_path_params {
        block = block.with_block(
            "path_params",
            NestedBlock::set(
                Block::new()
                    .with_attribute(
                        "path_name",
                        Attribute::required_string()
                            .with_env_default("GENESYSCLOUD_GATEWAY_PATH_NAME"),
                    )
                    .with_attribute(
                        "path_value",
                        Attribute::required_string()
                            .with_env_default("GENESYSCLOUD_GATEWAY_PATH_VALUE"),
                    ),
            ),
        );
    }
    block
}

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    let regions: Vec<String> = REGIONS.iter().map(|(name, _)| name.to_string()).collect();

    Schema::v0()
        .with_attribute(
            "access_token",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(env::ACCESS_TOKEN)
                .with_description("A string that the OAuth client uses to make requests. Can be set with the `GENESYSCLOUD_ACCESS_TOKEN` environment variable."),
        )
        .with_attribute(
            "oauthclient_id",
            Attribute::optional_string()
                .with_env_default(env::OAUTHCLIENT_ID)
                .with_description("OAuthClient ID found on the OAuth page of Admin UI. Can be set with the `GENESYSCLOUD_OAUTHCLIENT_ID` environment variable."),
        )
        .with_attribute(
            "oauthclient_secret",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(env::OAUTHCLIENT_SECRET)
                .with_description("OAuthClient secret found on the OAuth page of Admin UI. Can be set with the `GENESYSCLOUD_OAUTHCLIENT_SECRET` environment variable."),
        )
        .with_attribute(
            "aws_region",
            Attribute::optional_string()
                .with_env_default(env::REGION)
                .with_constraint(Constraint::OneOf {
                    values: regions,
                    ignore_case: true,
                })
                .with_description("AWS region where org exists. e.g. us-east-1. Can be set with the `GENESYSCLOUD_REGION` environment variable."),
        )
        .with_attribute(
            "sdk_debug",
            Attribute::optional_bool()
                .with_env_default(env::SDK_DEBUG)
                .with_default(json!(false))
                .with_description("Enables debug tracing of every platform request. Can be set with the `GENESYSCLOUD_SDK_DEBUG` environment variable."),
        )
        .with_attribute(
            "sdk_debug_format",
            Attribute::optional_string()
                .with_env_default(env::SDK_DEBUG_FORMAT)
                .with_default(json!("Text"))
                .with_constraint(Constraint::OneOf {
                    values: vec!["Text".to_string(), "Json".to_string()],
                    ignore_case: false,
                })
                .with_description("Specifies the data format of the SDK debug log. Only applicable if sdk_debug is true. Can be set with the `GENESYSCLOUD_SDK_DEBUG_FORMAT` environment variable."),
        )
        .with_attribute(
            "sdk_debug_file_path",
            Attribute::optional_string()
                .with_env_default(env::SDK_DEBUG_FILE_PATH)
                .with_default(json!("sdk_debug.log"))
                .with_constraint(Constraint::NotBlank)
                .with_description("Specifies the file path for the SDK debug log. Can be set with the `GENESYSCLOUD_SDK_DEBUG_FILE_PATH` environment variable."),
        )
        .with_attribute(
            "token_pool_size",
            Attribute::optional_int64()
                .with_env_default(env::TOKEN_POOL_SIZE)
                .with_default(json!(10))
                .with_constraint(Constraint::IntRange { min: 1, max: 20 })
                .with_description("Max number of OAuth tokens in the token pool. Can be set with the `GENESYSCLOUD_TOKEN_POOL_SIZE` environment variable."),
        )
        .with_attribute(
            "log_stack_traces",
            Attribute::optional_bool()
                .with_env_default(env::LOG_STACK_TRACES)
                .with_default(json!(false))
                .with_description("If true, stack traces will be logged to a file instead of crashing the provider, whenever possible. Can be set with the `GENESYSCLOUD_LOG_STACK_TRACES` environment variable."),
        )
        .with_attribute(
            "log_stack_traces_file_path",
            Attribute::optional_string()
                .with_env_default(env::LOG_STACK_TRACES_FILE_PATH)
                .with_default(json!("genesyscloud_stack_traces.log"))
                .with_constraint(Constraint::Suffix {
                    suffix: ".log".to_string(),
                })
                .with_description("Specifies the file path for the stack trace logs. Can be set with the `GENESYSCLOUD_LOG_STACK_TRACES_FILE_PATH` environment variable."),
        )
        .with_block(
            "gateway",
            NestedBlock::set(endpoint_block("gateway", true)),
        )
        .with_block(
            "proxy",
            NestedBlock::set(endpoint_block("proxy", false)).with_max_items(1),
        )
}
