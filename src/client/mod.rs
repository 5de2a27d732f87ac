//! Platform REST client.
//!
//! [`GenesysClient`] wraps a `reqwest::Client` with everything every call to
//! the platform needs: the region (or gateway) base URL, bearer auth with
//! automatic token refresh, request-level retry of throttled and failed
//! responses, a bound on concurrent requests, and SDK debug tracing.

mod auth;
#[allow(missing_docs)]
pub mod models;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{BasicAuth, ProviderConfig};
use crate::error::{ProviderError, Result};
use crate::logging::SDK_DEBUG_TARGET;

use self::auth::TokenStore;
use self::models::{ApiErrorBody, Division, DivisionListing, Organization};

pub use crate::config::AuthConfig;

/// API constants.
pub mod api {
    /// Path prefix of every API route.
    pub const BASE_PATH: &str = "/api/v2";

    /// Page size used when enumerating collections.
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    /// Header carrying the per-request correlation id.
    pub const CORRELATION_HEADER: &str = "TF-Correlation-Id";
}

/// Request-level retry of throttled or failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRetryConfig {
    /// Shortest wait between attempts.
    pub min_wait: Duration,
    /// Longest wait between attempts.
    pub max_wait: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
            max_retries: 20,
        }
    }
}

impl HttpRetryConfig {
    /// Wait before retry number `attempt` (0-based), honoring `Retry-After`.
    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(wait) = retry_after {
            return wait.clamp(self.min_wait, self.max_wait);
        }
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }
}

/// Whether a response status is worth another attempt.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Genesys Cloud API client.
#[derive(Debug)]
pub struct GenesysClient {
    http: Client,
    api_base: String,
    tokens: TokenStore,
    permits: Arc<Semaphore>,
    retry: HttpRetryConfig,
    user_agent: String,
    gateway_auth: Option<HeaderValue>,
}

impl GenesysClient {
    /// Build a client for a resolved configuration.
    pub fn new(config: &ProviderConfig, version: &str) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.token_pool_size as usize)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60));

        if let Some(proxy) = &config.proxy {
            let mut p = reqwest::Proxy::all(proxy.url()).map_err(|e| {
                ProviderError::Configuration(format!("invalid proxy {}: {}", proxy.url(), e))
            })?;
            if let Some(BasicAuth { username, password }) = &proxy.auth {
                p = p.basic_auth(username, password);
            }
            debug!(proxy = %proxy.url(), "routing requests through proxy");
            builder = builder.proxy(p);
        }

        let http = builder
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let gateway_auth = match config.gateway.as_ref().and_then(|g| g.auth.as_ref()) {
            Some(auth) => Some(basic_auth_header(&http, auth)?),
            None => None,
        };

        Ok(Self {
            tokens: TokenStore::new(config.auth.clone(), config.login_base_url()),
            http,
            api_base: format!("{}{}", config.api_base_url(), api::BASE_PATH),
            permits: Arc::new(Semaphore::new(config.token_pool_size.max(1) as usize)),
            retry: HttpRetryConfig::default(),
            user_agent: format!("GC Terraform Provider/{}", version),
            gateway_auth,
        })
    }

    /// Override request-level retry timing.
    pub fn with_retry_config(mut self, retry: HttpRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL every API path is appended to, including `/api/v2`.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Number of requests that may be in flight at once.
    pub fn pool_size(&self) -> usize {
        self.permits.available_permits()
    }

    /// Send a request, retrying throttled and failed responses.
    ///
    /// A 401 with client credentials discards the token and retries once
    /// with a fresh one. Any response that is not retried is returned as is.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut attempt = 0u32;
        let mut refreshed = false;

        loop {
            let token = self.tokens.token(&self.http).await?;
            let correlation_id = Uuid::new_v4().to_string();

            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .header(USER_AGENT, &self.user_agent)
                .header(api::CORRELATION_HEADER, &correlation_id);
            if let Some(auth) = &self.gateway_auth {
                request = request.header("Proxy-Authorization", auth.clone());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(
                target: SDK_DEBUG_TARGET,
                correlation_id = %correlation_id,
                method = %method,
                url = %url,
                attempt,
                body = %body.map(|b| b.to_string()).unwrap_or_default(),
                "request"
            );

            let started = Instant::now();
            let outcome = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| ProviderError::Sdk("request pool is closed".to_string()))?;
                request.send().await
            };

            let wait = match outcome {
                Ok(response) => {
                    let status = response.status();
                    debug!(
                        target: SDK_DEBUG_TARGET,
                        correlation_id = %correlation_id,
                        status = status.as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "response"
                    );

                    if status == StatusCode::UNAUTHORIZED && !refreshed && self.tokens.can_refresh() {
                        refreshed = true;
                        self.tokens.invalidate(&token).await;
                        continue;
                    }
                    if !is_retryable_status(status) || attempt >= self.retry.max_retries {
                        return Ok(response);
                    }
                    self.retry.backoff(attempt, retry_after(&response))
                },
                Err(err) => {
                    let transient = err.is_timeout() || err.is_connect();
                    if !transient || attempt >= self.retry.max_retries {
                        return Err(err.into());
                    }
                    debug!(error = %err, "request failed to complete");
                    self.retry.backoff(attempt, None)
                },
            };

            warn!(
                method = %method,
                path,
                attempt = attempt + 1,
                "retrying request in {:?}",
                wait
            );
            sleep(wait).await;
            attempt += 1;
        }
    }

    /// Turn a non-success response into a `ProviderError` for `resource`.
    async fn error_from(response: Response, resource: &str, context: &str) -> ProviderError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|b| b.describe())
            .unwrap_or(text);
        let message = if detail.is_empty() {
            context.to_string()
        } else {
            format!("{}: {}", context, detail)
        };

        match status {
            401 | 403 => ProviderError::PermissionDenied(format!("{} ({})", message, status)),
            _ => ProviderError::api(resource, status, message),
        }
    }

    async fn parse<T: DeserializeOwned>(
        response: Response,
        resource: &str,
        context: &str,
    ) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::error_from(response, resource, context).await);
        }
        Ok(response.json().await?)
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value> {
        Ok(serde_json::to_value(body)?)
    }

    /// GET and decode, failing on any non-success status.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        Self::parse(response, resource, &format!("failed to read {}", path)).await
    }

    /// POST a JSON body and decode the response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        resource: &str,
    ) -> Result<T> {
        let body = Self::encode(body)?;
        let response = self.send(Method::POST, path, Some(&body)).await?;
        Self::parse(response, resource, &format!("failed to create {}", path)).await
    }

    /// POST a JSON body, ignoring any response body.
    pub async fn post_no_content<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        resource: &str,
    ) -> Result<()> {
        let body = Self::encode(body)?;
        let response = self.send(Method::POST, path, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, resource, &format!("failed to post {}", path)).await);
        }
        Ok(())
    }

    /// PATCH a JSON body and decode the response.
    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        resource: &str,
    ) -> Result<T> {
        let body = Self::encode(body)?;
        let response = self.send(Method::PATCH, path, Some(&body)).await?;
        Self::parse(response, resource, &format!("failed to update {}", path)).await
    }

    /// DELETE a path.
    pub async fn delete(&self, path: &str, resource: &str) -> Result<()> {
        let response = self.send(Method::DELETE, path, None).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, resource, &format!("failed to delete {}", path)).await);
        }
        Ok(())
    }

    /// The organization the credentials belong to.
    pub async fn organization_me(&self) -> Result<Organization> {
        self.get_json("organizations/me", "genesyscloud_organization").await
    }

    /// One page of authorization divisions (1-based).
    pub async fn list_divisions(&self, page_number: u32, page_size: u32) -> Result<Vec<Division>> {
        let path = format!(
            "authorization/divisions?pageSize={}&pageNumber={}",
            page_size, page_number
        );
        let page: DivisionListing = self.get_json(&path, "genesyscloud_auth_division").await?;
        debug!(
            page_number,
            count = page.entities.len(),
            "fetched page of divisions"
        );
        Ok(page.entities)
    }
}

/// Encode credentials as a `Basic` header value.
fn basic_auth_header(http: &Client, auth: &BasicAuth) -> Result<HeaderValue> {
    let request = http
        .get("http://gateway.invalid/")
        .basic_auth(&auth.username, Some(&auth.password))
        .build()
        .map_err(|e| ProviderError::Configuration(format!("invalid gateway credentials: {}", e)))?;
    request
        .headers()
        .get(AUTHORIZATION)
        .cloned()
        .ok_or_else(|| ProviderError::Configuration("invalid gateway credentials".to_string()))
}

#[cfg(test)]
impl GenesysClient {
    /// Client pointed at a mock server with a static token and fast retries.
    pub fn test_client(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_base: format!("{}{}", base_url, api::BASE_PATH),
            tokens: TokenStore::new(AuthConfig::AccessToken("test-token".to_string()), base_url.to_string()),
            permits: Arc::new(Semaphore::new(4)),
            retry: HttpRetryConfig::default(),
            user_agent: "GC Terraform Provider/test".to_string(),
            gateway_auth: None,
        }
        .with_retry_config(HttpRetryConfig {
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
            max_retries: 3,
        })
    }

    /// Like [`GenesysClient::test_client`] but exchanging client credentials.
    pub fn test_client_with_credentials(base_url: &str) -> Self {
        let mut client = Self::test_client(base_url);
        client.tokens = TokenStore::new(
            AuthConfig::ClientCredentials {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            },
            base_url.to_string(),
        );
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, PathParam, ProxyConfig};
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> ProviderConfig {
        ProviderConfig::resolve(
            &json!({"access_token": "t", "aws_region": "eu-west-1", "token_pool_size": 3}),
            |_| None,
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_from_region() {
        let client = GenesysClient::new(&config(), "1.2.3").unwrap();
        assert_eq!(client.api_base(), "https://api.mypurecloud.ie/api/v2");
        assert_eq!(client.user_agent, "GC Terraform Provider/1.2.3");
        assert_eq!(client.pool_size(), 3);
    }

    #[test]
    fn test_base_url_through_gateway() {
        let mut config = config();
        config.gateway = Some(GatewayConfig {
            host: "gw.corp".to_string(),
            port: String::new(),
            protocol: "https".to_string(),
            path_params: vec![PathParam {
                path_name: "api".to_string(),
                path_value: "gc".to_string(),
            }],
            auth: Some(BasicAuth {
                username: "u".to_string(),
                password: "p".to_string(),
            }),
        });
        let client = GenesysClient::new(&config, "1.0.0").unwrap();
        assert_eq!(client.api_base(), "https://gw.corp/gc/api/v2");
        assert_eq!(
            client.gateway_auth.as_ref().and_then(|h| h.to_str().ok()),
            Some("Basic dTpw")
        );
    }

    #[test]
    fn test_proxy_is_accepted() {
        let mut config = config();
        config.proxy = Some(ProxyConfig {
            host: "proxy.corp".to_string(),
            port: "3128".to_string(),
            protocol: "http".to_string(),
            auth: None,
        });
        assert!(GenesysClient::new(&config, "1.0.0").is_ok());
    }

    #[test]
    fn test_backoff() {
        let retry = HttpRetryConfig::default();
        assert_eq!(retry.backoff(0, None), Duration::from_secs(1));
        assert_eq!(retry.backoff(3, None), Duration::from_secs(8));
        assert_eq!(retry.backoff(10, None), Duration::from_secs(30));
        assert_eq!(
            retry.backoff(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            retry.backoff(0, Some(Duration::from_secs(120))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_IMPLEMENTED));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_request_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("user-agent", "GC Terraform Provider/test"))
            .and(header_exists("tf-correlation-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org-1",
                "name": "Acme",
                "defaultCountryCode": "US"
            })))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let org = client.organization_me().await.unwrap();
        assert_eq!(org.id, "org-1");
    }

    #[tokio::test]
    async fn test_throttled_request_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org-1"})))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        assert_eq!(client.organization_me().await.unwrap().id, "org-1");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .respond_with(ResponseTemplate::new(503))
            // first attempt plus max_retries
            .expect(4)
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let err = client.organization_me().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "granted"})),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .and(header("authorization", "Bearer granted"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org-1"})))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client_with_credentials(&server.uri());
        assert_eq!(client.organization_me().await.unwrap().id, "org-1");
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/me"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "missing permission"})),
            )
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let err = client.organization_me().await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert!(err.to_string().contains("missing permission"));
    }

    #[tokio::test]
    async fn test_get_not_found_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let err = client
            .get_json::<Value>("routing/skillgroups/missing", "genesyscloud_routing_skill_group")
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_api_error_carries_resource_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/routing/skillgroups/sg-1"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "name is too long"})),
            )
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let err = client
            .patch_json::<_, Value>(
                "routing/skillgroups/sg-1",
                &json!({"name": "x"}),
                "genesyscloud_routing_skill_group",
            )
            .await
            .unwrap_err();
        match err {
            ProviderError::Api {
                resource,
                status,
                message,
            } => {
                assert_eq!(resource, "genesyscloud_routing_skill_group");
                assert_eq!(status, 400);
                assert!(message.contains("name is too long"));
            },
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_divisions_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/authorization/divisions"))
            .and(query_param("pageSize", "100"))
            .and(query_param("pageNumber", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"id": "d3", "name": "Three"}],
                "pageNumber": 2
            })))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let page = client.list_divisions(2, api::DEFAULT_PAGE_SIZE).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "d3");
    }
}
