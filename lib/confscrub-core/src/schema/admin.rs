//! Schema provider backed by the gateway admin API or Konnect.

use std::fmt;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{EntitySchema, SchemaProvider, SchemaTarget, konnect_entity_name};
use crate::error::SchemaError;

const ADMIN_TOKEN_HEADER: &str = "Kong-Admin-Token";

/// Credential sent to the admin API, zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AdminToken(String);

impl AdminToken {
    /// Wraps a token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AdminToken").field(&"[REDACTED]").finish()
    }
}

/// Fetches schemas over HTTP.
///
/// - gateway mode: `GET {base}/schemas/{collection}/{name}`, authenticated with the
///   `Kong-Admin-Token` header
/// - Konnect mode: `GET {base}/v1/schemas/json/{entity}/{name}`, where `entity` is the
///   Konnect name of the collection, authenticated with a bearer token
///
/// Transient failures are retried with exponential backoff; a `404` is reported at once.
#[derive(Debug, Clone)]
pub struct AdminSchemaProvider {
    client: reqwest::Client,
    base_url: Url,
    token: Option<AdminToken>,
    max_retries: usize,
    min_retry_delay: Duration,
}

/// Builder for [`AdminSchemaProvider`].
///
/// # Default Configuration
///
/// - **Token**: none
/// - **Timeout**: 10 seconds per request
/// - **Retries**: 3, starting at 200ms
#[derive(Debug, Clone)]
pub struct AdminSchemaProviderBuilder {
    base_url: Url,
    token: Option<AdminToken>,
    timeout: Duration,
    max_retries: usize,
    min_retry_delay: Duration,
}

impl AdminSchemaProvider {
    /// Starts building a provider for the admin API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid absolute URL.
    pub fn builder(base_url: &str) -> Result<AdminSchemaProviderBuilder, SchemaError> {
        let mut base_url = Url::parse(base_url)?;
        // keep the last path segment when joining relative paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(AdminSchemaProviderBuilder {
            base_url,
            token: None,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            min_retry_delay: Duration::from_millis(200),
        })
    }

    fn schema_url(&self, target: &SchemaTarget, konnect_mode: bool) -> Result<Url, SchemaError> {
        let path = if konnect_mode {
            format!(
                "v1/schemas/json/{}/{}",
                konnect_entity_name(target.collection()),
                target.name()
            )
        } else {
            format!("schemas/{}/{}", target.collection(), target.name())
        };
        Ok(self.base_url.join(&path)?)
    }

    async fn fetch_once(
        &self,
        url: Url,
        target: &SchemaTarget,
        konnect_mode: bool,
    ) -> Result<EntitySchema, SchemaError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = if konnect_mode {
                request.bearer_auth(token.as_str())
            } else {
                request.header(ADMIN_TOKEN_HEADER, token.as_str())
            };
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SchemaError::NotFound {
                target: target.clone(),
            });
        }

        let payload = response.error_for_status()?.json::<Value>().await?;
        EntitySchema::from_json(target, &payload)
    }
}

impl SchemaProvider for AdminSchemaProvider {
    async fn fetch_schema(
        &self,
        target: &SchemaTarget,
        konnect_mode: bool,
    ) -> Result<EntitySchema, SchemaError> {
        let url = self.schema_url(target, konnect_mode)?;
        debug!(%url, %target, "fetching entity schema");

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_retry_delay)
            .with_max_times(self.max_retries);

        (|| self.fetch_once(url.clone(), target, konnect_mode))
            .retry(&backoff)
            .when(|error| matches!(error, SchemaError::HttpError(_)))
            .await
    }
}

impl AdminSchemaProviderBuilder {
    /// Sets the token used to authenticate requests.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(AdminToken::new(token));
        self
    }

    /// Sets the timeout of each request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a failed request is retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build(self) -> Result<AdminSchemaProvider, SchemaError> {
        let Self {
            base_url,
            token,
            timeout,
            max_retries,
            min_retry_delay,
        } = self;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(AdminSchemaProvider {
            client,
            base_url,
            token,
            max_retries,
            min_retry_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str) -> AdminSchemaProvider {
        AdminSchemaProvider::builder(base_url)
            .expect("valid base url")
            .with_token("kpat_secret")
            .build()
            .expect("should build provider")
    }

    #[test]
    fn should_build_gateway_url() {
        let provider = provider("http://localhost:8001");
        let target = SchemaTarget::Plugin("rate-limiting".to_string());

        let url = provider.schema_url(&target, false).expect("valid url");

        insta::assert_snapshot!(url, @"http://localhost:8001/schemas/plugins/rate-limiting");
    }

    #[test]
    fn should_keep_base_path() {
        let provider = provider("https://gateway.example.com/admin");
        let target = SchemaTarget::Vault("env".to_string());

        let url = provider.schema_url(&target, false).expect("valid url");

        insta::assert_snapshot!(url, @"https://gateway.example.com/admin/schemas/vaults/env");
    }

    #[test]
    fn should_build_konnect_url_with_translated_name() {
        let provider = provider("https://us.api.konghq.com");
        let target = SchemaTarget::Partial("redis-ee".to_string());

        let url = provider.schema_url(&target, true).expect("valid url");

        insta::assert_snapshot!(url, @"https://us.api.konghq.com/v1/schemas/json/partial/redis-ee");
    }

    #[test]
    fn should_reject_relative_base_url() {
        let result = AdminSchemaProvider::builder("not a url");

        assert!(result.is_err());
    }

    #[test]
    fn should_not_leak_token_in_debug() {
        let provider = provider("http://localhost:8001");

        let debug = format!("{provider:?}");

        assert!(!debug.contains("kpat_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
