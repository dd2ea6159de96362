//! AKTools HTTP provider
//!
//! AKTools exposes akshare functions at `GET /api/public/{function}` and
//! answers with a JSON array of row objects.

use super::{MarketDataProvider, ProviderRow};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// AKTools provider implementation
pub struct AkToolsProvider {
    client: Client,
    base_url: String,
}

impl AkToolsProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn function_url(&self, function: &str) -> String {
        format!("{}/api/public/{}", self.base_url, function)
    }
}

#[async_trait]
impl MarketDataProvider for AkToolsProvider {
    fn id(&self) -> &'static str {
        "aktools"
    }

    async fn fetch_rows(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<ProviderRow>> {
        tracing::debug!("Provider call {} {:?}", function, params);

        let response = self
            .client
            .get(self.function_url(function))
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "{} returned {}: {}",
                function,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let payload: Value = response.json().await?;
        rows_from_payload(function, payload)
    }
}

/// Decode the response body into rows.
///
/// AKTools returns `[]` (or occasionally `null`) when a function has no data
/// for the requested date.
fn rows_from_payload(function: &str, payload: Value) -> Result<Vec<ProviderRow>> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(AppError::Provider(format!(
                    "{} returned a non-object row: {}",
                    function, other
                ))),
            })
            .collect(),
        other => Err(AppError::Provider(format!(
            "{} returned unexpected payload type: {}",
            function,
            match other {
                Value::Object(_) => "object",
                Value::String(_) => "string",
                Value::Number(_) => "number",
                _ => "bool",
            }
        ))),
    }
}
