use crate::config::Config;
use crate::errors::AppError;
use crate::models::ValidationVerdict;
use reqwest::Client;
use serde_json::Value;

/// Client for the Debounce single-email validation endpoint.
pub struct DebounceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DebounceClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Debounce client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.debounce_base_url.clone(),
            api_key: config.debounce_api_key.clone(),
        })
    }

    /// Classify an email's deliverability.
    ///
    /// Never fails: a broken call is reported as [`ValidationVerdict::Anomaly`]
    /// so the caller can skip the email and move on.
    pub async fn check(&self, email: &str) -> ValidationVerdict {
        match self.fetch_result_class(email).await {
            Ok(class) => {
                let verdict = ValidationVerdict::from_result_class(class.as_deref());
                tracing::debug!("Debounce verdict for {}: {:?}", email, verdict);
                verdict
            }
            Err(e) => {
                tracing::warn!("⚠️  Debounce check failed for {}: {}", email, e);
                ValidationVerdict::Anomaly(e.to_string())
            }
        }
    }

    /// Reads `debounce.result`; `Ok(None)` when the field is absent.
    async fn fetch_result_class(&self, email: &str) -> Result<Option<String>, AppError> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/", self.base_url),
            &[("api", self.api_key.as_str()), ("email", email)],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

        // Redact key from logs
        tracing::debug!("Debounce URL: {}/v1/?api=[REDACTED]&email={}", self.base_url, email);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Debounce request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Debounce returned status {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::UnexpectedResponse(format!("Failed to parse Debounce response: {}", e))
        })?;

        Ok(body
            .get("debounce")
            .and_then(|d| d.get("result"))
            .and_then(|r| r.as_str())
            .map(String::from))
    }
}
