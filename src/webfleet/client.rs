use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::api::VehicleApi;
use super::error::ApiError;
use crate::event::Severity;

const DEFAULT_API_URL: &str = "https://csv.webfleet.com/extern";

/// Client for the Webfleet `extern` endpoint.
///
/// Every action is a GET with the account credentials as query parameters
/// and `outputformat=json`. Errors come back as a JSON envelope rather than
/// an HTTP status, so the body is inspected after decoding.
pub struct WebfleetClient {
    http: reqwest::Client,
    api_url: String,
    account: String,
    username: String,
    apikey: String,
}

impl WebfleetClient {
    pub fn new(
        account: String,
        username: String,
        apikey: String,
        api_url: Option<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            account,
            username,
            apikey,
        })
    }

    async fn request(&self, action: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let base_params = [
            ("account", self.account.as_str()),
            ("username", self.username.as_str()),
            ("apikey", self.apikey.as_str()),
            ("lang", "en"),
            ("outputformat", "json"),
            ("action", action),
        ];

        debug!(action, "Webfleet request");

        let response = self
            .http
            .get(&self.api_url)
            .query(&base_params)
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;

        // Some actions return an empty body for an empty result set.
        if body.trim().is_empty() {
            return Ok(Value::Array(vec![]));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            message: format!("{e} (body: {})", body.chars().take(200).collect::<String>()),
        })?;

        check_error_envelope(&value)?;
        Ok(value)
    }
}

/// Rejects responses carrying the Webfleet error envelope.
fn check_error_envelope(value: &Value) -> Result<(), ApiError> {
    let Some(obj) = value.as_object() else {
        return Ok(());
    };

    if let Some(code) = obj.get("errorCode") {
        let message = obj
            .get("errorMsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ApiError::Remote {
            code: code.as_i64().unwrap_or(-1),
            message,
        });
    }

    if let Some(err) = obj.get("error") {
        return Err(ApiError::Remote {
            code: -1,
            message: err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string()),
        });
    }

    Ok(())
}

#[async_trait::async_trait]
impl VehicleApi for WebfleetClient {
    async fn fetch_events(
        &self,
        range_pattern: &str,
        severity: Severity,
    ) -> Result<Value, ApiError> {
        let params = [
            ("range_pattern", range_pattern.to_string()),
            ("eventlevel_cur", severity.code().to_string()),
        ];
        self.request("showEventReportExtern", &params).await
    }

    async fn switch_output(
        &self,
        vehicle_id: &str,
        output_name: &str,
        active: bool,
        duration_secs: u64,
    ) -> Result<Value, ApiError> {
        let params = [
            ("objectno", vehicle_id.to_string()),
            ("outputname", output_name.to_string()),
            ("state", if active { "1" } else { "0" }.to_string()),
            ("duration", duration_secs.to_string()),
        ];
        self.request("switchoutput", &params).await
    }
}
