use crate::errors::AppError;
use std::path::PathBuf;
use std::time::Duration;

/// Campaign that receives Negative Review leads unless overridden.
pub const DEFAULT_CAMPAIGN_ID: &str = "2859924";

#[derive(Debug, Clone)]
pub struct Config {
    pub sf_username: String,
    pub sf_password: String,
    pub sf_token: String,
    pub sf_login_url: String,
    pub sf_api_version: String,
    pub debounce_api_key: String,
    pub debounce_base_url: String,
    pub smartlead_api_key: String,
    pub smartlead_base_url: String,
    pub smartlead_campaign_id: String,
    pub gcp_creds: String,
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub tracker_sheet_name: Option<String>,
    pub tracker_spreadsheet_id: Option<String>,
    pub journal_path: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Self {
            sf_username: required("SF_USERNAME")?,
            sf_password: required("SF_PASSWORD")?,
            sf_token: required("SF_TOKEN")?,
            sf_login_url: base_url("SF_LOGIN_URL", "https://login.salesforce.com")?,
            sf_api_version: optional("SF_API_VERSION").unwrap_or_else(|| "59.0".to_string()),
            debounce_api_key: required("DEBOUNCE_API_KEY")?,
            debounce_base_url: base_url("DEBOUNCE_BASE_URL", "https://api.debounce.io")?,
            // CI secrets tend to carry a trailing newline
            smartlead_api_key: required("SMARTLEAD_API_KEY")?.trim().to_string(),
            smartlead_base_url: base_url("SMARTLEAD_BASE_URL", "https://server.smartlead.ai")?,
            smartlead_campaign_id: optional("SMARTLEAD_CAMPAIGN_ID")
                .unwrap_or_else(|| DEFAULT_CAMPAIGN_ID.to_string()),
            gcp_creds: required("GCP_CREDS")?,
            sheets_base_url: base_url("GOOGLE_SHEETS_BASE_URL", "https://sheets.googleapis.com")?,
            drive_base_url: base_url("GOOGLE_DRIVE_BASE_URL", "https://www.googleapis.com")?,
            tracker_sheet_name: optional("TRACKER_SHEET_NAME"),
            tracker_spreadsheet_id: optional("TRACKER_SPREADSHEET_ID"),
            journal_path: optional("SYNC_JOURNAL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".sync_unlogged.jsonl")),
            http_timeout: Duration::from_secs(
                optional("HTTP_TIMEOUT_SECS")
                    .map(|raw| {
                        raw.parse::<u64>().map_err(|_| {
                            AppError::ConfigMissing(
                                "HTTP_TIMEOUT_SECS must be a whole number of seconds".to_string(),
                            )
                        })
                    })
                    .transpose()?
                    .unwrap_or(30),
            ),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Salesforce login URL: {}", config.sf_login_url);
        tracing::debug!("Smartlead campaign: {}", config.smartlead_campaign_id);
        if let Some(ref id) = config.tracker_spreadsheet_id {
            tracing::debug!("Tracker spreadsheet pinned by id: {}", id);
        }
        tracing::debug!("Journal path: {}", config.journal_path.display());

        Ok(config)
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn required(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .map_err(|_| AppError::ConfigMissing(format!("{} environment variable required", name)))
        .and_then(|value| {
            if value.trim().is_empty() {
                return Err(AppError::ConfigMissing(format!("{} cannot be empty", name)));
            }
            Ok(value)
        })
}

fn base_url(name: &str, default: &str) -> Result<String, AppError> {
    let url = optional(name).unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::ConfigMissing(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}
