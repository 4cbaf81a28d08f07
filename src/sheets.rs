//! Google Sheets tracking store.
//!
//! The first tab of the tracker spreadsheet is an append-only log with one row
//! per synced email. Column A is read back at the start of every run as the
//! "already processed" set.

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{SyncMode, TrackingEntry};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// OAuth2 scopes requested for the service account.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// The subset of a service-account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: u32,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Handle on the first tab of the tracker spreadsheet.
pub struct TrackerSheet {
    client: Client,
    sheets_base_url: String,
    access_token: String,
    spreadsheet_id: String,
    tab_title: String,
}

impl TrackerSheet {
    /// Authorizes, opens the tracker and writes the header row into an empty tab.
    ///
    /// Failures are logged here; the caller treats any error as "no store".
    pub async fn connect(config: &Config, mode: SyncMode) -> Result<Self, AppError> {
        match Self::open(config, mode).await {
            Ok(sheet) => Ok(sheet),
            Err(e) => {
                tracing::error!("❌ Google Sheet connection error: {}", e);
                Err(e)
            }
        }
    }

    async fn open(config: &Config, mode: SyncMode) -> Result<Self, AppError> {
        let key: ServiceAccountKey = serde_json::from_str(&config.gcp_creds).map_err(|e| {
            AppError::ConfigMissing(format!("GCP_CREDS is not a service-account key: {}", e))
        })?;

        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Google client: {}", e))
            })?;

        let access_token = fetch_access_token(&client, &key)
            .await
            .context("Google service-account authorization")?;

        let spreadsheet_id = match config.tracker_spreadsheet_id {
            Some(ref id) => id.clone(),
            None => {
                let name = config
                    .tracker_sheet_name
                    .as_deref()
                    .unwrap_or_else(|| mode.default_tracker_name());
                find_spreadsheet_id(&client, &config.drive_base_url, &access_token, name).await?
            }
        };

        let mut sheet = Self {
            client,
            sheets_base_url: config.sheets_base_url.clone(),
            access_token,
            spreadsheet_id,
            tab_title: String::new(),
        };
        sheet.tab_title = sheet.first_tab_title().await?;

        if sheet.values(&sheet.range("A:G")).await?.is_empty() {
            tracing::info!("Tracker tab '{}' is empty, writing header row", sheet.tab_title);
            let header = mode.header().iter().map(|h| h.to_string()).collect();
            sheet.append_row(header).await.context("Writing tracker header")?;
        }

        tracing::info!(
            "✓ Tracker sheet ready: {} / {}",
            sheet.spreadsheet_id,
            sheet.tab_title
        );
        Ok(sheet)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn tab_title(&self) -> &str {
        &self.tab_title
    }

    /// Every non-empty value of column A, lowercased and trimmed.
    pub async fn read_processed_emails(&self) -> Result<HashSet<String>, AppError> {
        let rows = self.values(&self.range("A:A")).await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.first())
            .map(cell_text)
            .map(|cell| cell.trim().to_lowercase())
            .filter(|cell| !cell.is_empty())
            .collect())
    }

    /// Appends one tracking row below the existing data.
    pub async fn append(&self, entry: &TrackingEntry) -> Result<(), AppError> {
        self.append_row(entry.to_row())
            .await
            .with_context(|| format!("Appending tracker row for {}", entry.email))
    }

    async fn append_row(&self, cells: Vec<String>) -> Result<(), AppError> {
        let mut url = self.values_url(&self.range("A1"), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [cells] }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Sheets append failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Sheets append returned {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }

    async fn values(&self, range: &str) -> Result<Vec<Vec<Value>>, AppError> {
        let url = self.values_url(range, "")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Sheets read failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Sheets read of {} returned {}: {}",
                range, status, error_text
            )));
        }

        let body: ValueRange = response.json().await.map_err(|e| {
            AppError::UnexpectedResponse(format!("Failed to parse Sheets values: {}", e))
        })?;
        Ok(body.values)
    }

    async fn first_tab_title(&self) -> Result<String, AppError> {
        let mut url = Url::parse(&format!(
            "{}/v4/spreadsheets/{}",
            self.sheets_base_url, self.spreadsheet_id
        ))
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Sheets metadata failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Sheets metadata returned {}: {}",
                status, error_text
            )));
        }

        let meta: SpreadsheetMeta = response.json().await.map_err(|e| {
            AppError::UnexpectedResponse(format!("Failed to parse spreadsheet metadata: {}", e))
        })?;

        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .map(|p| p.title)
            .ok_or_else(|| AppError::UnexpectedResponse("Spreadsheet has no tabs".to_string()))
    }

    /// A1 range on the first tab, e.g. `'Sheet1'!A:A`.
    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.tab_title.replace('\'', "''"), cells)
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&format!(
            "{}/v4/spreadsheets/{}/values",
            self.sheets_base_url, self.spreadsheet_id
        ))
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::InternalError("Sheets base URL cannot hold a path".to_string()))?
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }
}

/// Exchanges a signed JWT assertion for a bearer token.
async fn fetch_access_token(client: &Client, key: &ServiceAccountKey) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: &key.token_uri,
        iat: now,
        exp: now + 3600,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AppError::Auth(format!("Invalid service-account private key: {}", e)))?;
    let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| AppError::Auth(format!("Failed to sign assertion: {}", e)))?;

    let response = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("Token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::Auth(format!(
            "Token endpoint returned {}: {}",
            status, error_text
        )));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
        AppError::UnexpectedResponse(format!("Failed to parse token response: {}", e))
    })?;

    tracing::debug!("Google access token obtained for {}", key.client_email);
    Ok(token.access_token)
}

/// Looks up a spreadsheet by exact name through the Drive API.
async fn find_spreadsheet_id(
    client: &Client,
    drive_base_url: &str,
    access_token: &str,
    name: &str,
) -> Result<String, AppError> {
    let q = format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        drive_query_escape(name),
        SPREADSHEET_MIME
    );
    let url = Url::parse_with_params(
        &format!("{}/drive/v3/files", drive_base_url),
        &[
            ("q", q.as_str()),
            ("fields", "files(id,name)"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ],
    )
    .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

    tracing::info!("Looking up tracker spreadsheet '{}'", name);

    let response = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("Drive lookup failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::ExternalApiError(format!(
            "Drive lookup returned {}: {}",
            status, error_text
        )));
    }

    let list: DriveFileList = response.json().await.map_err(|e| {
        AppError::UnexpectedResponse(format!("Failed to parse Drive file list: {}", e))
    })?;

    list.files
        .into_iter()
        .next()
        .map(|f| f.id)
        .ok_or_else(|| {
            AppError::ExternalApiError(format!(
                "Spreadsheet '{}' not found or not shared with the service account",
                name
            ))
        })
}

fn drive_query_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
