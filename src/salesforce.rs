use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    CandidateLead, QueryResponse, RelatedContact, SalesforceContact, SalesforceLead,
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Lead owners whose Negative Review leads are synced.
pub const LEAD_OWNERS: [&str; 2] = ["Vipul Babbar", "Anirudh Vashishth"];

/// How far back the candidate query looks.
pub const LOOKBACK_WEEKS: i64 = 4;

/// Authenticated Salesforce session obtained through the SOAP partner login.
pub struct SalesforceSession {
    client: Client,
    instance_url: String,
    session_id: String,
    api_version: String,
}

impl SalesforceSession {
    /// Logs in with username, password and security token.
    pub async fn login(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Salesforce client: {}", e))
            })?;

        let url = format!(
            "{}/services/Soap/u/{}",
            config.sf_login_url, config.sf_api_version
        );
        let envelope = login_envelope(
            &config.sf_username,
            &format!("{}{}", config.sf_password, config.sf_token),
        );

        tracing::info!("Logging in to Salesforce as {}", config.sf_username);

        let response = client
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(envelope)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Salesforce login request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            let fault = extract_xml_tag(&body, "faultstring")?
                .unwrap_or_else(|| format!("status {}", status));
            return Err(AppError::Auth(format!("Salesforce rejected login: {}", fault)));
        }

        let session_id = extract_xml_tag(&body, "sessionId")?.ok_or_else(|| {
            AppError::UnexpectedResponse("Salesforce login response missing sessionId".to_string())
        })?;
        let server_url = extract_xml_tag(&body, "serverUrl")?.ok_or_else(|| {
            AppError::UnexpectedResponse("Salesforce login response missing serverUrl".to_string())
        })?;
        let instance_url = instance_from_server_url(&server_url)?;

        tracing::info!("✓ Salesforce session established: {}", instance_url);

        Ok(Self {
            client,
            instance_url,
            session_id,
            api_version: config.sf_api_version.clone(),
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Fetch Negative Review leads created within the lookback window.
    pub async fn fetch_candidate_leads(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateLead>, AppError> {
        let soql = candidate_lead_query(now);
        let records: Vec<SalesforceLead> = self.query_all(&soql).await?;

        Ok(records.into_iter().map(CandidateLead::from).collect())
    }

    /// Fetch every contact attached to the named account.
    pub async fn fetch_account_contacts(
        &self,
        account_name: &str,
    ) -> Result<Vec<RelatedContact>, AppError> {
        let soql = account_contacts_query(account_name);
        let records: Vec<SalesforceContact> = self.query_all(&soql).await?;

        tracing::info!(
            "Found {} contact(s) on account {}",
            records.len(),
            account_name
        );
        Ok(records.into_iter().map(RelatedContact::from).collect())
    }

    /// Runs a SOQL query and follows `nextRecordsUrl` until every batch is read.
    async fn query_all<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, AppError> {
        let first = reqwest::Url::parse_with_params(
            &format!(
                "{}/services/data/v{}/query",
                self.instance_url, self.api_version
            ),
            &[("q", soql)],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build query URL: {}", e)))?;

        tracing::debug!("SOQL: {}", soql.split_whitespace().collect::<Vec<_>>().join(" "));

        let mut page: QueryResponse<T> = self.get_page(first).await?;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                tracing::warn!("Salesforce query not done but no nextRecordsUrl was returned");
                break;
            };
            let url = reqwest::Url::parse(&format!("{}{}", self.instance_url, next))
                .map_err(|e| AppError::InternalError(format!("Bad nextRecordsUrl: {}", e)))?;
            page = self.get_page(url).await?;
            records.append(&mut page.records);
        }

        Ok(records)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: reqwest::Url,
    ) -> Result<QueryResponse<T>, AppError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.session_id)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Salesforce query failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Salesforce query returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::UnexpectedResponse(format!("Failed to parse Salesforce query response: {}", e))
        })
    }
}

/// SOQL selecting Negative Review leads owned by the sync owners.
pub fn candidate_lead_query(now: DateTime<Utc>) -> String {
    let check_time = now - Duration::weeks(LOOKBACK_WEEKS);
    let owners = LEAD_OWNERS
        .iter()
        .map(|owner| format!("Owner.Name = {}", soql_literal(owner)))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!(
        "SELECT Id, Email, FirstName, LastName, Company, \
         Account_Traffic__c, Account_s_Current_Tool__c, Account_Primary_Category__c, \
         Related_Account__r.Name, Related_Contact__r.Name \
         FROM Lead \
         WHERE CreatedDate > {} \
         AND LeadSource = 'Outbound' \
         AND Sub_Channel__c = 'Negative Review' \
         AND ({})",
        check_time.format("%Y-%m-%dT%H:%M:%SZ"),
        owners
    )
}

/// SOQL selecting the contacts of one account.
pub fn account_contacts_query(account_name: &str) -> String {
    format!(
        "SELECT Id, Email, FirstName, LastName, Left_the_Company__c \
         FROM Contact \
         WHERE Account.Name = {}",
        soql_literal(account_name)
    )
}

/// Quotes a value as a SOQL string literal, escaping every character SOQL
/// treats specially inside one.
pub fn soql_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn login_envelope(username: &str, password: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:urn="urn:partner.soap.sforce.com">
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        xml_escape(username),
        xml_escape(password)
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Text of the first `<tag>` (any namespace prefix) in a SOAP body.
fn extract_xml_tag(body: &str, tag: &str) -> Result<Option<String>, AppError> {
    let pattern = format!(r"<(?:\w+:)?{tag}>([^<]*)</(?:\w+:)?{tag}>", tag = regex::escape(tag));
    let re = Regex::new(&pattern)
        .map_err(|e| AppError::InternalError(format!("Invalid tag pattern: {}", e)))?;

    Ok(re
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string()))
}

/// `https://eu12.my.salesforce.com/services/Soap/u/59.0/00D...` -> `https://eu12.my.salesforce.com`
fn instance_from_server_url(server_url: &str) -> Result<String, AppError> {
    let parsed = url::Url::parse(server_url).map_err(|e| {
        AppError::UnexpectedResponse(format!("Invalid serverUrl '{}': {}", server_url, e))
    })?;
    Ok(parsed.origin().ascii_serialization())
}
