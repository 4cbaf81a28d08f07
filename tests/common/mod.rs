//! Shared mock-server fixtures for the integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use sf_smartlead_sync::config::{Config, DEFAULT_CAMPAIGN_ID};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param_contains};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SPREADSHEET_ID: &str = "sheet-123";
pub const SESSION_ID: &str = "00D000000000001!AQ4AQtestsession";
pub const QUERY_PATH: &str = "/services/data/v59.0/query";

/// Config with every external endpoint pointed at the mock server.
pub fn create_test_config(server_uri: &str, journal_path: &Path) -> Config {
    Config {
        sf_username: "ops@example.com".to_string(),
        sf_password: "password".to_string(),
        sf_token: "token".to_string(),
        sf_login_url: server_uri.to_string(),
        sf_api_version: "59.0".to_string(),
        debounce_api_key: "debounce_key".to_string(),
        debounce_base_url: server_uri.to_string(),
        smartlead_api_key: "smartlead_key".to_string(),
        smartlead_base_url: server_uri.to_string(),
        smartlead_campaign_id: DEFAULT_CAMPAIGN_ID.to_string(),
        gcp_creds: service_account_json(&format!("{}/token", server_uri)),
        sheets_base_url: server_uri.to_string(),
        drive_base_url: server_uri.to_string(),
        tracker_sheet_name: None,
        tracker_spreadsheet_id: Some(SPREADSHEET_ID.to_string()),
        journal_path: journal_path.to_path_buf(),
        http_timeout: Duration::from_secs(5),
    }
}

/// The fixture service-account key with its token URI rewritten.
pub fn service_account_json(token_uri: &str) -> String {
    let mut key: Value =
        serde_json::from_str(include_str!("../fixtures/service_account.json")).unwrap();
    key["token_uri"] = json!(token_uri);
    key.to_string()
}

pub async fn mount_salesforce_login(server: &MockServer) {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:partner.soap.sforce.com">
  <soapenv:Body>
    <loginResponse>
      <result>
        <metadataServerUrl>{uri}/services/Soap/m/59.0/00D000000000001</metadataServerUrl>
        <passwordExpired>false</passwordExpired>
        <sandbox>false</sandbox>
        <serverUrl>{uri}/services/Soap/u/59.0/00D000000000001</serverUrl>
        <sessionId>{session}</sessionId>
      </result>
    </loginResponse>
  </soapenv:Body>
</soapenv:Envelope>"#,
        uri = server.uri(),
        session = SESSION_ID
    );

    Mock::given(method("POST"))
        .and(path("/services/Soap/u/59.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/xml"))
        .mount(server)
        .await;
}

pub async fn mount_candidate_leads(server: &MockServer, leads: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(query_param_contains("q", "FROM Lead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": leads.len(),
            "done": true,
            "records": leads
        })))
        .mount(server)
        .await;
}

pub async fn mount_account_contacts(
    server: &MockServer,
    account_clause: &str,
    contacts: Vec<Value>,
    expected_calls: u64,
) {
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(query_param_contains("q", "FROM Contact"))
        .and(query_param_contains("q", account_clause))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": contacts.len(),
            "done": true,
            "records": contacts
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_google_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

/// Tracker metadata plus reads of the existing column A emails.
///
/// An empty slice models a brand-new tab without a header.
pub async fn mount_tracker(server: &MockServer, existing_emails: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{}", SPREADSHEET_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                {"properties": {"title": "Archive", "index": 1}},
                {"properties": {"title": "Sheet1", "index": 0}}
            ]
        })))
        .mount(server)
        .await;

    let mut column_a: Vec<Value> = Vec::new();
    if !existing_emails.is_empty() {
        column_a.push(json!(["Email"]));
        column_a.extend(existing_emails.iter().map(|e| json!([e])));
    }

    let all_values = if column_a.is_empty() {
        json!({"range": "Sheet1!A1:G1000", "majorDimension": "ROWS"})
    } else {
        json!({"range": "Sheet1!A1:G1000", "majorDimension": "ROWS", "values": column_a})
    };

    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/.*A:G$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(all_values.clone()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/.*A:A$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(all_values))
        .mount(server)
        .await;
}

pub async fn mount_tracker_append(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/.*:append$"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "spreadsheetId": SPREADSHEET_ID,
            "updates": {"updatedRows": 1}
        })))
        .mount(server)
        .await;
}

/// Debounce answering `result` for every email.
pub async fn mount_debounce(server: &MockServer, result: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(debounce_body(result)))
        .mount(server)
        .await;
}

pub fn debounce_body(result: &str) -> Value {
    json!({
        "debounce": {
            "email": "someone@example.com",
            "code": "5",
            "role": "false",
            "free_email": "false",
            "result": result,
            "reason": "Deliverable",
            "send_transactional": "1",
            "did_you_mean": ""
        },
        "success": "1",
        "balance": "9000"
    })
}

pub async fn mount_smartlead(server: &MockServer, status: u16, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/campaigns/{}/leads", DEFAULT_CAMPAIGN_ID)))
        .and(query_param_contains("api_key", "smartlead_key"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "ok": true,
            "upload_count": 1,
            "total_leads": 1
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn lead_record(id: &str, email: Option<&str>, account: &str) -> Value {
    json!({
        "attributes": {"type": "Lead", "url": format!("/services/data/v59.0/sobjects/Lead/{}", id)},
        "Id": id,
        "Email": email,
        "FirstName": "Jane",
        "LastName": "Doe",
        "Company": null,
        "Account_Traffic__c": "High",
        "Account_s_Current_Tool__c": "Excel",
        "Account_Primary_Category__c": "Retail",
        "Related_Account__r": {"attributes": {"type": "Account"}, "Name": account},
        "Related_Contact__r": {"attributes": {"type": "Contact"}, "Name": "John Roe"}
    })
}

pub fn contact_record(id: &str, email: Option<&str>, left_company: bool) -> Value {
    json!({
        "attributes": {"type": "Contact", "url": format!("/services/data/v59.0/sobjects/Contact/{}", id)},
        "Id": id,
        "Email": email,
        "FirstName": "Colleague",
        "LastName": id,
        "Left_the_Company__c": left_company
    })
}

/// Rows sent to the tracker's append endpoint, in order.
pub async fn appended_rows(server: &MockServer) -> Vec<Vec<String>> {
    requests_where(server, |r| {
        r.method.as_str() == "POST" && r.url.path().ends_with(":append")
    })
    .await
    .iter()
    .flat_map(|r| {
        let body: Value = r.body_json().unwrap();
        body["values"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                row.as_array()
                    .unwrap()
                    .iter()
                    .map(|c| c.as_str().unwrap().to_string())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
    })
    .collect()
}

/// Emails sent to Debounce, in order.
pub async fn validated_emails(server: &MockServer) -> Vec<String> {
    requests_where(server, |r| r.url.path() == "/v1/")
        .await
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "email")
                .map(|(_, v)| v.to_string())
        })
        .collect()
}

/// Emails pushed to Smartlead, in order.
pub async fn pushed_emails(server: &MockServer) -> Vec<String> {
    requests_where(server, |r| r.url.path().ends_with("/leads"))
        .await
        .iter()
        .map(|r| {
            let body: Value = r.body_json().unwrap();
            body["lead_list"][0]["email"].as_str().unwrap().to_string()
        })
        .collect()
}

/// SOQL strings sent to the query endpoint, in order.
pub async fn soql_queries(server: &MockServer) -> Vec<String> {
    requests_where(server, |r| r.url.path() == QUERY_PATH)
        .await
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "q")
                .map(|(_, v)| v.to_string())
        })
        .collect()
}

async fn requests_where<F>(server: &MockServer, keep: F) -> Vec<Request>
where
    F: Fn(&Request) -> bool,
{
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| keep(r))
        .collect()
}
