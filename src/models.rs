use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder written wherever Salesforce has no value for a field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Debounce result classes that are safe to push to the campaign.
pub const ACCEPTED_RESULTS: [&str; 3] = ["Accept All", "Deliverable", "Safe to Send"];

// ============ Sync Modes ============

/// Which flavour of the sync a binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Qualifying leads only; column 7 names the lead's related contact.
    LeadsOnly,
    /// Leads plus their account colleagues; column 7 holds the sync role.
    WithColleagues,
}

impl SyncMode {
    /// Header row written to an empty tracker tab.
    pub fn header(&self) -> [&'static str; 7] {
        let label = match self {
            SyncMode::LeadsOnly => "Related Contact Name",
            SyncMode::WithColleagues => "Person Type",
        };
        [
            "Email",
            "TimeStamp",
            "Related Account",
            "Account Traffic",
            "Current Tool",
            "Account Category",
            label,
        ]
    }

    /// Spreadsheet opened when `TRACKER_SHEET_NAME` is not set.
    pub fn default_tracker_name(&self) -> &'static str {
        match self {
            SyncMode::LeadsOnly => "Negative_Review_Tracker",
            SyncMode::WithColleagues => "Negative_Review_Colleague_Tracker",
        }
    }
}

/// Role label recorded for each email in colleague mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncRole {
    #[serde(rename = "Main Lead")]
    MainLead,
    #[serde(rename = "Related Contact")]
    RelatedContact,
}

impl SyncRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRole::MainLead => "Main Lead",
            SyncRole::RelatedContact => "Related Contact",
        }
    }
}

// ============ Salesforce API Models ============

/// Envelope returned by the REST `query` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    #[serde(default)]
    pub total_size: u64,
    pub done: bool,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub next_records_url: Option<String>,
}

/// `Name` of a lookup relationship such as `Related_Account__r`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipName {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

/// Raw `Lead` row as selected by the candidate query.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesforceLead {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "Company", default)]
    pub company: Option<String>,
    // Formula fields may come back as numbers
    #[serde(rename = "Account_Traffic__c", default)]
    pub account_traffic: Option<Value>,
    #[serde(rename = "Account_s_Current_Tool__c", default)]
    pub current_tool: Option<Value>,
    #[serde(rename = "Account_Primary_Category__c", default)]
    pub primary_category: Option<Value>,
    #[serde(rename = "Related_Account__r", default)]
    pub related_account: Option<RelationshipName>,
    #[serde(rename = "Related_Contact__r", default)]
    pub related_contact: Option<RelationshipName>,
}

/// Raw `Contact` row returned by the per-account query.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesforceContact {
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "Left_the_Company__c", default)]
    pub left_the_company: Option<bool>,
}

// ============ Domain Models ============

/// A lead that matched the sync query, with every attribute resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLead {
    pub id: String,
    /// Lowercased and trimmed; empty when Salesforce has no email.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_name: String,
    pub traffic: String,
    pub tool: String,
    pub category: String,
    pub related_contact_name: String,
}

impl CandidateLead {
    /// Whether colleague discovery has a real account to look up.
    pub fn has_account(&self) -> bool {
        self.account_name != NOT_AVAILABLE
    }
}

impl From<SalesforceLead> for CandidateLead {
    fn from(lead: SalesforceLead) -> Self {
        let account_name = relationship_name(lead.related_account.as_ref())
            .or_else(|| non_empty(lead.company.as_deref()))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let related_contact_name = relationship_name(lead.related_contact.as_ref())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Self {
            id: lead.id,
            email: normalize_email(lead.email.as_deref()),
            first_name: lead.first_name,
            last_name: lead.last_name,
            account_name,
            traffic: field_text(lead.account_traffic.as_ref()),
            tool: field_text(lead.current_tool.as_ref()),
            category: field_text(lead.primary_category.as_ref()),
            related_contact_name,
        }
    }
}

/// A colleague found on the same account as a synced lead.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedContact {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub left_company: bool,
}

impl From<SalesforceContact> for RelatedContact {
    fn from(contact: SalesforceContact) -> Self {
        Self {
            email: normalize_email(contact.email.as_deref()),
            first_name: contact.first_name,
            last_name: contact.last_name,
            left_company: contact.left_the_company.unwrap_or(false),
        }
    }
}

/// Column 7 of the tracker and the matching Smartlead custom field.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignLabel {
    RelatedContactName(String),
    PersonType(SyncRole),
}

impl CampaignLabel {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignLabel::RelatedContactName(name) => name,
            CampaignLabel::PersonType(role) => role.as_str(),
        }
    }
}

/// Everything the campaign push needs for one email.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignLead {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_name: String,
    pub traffic: String,
    pub tool: String,
    pub category: String,
    pub label: CampaignLabel,
}

impl CampaignLead {
    /// Builds the campaign entry for a lead in the given mode.
    pub fn for_lead(lead: &CandidateLead, mode: SyncMode) -> Self {
        let label = match mode {
            SyncMode::LeadsOnly => CampaignLabel::RelatedContactName(lead.related_contact_name.clone()),
            SyncMode::WithColleagues => CampaignLabel::PersonType(SyncRole::MainLead),
        };
        Self {
            email: lead.email.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            account_name: lead.account_name.clone(),
            traffic: lead.traffic.clone(),
            tool: lead.tool.clone(),
            category: lead.category.clone(),
            label,
        }
    }

    /// Builds the campaign entry for a colleague; account attributes come from the lead.
    pub fn for_colleague(contact: &RelatedContact, lead: &CandidateLead) -> Self {
        Self {
            email: contact.email.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            account_name: lead.account_name.clone(),
            traffic: lead.traffic.clone(),
            tool: lead.tool.clone(),
            category: lead.category.clone(),
            label: CampaignLabel::PersonType(SyncRole::RelatedContact),
        }
    }
}

/// One row of the tracking spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub email: String,
    pub timestamp: String,
    pub account_name: String,
    pub traffic: String,
    pub tool: String,
    pub category: String,
    pub label: String,
}

impl TrackingEntry {
    /// Stamps a successfully pushed lead with the local time.
    pub fn stamped(lead: &CampaignLead) -> Self {
        Self {
            email: lead.email.clone(),
            timestamp: local_timestamp(),
            account_name: lead.account_name.clone(),
            traffic: lead.traffic.clone(),
            tool: lead.tool.clone(),
            category: lead.category.clone(),
            label: lead.label.as_str().to_string(),
        }
    }

    /// Cells in tracker column order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.email.clone(),
            self.timestamp.clone(),
            self.account_name.clone(),
            self.traffic.clone(),
            self.tool.clone(),
            self.category.clone(),
            self.label.clone(),
        ]
    }
}

/// Outcome of a deliverability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    /// Accepted class; push the email.
    Proceed(String),
    /// Any other class (or none); skip silently.
    Skip(String),
    /// The check itself failed; skip and log.
    Anomaly(String),
}

impl ValidationVerdict {
    /// Classifies the `debounce.result` field.
    pub fn from_result_class(class: Option<&str>) -> Self {
        match class {
            Some(c) if ACCEPTED_RESULTS.contains(&c) => ValidationVerdict::Proceed(c.to_string()),
            Some(c) => ValidationVerdict::Skip(c.to_string()),
            None => ValidationVerdict::Skip("missing result".to_string()),
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, ValidationVerdict::Proceed(_))
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub candidates: usize,
    pub leads_synced: usize,
    pub contacts_synced: usize,
    pub duplicates: usize,
    pub missing_email: usize,
    pub rejected: usize,
    pub anomalies: usize,
    pub push_failures: usize,
    pub journaled: usize,
    /// Pushed, but neither the tracker nor the journal took the row.
    pub unrecorded: usize,
    pub left_company: usize,
    pub replayed: usize,
}

// ============ Helpers ============

/// Lowercases and trims an email; `None` becomes the empty string.
pub fn normalize_email(raw: Option<&str>) -> String {
    raw.map(|e| e.trim().to_lowercase()).unwrap_or_default()
}

/// Local wall-clock time in ISO-8601 with microseconds and no offset.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn relationship_name(rel: Option<&RelationshipName>) -> Option<String> {
    rel.and_then(|r| non_empty(r.name.as_deref()))
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}
