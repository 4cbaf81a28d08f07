use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CampaignLabel, CampaignLead};
use reqwest::Client;
use serde::Serialize;

/// Value of the `source` custom field on every pushed lead.
pub const LEAD_SOURCE: &str = "Salesforce Negative Review";

/// Client for adding leads to a Smartlead campaign.
pub struct SmartleadClient {
    client: Client,
    base_url: String,
    api_key: String,
    campaign_id: String,
}

#[derive(Debug, Serialize)]
pub struct AddLeadsRequest<'a> {
    pub lead_list: Vec<LeadPayload<'a>>,
    pub settings: AddLeadsSettings,
}

#[derive(Debug, Serialize)]
pub struct LeadPayload<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub custom_fields: CustomFields<'a>,
}

#[derive(Debug, Serialize)]
pub struct CustomFields<'a> {
    pub source: &'a str,
    pub related_account_id: &'a str,
    pub account_traffic: &'a str,
    pub current_tool: &'a str,
    pub account_category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_contact_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_type: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AddLeadsSettings {
    pub ignore_duplicate_leads_in_other_campaign: bool,
}

impl<'a> AddLeadsRequest<'a> {
    /// Wraps a single lead in the campaign's batch body.
    pub fn single(lead: &'a CampaignLead) -> Self {
        let (related_contact_name, person_type) = match &lead.label {
            CampaignLabel::RelatedContactName(name) => (Some(name.as_str()), None),
            CampaignLabel::PersonType(role) => (None, Some(role.as_str())),
        };

        Self {
            lead_list: vec![LeadPayload {
                email: lead.email.trim(),
                first_name: lead.first_name.as_deref().unwrap_or("").trim(),
                last_name: lead.last_name.as_deref().unwrap_or("").trim(),
                custom_fields: CustomFields {
                    source: LEAD_SOURCE,
                    related_account_id: &lead.account_name,
                    account_traffic: &lead.traffic,
                    current_tool: &lead.tool,
                    account_category: &lead.category,
                    related_contact_name,
                    person_type,
                },
            }],
            settings: AddLeadsSettings {
                ignore_duplicate_leads_in_other_campaign: false,
            },
        }
    }
}

impl SmartleadClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Smartlead client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.smartlead_base_url.clone(),
            api_key: config.smartlead_api_key.clone(),
            campaign_id: config.smartlead_campaign_id.clone(),
        })
    }

    /// Adds one lead to the campaign.
    ///
    /// Returns `true` only when Smartlead answers 200 or 201. Transport errors
    /// are logged and reported as `false`; nothing is retried.
    pub async fn push_lead(&self, lead: &CampaignLead) -> bool {
        match self.send(lead).await {
            Ok(status) if status == 200 || status == 201 => {
                tracing::info!("✓ Pushed {} to campaign {}", lead.email, self.campaign_id);
                true
            }
            Ok(status) => {
                tracing::warn!(
                    "⚠️  Smartlead rejected {} with status {}",
                    lead.email,
                    status
                );
                false
            }
            Err(e) => {
                tracing::warn!("⚠️  Smartlead API fail for {}: {}", lead.email, e);
                false
            }
        }
    }

    async fn send(&self, lead: &CampaignLead) -> Result<u16, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/api/v1/campaigns/{}/leads",
                self.base_url, self.campaign_id
            ),
            &[("api_key", self.api_key.as_str())],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

        let body = AddLeadsRequest::single(lead);

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Smartlead request failed: {}", e)))?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let error_text = response.text().await.unwrap_or_default();
            tracing::debug!("Smartlead response body: {}", error_text);
        }
        Ok(status)
    }
}
