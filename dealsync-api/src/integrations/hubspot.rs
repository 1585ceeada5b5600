//! HubSpot CRM v3 client.
//!
//! Every request goes through the shared rate limiter and is retried up to
//! `max_attempts` times. Searches and updates are retried on 429, 5xx and
//! connection failures; deal creation only when HubSpot cannot have applied it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use shared_types::{Contact, DateWindow, Deal, FollowUpStatus, NewDeal};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::HubSpotConfig;
use crate::helpers::rate_limiter::RateLimiter;
use crate::integrations::crm::{ContactPage, CrmClient, CrmError};

/// HubSpot-defined association type for deal -> contact
const DEAL_TO_CONTACT_ASSOCIATION_TYPE: u32 = 3;
const CONTACT_PROPERTIES: &[&str] = &["id", "firstname", "email", "createdate"];
const DEAL_PROPERTIES: &[&str] = &[
    "dealname",
    "pipeline",
    "dealstage",
    "amount",
    "follow_up_status",
];
const RETRY_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct HubspotSearchRequest {
    #[serde(rename = "filterGroups")]
    filter_groups: Vec<HubspotFilterGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
}

#[derive(Debug, Serialize)]
struct HubspotFilterGroup {
    filters: Vec<HubspotFilter>,
}

#[derive(Debug, Serialize)]
struct HubspotFilter {
    #[serde(rename = "propertyName")]
    property_name: String,
    operator: String,
    value: String,
    #[serde(rename = "highValue", skip_serializing_if = "Option::is_none")]
    high_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HubspotSearchResponse {
    #[serde(default)]
    results: Vec<HubspotObject>,
    paging: Option<HubspotPaging>,
}

#[derive(Debug, Deserialize)]
struct HubspotPaging {
    next: Option<HubspotNextPage>,
}

#[derive(Debug, Deserialize)]
struct HubspotNextPage {
    after: String,
}

#[derive(Debug, Deserialize)]
struct HubspotObject {
    id: String,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

impl HubspotObject {
    /// Property values come back as strings, occasionally as numbers or null
    fn property(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn into_contact(self) -> Contact {
        let created_at = self
            .property("createdate")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Contact::new(
            self.id.clone(),
            self.property("firstname"),
            self.property("email"),
            created_at,
        )
    }

    fn into_deal(self, contact_id: &str) -> Deal {
        Deal {
            name: self.property("dealname").unwrap_or_default(),
            pipeline: self.property("pipeline").unwrap_or_default(),
            stage: self.property("dealstage").unwrap_or_default(),
            amount: self.property("amount").and_then(|s| s.parse::<f64>().ok()),
            follow_up_status: self.property("follow_up_status").map(FollowUpStatus::from),
            associated_contact_id: contact_id.to_string(),
            id: self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HubspotCreatedObject {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    /// Searches and property updates; repeating them changes nothing
    Idempotent,
    /// Creates; retried only on 429 or when the connection was never made
    NotApplied,
}

impl RetryPolicy {
    fn retries_status(self, status: StatusCode) -> bool {
        match self {
            RetryPolicy::Idempotent => is_retryable(status),
            RetryPolicy::NotApplied => status == StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn retries_transport(self, error: &reqwest::Error) -> bool {
        match self {
            RetryPolicy::Idempotent => error.is_timeout() || error.is_connect(),
            RetryPolicy::NotApplied => error.is_connect(),
        }
    }
}

pub struct HubSpotClient {
    client: Client,
    api_base: String,
    access_token: String,
    max_attempts: u32,
    limiter: RateLimiter,
}

impl HubSpotClient {
    pub fn new(config: &HubSpotConfig) -> Result<Self, CrmError> {
        let access_token = config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CrmError::MissingCredentials)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token,
            max_attempts: config.max_attempts.max(1),
            limiter: RateLimiter::per_second(config.requests_per_second),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn contact_search_request(
        window: &DateWindow,
        page_size: u32,
        after: Option<String>,
    ) -> HubspotSearchRequest {
        HubspotSearchRequest {
            filter_groups: vec![HubspotFilterGroup {
                filters: vec![HubspotFilter {
                    property_name: "createdate".to_string(),
                    operator: "BETWEEN".to_string(),
                    value: window.start_param(),
                    high_value: Some(window.end_param()),
                }],
            }],
            properties: CONTACT_PROPERTIES.iter().map(|s| s.to_string()).collect(),
            limit: Some(page_size),
            after,
        }
    }

    fn deal_search_request(contact_id: &str) -> HubspotSearchRequest {
        HubspotSearchRequest {
            filter_groups: vec![HubspotFilterGroup {
                filters: vec![HubspotFilter {
                    property_name: "associations.contact".to_string(),
                    operator: "EQ".to_string(),
                    value: contact_id.to_string(),
                    high_value: None,
                }],
            }],
            properties: DEAL_PROPERTIES.iter().map(|s| s.to_string()).collect(),
            limit: None,
            after: None,
        }
    }

    fn create_deal_body(deal: &NewDeal) -> serde_json::Value {
        serde_json::json!({
            "properties": {
                "dealname": deal.name,
                "pipeline": deal.pipeline,
                "dealstage": deal.stage,
                "amount": deal.amount,
            },
            "associations": [{
                "to": { "id": deal.associated_contact_id },
                "types": [{
                    "associationCategory": "HUBSPOT_DEFINED",
                    "associationTypeId": DEAL_TO_CONTACT_ASSOCIATION_TYPE,
                }],
            }],
        })
    }

    /// Sends the request built by `build`, retrying transient failures.
    /// Returns the response body on success.
    async fn send(
        &self,
        operation: &str,
        policy: RetryPolicy,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<String, CrmError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.acquire().await;

            let result = build().bearer_auth(&self.access_token).send().await;

            let (error, wait) = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    let retry_after = retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let error = CrmError::Status {
                        status: status.as_u16(),
                        body: truncate(body),
                    };

                    if !policy.retries_status(status) {
                        return Err(error);
                    }
                    (error, retry_after)
                }
                Err(e) if policy.retries_transport(&e) => (CrmError::Transport(e), None),
                Err(e) => return Err(CrmError::Transport(e)),
            };

            if attempt >= self.max_attempts {
                return Err(error);
            }

            let wait = wait.unwrap_or(RETRY_BACKOFF * attempt);
            warn!(
                error = &error as &dyn std::error::Error,
                "HubSpot {} attempt {} failed, retrying in {:?}",
                operation,
                attempt,
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay-seconds form only, capped at `MAX_RETRY_AFTER`
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn truncate(body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body
    }
}

fn parse_contact_page(body: &str) -> Result<ContactPage, CrmError> {
    let response: HubspotSearchResponse = serde_json::from_str(body)?;
    let next_after = response
        .paging
        .and_then(|p| p.next)
        .map(|next| next.after);

    Ok(ContactPage {
        contacts: response
            .results
            .into_iter()
            .map(HubspotObject::into_contact)
            .collect(),
        next_after,
    })
}

fn parse_deals(body: &str, contact_id: &str) -> Result<Vec<Deal>, CrmError> {
    let response: HubspotSearchResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .into_iter()
        .map(|obj| obj.into_deal(contact_id))
        .collect())
}

#[async_trait]
impl CrmClient for HubSpotClient {
    #[instrument(level = "debug", skip(self, window))]
    async fn search_contacts(
        &self,
        window: &DateWindow,
        page_size: u32,
        after: Option<String>,
    ) -> Result<ContactPage, CrmError> {
        let url = self.url("/crm/v3/objects/contacts/search");
        let request = Self::contact_search_request(window, page_size, after);

        let body = self
            .send("contact search", RetryPolicy::Idempotent, || {
                self.client.post(&url).json(&request)
            })
            .await?;
        let page = parse_contact_page(&body)?;

        debug!(
            "Fetched {} contacts (more pages: {})",
            page.contacts.len(),
            page.next_after.is_some()
        );
        Ok(page)
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_deals_for_contact(&self, contact_id: &str) -> Result<Vec<Deal>, CrmError> {
        let url = self.url("/crm/v3/objects/deals/search");
        let request = Self::deal_search_request(contact_id);

        let body = self
            .send("deal search", RetryPolicy::Idempotent, || {
                self.client.post(&url).json(&request)
            })
            .await?;
        parse_deals(&body, contact_id)
    }

    #[instrument(level = "debug", skip(self, status), fields(status = %status))]
    async fn update_follow_up_status(
        &self,
        deal_id: &str,
        status: &FollowUpStatus,
    ) -> Result<(), CrmError> {
        let url = self.url(&format!("/crm/v3/objects/deals/{}", deal_id));
        let patch = serde_json::json!({
            "properties": { "follow_up_status": status.as_str() }
        });

        self.send("deal update", RetryPolicy::Idempotent, || {
            self.client.patch(&url).json(&patch)
        })
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, deal), fields(contact_id = %deal.associated_contact_id))]
    async fn create_deal(&self, deal: &NewDeal) -> Result<String, CrmError> {
        let url = self.url("/crm/v3/objects/deals");
        let body = Self::create_deal_body(deal);

        let response = self
            .send("deal create", RetryPolicy::NotApplied, || {
                self.client.post(&url).json(&body)
            })
            .await?;
        let created: HubspotCreatedObject = serde_json::from_str(&response)?;
        Ok(created.id)
    }
}
