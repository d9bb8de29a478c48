//! Client/lead snapshot as read from the document store.
//!
//! Every field is optional and decoded leniently: a value of the wrong shape
//! decodes as absent rather than rejecting the whole record, so scoring stays
//! total over partially-populated documents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CrmError, CrmResult};

/// Decode `T`, treating a malformed value the same as a missing one.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// ─── Enumerations ───────────────────────────────────────────────────────────

/// Channel a lead arrived through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Referral,
    WebsiteForm,
    Linkedin,
    Whatsapp,
    Facebook,
    GoogleAds,
    SocialMedia,
    ColdCall,
    Other,
}

impl LeadSource {
    pub fn weight(&self) -> u32 {
        match self {
            LeadSource::Referral => 25,
            LeadSource::WebsiteForm => 20,
            LeadSource::Linkedin => 18,
            LeadSource::Whatsapp => 15,
            LeadSource::Facebook => 12,
            LeadSource::GoogleAds => 12,
            LeadSource::SocialMedia => 10,
            LeadSource::ColdCall => 5,
            LeadSource::Other => 5,
        }
    }
}

/// Budget bucket declared in the assessment form (EUR).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BudgetRange {
    #[serde(rename = "60,000+")]
    Above60k,
    #[serde(rename = "30,000-60,000")]
    From30kTo60k,
    #[serde(rename = "15,000-30,000")]
    From15kTo30k,
    #[serde(rename = "8,000-15,000")]
    From8kTo15k,
    #[serde(rename = "3,000-8,000")]
    From3kTo8k,
    #[serde(rename = "under_3,000")]
    Under3k,
}

impl BudgetRange {
    pub fn weight(&self) -> u32 {
        match self {
            BudgetRange::Above60k => 25,
            BudgetRange::From30kTo60k => 20,
            BudgetRange::From15kTo30k => 15,
            BudgetRange::From8kTo15k => 10,
            BudgetRange::From3kTo8k => 5,
            BudgetRange::Under3k => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Urgent,
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    pub fn weight(&self) -> u32 {
        match self {
            UrgencyLevel::Urgent => 20,
            UrgencyLevel::High => 15,
            UrgencyLevel::Medium => 10,
            UrgencyLevel::Low => 5,
        }
    }
}

/// Lifecycle state of a client record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Lead,
    Contacted,
    Qualified,
    ProposalSent,
    Negotiation,
    Won,
    Lost,
    Inactive,
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default, alias = "_id", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lead_source: Option<LeadSource>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub assessment_form: Option<AssessmentForm>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub business_info: Option<BusinessInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ClientMetadata>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<ClientStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentForm {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub budget_and_timeline: Option<BudgetAndTimeline>,
    /// Process name → `{ "needed": bool, ... }`.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub processes_to_improve: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<DateTime<Utc>>,
}

impl AssessmentForm {
    /// Processes whose entry is an object with `needed` set to exactly `true`.
    pub fn needed_process_count(&self) -> usize {
        self.processes_to_improve
            .as_ref()
            .map(|processes| {
                processes
                    .values()
                    .filter(|p| p.get("needed") == Some(&serde_json::Value::Bool(true)))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAndTimeline {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<BudgetRange>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub urgency_level: Option<UrgencyLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    /// Headcount as stored; exports may carry it as `25` or `25.0`.
    pub number_of_employees: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Client {
    /// Decode a snapshot from an arbitrary JSON value. Only a value that is
    /// not an object is rejected; malformed members decode as absent.
    pub fn from_json(value: serde_json::Value) -> CrmResult<Self> {
        if !value.is_object() {
            return Err(CrmError::InvalidInput(
                "client snapshot must be a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().and_then(|m| m.created_at)
    }

    pub fn budget_and_timeline(&self) -> Option<&BudgetAndTimeline> {
        self.assessment_form
            .as_ref()
            .and_then(|f| f.budget_and_timeline.as_ref())
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.as_ref().map_or(0, Vec::len)
    }

    pub fn has_email(&self) -> bool {
        self.personal_info
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .is_some_and(|e| !e.trim().is_empty())
    }

    pub fn has_website(&self) -> bool {
        self.business_info
            .as_ref()
            .and_then(|b| b.website.as_deref())
            .is_some_and(|w| !w.trim().is_empty())
    }

    pub fn employee_count(&self) -> Option<f64> {
        self.business_info.as_ref().and_then(|b| b.number_of_employees)
    }
}
