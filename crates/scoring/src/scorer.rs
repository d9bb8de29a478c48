//! Lead scorer: stateless computation over a `Client` snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tailorbiz_core::config::ScoringConfig;
use tailorbiz_core::error::{CrmError, CrmResult};
use tailorbiz_core::event_bus::{make_event, noop_sink, CrmEventType, EventSink};
use tailorbiz_core::types::{Client, ClientStatus};

use crate::category::{LeadCategory, Priority};

const PROCESS_POINTS: u32 = 4;
const PROCESS_CAP: u32 = 20;
const ASSESSMENT_BONUS: u32 = 10;
const INTERACTION_POINTS: u32 = 2;
const ENGAGEMENT_CAP: u32 = 15;
const EMAIL_BONUS: u32 = 5;
const WEBSITE_BONUS: u32 = 3;
const MAX_SCORE: f64 = 100.0;

/// Per-factor contributions behind a score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub source: u32,
    pub budget: u32,
    pub urgency: u32,
    pub processes: u32,
    pub assessment: u32,
    pub engagement: u32,
    pub email: u32,
    pub website: u32,
    pub company_size: u32,
    /// Sum of all factors before decay.
    pub raw_total: u32,
    pub age_days: i64,
    /// Multiplier applied for staleness; 1.0 when no decay applies.
    pub decay_factor: f64,
    pub score: u8,
}

/// Score plus the category band and the recommended next step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecommendation {
    pub score: u8,
    pub category: LeadCategory,
    pub label: String,
    pub color: String,
    pub action: String,
    pub priority: Priority,
    pub reasoning: String,
}

/// Headcount may arrive as `25` or `25.0`; fractional counts fall into the
/// band below the next threshold.
fn company_size_points(employees: f64) -> u32 {
    if employees >= 20.0 {
        7
    } else if employees >= 10.0 {
        5
    } else if employees >= 5.0 {
        3
    } else if employees >= 2.0 {
        1
    } else {
        0
    }
}

#[derive(Clone)]
pub struct LeadScorer {
    config: ScoringConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for LeadScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadScorer")
            .field("config", &self.config)
            .finish()
    }
}

impl LeadScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            config: config.clone(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink; every computed score is published as `LeadScored`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Staleness multiplier by status; the tiers are exclusive.
    fn decay_factor(&self, status: Option<ClientStatus>, age_days: i64) -> f64 {
        match status {
            Some(ClientStatus::Lead) if age_days > self.config.stale_lead_days => {
                self.config.stale_lead_factor
            }
            Some(ClientStatus::Contacted) if age_days > self.config.stale_contacted_days => {
                self.config.stale_contacted_factor
            }
            _ => 1.0,
        }
    }

    /// Computes every factor of the score. Absent or malformed optional data
    /// contributes zero; a missing `metadata.createdAt` is rejected because
    /// the staleness decay cannot be evaluated without it.
    pub fn score_breakdown(&self, client: &Client, now: DateTime<Utc>) -> CrmResult<ScoreBreakdown> {
        let created_at = client.created_at().ok_or_else(|| {
            warn!(client_id = ?client.id, "Client snapshot has no creation date");
            CrmError::InvalidInput("metadata.createdAt is required for scoring".to_string())
        })?;

        let form = client.assessment_form.as_ref();
        let timeline = client.budget_and_timeline();

        let mut b = ScoreBreakdown {
            source: client.lead_source.map_or(0, |s| s.weight()),
            budget: timeline.and_then(|t| t.budget_range).map_or(0, |r| r.weight()),
            urgency: timeline.and_then(|t| t.urgency_level).map_or(0, |u| u.weight()),
            processes: form.map_or(0, |f| {
                (f.needed_process_count() as u32)
                    .saturating_mul(PROCESS_POINTS)
                    .min(PROCESS_CAP)
            }),
            assessment: if form.and_then(|f| f.filled_at).is_some() {
                ASSESSMENT_BONUS
            } else {
                0
            },
            engagement: (client.interaction_count() as u32)
                .saturating_mul(INTERACTION_POINTS)
                .min(ENGAGEMENT_CAP),
            email: if client.has_email() { EMAIL_BONUS } else { 0 },
            website: if client.has_website() { WEBSITE_BONUS } else { 0 },
            company_size: client.employee_count().map_or(0, company_size_points),
            ..Default::default()
        };

        b.raw_total = b.source
            + b.budget
            + b.urgency
            + b.processes
            + b.assessment
            + b.engagement
            + b.email
            + b.website
            + b.company_size;
        b.age_days = (now - created_at).num_days();
        b.decay_factor = self.decay_factor(client.status, b.age_days);

        let decayed = b.raw_total as f64 * b.decay_factor;
        b.score = decayed.round().clamp(0.0, MAX_SCORE) as u8;

        Ok(b)
    }

    /// Score in `[0, 100]` as of `now`.
    pub fn calculate_lead_score_at(&self, client: &Client, now: DateTime<Utc>) -> CrmResult<u8> {
        let breakdown = self.score_breakdown(client, now)?;

        metrics::counter!("scoring.leads_scored").increment(1);
        metrics::histogram!("scoring.lead_score").record(breakdown.score as f64);

        debug!(
            client_id = ?client.id,
            raw = breakdown.raw_total,
            decay = breakdown.decay_factor,
            age_days = breakdown.age_days,
            score = breakdown.score,
            "Lead scored"
        );

        self.event_sink.emit(make_event(
            CrmEventType::LeadScored,
            None,
            client.id.clone(),
            None,
            serde_json::json!({
                "score": breakdown.score,
                "category": LeadCategory::from_score(breakdown.score),
            }),
        ));

        Ok(breakdown.score)
    }

    pub fn calculate_lead_score(&self, client: &Client) -> CrmResult<u8> {
        self.calculate_lead_score_at(client, Utc::now())
    }

    pub fn get_recommended_action_at(
        &self,
        client: &Client,
        now: DateTime<Utc>,
    ) -> CrmResult<LeadRecommendation> {
        let score = self.calculate_lead_score_at(client, now)?;
        let category = LeadCategory::from_score(score);

        Ok(LeadRecommendation {
            score,
            category,
            label: category.label().to_string(),
            color: category.color().to_string(),
            action: category.action().to_string(),
            priority: category.priority(),
            reasoning: category.reasoning().to_string(),
        })
    }

    pub fn get_recommended_action(&self, client: &Client) -> CrmResult<LeadRecommendation> {
        self.get_recommended_action_at(client, Utc::now())
    }
}

impl Default for LeadScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}
