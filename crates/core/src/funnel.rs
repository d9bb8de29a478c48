//! Lead nurturing funnel aggregate — ordered stages holding lead placements,
//! stage-bound automation rules and aggregate analytics.
//!
//! The aggregate methods are pure in-memory mutations. Persistence and the
//! optimistic `version` check are owned by the repository layer.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CrmError, CrmResult};

// ─── Automation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutomationTrigger {
    OnEnter,
    AfterDelay,
    OnInactivity,
    OnAction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutomationAction {
    SendEmail,
    SendWhatsapp,
    SendSms,
    CreateTask,
    NotifyOwner,
    UpdateStatus,
    MoveToStage,
    AddTag,
}

/// A rule bound to a stage by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    pub stage: String,
    pub trigger: AutomationTrigger,
    pub action: AutomationAction,
    #[serde(default)]
    pub delay_hours: u32,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// ─── Stages ─────────────────────────────────────────────────────────────────

/// A lead's presence in a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadPlacement {
    pub lead_id: String,
    pub entered_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStage {
    pub name: String,
    /// Unique position of the stage; traversal is by ascending order.
    pub order: u32,
    #[serde(default = "default_stage_color")]
    pub color: String,
    #[serde(default)]
    pub leads: Vec<LeadPlacement>,
    /// Percentage of this stage's leads present in the next stage.
    #[serde(default)]
    pub conversion_rate: f64,
    /// Mean dwell time in hours of the leads currently in the stage.
    #[serde(default)]
    pub average_time_hours: f64,
}

fn default_stage_color() -> String {
    "#1976d2".to_string()
}

impl FunnelStage {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            order,
            color: default_stage_color(),
            leads: Vec::new(),
            conversion_rate: 0.0,
            average_time_hours: 0.0,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn contains(&self, lead_id: &str) -> bool {
        self.leads.iter().any(|l| l.lead_id == lead_id)
    }
}

// ─── Analytics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalytics {
    /// Historical count of stage entries; never decremented.
    #[serde(default)]
    pub total_leads: u64,
    #[serde(default)]
    pub converted: u64,
    #[serde(default)]
    pub dropped: u64,
    #[serde(default)]
    pub average_conversion_time: f64,
    #[serde(default)]
    pub cost_per_lead: f64,
    #[serde(default)]
    pub overall_conversion_rate: f64,
}

// ─── Aggregate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub stages: Vec<FunnelStage>,
    #[serde(default)]
    pub automations: Vec<AutomationRule>,
    #[serde(default)]
    pub analytics: FunnelAnalytics,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Optimistic concurrency token, bumped by every successful save.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Percentage with two decimals, e.g. 5 of 10 → 50.0.
fn percentage(part: usize, whole: usize) -> f64 {
    ((part as f64 / whole as f64) * 10000.0).round() / 100.0
}

fn check_unique_orders(stages: &[FunnelStage]) -> CrmResult<()> {
    let mut seen = HashSet::new();
    for stage in stages {
        if !seen.insert(stage.order) {
            return Err(CrmError::InvalidInput(format!(
                "duplicate stage order {}",
                stage.order
            )));
        }
    }
    Ok(())
}

impl Funnel {
    /// Builds a funnel with stages sorted by ascending order. Fails if two
    /// stages share an order value.
    pub fn new(name: impl Into<String>, mut stages: Vec<FunnelStage>) -> CrmResult<Self> {
        check_unique_orders(&stages)?;
        stages.sort_by_key(|s| s.order);

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            stages,
            automations: Vec::new(),
            analytics: FunnelAnalytics::default(),
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Checks a funnel that did not come through `new`, e.g. one decoded
    /// from a stored document: stage orders must be unique.
    pub fn validate(&self) -> CrmResult<()> {
        check_unique_orders(&self.stages)
    }

    pub fn with_automation(mut self, rule: AutomationRule) -> Self {
        self.automations.push(rule);
        self
    }

    pub fn stage(&self, order: u32) -> Option<&FunnelStage> {
        self.stages.iter().find(|s| s.order == order)
    }

    fn stage_index(&self, order: u32) -> CrmResult<usize> {
        self.stages
            .iter()
            .position(|s| s.order == order)
            .ok_or(CrmError::StageNotFound { order })
    }

    /// Stage indices in ascending `order`, regardless of storage order.
    fn ordered_indices(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.stages.len()).collect();
        idx.sort_by_key(|&i| self.stages[i].order);
        idx
    }

    /// Order of the first stage (by traversal) currently holding the lead.
    pub fn stage_of(&self, lead_id: &str) -> Option<u32> {
        self.ordered_indices()
            .into_iter()
            .map(|i| &self.stages[i])
            .find(|s| s.contains(lead_id))
            .map(|s| s.order)
    }

    /// Appends a placement to the stage with the given order and counts the
    /// entry in `analytics.total_leads`.
    pub fn add_lead_to_stage(
        &mut self,
        stage_order: u32,
        lead_id: &str,
        source: Option<String>,
        campaign: Option<String>,
        now: DateTime<Utc>,
    ) -> CrmResult<&LeadPlacement> {
        let idx = self.stage_index(stage_order)?;
        let stage = &mut self.stages[idx];
        stage.leads.push(LeadPlacement {
            lead_id: lead_id.to_string(),
            entered_at: now,
            source,
            campaign,
            metadata: serde_json::json!({}),
        });
        self.analytics.total_leads += 1;
        Ok(&self.stages[idx].leads[self.stages[idx].leads.len() - 1])
    }

    /// Moves a placement between stages, resetting `entered_at`. Moving to
    /// the same stage re-appends the placement with a fresh entry time.
    /// Both stages and the placement are resolved before anything changes.
    pub fn move_lead_to_stage(
        &mut self,
        lead_id: &str,
        from_order: u32,
        to_order: u32,
        now: DateTime<Utc>,
    ) -> CrmResult<&LeadPlacement> {
        let from = self.stage_index(from_order)?;
        let to = self.stage_index(to_order)?;
        let pos = self.stages[from]
            .leads
            .iter()
            .position(|l| l.lead_id == lead_id)
            .ok_or_else(|| CrmError::LeadNotInStage {
                lead_id: lead_id.to_string(),
                order: from_order,
            })?;

        let mut placement = self.stages[from].leads.remove(pos);
        placement.entered_at = now;
        self.stages[to].leads.push(placement);
        Ok(&self.stages[to].leads[self.stages[to].leads.len() - 1])
    }

    /// Recomputes stage-to-next-stage conversion percentages and the overall
    /// first-to-last rate. The last stage's own rate is left untouched, as is
    /// the overall rate when the first stage is empty.
    pub fn calculate_conversion_rates(&mut self) {
        let ordered = self.ordered_indices();

        for pair in ordered.windows(2) {
            let current = self.stages[pair[0]].leads.len();
            let next = self.stages[pair[1]].leads.len();
            self.stages[pair[0]].conversion_rate = if current > 0 {
                percentage(next, current)
            } else {
                0.0
            };
        }

        if let (Some(&first), Some(&last)) = (ordered.first(), ordered.last()) {
            let entered = self.stages[first].leads.len();
            if entered > 0 {
                self.analytics.overall_conversion_rate =
                    percentage(self.stages[last].leads.len(), entered);
            }
        }
    }

    /// Sets each stage's mean dwell time in hours for its current placements.
    pub fn calculate_average_times(&mut self, now: DateTime<Utc>) {
        for stage in &mut self.stages {
            stage.average_time_hours = if stage.leads.is_empty() {
                0.0
            } else {
                let total_secs: i64 = stage
                    .leads
                    .iter()
                    .map(|l| (now - l.entered_at).num_seconds().max(0))
                    .sum();
                let hours = total_secs as f64 / 3600.0 / stage.leads.len() as f64;
                (hours * 100.0).round() / 100.0
            };
        }
    }

    /// Active rules bound to the named stage for the given trigger.
    pub fn automations_for(
        &self,
        stage_name: &str,
        trigger: AutomationTrigger,
    ) -> Vec<&AutomationRule> {
        self.automations
            .iter()
            .filter(|r| r.is_active && r.trigger == trigger && r.stage == stage_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn three_stage_funnel() -> Funnel {
        Funnel::new(
            "Consulenza",
            vec![
                FunnelStage::new("Awareness", 1),
                FunnelStage::new("Interest", 2),
                FunnelStage::new("Decision", 3),
            ],
        )
        .unwrap()
    }

    fn fill(funnel: &mut Funnel, order: u32, count: usize) {
        let now = Utc::now();
        for i in 0..count {
            funnel
                .add_lead_to_stage(order, &format!("lead-{}-{}", order, i), None, None, now)
                .unwrap();
        }
    }

    #[test]
    fn test_new_sorts_and_rejects_duplicates() {
        let funnel = Funnel::new(
            "f",
            vec![FunnelStage::new("b", 2), FunnelStage::new("a", 1)],
        )
        .unwrap();
        assert_eq!(funnel.stages[0].order, 1);
        assert_eq!(funnel.stages[1].order, 2);

        let err = Funnel::new("f", vec![FunnelStage::new("a", 1), FunnelStage::new("b", 1)])
            .unwrap_err();
        assert!(matches!(err, CrmError::InvalidInput(_)));
    }

    #[test]
    fn test_add_lead_to_stage() {
        let mut funnel = three_stage_funnel();
        let now = Utc::now();
        let placement = funnel
            .add_lead_to_stage(1, "lead-1", Some("website_form".into()), Some("spring".into()), now)
            .unwrap();
        assert_eq!(placement.lead_id, "lead-1");
        assert_eq!(placement.entered_at, now);
        assert_eq!(funnel.analytics.total_leads, 1);
        assert_eq!(funnel.stage(1).unwrap().leads.len(), 1);
        assert_eq!(funnel.stage_of("lead-1"), Some(1));
    }

    #[test]
    fn test_add_to_unknown_stage_leaves_counter() {
        let mut funnel = three_stage_funnel();
        let err = funnel
            .add_lead_to_stage(9, "lead-1", None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CrmError::StageNotFound { order: 9 }));
        assert_eq!(funnel.analytics.total_leads, 0);
    }

    #[test]
    fn test_move_lead_refreshes_entry_and_keeps_fields() {
        let mut funnel = three_stage_funnel();
        let entered = Utc::now() - Duration::days(3);
        funnel
            .add_lead_to_stage(1, "lead-1", Some("linkedin".into()), Some("q1".into()), entered)
            .unwrap();

        let now = Utc::now();
        funnel.move_lead_to_stage("lead-1", 1, 2, now).unwrap();

        assert!(!funnel.stage(1).unwrap().contains("lead-1"));
        let dest = funnel.stage(2).unwrap();
        let placements: Vec<_> = dest.leads.iter().filter(|l| l.lead_id == "lead-1").collect();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].entered_at, now);
        assert_eq!(placements[0].source.as_deref(), Some("linkedin"));
        assert_eq!(placements[0].campaign.as_deref(), Some("q1"));
        // Moves are not new entries.
        assert_eq!(funnel.analytics.total_leads, 1);
    }

    #[test]
    fn test_move_failures_leave_state_untouched() {
        let mut funnel = three_stage_funnel();
        funnel.add_lead_to_stage(1, "lead-1", None, None, Utc::now()).unwrap();

        let err = funnel.move_lead_to_stage("lead-1", 1, 42, Utc::now()).unwrap_err();
        assert!(matches!(err, CrmError::StageNotFound { order: 42 }));
        assert!(funnel.stage(1).unwrap().contains("lead-1"));

        let err = funnel.move_lead_to_stage("lead-1", 2, 3, Utc::now()).unwrap_err();
        assert!(matches!(err, CrmError::LeadNotInStage { order: 2, .. }));
        assert!(funnel.stage(1).unwrap().contains("lead-1"));
        assert!(funnel.stage(3).unwrap().leads.is_empty());
    }

    #[test]
    fn test_same_stage_move_refreshes_entry_time() {
        let mut funnel = three_stage_funnel();
        let entered = Utc::now() - Duration::hours(5);
        funnel.add_lead_to_stage(1, "lead-1", None, None, entered).unwrap();
        let now = Utc::now();
        funnel.move_lead_to_stage("lead-1", 1, 1, now).unwrap();

        let stage = funnel.stage(1).unwrap();
        assert_eq!(stage.leads.len(), 1);
        assert_eq!(stage.leads[0].entered_at, now);
    }

    #[test]
    fn test_conversion_rates() {
        let mut funnel = three_stage_funnel();
        fill(&mut funnel, 1, 10);
        fill(&mut funnel, 2, 5);
        fill(&mut funnel, 3, 2);

        funnel.calculate_conversion_rates();
        assert_eq!(funnel.stage(1).unwrap().conversion_rate, 50.0);
        assert_eq!(funnel.stage(2).unwrap().conversion_rate, 40.0);
        assert_eq!(funnel.stage(3).unwrap().conversion_rate, 0.0);
        assert_eq!(funnel.analytics.overall_conversion_rate, 20.0);
    }

    #[test]
    fn test_conversion_rates_two_decimals() {
        let mut funnel = three_stage_funnel();
        fill(&mut funnel, 1, 3);
        fill(&mut funnel, 2, 1);
        funnel.calculate_conversion_rates();
        assert_eq!(funnel.stage(1).unwrap().conversion_rate, 33.33);
    }

    #[test]
    fn test_decoded_duplicate_orders_fail_validation() {
        let funnel: Funnel = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Broken",
            "stages": [{"name": "A", "order": 1}, {"name": "B", "order": 1}],
            "createdAt": Utc::now(),
            "updatedAt": Utc::now()
        }))
        .unwrap();
        let err = funnel.validate().unwrap_err();
        assert!(matches!(err, CrmError::InvalidInput(_)));

        assert!(three_stage_funnel().validate().is_ok());
    }

    #[test]
    fn test_single_stage_overall_rate() {
        let mut funnel = Funnel::new("Landing", vec![FunnelStage::new("Signup", 1)]).unwrap();
        fill(&mut funnel, 1, 4);

        funnel.calculate_conversion_rates();
        assert_eq!(funnel.analytics.overall_conversion_rate, 100.0);
        assert_eq!(funnel.stage(1).unwrap().conversion_rate, 0.0);
    }

    #[test]
    fn test_conversion_rates_empty_first_stage() {
        let mut funnel = three_stage_funnel();
        funnel.analytics.overall_conversion_rate = 12.5;
        fill(&mut funnel, 2, 4);

        funnel.calculate_conversion_rates();
        assert_eq!(funnel.stage(1).unwrap().conversion_rate, 0.0);
        assert_eq!(funnel.stage(2).unwrap().conversion_rate, 0.0);
        // Overall rate is left as it was.
        assert_eq!(funnel.analytics.overall_conversion_rate, 12.5);
    }

    #[test]
    fn test_conversion_rates_follow_order_not_storage() {
        let mut funnel = three_stage_funnel();
        fill(&mut funnel, 1, 10);
        fill(&mut funnel, 2, 5);
        fill(&mut funnel, 3, 2);
        funnel.stages.reverse();

        funnel.calculate_conversion_rates();
        assert_eq!(funnel.stage(1).unwrap().conversion_rate, 50.0);
        assert_eq!(funnel.stage(2).unwrap().conversion_rate, 40.0);
        assert_eq!(funnel.analytics.overall_conversion_rate, 20.0);
    }

    #[test]
    fn test_average_times() {
        let mut funnel = three_stage_funnel();
        let now = Utc::now();
        funnel.add_lead_to_stage(1, "a", None, None, now - Duration::hours(2)).unwrap();
        funnel.add_lead_to_stage(1, "b", None, None, now - Duration::hours(4)).unwrap();

        funnel.calculate_average_times(now);
        assert_eq!(funnel.stage(1).unwrap().average_time_hours, 3.0);
        assert_eq!(funnel.stage(2).unwrap().average_time_hours, 0.0);
    }

    #[test]
    fn test_automations_for_filters_inactive() {
        let funnel = three_stage_funnel()
            .with_automation(AutomationRule {
                stage: "Interest".into(),
                trigger: AutomationTrigger::OnEnter,
                action: AutomationAction::SendEmail,
                delay_hours: 0,
                config: serde_json::json!({"template": "case_study"}),
                is_active: true,
            })
            .with_automation(AutomationRule {
                stage: "Interest".into(),
                trigger: AutomationTrigger::OnEnter,
                action: AutomationAction::SendWhatsapp,
                delay_hours: 0,
                config: serde_json::json!({}),
                is_active: false,
            })
            .with_automation(AutomationRule {
                stage: "Interest".into(),
                trigger: AutomationTrigger::OnInactivity,
                action: AutomationAction::NotifyOwner,
                delay_hours: 72,
                config: serde_json::json!({}),
                is_active: true,
            });

        let rules = funnel.automations_for("Interest", AutomationTrigger::OnEnter);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, AutomationAction::SendEmail);
        assert!(funnel
            .automations_for("Decision", AutomationTrigger::OnEnter)
            .is_empty());
    }

    #[test]
    fn test_document_round_trip_keeps_camel_case() {
        let mut funnel = three_stage_funnel();
        funnel.add_lead_to_stage(1, "lead-1", None, None, Utc::now()).unwrap();
        let value = serde_json::to_value(&funnel).unwrap();
        assert!(value["stages"][0]["leads"][0]["enteredAt"].is_string());
        assert_eq!(value["analytics"]["totalLeads"], 1);
    }
}
