use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tailorbiz_core::config::FunnelConfig;
use tailorbiz_core::error::{CrmError, CrmResult};
use tailorbiz_core::event_bus::{make_event, CrmEventType, EventSink};
use tailorbiz_core::funnel::{AutomationRule, AutomationTrigger, Funnel};

use crate::store::FunnelRepository;

/// Result of a placement change: the persisted funnel and the `on_enter`
/// automation rules of the stage the lead entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageChange {
    pub funnel: Funnel,
    pub triggered: Vec<AutomationRule>,
}

/// Applies lead lifecycle events to persisted funnels.
///
/// Every operation loads the funnel, mutates it, and saves it with an
/// optimistic version check. Lookup failures return before the save, so the
/// stored funnel is never partially updated.
#[derive(Clone)]
pub struct FunnelStageManager {
    repo: Arc<dyn FunnelRepository>,
    event_sink: Arc<dyn EventSink>,
    config: FunnelConfig,
}

impl std::fmt::Debug for FunnelStageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunnelStageManager")
            .field("config", &self.config)
            .finish()
    }
}

impl FunnelStageManager {
    pub fn new(repo: Arc<dyn FunnelRepository>, config: &FunnelConfig) -> Self {
        Self {
            repo,
            event_sink: tailorbiz_core::event_bus::noop_sink(),
            config: config.clone(),
        }
    }

    /// Attach an event sink for lifecycle and automation events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    async fn load(&self, funnel_id: Uuid) -> CrmResult<Funnel> {
        self.repo
            .get(funnel_id)
            .await?
            .ok_or(CrmError::FunnelNotFound(funnel_id))
    }

    fn emit(
        &self,
        event_type: CrmEventType,
        funnel_id: Uuid,
        lead_id: &str,
        stage_order: u32,
        detail: serde_json::Value,
    ) {
        if self.config.emit_events {
            self.event_sink.emit(make_event(
                event_type,
                Some(funnel_id),
                Some(lead_id.to_string()),
                Some(stage_order),
                detail,
            ));
        }
    }

    /// Reports the `on_enter` rules of the stage with the given order.
    fn trigger_on_enter(&self, funnel: &Funnel, lead_id: &str, stage_order: u32) -> Vec<AutomationRule> {
        let Some(stage) = funnel.stage(stage_order) else {
            return Vec::new();
        };
        let rules: Vec<AutomationRule> = funnel
            .automations_for(&stage.name, AutomationTrigger::OnEnter)
            .into_iter()
            .cloned()
            .collect();

        for rule in &rules {
            info!(
                funnel_id = %funnel.id,
                lead_id = %lead_id,
                stage = %stage.name,
                action = ?rule.action,
                "Automation triggered"
            );
            self.emit(
                CrmEventType::AutomationTriggered,
                funnel.id,
                lead_id,
                stage_order,
                serde_json::json!({
                    "action": rule.action,
                    "delayHours": rule.delay_hours,
                    "config": rule.config,
                }),
            );
        }
        rules
    }

    /// Places a lead in the stage with `stage_order` and counts the entry.
    pub async fn add_lead_to_stage(
        &self,
        funnel_id: Uuid,
        stage_order: u32,
        lead_id: &str,
        source: Option<String>,
        campaign: Option<String>,
    ) -> CrmResult<StageChange> {
        let mut funnel = self.load(funnel_id).await?;
        let source = source.or_else(|| Some(self.config.default_source.clone()));
        funnel.add_lead_to_stage(stage_order, lead_id, source, campaign, Utc::now())?;

        let funnel = self.repo.save(&funnel).await?;
        metrics::counter!("funnel.leads_added").increment(1);
        info!(
            funnel_id = %funnel_id,
            lead_id = %lead_id,
            stage_order,
            total_leads = funnel.analytics.total_leads,
            "Lead added to stage"
        );

        self.emit(
            CrmEventType::LeadEnteredStage,
            funnel_id,
            lead_id,
            stage_order,
            serde_json::json!({}),
        );
        let triggered = self.trigger_on_enter(&funnel, lead_id, stage_order);

        Ok(StageChange { funnel, triggered })
    }

    /// Moves a lead from one stage to another, refreshing its entry time.
    pub async fn move_lead_to_stage(
        &self,
        funnel_id: Uuid,
        lead_id: &str,
        from_order: u32,
        to_order: u32,
    ) -> CrmResult<StageChange> {
        let mut funnel = self.load(funnel_id).await?;
        funnel.move_lead_to_stage(lead_id, from_order, to_order, Utc::now())?;

        let funnel = self.repo.save(&funnel).await?;
        metrics::counter!("funnel.leads_moved").increment(1);
        info!(
            funnel_id = %funnel_id,
            lead_id = %lead_id,
            from = from_order,
            to = to_order,
            "Lead moved between stages"
        );

        self.emit(
            CrmEventType::LeadMovedStage,
            funnel_id,
            lead_id,
            to_order,
            serde_json::json!({"from": from_order}),
        );
        let triggered = self.trigger_on_enter(&funnel, lead_id, to_order);

        Ok(StageChange { funnel, triggered })
    }

    /// Recomputes conversion rates and dwell times, then persists them.
    pub async fn recalculate_conversion_rates(&self, funnel_id: Uuid) -> CrmResult<Funnel> {
        let mut funnel = self.load(funnel_id).await?;
        funnel.calculate_conversion_rates();
        funnel.calculate_average_times(Utc::now());

        let funnel = self.repo.save(&funnel).await?;
        info!(
            funnel_id = %funnel_id,
            overall = funnel.analytics.overall_conversion_rate,
            "Conversion rates updated"
        );
        if self.config.emit_events {
            self.event_sink.emit(make_event(
                CrmEventType::ConversionRatesUpdated,
                Some(funnel_id),
                None,
                None,
                serde_json::json!({"overall": funnel.analytics.overall_conversion_rate}),
            ));
        }
        Ok(funnel)
    }
}
