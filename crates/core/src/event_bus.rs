//! CRM event bus — trait for emitting lifecycle events from the scorer and
//! the funnel manager.
//!
//! Modules accept an `Arc<dyn EventSink>`; the web layer routes events to
//! notifications and the automation runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrmEventType {
    LeadScored,
    LeadEnteredStage,
    LeadMovedStage,
    AutomationTriggered,
    ConversionRatesUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmEvent {
    pub event_id: Uuid,
    pub event_type: CrmEventType,
    pub funnel_id: Option<Uuid>,
    pub lead_id: Option<String>,
    pub stage_order: Option<u32>,
    pub detail: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Trait for emitting CRM events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrmEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: CrmEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<CrmEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<CrmEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: CrmEventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: CrmEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for a funnel-scoped event.
pub fn make_event(
    event_type: CrmEventType,
    funnel_id: Option<Uuid>,
    lead_id: Option<String>,
    stage_order: Option<u32>,
    detail: serde_json::Value,
) -> CrmEvent {
    CrmEvent {
        event_id: Uuid::new_v4(),
        event_type,
        funnel_id,
        lead_id,
        stage_order,
        detail,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        let funnel_id = Uuid::new_v4();
        sink.emit(make_event(
            CrmEventType::LeadEnteredStage,
            Some(funnel_id),
            Some("lead-1".into()),
            Some(1),
            serde_json::json!({}),
        ));
        sink.emit(make_event(
            CrmEventType::LeadMovedStage,
            Some(funnel_id),
            Some("lead-1".into()),
            Some(2),
            serde_json::json!({"from": 1}),
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(CrmEventType::LeadEnteredStage), 1);
        assert_eq!(sink.count_type(CrmEventType::LeadMovedStage), 1);

        let events = sink.events();
        assert_eq!(events[1].stage_order, Some(2));
        assert_eq!(events[1].detail["from"], 1);

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        sink.emit(make_event(
            CrmEventType::LeadScored,
            None,
            None,
            None,
            serde_json::json!({"score": 42}),
        ));
    }
}
