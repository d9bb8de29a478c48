use serde::Deserialize;

use crate::error::{CrmError, CrmResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `TAILORBIZ__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub funnel: FunnelConfig,
}

// ─── Scoring Config ─────────────────────────────────────────────────────────

/// Staleness decay applied to leads that were never worked.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Age in days after which an untouched `lead` decays.
    #[serde(default = "default_stale_lead_days")]
    pub stale_lead_days: i64,
    #[serde(default = "default_stale_lead_factor")]
    pub stale_lead_factor: f64,
    /// Age in days after which a `contacted` client decays.
    #[serde(default = "default_stale_contacted_days")]
    pub stale_contacted_days: i64,
    #[serde(default = "default_stale_contacted_factor")]
    pub stale_contacted_factor: f64,
}
fn default_stale_lead_days() -> i64 {
    30
}
fn default_stale_lead_factor() -> f64 {
    0.7
}
fn default_stale_contacted_days() -> i64 {
    60
}
fn default_stale_contacted_factor() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            stale_lead_days: default_stale_lead_days(),
            stale_lead_factor: default_stale_lead_factor(),
            stale_contacted_days: default_stale_contacted_days(),
            stale_contacted_factor: default_stale_contacted_factor(),
        }
    }
}

// ─── Funnel Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct FunnelConfig {
    /// Emit lifecycle events to the configured sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
    /// Source recorded on a placement when the caller gives none.
    #[serde(default = "default_source")]
    pub default_source: String,
}
fn default_emit_events() -> bool {
    true
}
fn default_source() -> String {
    "manual".to_string()
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            emit_events: default_emit_events(),
            default_source: default_source(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            funnel: FunnelConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    /// Environment variables take precedence over the file.
    pub fn load(path: Option<&str>) -> CrmResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("TAILORBIZ")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CrmError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scoring.stale_lead_days, 30);
        assert!((cfg.scoring.stale_lead_factor - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.scoring.stale_contacted_days, 60);
        assert!((cfg.scoring.stale_contacted_factor - 0.5).abs() < f64::EPSILON);
        assert!(cfg.funnel.emit_events);
        assert_eq!(cfg.funnel.default_source, "manual");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let cfg: AppConfig =
            serde_json::from_value(serde_json::json!({"scoring": {"stale_lead_days": 14}}))
                .unwrap();
        assert_eq!(cfg.scoring.stale_lead_days, 14);
        assert_eq!(cfg.scoring.stale_contacted_days, 60);
        assert_eq!(cfg.funnel.default_source, "manual");
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = AppConfig::load(Some("/nonexistent/tailorbiz/settings")).unwrap_err();
        assert!(matches!(err, CrmError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
