use thiserror::Error;
use uuid::Uuid;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Funnel {0} not found")]
    FunnelNotFound(Uuid),

    #[error("Stage with order {order} not found")]
    StageNotFound { order: u32 },

    #[error("Lead {lead_id} not found in stage {order}")]
    LeadNotInStage { lead_id: String, order: u32 },

    #[error("Funnel {funnel_id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        funnel_id: Uuid,
        expected: u64,
        found: u64,
    },

    /// Storage backend fault, passed through unchanged by the manager.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrmError {
    /// Lookup misses the caller can map to a 404-style response.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CrmError::FunnelNotFound(_)
                | CrmError::StageNotFound { .. }
                | CrmError::LeadNotInStage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(CrmError::StageNotFound { order: 3 }.is_not_found());
        assert!(CrmError::LeadNotInStage {
            lead_id: "l-1".into(),
            order: 1
        }
        .is_not_found());
        assert!(CrmError::FunnelNotFound(Uuid::new_v4()).is_not_found());
        assert!(!CrmError::InvalidInput("bad".into()).is_not_found());
        assert!(!CrmError::Persistence("down".into()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = CrmError::LeadNotInStage {
            lead_id: "lead-9".into(),
            order: 2,
        };
        assert_eq!(err.to_string(), "Lead lead-9 not found in stage 2");
        assert_eq!(
            CrmError::StageNotFound { order: 7 }.to_string(),
            "Stage with order 7 not found"
        );
    }
}
