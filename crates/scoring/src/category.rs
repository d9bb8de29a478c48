//! Score bands and the fixed recommendation attached to each band.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadCategory {
    Cold,
    Cool,
    Lukewarm,
    Warm,
    Hot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    VeryLow,
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadCategoryInfo {
    pub category: LeadCategory,
    pub label: String,
    pub color: String,
}

impl LeadCategory {
    /// Band lookup; each band includes its lower bound.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => LeadCategory::Hot,
            60..=79 => LeadCategory::Warm,
            40..=59 => LeadCategory::Lukewarm,
            20..=39 => LeadCategory::Cool,
            _ => LeadCategory::Cold,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadCategory::Hot => "Hot Lead",
            LeadCategory::Warm => "Warm Lead",
            LeadCategory::Lukewarm => "Lukewarm Lead",
            LeadCategory::Cool => "Cool Lead",
            LeadCategory::Cold => "Cold Lead",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            LeadCategory::Hot => "#d32f2f",
            LeadCategory::Warm => "#f57c00",
            LeadCategory::Lukewarm => "#fbc02d",
            LeadCategory::Cool => "#1976d2",
            LeadCategory::Cold => "#757575",
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            LeadCategory::Hot => Priority::Urgent,
            LeadCategory::Warm => Priority::High,
            LeadCategory::Lukewarm => Priority::Medium,
            LeadCategory::Cool => Priority::Low,
            LeadCategory::Cold => Priority::VeryLow,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            LeadCategory::Hot => "Call within 24 hours and send a tailored proposal",
            LeadCategory::Warm => "Book a discovery call this week",
            LeadCategory::Lukewarm => "Send a relevant case study and follow up in a few days",
            LeadCategory::Cool => "Add to the nurturing email sequence",
            LeadCategory::Cold => "Keep in the monthly newsletter and re-score later",
        }
    }

    pub fn reasoning(&self) -> &'static str {
        match self {
            LeadCategory::Hot => {
                "Strong budget, urgency and engagement signals: ready for a commercial conversation"
            }
            LeadCategory::Warm => "Clear interest with a defined need, still missing some qualifying data",
            LeadCategory::Lukewarm => "Some interest but budget or timeline are not confirmed",
            LeadCategory::Cool => "Few qualifying signals so far: needs education before contact",
            LeadCategory::Cold => "Little or stale information: not worth active sales effort now",
        }
    }

    pub fn info(&self) -> LeadCategoryInfo {
        LeadCategoryInfo {
            category: *self,
            label: self.label().to_string(),
            color: self.color().to_string(),
        }
    }
}

/// Category, label and display color for a score.
pub fn get_lead_category(score: u8) -> LeadCategoryInfo {
    LeadCategory::from_score(score).info()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(get_lead_category(100).category, LeadCategory::Hot);
        assert_eq!(get_lead_category(80).category, LeadCategory::Hot);
        assert_eq!(get_lead_category(79).category, LeadCategory::Warm);
        assert_eq!(get_lead_category(60).category, LeadCategory::Warm);
        assert_eq!(get_lead_category(59).category, LeadCategory::Lukewarm);
        assert_eq!(get_lead_category(40).category, LeadCategory::Lukewarm);
        assert_eq!(get_lead_category(39).category, LeadCategory::Cool);
        assert_eq!(get_lead_category(20).category, LeadCategory::Cool);
        assert_eq!(get_lead_category(19).category, LeadCategory::Cold);
        assert_eq!(get_lead_category(0).category, LeadCategory::Cold);
    }

    #[test]
    fn test_info_carries_label_and_color() {
        let info = get_lead_category(85);
        assert_eq!(info.label, "Hot Lead");
        assert_eq!(info.color, "#d32f2f");
    }

    #[test]
    fn test_priority_follows_band() {
        assert!(LeadCategory::Hot.priority() > LeadCategory::Warm.priority());
        assert!(LeadCategory::Cool.priority() > LeadCategory::Cold.priority());
        assert_eq!(LeadCategory::Lukewarm.priority(), Priority::Medium);
    }

    #[test]
    fn test_serializes_snake_case() {
        let value = serde_json::to_value(get_lead_category(45)).unwrap();
        assert_eq!(value["category"], "lukewarm");
    }
}
