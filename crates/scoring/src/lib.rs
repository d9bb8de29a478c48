//! Lead scoring — weighted 0–100 score over a client snapshot, qualitative
//! category bands and the recommended next action per band.

pub mod category;
pub mod scorer;

pub use category::{get_lead_category, LeadCategory, LeadCategoryInfo, Priority};
pub use scorer::{LeadRecommendation, LeadScorer, ScoreBreakdown};
