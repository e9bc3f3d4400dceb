//! The `Recommend`/`Draft` facets of the language-model adapter capability
//! (§9 design note: "behind a single capability interface `{Recommend,
//! Draft, RouteQuery}`"). `RouteQuery` lives in `supportgate-mcp`, which
//! this crate does not depend on; both share the same swap-without-touching-
//! callers convention.

use async_trait::async_trait;
use supportgate_core::model::{DraftResponse, RecommendedAction};

use crate::error::TicketError;

/// Normalized context handed to the adapter — the envelope, merged
/// analytics, urgency, and priority (§4.9 step 9). An external
/// collaborator boundary: this crate only defines the shape it sends.
#[derive(Debug, Clone)]
pub struct RecommendationContext {
    pub ticket_subject: String,
    pub customer_message_history: Vec<String>,
    pub analytics_summary: String,
    pub urgency_category: String,
    pub priority_reason: String,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub actions: Vec<RecommendedAction>,
    pub talking_points: Vec<String>,
    pub warnings: Vec<String>,
    pub estimated_impact: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub tone: Option<String>,
    pub length: Option<String>,
    pub include_offer: Option<bool>,
    pub template: Option<String>,
}

#[async_trait]
pub trait LanguageModelAdapter: Send + Sync {
    /// Produce a recommendation for an agent working a ticket (§4.9 step 9,
    /// §4.11 `GetRecommendation`).
    async fn recommend(&self, context: &RecommendationContext) -> Result<Recommendation, TicketError>;

    /// Produce a customer-facing draft reply. Enforced constraints (§4.9
    /// step 9): never invent coupon codes, order numbers, tracking numbers,
    /// or specific-discount promises; use literal product names from the
    /// provided history; for manufacturer-detail questions, point at the
    /// manufacturer's resource instead of guessing.
    async fn draft(&self, context: &RecommendationContext, options: &DraftOptions) -> Result<DraftResponse, TicketError>;
}

/// A `LanguageModelAdapter` for deployments with no model configured. Every
/// call fails with `UpstreamFailure` rather than silently fabricating
/// recommendations or drafts.
pub struct UnavailableAdapter;

#[async_trait]
impl LanguageModelAdapter for UnavailableAdapter {
    async fn recommend(&self, _context: &RecommendationContext) -> Result<Recommendation, TicketError> {
        Err(TicketError::UpstreamFailure("no language model adapter is configured".into()))
    }

    async fn draft(&self, _context: &RecommendationContext, _options: &DraftOptions) -> Result<DraftResponse, TicketError> {
        Err(TicketError::UpstreamFailure("no language model adapter is configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> RecommendationContext {
        RecommendationContext {
            ticket_subject: "Where is my order".into(),
            customer_message_history: vec!["Hi".into()],
            analytics_summary: String::new(),
            urgency_category: "normal".into(),
            priority_reason: String::new(),
        }
    }

    #[tokio::test]
    async fn test_unavailable_adapter_fails_recommend_and_draft() {
        let adapter = UnavailableAdapter;
        assert!(adapter.recommend(&sample_context()).await.is_err());
        assert!(adapter.draft(&sample_context(), &DraftOptions::default()).await.is_err());
    }
}
