//! Ticket Service (C11, §4.11).
//!
//! The tenant-scoped CRUD surface the HTTP layer calls directly; owns the
//! freshness-gating rule for recommendations and drafts and the tag-update
//! semantics for `UpdateTicket`.

use chrono::Utc;
use serde::Deserialize;
use supportgate_core::analytics::AnalyticsService;
use supportgate_core::model::{
    AiRecommendation, CustomerAnalytics, DraftResponse, Priority, Ticket, TicketMessage, TicketNote, TicketStatus,
};
use supportgate_core::scoring::{self, ScoreBreakdown};
use uuid::Uuid;

use crate::adapters::{DraftOptions, LanguageModelAdapter, RecommendationContext};
use crate::error::TicketError;
use crate::store::{TicketFilters, TicketStore};

/// A ticket plus its chronological messages and merged read-model view,
/// as returned by `GetTicket` (§4.11).
#[derive(Debug, Clone)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
    pub analytics: Option<CustomerAnalytics>,
    pub recommendation: Option<AiRecommendation>,
}

/// Field `ListTickets` sorts on when `smart_order` is not requested (§6
/// `sort=`). Defaults to `created_at`, matching §4.11's "default sort
/// created_at desc".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSortField {
    #[default]
    CreatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// `page`/`limit` from §6; `page` is 1-based, a `page` of 0 is treated as 1.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

impl Pagination {
    fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let limit = self.limit.max(1) as usize;
        let page = self.page.max(1) as usize;
        let start = (page - 1) * limit;
        items.into_iter().skip(start).take(limit).collect()
    }
}

/// Tag mutation modes for `UpdateTicket` (§4.11): `tags` replaces the set
/// wholesale, `add_tags` unions in, `remove_tags` subtracts.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    pub subject: Option<String>,
    pub tags: Option<Vec<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

pub struct TicketService<'a> {
    store: &'a dyn TicketStore,
    analytics: &'a AnalyticsService<'a>,
    adapter: &'a dyn LanguageModelAdapter,
}

impl<'a> TicketService<'a> {
    pub fn new(store: &'a dyn TicketStore, analytics: &'a AnalyticsService<'a>, adapter: &'a dyn LanguageModelAdapter) -> Self {
        Self { store, analytics, adapter }
    }

    pub async fn create_ticket(
        &self,
        tenant_id: Uuid,
        customer_id: String,
        channel: String,
        subject: String,
        initial_message: String,
    ) -> Result<Ticket, TicketError> {
        let now = Utc::now();
        let ticket_number = self.store.next_ticket_number(tenant_id).await;
        let ticket = Ticket {
            id: Uuid::new_v4(),
            tenant_id,
            ticket_number,
            customer_id,
            channel,
            status: TicketStatus::Open,
            priority: Priority::Normal,
            subject,
            assigned_to: None,
            tags: Vec::new(),
            custom_fields: std::collections::HashMap::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        let message = TicketMessage {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            from_agent: false,
            content: initial_message,
            author: ticket.customer_id.clone(),
            created_at: now,
        };
        self.store.insert_ticket(ticket.clone(), message).await?;
        tracing::info!(ticket_id = %ticket.id, ticket_number = %ticket.ticket_number, "ticket created");
        Ok(ticket)
    }

    /// `ListTickets`, with `smart_order` deferring to C10's scorer (§4.10,
    /// §4.11). Pagination is applied last: with `smart_order`, the full
    /// candidate set is scored and sorted by total descending first, THEN
    /// paginated (§4.10); without it, the conventional `sort`/`order` is
    /// applied before pagination.
    pub async fn list_tickets(
        &self,
        tenant_id: Uuid,
        filters: &TicketFilters,
        smart_order: bool,
        topic_alerts: &[String],
        sort: TicketSortField,
        order: SortOrder,
        pagination: Pagination,
    ) -> Result<Vec<(Ticket, Option<ScoreBreakdown>)>, TicketError> {
        let tickets = self.store.list_tickets(tenant_id, filters).await?;

        let scored: Vec<(Ticket, Option<ScoreBreakdown>)> = if smart_order {
            let now = Utc::now();
            let mut scored = Vec::with_capacity(tickets.len());
            for ticket in tickets {
                let messages = self.store.list_messages(ticket.id).await?;
                let latest_text = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                let analytics = self.analytics.get_customer_analytics(&ticket.customer_id).await.ok();
                let breakdown = scoring::score(&ticket, analytics.as_ref(), &latest_text, topic_alerts, now);
                scored.push((ticket, Some(breakdown)));
            }
            scored.sort_by(|a, b| scoring::cmp_for_ranking(a.1.as_ref().unwrap(), b.1.as_ref().unwrap()));
            scored
        } else {
            let mut plain: Vec<(Ticket, Option<ScoreBreakdown>)> = tickets.into_iter().map(|t| (t, None)).collect();
            plain.sort_by(|a, b| {
                let cmp = match sort {
                    TicketSortField::CreatedAt => a.0.created_at.cmp(&b.0.created_at),
                    TicketSortField::Priority => a.0.priority.cmp(&b.0.priority),
                };
                match order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                }
            });
            plain
        };

        Ok(pagination.apply(scored))
    }

    pub async fn get_ticket(&self, tenant_id: Uuid, id_or_number: &str) -> Result<TicketDetail, TicketError> {
        let ticket = self.store.get_ticket(tenant_id, id_or_number).await?;
        let messages = self.store.list_messages(ticket.id).await?;
        let analytics = self.analytics.get_customer_analytics(&ticket.customer_id).await.ok();
        let message_count = messages.len();
        let recommendation = self
            .store
            .get_recommendation(ticket.id)
            .await?
            .filter(|r| r.is_fresh(Utc::now(), message_count));
        Ok(TicketDetail {
            ticket,
            messages,
            analytics,
            recommendation,
        })
    }

    /// `AppendMessage`: bumps `updated_at`, optionally closes the ticket,
    /// and invalidates any cached recommendation since the conversation has
    /// moved on (§4.11).
    pub async fn append_message(
        &self,
        tenant_id: Uuid,
        id_or_number: &str,
        content: String,
        from_agent: bool,
        author: String,
        close_ticket: bool,
    ) -> Result<(), TicketError> {
        let mut ticket = self.store.get_ticket(tenant_id, id_or_number).await?;
        let now = Utc::now();
        let message = TicketMessage {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            from_agent,
            content,
            author,
            created_at: now,
        };
        self.store.append_message(message).await?;

        if close_ticket {
            ticket.close(now);
            self.store.update_ticket(tenant_id, ticket.clone()).await?;
        }

        // Invalidate: a stale recommendation no longer reflects the thread.
        if let Some(rec) = self.store.get_recommendation(ticket.id).await? {
            let expired = AiRecommendation {
                expires_at: now - chrono::Duration::seconds(1),
                ..rec
            };
            self.store.save_recommendation(expired).await?;
        }
        Ok(())
    }

    /// `UpdateTicket`: `tags` replaces, `add_tags` unions, `remove_tags`
    /// subtracts, in that order (§4.11).
    pub async fn update_ticket(&self, tenant_id: Uuid, id_or_number: &str, update: TicketUpdate) -> Result<Ticket, TicketError> {
        let mut ticket = self.store.get_ticket(tenant_id, id_or_number).await?;

        if let Some(status) = update.status {
            ticket.status = status;
        }
        if let Some(priority) = update.priority {
            ticket.priority = priority;
        }
        if let Some(assigned_to) = update.assigned_to {
            ticket.assigned_to = Some(assigned_to);
        }
        if let Some(subject) = update.subject {
            ticket.subject = subject;
        }
        if let Some(tags) = update.tags {
            ticket.tags = Vec::new();
            for tag in tags {
                ticket.add_tag(tag);
            }
        }
        for tag in update.add_tags {
            ticket.add_tag(tag);
        }
        for tag in &update.remove_tags {
            ticket.remove_tag(tag);
        }

        ticket.updated_at = Utc::now();
        self.store.update_ticket(tenant_id, ticket.clone()).await?;
        Ok(ticket)
    }

    pub async fn add_note(&self, ticket_id: Uuid, text: String, author: String) -> Result<TicketNote, TicketError> {
        let note = TicketNote {
            id: Uuid::new_v4(),
            ticket_id,
            text,
            author,
            created_at: Utc::now(),
        };
        self.store.add_note(note.clone()).await?;
        Ok(note)
    }

    pub async fn list_notes(&self, ticket_id: Uuid) -> Result<Vec<TicketNote>, TicketError> {
        self.store.list_notes(ticket_id).await
    }

    /// Drop every message after the first and drop the cached recommendation
    /// (§4.11 `ResetConversation`).
    pub async fn reset_conversation(&self, ticket_id: Uuid) -> Result<(), TicketError> {
        self.store.clear_messages_after_first(ticket_id).await
    }

    /// `GetRecommendation`: freshness-gated on message count, regenerates
    /// and caches for an hour on a miss (§4.11).
    pub async fn get_recommendation(&self, tenant_id: Uuid, id_or_number: &str) -> Result<AiRecommendation, TicketError> {
        let ticket = self.store.get_ticket(tenant_id, id_or_number).await?;
        let messages = self.store.list_messages(ticket.id).await?;

        if let Some(existing) = self.store.get_recommendation(ticket.id).await? {
            if existing.is_fresh(Utc::now(), messages.len()) {
                return Ok(existing);
            }
        }

        let recommendation = self.regenerate_recommendation(&ticket, &messages).await?;
        self.store.save_recommendation(recommendation.clone()).await?;
        Ok(recommendation)
    }

    /// `GetDraft`: same freshness gate as `GetRecommendation`, reading the
    /// draft component of the cached recommendation (§4.11).
    pub async fn get_draft(&self, tenant_id: Uuid, id_or_number: &str) -> Result<DraftResponse, TicketError> {
        let recommendation = self.get_recommendation(tenant_id, id_or_number).await?;
        recommendation
            .draft_response
            .ok_or_else(|| TicketError::UpstreamFailure("no draft available".into()))
    }

    /// `RegenerateDraft`: always calls the adapter, ignoring any cached
    /// freshness (§4.11).
    pub async fn regenerate_draft(&self, tenant_id: Uuid, id_or_number: &str) -> Result<DraftResponse, TicketError> {
        let ticket = self.store.get_ticket(tenant_id, id_or_number).await?;
        let messages = self.store.list_messages(ticket.id).await?;
        let recommendation = self.regenerate_recommendation(&ticket, &messages).await?;
        self.store.save_recommendation(recommendation.clone()).await?;
        recommendation
            .draft_response
            .ok_or_else(|| TicketError::UpstreamFailure("no draft available".into()))
    }

    async fn regenerate_recommendation(
        &self,
        ticket: &Ticket,
        messages: &[TicketMessage],
    ) -> Result<AiRecommendation, TicketError> {
        let analytics = self.analytics.get_customer_analytics(&ticket.customer_id).await.ok();
        let context = RecommendationContext {
            ticket_subject: ticket.subject.clone(),
            customer_message_history: messages.iter().map(|m| m.content.clone()).collect(),
            analytics_summary: analytics
                .as_ref()
                .map(|a| format!("ltv={:.2} vip={}", a.business.lifetime_value, a.is_vip))
                .unwrap_or_default(),
            urgency_category: format!("{:?}", ticket.priority),
            priority_reason: String::new(),
        };
        let recommendation = self.adapter.recommend(&context).await.inspect_err(|e| {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "recommendation adapter call failed");
        })?;
        let draft = self.adapter.draft(&context, &DraftOptions::default()).await?;

        let now = Utc::now();
        Ok(AiRecommendation {
            ticket_id: ticket.id,
            priority: ticket.priority,
            actions: recommendation.actions,
            talking_points: recommendation.talking_points,
            warnings: recommendation.warnings,
            estimated_impact: recommendation.estimated_impact,
            draft_response: Some(draft),
            message_count: messages.len(),
            generated_at: now,
            expires_at: now + chrono::Duration::hours(1),
        })
    }

    /// `MarkActionCompleted` (§4.11): stamps `completed_at` on the
    /// indicated action of the cached recommendation, or clears it.
    pub async fn mark_action_completed(
        &self,
        ticket_id: Uuid,
        action_index: usize,
        completed: bool,
    ) -> Result<(), TicketError> {
        let mut recommendation = self
            .store
            .get_recommendation(ticket_id)
            .await?
            .ok_or_else(|| TicketError::NotFound(ticket_id.to_string()))?;
        let action = recommendation
            .actions
            .get_mut(action_index)
            .ok_or_else(|| TicketError::Validation("action_index out of range".into()))?;
        action.completed_at = if completed { Some(Utc::now()) } else { None };
        self.store.save_recommendation(recommendation).await?;
        Ok(())
    }

    /// `GetScoreBreakdown` (§4.10, §4.11).
    pub async fn get_score_breakdown(
        &self,
        tenant_id: Uuid,
        id_or_number: &str,
        topic_alerts: &[String],
    ) -> Result<ScoreBreakdown, TicketError> {
        let ticket = self.store.get_ticket(tenant_id, id_or_number).await?;
        let messages = self.store.list_messages(ticket.id).await?;
        let latest_text = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let analytics = self.analytics.get_customer_analytics(&ticket.customer_id).await.ok();
        Ok(scoring::score(&ticket, analytics.as_ref(), &latest_text, topic_alerts, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use supportgate_core::analytics::{AnalyticsStore, CustomerProfileRow};
    use supportgate_core::cache::Cache;
    use supportgate_core::error::AnalyticsError;
    use supportgate_core::model::{BusinessMetrics, RecommendedAction};
    use crate::adapters::Recommendation;
    use crate::store::InMemoryTicketStore;

    struct EmptyAnalyticsStore;
    #[async_trait]
    impl AnalyticsStore for EmptyAnalyticsStore {
        async fn get_profile(&self, customer_id: &str) -> Result<CustomerProfileRow, AnalyticsError> {
            Ok(CustomerProfileRow {
                customer_id: customer_id.to_string(),
                archetype_id: None,
                dominant_segments: Vec::new(),
                business: BusinessMetrics::default(),
                churn_score: 0.1,
                tags: Vec::new(),
                low_engagement_with_history: false,
                price_sensitive: false,
                frequent_purchaser: false,
                high_return_rate: false,
            })
        }
    }

    struct FixedAdapter;
    #[async_trait]
    impl LanguageModelAdapter for FixedAdapter {
        async fn recommend(&self, _context: &RecommendationContext) -> Result<Recommendation, TicketError> {
            Ok(Recommendation {
                actions: vec![RecommendedAction {
                    priority: 1,
                    reasoning: "follow up".into(),
                    completed_at: None,
                }],
                talking_points: Vec::new(),
                warnings: Vec::new(),
                estimated_impact: None,
            })
        }

        async fn draft(&self, _context: &RecommendationContext, _options: &DraftOptions) -> Result<DraftResponse, TicketError> {
            Ok(DraftResponse {
                text: "Thanks for reaching out!".into(),
                draft_tone: "friendly".into(),
                draft_personalization: None,
            })
        }
    }

    fn harness() -> (InMemoryTicketStore, Cache, EmptyAnalyticsStore, FixedAdapter) {
        (InMemoryTicketStore::new(), Cache::new(), EmptyAnalyticsStore, FixedAdapter)
    }

    #[tokio::test]
    async fn test_create_and_get_ticket() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();

        let ticket = service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "Where's my order".into(), "Hi, help?".into())
            .await
            .unwrap();

        let detail = service.get_ticket(tenant_id, &ticket.id.to_string()).await.unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert!(detail.analytics.is_some());
    }

    #[tokio::test]
    async fn test_update_ticket_tag_semantics() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        let ticket = service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "Subject".into(), "Hi".into())
            .await
            .unwrap();

        let updated = service
            .update_ticket(
                tenant_id,
                &ticket.id.to_string(),
                TicketUpdate {
                    tags: Some(vec!["a".into(), "b".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tags, vec!["a".to_string(), "b".to_string()]);

        let updated = service
            .update_ticket(
                tenant_id,
                &ticket.id.to_string(),
                TicketUpdate {
                    add_tags: vec!["c".into()],
                    remove_tags: vec!["a".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tags, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_append_message_invalidates_recommendation() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        let ticket = service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "Subject".into(), "Hi".into())
            .await
            .unwrap();

        let recommendation = service.get_recommendation(tenant_id, &ticket.id.to_string()).await.unwrap();
        assert!(recommendation.is_fresh(Utc::now(), 2));

        service
            .append_message(tenant_id, &ticket.id.to_string(), "follow up".into(), false, "cust-1".into(), false)
            .await
            .unwrap();

        let refreshed = service.get_recommendation(tenant_id, &ticket.id.to_string()).await.unwrap();
        assert!(refreshed.is_fresh(Utc::now(), 3));
    }

    #[tokio::test]
    async fn test_mark_action_completed() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        let ticket = service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "Subject".into(), "Hi".into())
            .await
            .unwrap();
        service.get_recommendation(tenant_id, &ticket.id.to_string()).await.unwrap();

        service.mark_action_completed(ticket.id, 0, true).await.unwrap();
        let recommendation = store.get_recommendation(ticket.id).await.unwrap().unwrap();
        assert!(recommendation.actions[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_list_tickets_smart_order() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "A".into(), "hello".into())
            .await
            .unwrap();
        service
            .create_ticket(tenant_id, "cust-2".into(), "email".into(), "B".into(), "hi".into())
            .await
            .unwrap();

        let ranked = service
            .list_tickets(
                tenant_id,
                &TicketFilters::default(),
                true,
                &[],
                TicketSortField::default(),
                SortOrder::default(),
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|(_, breakdown)| breakdown.is_some()));
    }

    #[tokio::test]
    async fn test_list_tickets_paginates_after_sorting() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        for label in ["A", "B", "C"] {
            service
                .create_ticket(tenant_id, "cust-1".into(), "email".into(), label.into(), "hi".into())
                .await
                .unwrap();
        }

        let page = service
            .list_tickets(
                tenant_id,
                &TicketFilters::default(),
                false,
                &[],
                TicketSortField::CreatedAt,
                SortOrder::Asc,
                Pagination { page: 2, limit: 2 },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].0.subject, "C");
    }

    #[tokio::test]
    async fn test_list_tickets_sorts_by_priority() {
        let (store, cache, analytics_store, adapter) = harness();
        let analytics = AnalyticsService::new(&analytics_store, &cache, Uuid::new_v4());
        let service = TicketService::new(&store, &analytics, &adapter);
        let tenant_id = Uuid::new_v4();
        let low = service
            .create_ticket(tenant_id, "cust-1".into(), "email".into(), "Low".into(), "hi".into())
            .await
            .unwrap();
        let urgent = service
            .create_ticket(tenant_id, "cust-2".into(), "email".into(), "Urgent".into(), "hi".into())
            .await
            .unwrap();
        service
            .update_ticket(tenant_id, &urgent.id.to_string(), TicketUpdate { priority: Some(Priority::Urgent), ..Default::default() })
            .await
            .unwrap();
        service
            .update_ticket(tenant_id, &low.id.to_string(), TicketUpdate { priority: Some(Priority::Low), ..Default::default() })
            .await
            .unwrap();

        let ranked = service
            .list_tickets(
                tenant_id,
                &TicketFilters::default(),
                false,
                &[],
                TicketSortField::Priority,
                SortOrder::Desc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(ranked[0].0.subject, "Urgent");
        assert_eq!(ranked[1].0.subject, "Low");
    }
}
