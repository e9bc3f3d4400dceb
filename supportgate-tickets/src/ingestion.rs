//! Ingestion Pipeline (C9, §4.9).
//!
//! Normalizes the two webhook shapes providers send into one envelope,
//! applies the automation/loop filters, then enriches and writes back.
//! Steps 1-5 run synchronously from the webhook handler; steps 6-12 are
//! meant to be spawned onto a detached background task by the caller
//! (§5: "Each inbound webhook spawns a detached background task for
//! ingestion steps 6-12 so the provider sees a prompt 200 response") —
//! this crate exposes that split as two methods rather than owning the
//! task spawn itself, since the worker pool is an HTTP-layer concern.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use supportgate_core::analytics::AnalyticsService;
use supportgate_core::customer_resolver::{self, PhoneLookup};
use supportgate_core::model::{AiRecommendation, CustomerAnalytics, Priority, TicketNote, TicketStatus};
use supportgate_core::priority::{self, PriorityInputs};
use supportgate_core::urgency;
use uuid::Uuid;

use crate::adapters::{DraftOptions, LanguageModelAdapter, RecommendationContext};
use crate::error::TicketError;
use crate::store::TicketStore;

const MARKETING_DOMAINS: [&str; 5] = [
    "klaviyo.com",
    "mailchimp.com",
    "sendgrid.net",
    "constantcontact.com",
    "activecampaign.com",
];

/// A single message as seen in a provider webhook, already flattened out
/// of whichever raw shape the provider used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub content: String,
    pub from_agent: bool,
    pub via: Option<String>,
    pub channel: Option<String>,
    pub created_by_agent: bool,
}

/// The canonical envelope every provider payload is folded into (§4.9
/// step 1): `ticket, customer, messages[]`, trailing message newest.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub ticket_status: TicketStatus,
    /// `true` when the provider's own status string was `spam` or `deleted`
    /// rather than one of our three canonical statuses (§4.9 step 2).
    pub provider_reports_spam_or_deleted: bool,
    pub ticket_tags: Vec<String>,
    pub subject: String,
    pub customer: Value,
    pub messages: Vec<InboundMessage>,
    pub via: Option<String>,
    pub source_channel: Option<String>,
}

impl InboundEnvelope {
    fn latest_message(&self) -> Option<&InboundMessage> {
        self.messages.last()
    }
}

fn message_from_value(value: &Value) -> InboundMessage {
    InboundMessage {
        content: value
            .get("body")
            .or_else(|| value.get("content"))
            .or_else(|| value.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        from_agent: value.get("from_agent").and_then(Value::as_bool).unwrap_or(false),
        via: value.get("via").and_then(Value::as_str).map(str::to_string),
        channel: value.get("channel").and_then(Value::as_str).map(str::to_string),
        created_by_agent: value.get("created_by_agent").and_then(Value::as_bool).unwrap_or(false),
    }
}

/// Fold the two provider webhook shapes (a whole ticket, or a `{ticket,
/// message}` pair) into the canonical envelope (§4.9 step 1). Provider wire
/// formats are an external collaborator boundary: this covers the field
/// names common across the supported providers, not a full per-provider
/// schema.
pub fn normalize_payload(raw: &Value) -> InboundEnvelope {
    let ticket = raw.get("ticket").unwrap_or(raw);
    let customer = ticket
        .get("customer")
        .or_else(|| raw.get("customer"))
        .cloned()
        .unwrap_or(Value::Null);

    let mut messages: Vec<InboundMessage> = ticket
        .get("messages")
        .or_else(|| raw.get("messages"))
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(message_from_value).collect())
        .unwrap_or_default();
    if let Some(message) = raw.get("message") {
        messages.push(message_from_value(message));
    }

    let status_str = ticket.get("status").and_then(Value::as_str).unwrap_or("open").to_lowercase();
    let (ticket_status, provider_reports_spam_or_deleted) = match status_str.as_str() {
        "closed" => (TicketStatus::Closed, false),
        "pending" => (TicketStatus::Pending, false),
        "spam" | "deleted" => (TicketStatus::Closed, true),
        _ => (TicketStatus::Open, false),
    };

    let ticket_tags = ticket
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    InboundEnvelope {
        ticket_status,
        provider_reports_spam_or_deleted,
        ticket_tags,
        subject: ticket.get("subject").and_then(Value::as_str).unwrap_or("").to_string(),
        customer,
        messages,
        via: ticket.get("via").and_then(Value::as_str).map(str::to_string),
        source_channel: ticket.get("channel").and_then(Value::as_str).map(str::to_string),
    }
}

/// Source of the inbound event (§4.9 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Ringcentral,
    Sms,
    Email,
    Chat,
    Phone,
    Api,
    Unknown,
}

/// Classify event source from `via`, `channel`, subject, and customer email
/// (§4.9 step 3).
pub fn detect_source(envelope: &InboundEnvelope) -> EventSource {
    let via = envelope.via.as_deref().unwrap_or("").to_lowercase();
    let channel = envelope.source_channel.as_deref().unwrap_or("").to_lowercase();
    let subject = envelope.subject.to_lowercase();

    if via.contains("ringcentral") || channel.contains("ringcentral") {
        return EventSource::Ringcentral;
    }
    if channel.contains("sms") || subject.contains("sms") {
        return EventSource::Sms;
    }
    if channel.contains("chat") {
        return EventSource::Chat;
    }
    if channel.contains("phone") || channel.contains("call") {
        return EventSource::Phone;
    }
    if via == "api" {
        return EventSource::Api;
    }
    if channel.contains("email") || envelope.customer.get("email").is_some() {
        return EventSource::Email;
    }
    EventSource::Unknown
}

/// Why the pipeline stopped short of enrichment (§4.9 step 1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OwnMessage,
    ManualIgnoreTag,
    TicketClosedOrSpam,
    NoReplyEmail,
    MarketingAutomationDomain,
    SmsNotificationSubject,
    EmptyMessageBody,
    PureApiAutomation,
}

fn has_manual_override(tags: &[String], needles: &[&str]) -> bool {
    tags.iter()
        .any(|t| needles.iter().any(|n| t.eq_ignore_ascii_case(n)))
}

/// Evaluate the automation/loop filters in order; manual-override tags
/// dominate (§4.9 step 2).
pub fn skip_reason(envelope: &InboundEnvelope, source: EventSource) -> Option<SkipReason> {
    if let Some(latest) = envelope.latest_message() {
        let is_own_note = latest.via.as_deref() == Some("api") && latest.channel.as_deref() == Some("internal-note");
        if is_own_note || latest.from_agent {
            return Some(SkipReason::OwnMessage);
        }
    }

    if has_manual_override(&envelope.ticket_tags, &["ai_ignore", "no-ai", "human-only"]) {
        return Some(SkipReason::ManualIgnoreTag);
    }

    if matches!(envelope.ticket_status, TicketStatus::Closed) || envelope.provider_reports_spam_or_deleted {
        return Some(SkipReason::TicketClosedOrSpam);
    }

    let email = envelope
        .customer
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    let is_noreply = email.contains("no-reply") || email.contains("noreply");
    let ringcentral_with_phone = source == EventSource::Ringcentral
        && envelope.customer.get("phone").and_then(Value::as_str).is_some();
    if is_noreply && !ringcentral_with_phone {
        return Some(SkipReason::NoReplyEmail);
    }

    if source != EventSource::Sms {
        let email_host = email.split('@').nth(1).unwrap_or("");
        if MARKETING_DOMAINS.iter().any(|d| email_host == *d) {
            return Some(SkipReason::MarketingAutomationDomain);
        }
    }

    if envelope.subject.to_lowercase().contains("new sms to") {
        return Some(SkipReason::SmsNotificationSubject);
    }

    let latest_non_note = envelope
        .messages
        .iter()
        .rev()
        .find(|m| !(m.via.as_deref() == Some("api") && m.channel.as_deref() == Some("internal-note")));
    if let Some(latest) = latest_non_note {
        if latest.content.trim().is_empty() {
            let permitted = source == EventSource::Ringcentral
                && envelope.customer.get("phone").and_then(Value::as_str).is_some();
            if !permitted {
                return Some(SkipReason::EmptyMessageBody);
            }
        }
    }

    let via_is_api = envelope.via.as_deref() == Some("api");
    let any_agent_created = envelope.messages.iter().any(|m| m.created_by_agent);
    let forced = has_manual_override(&envelope.ticket_tags, &["ai_force", "force-ai"]);
    if via_is_api && !any_agent_created && !forced {
        return Some(SkipReason::PureApiAutomation);
    }

    None
}

/// Merge provider-embedded primary metrics with C6's supplemental
/// analytics (§4.9 step 5). Provider-embedded fields win where both are
/// present, since the customer's own ticketing record is the more current
/// source for LTV/tags at the moment of the event.
pub fn merge_analytics(
    provider_embedded: Option<CustomerAnalytics>,
    supplemental: CustomerAnalytics,
) -> CustomerAnalytics {
    match provider_embedded {
        Some(mut primary) => {
            if primary.dominant_segments.is_empty() {
                primary.dominant_segments = supplemental.dominant_segments;
            }
            if primary.archetype_id.is_none() {
                primary.archetype_id = supplemental.archetype_id;
            }
            primary.communication_style_hints = supplemental.communication_style_hints;
            if primary.churn.is_none() {
                primary.churn = supplemental.churn;
            }
            primary
        }
        None => supplemental,
    }
}

/// Outcome of running the synchronous half of the pipeline (§4.9 steps 1-5).
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub status: &'static str,
    pub reason: Option<SkipReason>,
}

/// Result of the asynchronous half (§4.9 steps 6-12), returned for the
/// structured observability event (step 12).
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    pub ticket_id: Uuid,
    pub priority: Priority,
    pub urgency_category: String,
    pub source: EventSource,
    pub is_vip: bool,
    pub note_posted: bool,
}

pub struct IngestionPipeline<'a> {
    store: &'a dyn TicketStore,
    analytics: &'a AnalyticsService<'a>,
    phone_lookup: &'a dyn PhoneLookup,
    adapter: &'a dyn LanguageModelAdapter,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a dyn TicketStore,
        analytics: &'a AnalyticsService<'a>,
        phone_lookup: &'a dyn PhoneLookup,
        adapter: &'a dyn LanguageModelAdapter,
    ) -> Self {
        Self {
            store,
            analytics,
            phone_lookup,
            adapter,
        }
    }

    /// Steps 1-2: normalize and filter. Returns the skip verdict, or `None`
    /// if the event should proceed to enrichment.
    pub fn precheck(&self, envelope: &InboundEnvelope) -> IngestionOutcome {
        let source = detect_source(envelope);
        match skip_reason(envelope, source) {
            Some(reason) => IngestionOutcome {
                status: "skipped",
                reason: Some(reason),
            },
            None => IngestionOutcome {
                status: "accepted",
                reason: None,
            },
        }
    }

    /// Steps 3-12: customer resolution, analytics merge, urgency/priority,
    /// draft generation, note persistence, and the recommendation cache
    /// record. Provider-specific priority/tag write-back against the CRM
    /// is the caller's concern (it holds the decrypted credentials); this
    /// only returns the decision the caller should write back.
    pub async fn enrich(
        &self,
        tenant_ticket_id: Uuid,
        envelope: &InboundEnvelope,
        provider_embedded_analytics: Option<CustomerAnalytics>,
    ) -> Result<(EnrichmentResult, TicketNote), TicketError> {
        let source = detect_source(envelope);

        let customer_id = customer_resolver::resolve_customer_id(&envelope.customer, self.phone_lookup)
            .await
            .map_err(|_| TicketError::CustomerUnidentified)?;

        let supplemental = self.analytics.get_customer_analytics(&customer_id).await?;
        let analytics = merge_analytics(provider_embedded_analytics, supplemental);

        let latest_text = envelope
            .latest_message()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let urgency = urgency::classify(latest_text);

        let decision = priority::decide(
            &urgency,
            PriorityInputs {
                is_vip: analytics.is_vip,
                lifetime_value: analytics.business.lifetime_value,
                churn_score: analytics.churn.as_ref().map(|c| c.score).unwrap_or(0.0),
            },
        );

        let context = RecommendationContext {
            ticket_subject: envelope.subject.clone(),
            customer_message_history: envelope.messages.iter().map(|m| m.content.clone()).collect(),
            analytics_summary: format!(
                "ltv={:.2} churn={:.2} vip={}",
                analytics.business.lifetime_value,
                analytics.churn.as_ref().map(|c| c.score).unwrap_or(0.0),
                analytics.is_vip
            ),
            urgency_category: format!("{:?}", urgency.category),
            priority_reason: decision.reason.clone(),
        };

        let draft = self
            .adapter
            .draft(&context, &DraftOptions::default())
            .await
            .map_err(|e| TicketError::UpstreamFailure(e.to_string()))?;

        let now = Utc::now();
        let note = TicketNote {
            id: Uuid::new_v4(),
            ticket_id: tenant_ticket_id,
            text: draft.text.clone(),
            author: "ai-assistant".to_string(),
            created_at: now,
        };
        self.store.add_note(note.clone()).await?;

        let recommendation = AiRecommendation {
            ticket_id: tenant_ticket_id,
            priority: decision.priority,
            actions: Vec::new(),
            talking_points: Vec::new(),
            warnings: Vec::new(),
            estimated_impact: None,
            draft_response: Some(draft),
            message_count: envelope.messages.len(),
            generated_at: now,
            expires_at: now + chrono::Duration::hours(1),
        };
        self.store.save_recommendation(recommendation).await?;

        Ok((
            EnrichmentResult {
                ticket_id: tenant_ticket_id,
                priority: decision.priority,
                urgency_category: format!("{:?}", urgency.category),
                source,
                is_vip: analytics.is_vip,
                note_posted: true,
            },
            note,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_with(messages: Vec<InboundMessage>, tags: Vec<String>, status: TicketStatus) -> InboundEnvelope {
        InboundEnvelope {
            ticket_status: status,
            provider_reports_spam_or_deleted: false,
            ticket_tags: tags,
            subject: "Order question".into(),
            customer: json!({"email": "shopper@example.com"}),
            messages,
            via: None,
            source_channel: Some("email".into()),
        }
    }

    fn customer_message(content: &str) -> InboundMessage {
        InboundMessage {
            content: content.to_string(),
            from_agent: false,
            via: None,
            channel: None,
            created_by_agent: false,
        }
    }

    /// Spec scenario 5: own-note loop prevention.
    #[test]
    fn test_scenario_own_note_skipped() {
        let envelope = envelope_with(
            vec![InboundMessage {
                content: "Priority updated".into(),
                from_agent: false,
                via: Some("api".into()),
                channel: Some("internal-note".into()),
                created_by_agent: true,
            }],
            Vec::new(),
            TicketStatus::Open,
        );
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::OwnMessage));
    }

    #[test]
    fn test_manual_ignore_tag_skips() {
        let envelope = envelope_with(vec![customer_message("help")], vec!["ai_ignore".to_string()], TicketStatus::Open);
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::ManualIgnoreTag));
    }

    #[test]
    fn test_closed_ticket_skips() {
        let envelope = envelope_with(vec![customer_message("help")], Vec::new(), TicketStatus::Closed);
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::TicketClosedOrSpam));
    }

    #[test]
    fn test_provider_spam_status_skips() {
        let envelope = normalize_payload(&json!({
            "ticket": {"status": "spam", "subject": "x"},
            "message": {"body": "buy now"},
        }));
        assert!(envelope.provider_reports_spam_or_deleted);
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::TicketClosedOrSpam));
    }

    #[test]
    fn test_normalize_payload_whole_ticket_shape() {
        let envelope = normalize_payload(&json!({
            "ticket": {
                "status": "open",
                "subject": "Where is my order",
                "tags": ["vip"],
                "customer": {"email": "shopper@example.com"},
                "messages": [{"body": "help", "from_agent": false}],
            }
        }));
        assert_eq!(envelope.subject, "Where is my order");
        assert_eq!(envelope.ticket_tags, vec!["vip".to_string()]);
        assert_eq!(envelope.messages.len(), 1);
        assert_eq!(envelope.messages[0].content, "help");
    }

    #[test]
    fn test_noreply_email_skips_unless_ringcentral_with_phone() {
        let mut envelope = envelope_with(vec![customer_message("help")], Vec::new(), TicketStatus::Open);
        envelope.customer = json!({"email": "no-reply@shop.com"});
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::NoReplyEmail));

        envelope.via = Some("ringcentral".into());
        envelope.source_channel = Some("ringcentral".into());
        envelope.customer = json!({"email": "no-reply@shop.com", "phone": "5551234567"});
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), None);
    }

    #[test]
    fn test_marketing_automation_domain_skips() {
        let mut envelope = envelope_with(vec![customer_message("you have a new order")], Vec::new(), TicketStatus::Open);
        envelope.customer = json!({"email": "bounce@klaviyo.com"});
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::MarketingAutomationDomain));
    }

    #[test]
    fn test_sms_bypasses_marketing_domain_filter() {
        let mut envelope = envelope_with(vec![customer_message("please help")], Vec::new(), TicketStatus::Open);
        envelope.customer = json!({"email": "bounce@klaviyo.com"});
        envelope.source_channel = Some("sms".into());
        let source = detect_source(&envelope);
        assert_eq!(source, EventSource::Sms);
        assert_eq!(skip_reason(&envelope, source), None);
    }

    #[test]
    fn test_pure_api_automation_skips_unless_forced() {
        let mut envelope = envelope_with(vec![customer_message("auto ping")], Vec::new(), TicketStatus::Open);
        envelope.via = Some("api".into());
        let source = detect_source(&envelope);
        assert_eq!(skip_reason(&envelope, source), Some(SkipReason::PureApiAutomation));

        envelope.ticket_tags = vec!["force-ai".to_string()];
        assert_eq!(skip_reason(&envelope, source), None);
    }

    #[test]
    fn test_merge_analytics_prefers_provider_embedded_core_fields() {
        let provider = CustomerAnalytics {
            customer_id: "cust-1".into(),
            business: supportgate_core::model::BusinessMetrics {
                lifetime_value: 900.0,
                ..Default::default()
            },
            churn: None,
            dominant_segments: Vec::new(),
            archetype_id: None,
            communication_style_hints: Vec::new(),
            is_vip: true,
            tags: vec!["LCC_Member".into()],
        };
        let supplemental = CustomerAnalytics {
            customer_id: "cust-1".into(),
            business: supportgate_core::model::BusinessMetrics {
                lifetime_value: 100.0,
                ..Default::default()
            },
            churn: Some(supportgate_core::model::ChurnProfile {
                score: 0.4,
                risk_level: supportgate_core::model::ChurnRiskLevel::Medium,
            }),
            dominant_segments: vec!["crafts".into()],
            archetype_id: Some("loyal".into()),
            communication_style_hints: vec!["price_sensitive".into()],
            is_vip: false,
            tags: Vec::new(),
        };
        let merged = merge_analytics(Some(provider), supplemental);
        assert_eq!(merged.business.lifetime_value, 900.0, "provider-embedded LTV wins");
        assert_eq!(merged.churn.unwrap().score, 0.4, "supplemental fills in missing churn");
        assert_eq!(merged.dominant_segments, vec!["crafts".to_string()]);
    }
}
