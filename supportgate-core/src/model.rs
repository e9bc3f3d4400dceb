//! Shared domain types: tenants, tickets, and the customer analytics read
//! model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A ticketing provider that can deliver webhooks and accept write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gorgias,
    Zendesk,
    Salesforce,
    Helpshift,
    Intercom,
    Freshdesk,
}

impl Provider {
    /// All providers, in the order they appear in the spec's verifier table.
    pub const ALL: [Provider; 6] = [
        Provider::Gorgias,
        Provider::Zendesk,
        Provider::Salesforce,
        Provider::Helpshift,
        Provider::Intercom,
        Provider::Freshdesk,
    ];

    /// The HTTP header carrying this provider's webhook signature.
    pub fn signature_header(&self) -> &'static str {
        match self {
            Provider::Gorgias => "X-Gorgias-Signature",
            Provider::Zendesk => "X-Zendesk-Webhook-Signature",
            Provider::Salesforce => "X-Salesforce-Signature",
            Provider::Helpshift => "X-Helpshift-Signature",
            Provider::Intercom => "X-Hub-Signature",
            Provider::Freshdesk => "X-Freshdesk-Signature",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::Gorgias => "gorgias",
            Provider::Zendesk => "zendesk",
            Provider::Salesforce => "salesforce",
            Provider::Helpshift => "helpshift",
            Provider::Intercom => "intercom",
            Provider::Freshdesk => "freshdesk",
        };
        f.write_str(s)
    }
}

/// Deployment environment a tenant runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
}

/// A distinct customer of the platform whose data is fully isolated (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub legacy_store_id: Option<String>,
    pub crm_provider: Provider,
    /// Opaque ciphertext; decrypts to a provider-credential mapping including
    /// `webhook_secret`. Never logged.
    pub crm_config_ciphertext: Vec<u8>,
    pub webhook_identifiers: HashMap<String, String>,
    pub features: HashMap<String, serde_json::Value>,
    pub settings: HashMap<String, serde_json::Value>,
    pub is_active: bool,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted, provider-specific CRM credentials. Never serialized into logs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrmConfig {
    pub webhook_secret: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Ticket lifecycle status (§3 invariant: `closed_at` set iff `status == Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Closed,
}

/// Priority assigned by the urgency/priority engine (C8) or an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// A support ticket, owned by exactly one tenant (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Monotonic, tenant-scoped display number, e.g. `T-001`. Immutable.
    pub ticket_number: String,
    pub customer_id: String,
    pub channel: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub subject: String,
    pub assigned_to: Option<String>,
    /// Order-preserving, duplicate-free tag set.
    pub tags: Vec<String>,
    pub custom_fields: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Insert a tag if absent, preserving insertion order. No-op if present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.iter().any(|t| t == &tag) {
            self.tags.push(tag);
        }
    }

    /// Remove a tag if present. No-op if absent.
    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// `true` if any tag (case-insensitively) marks this customer as VIP/LCC
    /// (§4.8: any tag whose lowercased form contains `lcc`, plus the
    /// well-known literal forms).
    pub fn has_vip_tag(&self) -> bool {
        tags_indicate_vip(&self.tags)
    }

    /// Close the ticket, stamping `closed_at` (§3 invariant).
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::Closed;
        self.closed_at = Some(now);
        self.updated_at = now;
    }
}

/// `true` if any tag in `tags` marks VIP/LCC membership (§4.8, §GLOSSARY).
///
/// The well-known literal forms are checked first, then a generic
/// case-insensitive substring match on `"lcc"` — the source conflates
/// several tag strings this way; see DESIGN.md for the Open Question on
/// whether a literal tag like `"LCCX"` should count (resolved: yes, per
/// the original's `"lcc" in tag.lower()` behavior).
pub fn tags_indicate_vip(tags: &[String]) -> bool {
    const WELL_KNOWN: [&str; 4] = ["LCC_Member", "lcc_member", "LCC Member", "Crafter Club"];
    tags.iter().any(|t| {
        WELL_KNOWN.iter().any(|w| w.eq_ignore_ascii_case(t)) || t.to_lowercase().contains("lcc")
    })
}

/// A message on a ticket, ordered chronologically (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub from_agent: bool,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// An internal, non-customer-visible note on a ticket (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketNote {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// A suggested agent action inside an `AIRecommendation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub priority: u32,
    pub reasoning: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A suggested customer-facing draft reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResponse {
    pub text: String,
    pub draft_tone: String,
    pub draft_personalization: Option<String>,
}

/// Cached language-model output attached to a ticket (§3). At most one
/// non-expired recommendation per ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRecommendation {
    pub ticket_id: Uuid,
    pub priority: Priority,
    pub actions: Vec<RecommendedAction>,
    pub talking_points: Vec<String>,
    pub warnings: Vec<String>,
    pub estimated_impact: Option<String>,
    pub draft_response: Option<DraftResponse>,
    /// Message count at generation time; staleness is detected by comparing
    /// this to the ticket's *current* message count, independent of
    /// `expires_at` (§3 invariant).
    pub message_count: usize,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AiRecommendation {
    /// A recommendation is usable iff it has not expired AND the ticket's
    /// message count has not changed since generation (§3, §4.11, scenario 6).
    pub fn is_fresh(&self, now: DateTime<Utc>, current_message_count: usize) -> bool {
        now < self.expires_at && self.message_count == current_message_count
    }
}

/// Churn risk band, derived from a scalar score (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChurnRiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ChurnRiskLevel {
    /// Band a churn score in `[0,1]` per the thresholds in §4.6:
    /// `<0.3 low, <0.5 medium, <0.7 high, >=0.7 critical`.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            ChurnRiskLevel::Low
        } else if score < 0.5 {
            ChurnRiskLevel::Medium
        } else if score < 0.7 {
            ChurnRiskLevel::High
        } else {
            ChurnRiskLevel::Critical
        }
    }
}

/// Business-metrics facet of `CustomerAnalytics` (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessMetrics {
    pub lifetime_value: f64,
    pub total_orders: u32,
    pub average_order_value: f64,
    pub days_since_last_purchase: Option<u32>,
    pub tenure_days: Option<u32>,
}

/// Churn facet of `CustomerAnalytics` (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnProfile {
    pub score: f64,
    pub risk_level: ChurnRiskLevel,
}

/// Read model produced by C6, merged with provider-embedded data by C9/C11.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerAnalytics {
    pub customer_id: String,
    pub business: BusinessMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churn: Option<ChurnProfile>,
    pub dominant_segments: Vec<String>,
    pub archetype_id: Option<String>,
    /// Background-context-only communication-style hints (§4.6 step 3);
    /// MUST NOT override explicit customer-stated facts downstream.
    pub communication_style_hints: Vec<String>,
    pub is_vip: bool,
    pub tags: Vec<String>,
}

impl Default for ChurnProfile {
    fn default() -> Self {
        Self {
            score: 0.0,
            risk_level: ChurnRiskLevel::Low,
        }
    }
}
