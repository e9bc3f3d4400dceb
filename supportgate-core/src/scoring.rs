//! Smart-Order Scorer (C10, §4.10).
//!
//! Seven independently bounded components, summed for a total; weights are
//! named constants so the breakdown endpoint can echo exactly what was
//! used (§9 design note).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{CustomerAnalytics, Priority, Ticket};

pub const CHURN_WEIGHT: f64 = 3.0;
pub const VALUE_WEIGHT: f64 = 2.0;
pub const URGENCY_WEIGHT: f64 = 1.5;
pub const DIFFICULTY_FAQ_BONUS: f64 = 1.0;
pub const DIFFICULTY_MULTI_ORDER_PENALTY: f64 = -1.5;
pub const SENTIMENT_FRUSTRATED_BONUS: f64 = 2.0;
pub const TOPIC_ALERT_BONUS: f64 = 5.0;

const LTV_CAP: f64 = 10.0;
const LTV_DIVISOR: f64 = 1000.0;

/// FAQ-ish short messages nudge difficulty down (easier); these keywords
/// nudge it up (harder) — not fully enumerated in the source (§9 Open
/// Question); kept short and reviewable here.
const MULTI_ORDER_KEYWORDS: [&str; 5] = [
    "multiple orders",
    "several orders",
    "both orders",
    "all my orders",
    "across accounts",
];
const FRUSTRATED_KEYWORDS: [&str; 6] = [
    "frustrated",
    "unacceptable",
    "ridiculous",
    "furious",
    "terrible experience",
    "done with this",
];

fn urgency_weight_for(priority: Priority) -> f64 {
    match priority {
        Priority::Urgent => 4.0,
        Priority::High => 3.0,
        Priority::Normal => 1.0,
        Priority::Low => 0.5,
    }
}

/// All seven components plus the weights applied and echoed facts, per
/// §4.10's `get_scoring_breakdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub churn_risk: f64,
    pub customer_value: f64,
    pub urgency: f64,
    pub age: f64,
    pub difficulty: f64,
    pub sentiment: f64,
    pub topic_alert: f64,
    pub total: f64,
    pub weights: ScoringWeights,
    pub matches_topic_alert: bool,
    pub ticket_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub churn: f64,
    pub value: f64,
    pub urgency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            churn: CHURN_WEIGHT,
            value: VALUE_WEIGHT,
            urgency: URGENCY_WEIGHT,
        }
    }
}

/// Score one ticket (§4.10). `latest_message_text` drives difficulty,
/// sentiment, and topic-alert components; absent analytics zeroes churn
/// and value and does not fail.
pub fn score(
    ticket: &Ticket,
    analytics: Option<&CustomerAnalytics>,
    latest_message_text: &str,
    topic_alerts: &[String],
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let churn_score = analytics.and_then(|a| a.churn.as_ref()).map(|c| c.score).unwrap_or(0.0);
    let churn_risk = churn_score * CHURN_WEIGHT;

    let ltv = analytics.map(|a| a.business.lifetime_value).unwrap_or(0.0);
    let customer_value = (ltv / LTV_DIVISOR).min(LTV_CAP) * VALUE_WEIGHT;

    let urgency = urgency_weight_for(ticket.priority) * URGENCY_WEIGHT;

    let hours_open = (now - ticket.created_at).num_seconds() as f64 / 3600.0;
    let age = (1.0 - (-hours_open.max(0.0) / 24.0).exp()).max(0.0);

    let lower_text = latest_message_text.to_lowercase();
    let difficulty = score_difficulty(&lower_text);
    let sentiment = if FRUSTRATED_KEYWORDS.iter().any(|k| lower_text.contains(k)) {
        SENTIMENT_FRUSTRATED_BONUS
    } else {
        0.0
    };
    let matches_topic_alert = topic_alerts
        .iter()
        .any(|alert| lower_text.contains(&alert.to_lowercase()));
    let topic_alert = if matches_topic_alert { TOPIC_ALERT_BONUS } else { 0.0 };

    let total = churn_risk + customer_value + urgency + age + difficulty + sentiment + topic_alert;

    ScoreBreakdown {
        churn_risk,
        customer_value,
        urgency,
        age,
        difficulty,
        sentiment,
        topic_alert,
        total,
        weights: ScoringWeights::default(),
        matches_topic_alert,
        ticket_id: ticket.id,
        created_at: ticket.created_at,
    }
}

fn score_difficulty(lower_text: &str) -> f64 {
    if MULTI_ORDER_KEYWORDS.iter().any(|k| lower_text.contains(k)) {
        return DIFFICULTY_MULTI_ORDER_PENALTY;
    }
    if lower_text.split_whitespace().count() <= 8 {
        return DIFFICULTY_FAQ_BONUS;
    }
    0.0
}

/// Order two breakdowns for inbox ranking: total descending, then
/// `created_at` ascending (older first), then ticket id lexicographically
/// (§4.10, §8 testable property).
pub fn cmp_for_ranking(a: &ScoreBreakdown, b: &ScoreBreakdown) -> std::cmp::Ordering {
    b.total
        .partial_cmp(&a.total)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.ticket_id.to_string().cmp(&b.ticket_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BusinessMetrics, ChurnProfile, ChurnRiskLevel, TicketStatus};
    use std::collections::HashMap;

    fn ticket_with(priority: Priority, age: chrono::Duration, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            ticket_number: "T-001".into(),
            customer_id: "cust-1".into(),
            channel: "email".into(),
            status: TicketStatus::Open,
            priority,
            subject: "Help".into(),
            assigned_to: None,
            tags: Vec::new(),
            custom_fields: HashMap::new(),
            created_at: now - age,
            updated_at: now,
            closed_at: None,
        }
    }

    fn analytics_with(ltv: f64, churn: f64) -> CustomerAnalytics {
        CustomerAnalytics {
            customer_id: "cust-1".into(),
            business: BusinessMetrics {
                lifetime_value: ltv,
                ..Default::default()
            },
            churn: Some(ChurnProfile {
                score: churn,
                risk_level: ChurnRiskLevel::from_score(churn),
            }),
            dominant_segments: Vec::new(),
            archetype_id: None,
            communication_style_hints: Vec::new(),
            is_vip: false,
            tags: Vec::new(),
        }
    }

    /// Spec scenario 4: two tickets A and B, A should rank above B.
    #[test]
    fn test_scenario_smart_order_ranking() {
        let now = Utc::now();
        let ticket_a = ticket_with(Priority::Urgent, chrono::Duration::hours(5), now);
        let analytics_a = analytics_with(3500.0, 0.85);
        let breakdown_a = score(
            &ticket_a,
            Some(&analytics_a),
            "please cancel my order, I am so frustrated",
            &["cancel".to_string()],
            now,
        );

        let ticket_b = ticket_with(Priority::Normal, chrono::Duration::hours(1), now);
        let analytics_b = analytics_with(200.0, 0.3);
        let breakdown_b = score(&ticket_b, Some(&analytics_b), "any updates?", &["cancel".to_string()], now);

        assert!(breakdown_a.total > breakdown_b.total);
        assert_eq!(cmp_for_ranking(&breakdown_a, &breakdown_b), std::cmp::Ordering::Less);

        assert!((breakdown_a.churn_risk - 2.55).abs() < 1e-9);
        assert!((breakdown_a.customer_value - 7.0).abs() < 1e-9);
        assert!((breakdown_a.urgency - 6.0).abs() < 1e-9);
        assert!(breakdown_a.matches_topic_alert);
        assert_eq!(breakdown_a.topic_alert, TOPIC_ALERT_BONUS);
        assert_eq!(breakdown_a.sentiment, SENTIMENT_FRUSTRATED_BONUS);
    }

    #[test]
    fn test_absent_analytics_zeroes_churn_and_value() {
        let now = Utc::now();
        let ticket = ticket_with(Priority::Normal, chrono::Duration::hours(2), now);
        let breakdown = score(&ticket, None, "hello", &[], now);
        assert_eq!(breakdown.churn_risk, 0.0);
        assert_eq!(breakdown.customer_value, 0.0);
        assert!(!breakdown.matches_topic_alert);
    }

    #[test]
    fn test_tie_break_by_created_at_then_id() {
        let now = Utc::now();
        let ticket_a = ticket_with(Priority::Normal, chrono::Duration::hours(2), now);
        let mut ticket_b = ticket_with(Priority::Normal, chrono::Duration::hours(2), now);
        ticket_b.created_at = ticket_a.created_at;

        let breakdown_a = score(&ticket_a, None, "", &[], now);
        let breakdown_b = score(&ticket_b, None, "", &[], now);
        // Same total and same created_at: tie-break falls to id ordering.
        let expected = if ticket_a.id.to_string() < ticket_b.id.to_string() {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        };
        assert_eq!(cmp_for_ranking(&breakdown_a, &breakdown_b), expected);
    }

    #[test]
    fn test_multi_order_difficulty_penalty() {
        let now = Utc::now();
        let ticket = ticket_with(Priority::Normal, chrono::Duration::hours(1), now);
        let breakdown = score(&ticket, None, "I need help with multiple orders I placed", &[], now);
        assert_eq!(breakdown.difficulty, DIFFICULTY_MULTI_ORDER_PENALTY);
    }

    #[test]
    fn test_short_faq_difficulty_bonus() {
        let now = Utc::now();
        let ticket = ticket_with(Priority::Normal, chrono::Duration::hours(1), now);
        let breakdown = score(&ticket, None, "what fabric is this?", &[], now);
        assert_eq!(breakdown.difficulty, DIFFICULTY_FAQ_BONUS);
    }
}
