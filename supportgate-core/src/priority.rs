//! Priority combination rules (C8, §4.8).
//!
//! First-rule-wins: rules are evaluated in the order given in the spec and
//! the first whose predicate holds determines priority, reason, and tags.

use serde::{Deserialize, Serialize};

use crate::model::Priority;
use crate::urgency::{UrgencyClassification, UrgencyLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityDecision {
    pub priority: Priority,
    pub reason: String,
    pub tags: Vec<String>,
}

/// Inputs the combination rules read, beyond the urgency classification.
#[derive(Debug, Clone, Copy)]
pub struct PriorityInputs {
    pub is_vip: bool,
    pub lifetime_value: f64,
    pub churn_score: f64,
}

const HIGH_VALUE_LTV_THRESHOLD: f64 = 2000.0;
const RETENTION_CHURN_THRESHOLD: f64 = 0.5;

/// Apply the priority combination rules in order; the first that fires wins
/// (§4.8, §8 testable property).
pub fn decide(urgency: &UrgencyClassification, inputs: PriorityInputs) -> PriorityDecision {
    let mut tags: Vec<String> = Vec::new();
    if let Some(tag) = &urgency.gorgias_tag {
        tags.push(tag.clone());
    }

    let is_urgent = urgency.urgency_level == UrgencyLevel::Urgent;
    let is_high_value = inputs.lifetime_value >= HIGH_VALUE_LTV_THRESHOLD;

    // Rule 1: urgent ∧ VIP
    if is_urgent && inputs.is_vip {
        let mut rule_tags = vec!["lcc_member".to_string(), "vip".to_string()];
        rule_tags.extend(tags);
        return PriorityDecision {
            priority: Priority::Urgent,
            reason: "urgent request from a VIP customer".to_string(),
            tags: rule_tags,
        };
    }

    // Rule 2: urgent ∧ LTV >= 2000
    if is_urgent && is_high_value {
        let mut rule_tags = vec!["high_value".to_string()];
        rule_tags.extend(tags);
        return PriorityDecision {
            priority: Priority::Urgent,
            reason: "urgent request from a high-value customer".to_string(),
            tags: rule_tags,
        };
    }

    // Rule 3: urgent
    if is_urgent {
        return PriorityDecision {
            priority: Priority::Urgent,
            reason: "urgent request".to_string(),
            tags,
        };
    }

    // Rule 4: VIP
    if inputs.is_vip {
        return PriorityDecision {
            priority: Priority::High,
            reason: "VIP customer".to_string(),
            tags: vec!["lcc_member".to_string(), "vip".to_string()],
        };
    }

    // Rule 5: high urgency
    if urgency.urgency_level == UrgencyLevel::High {
        return PriorityDecision {
            priority: Priority::High,
            reason: "high-urgency request".to_string(),
            tags,
        };
    }

    // Rule 6: LTV >= 2000 ∧ churn >= 0.5
    if is_high_value && inputs.churn_score >= RETENTION_CHURN_THRESHOLD {
        return PriorityDecision {
            priority: Priority::High,
            reason: "high-value customer at elevated churn risk".to_string(),
            tags: vec!["high_value".to_string(), "retention_priority".to_string()],
        };
    }

    // Rule 7: otherwise
    PriorityDecision {
        priority: Priority::Normal,
        reason: "no priority rule matched".to_string(),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urgency;

    fn inputs(is_vip: bool, ltv: f64, churn: f64) -> PriorityInputs {
        PriorityInputs {
            is_vip,
            lifetime_value: ltv,
            churn_score: churn,
        }
    }

    /// Spec scenario 2: urgent cancel request for a VIP.
    #[test]
    fn test_scenario_urgent_cancel_for_vip() {
        let urgency = urgency::classify("Please cancel my order");
        let decision = decide(&urgency, inputs(true, 500.0, 0.3));
        assert_eq!(decision.priority, Priority::Urgent);
        assert!(decision.reason.contains("VIP"));
        assert!(decision.tags.contains(&"lcc_member".to_string()));
        assert!(decision.tags.contains(&"vip".to_string()));
        assert!(decision.tags.contains(&"urgent_cancel_request".to_string()));
    }

    /// Spec scenario 3: VIP with no urgency matches rule 4.
    #[test]
    fn test_scenario_vip_no_urgency() {
        let urgency = urgency::classify("What fabric is this?");
        let decision = decide(&urgency, inputs(true, 200.0, 0.2));
        assert_eq!(decision.priority, Priority::High);
        assert!(decision.tags.contains(&"lcc_member".to_string()));
        assert!(decision.tags.contains(&"vip".to_string()));
    }

    #[test]
    fn test_urgent_high_value_non_vip() {
        let urgency = urgency::classify("I need to cancel my subscription");
        let decision = decide(&urgency, inputs(false, 2500.0, 0.1));
        assert_eq!(decision.priority, Priority::Urgent);
        assert!(decision.tags.contains(&"high_value".to_string()));
    }

    #[test]
    fn test_high_value_high_churn_non_vip_non_urgent() {
        let urgency = urgency::classify("Just checking on my order status");
        let decision = decide(&urgency, inputs(false, 3000.0, 0.6));
        assert_eq!(decision.priority, Priority::High);
        assert!(decision.tags.contains(&"retention_priority".to_string()));
    }

    #[test]
    fn test_no_rule_fires_gives_normal() {
        let urgency = urgency::classify("Thanks for the update");
        let decision = decide(&urgency, inputs(false, 100.0, 0.1));
        assert_eq!(decision.priority, Priority::Normal);
        assert!(decision.tags.is_empty());
    }
}
