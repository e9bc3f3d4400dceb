//! Urgency keyword classification (C8, §4.8).
//!
//! The rule table is reproduced verbatim from the source and matched as a
//! case-insensitive substring over the concatenated customer-message text.
//! Substring matching is intentional, not an oversight: see DESIGN.md for
//! the recorded over-triggering risk (e.g. "cancelled within 24h").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Urgent,
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyCategory {
    CancelRequest,
    AddressChange,
    OrderEdit,
    DamagedProduct,
    MissingItems,
    DelayedOrder,
    General,
}

impl UrgencyCategory {
    /// The provider tag this category maps to, if any (§4.8: "When a match
    /// is found in a category whose `gorgias_tag` mapping exists").
    pub fn gorgias_tag(&self, level: UrgencyLevel) -> Option<String> {
        match (level, self) {
            (UrgencyLevel::Urgent, c) if *c != UrgencyCategory::General => {
                Some(format!("urgent_{}", c.as_str()))
            }
            (UrgencyLevel::High, c) if *c != UrgencyCategory::General => {
                Some(format!("high_priority_{}", c.as_str()))
            }
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            UrgencyCategory::CancelRequest => "cancel_request",
            UrgencyCategory::AddressChange => "address_change",
            UrgencyCategory::OrderEdit => "order_edit",
            UrgencyCategory::DamagedProduct => "damaged_product",
            UrgencyCategory::MissingItems => "missing_items",
            UrgencyCategory::DelayedOrder => "delayed_order",
            UrgencyCategory::General => "general",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgencyClassification {
    pub urgency_level: UrgencyLevel,
    pub category: UrgencyCategory,
    pub matched_keywords: Vec<String>,
    pub gorgias_tag: Option<String>,
}

struct Rule {
    category: UrgencyCategory,
    patterns: &'static [&'static str],
}

const URGENT_TIER: &[Rule] = &[
    Rule {
        category: UrgencyCategory::CancelRequest,
        patterns: &[
            "cancel my order",
            "cancel order",
            "need to cancel",
            "want to cancel",
            "please cancel",
        ],
    },
    Rule {
        category: UrgencyCategory::AddressChange,
        patterns: &[
            "change address",
            "edit address",
            "incorrect address",
            "wrong address",
            "ship to different address",
            "address is wrong",
            "shipped to wrong address",
        ],
    },
    Rule {
        category: UrgencyCategory::OrderEdit,
        patterns: &[
            "edit my order",
            "edit order",
            "change my order",
            "modify my order",
            "wrong item ordered",
        ],
    },
];

const HIGH_TIER: &[Rule] = &[
    Rule {
        category: UrgencyCategory::DamagedProduct,
        patterns: &["broken", "damaged", "defective", "arrived broken"],
    },
    Rule {
        category: UrgencyCategory::MissingItems,
        patterns: &["missing item", "didn't receive", "item not in box"],
    },
    Rule {
        category: UrgencyCategory::DelayedOrder,
        patterns: &["hasn't arrived", "delayed", "still waiting"],
    },
];

/// Classify the latest customer message text. Returns the first matching
/// urgent category, else the first matching high category, else
/// `(normal, general, [])` (§4.8, §8 testable property).
pub fn classify(message_text: &str) -> UrgencyClassification {
    let lower = message_text.to_lowercase();

    if let Some((category, keywords)) = match_tier(&lower, URGENT_TIER) {
        let tag = category.gorgias_tag(UrgencyLevel::Urgent);
        return UrgencyClassification {
            urgency_level: UrgencyLevel::Urgent,
            category,
            matched_keywords: keywords,
            gorgias_tag: tag,
        };
    }

    if let Some((category, keywords)) = match_tier(&lower, HIGH_TIER) {
        let tag = category.gorgias_tag(UrgencyLevel::High);
        return UrgencyClassification {
            urgency_level: UrgencyLevel::High,
            category,
            matched_keywords: keywords,
            gorgias_tag: tag,
        };
    }

    UrgencyClassification {
        urgency_level: UrgencyLevel::Normal,
        category: UrgencyCategory::General,
        matched_keywords: Vec::new(),
        gorgias_tag: None,
    }
}

fn match_tier(lower_text: &str, tiers: &[Rule]) -> Option<(UrgencyCategory, Vec<String>)> {
    for rule in tiers {
        let matched: Vec<String> = rule
            .patterns
            .iter()
            .filter(|p| lower_text.contains(*p))
            .map(|p| p.to_string())
            .collect();
        if !matched.is_empty() {
            return Some((rule.category, matched));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgent_cancel_request() {
        let result = classify("Please cancel my order right away");
        assert_eq!(result.urgency_level, UrgencyLevel::Urgent);
        assert_eq!(result.category, UrgencyCategory::CancelRequest);
        assert!(result.matched_keywords.contains(&"cancel my order".to_string()));
        assert_eq!(result.gorgias_tag.as_deref(), Some("urgent_cancel_request"));
    }

    #[test]
    fn test_high_damaged_product() {
        let result = classify("The item arrived broken in the box");
        assert_eq!(result.urgency_level, UrgencyLevel::High);
        assert_eq!(result.category, UrgencyCategory::DamagedProduct);
        assert_eq!(result.gorgias_tag.as_deref(), Some("high_priority_damaged_product"));
    }

    #[test]
    fn test_normal_no_match() {
        let result = classify("What fabric is this made of?");
        assert_eq!(result.urgency_level, UrgencyLevel::Normal);
        assert_eq!(result.category, UrgencyCategory::General);
        assert!(result.matched_keywords.is_empty());
        assert!(result.gorgias_tag.is_none());
    }

    #[test]
    fn test_urgent_tier_takes_precedence_over_high() {
        let result = classify("My order arrived broken, please cancel my order");
        assert_eq!(result.urgency_level, UrgencyLevel::Urgent);
        assert_eq!(result.category, UrgencyCategory::CancelRequest);
    }

    #[test]
    fn test_case_insensitive_match() {
        let result = classify("CANCEL MY ORDER NOW");
        assert_eq!(result.urgency_level, UrgencyLevel::Urgent);
    }
}
