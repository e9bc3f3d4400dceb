//! Customer Resolver (C7, §4.7).
//!
//! Extracts an opaque customer id from a provider webhook's embedded
//! customer object, falling back through phone lookup and finally email.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AnalyticsError;

/// External identity service consulted when no stable id is embedded in
/// the webhook and only a phone number is available (§4.7). An external
/// collaborator (§1).
#[async_trait]
pub trait PhoneLookup: Send + Sync {
    async fn lookup(&self, e164_phone: &str) -> Result<Option<String>, AnalyticsError>;
}

/// Normalize a phone number to E.164 (§4.7): strip non-digits (keeping a
/// leading `+`), then prepend a country code by digit count.
pub fn normalize_phone(raw: &str) -> String {
    let has_plus = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if has_plus {
        return format!("+{digits}");
    }
    match digits.len() {
        10 => format!("+1{digits}"),
        11 if digits.starts_with('1') => format!("+{digits}"),
        _ => format!("+{digits}"),
    }
}

/// A `PhoneLookup` for deployments with no phone-to-customer directory
/// configured; every lookup falls through to the email rung (§4.7).
pub struct NoopPhoneLookup;

#[async_trait]
impl PhoneLookup for NoopPhoneLookup {
    async fn lookup(&self, _e164_phone: &str) -> Result<Option<String>, AnalyticsError> {
        Ok(None)
    }
}

/// Resolve an opaque customer id from the raw `customer` object embedded
/// in a webhook, trying each extraction rung in order (§4.7):
/// `external_id` -> `shopify_customer_id` -> integrations-embedded Shopify
/// id -> provider's internal id -> phone lookup -> email.
pub async fn resolve_customer_id(
    customer: &Value,
    phone_lookup: &dyn PhoneLookup,
) -> Result<String, AnalyticsError> {
    if let Some(id) = customer.get("external_id").and_then(Value::as_str) {
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if let Some(id) = customer.get("shopify_customer_id").and_then(Value::as_str) {
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if let Some(id) = customer
        .get("integrations")
        .and_then(|v| v.get("shopify"))
        .and_then(|v| v.get("customer_id"))
        .and_then(Value::as_str)
    {
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if let Some(id) = customer.get("id").and_then(|v| {
        v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string()))
    }) {
        if !id.is_empty() {
            return Ok(id);
        }
    }

    if let Some(phone) = customer.get("phone").and_then(Value::as_str) {
        if !phone.is_empty() {
            let normalized = normalize_phone(phone);
            if let Some(id) = phone_lookup.lookup(&normalized).await? {
                return Ok(id);
            }
        }
    }

    if let Some(email) = customer.get("email").and_then(Value::as_str) {
        if !email.is_empty() {
            return Ok(email.to_string());
        }
    }

    Err(AnalyticsError::Unidentified)
}
