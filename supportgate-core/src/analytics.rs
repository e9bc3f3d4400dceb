//! Analytics Access (C6, §4.6).
//!
//! Reads the customer analytics read model, trying the cache first and
//! falling back to the store. Communication-style hints are derived here
//! from archetype segments and are background context only — callers MUST
//! NOT let them override an explicit customer-stated fact.

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::{Cache, CacheKey, CHURN_PREDICTION_TTL, CUSTOMER_PROFILE_TTL};
use crate::error::AnalyticsError;
use crate::model::{BusinessMetrics, ChurnProfile, ChurnRiskLevel, CustomerAnalytics};

/// Base profile row as read from the analytical store (§4.6 step 2). An
/// external collaborator (§1); this crate only consumes the shape.
#[derive(Debug, Clone)]
pub struct CustomerProfileRow {
    pub customer_id: String,
    pub archetype_id: Option<String>,
    pub dominant_segments: Vec<String>,
    pub business: BusinessMetrics,
    pub churn_score: f64,
    pub tags: Vec<String>,
    /// `true` when the archetype places this customer in a low-engagement
    /// segment despite having prior orders, distinct from a brand-new
    /// zero-order account (§4.6 step 3).
    pub low_engagement_with_history: bool,
    /// `true` when the archetype segment indicates price sensitivity.
    pub price_sensitive: bool,
    /// `true` when the archetype segment indicates frequent repeat purchase.
    pub frequent_purchaser: bool,
    /// `true` when the archetype segment indicates elevated return rate.
    pub high_return_rate: bool,
}

/// Read access to the analytical store underlying C6. An external
/// collaborator (§1); not specified further here.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn get_profile(&self, customer_id: &str) -> Result<CustomerProfileRow, AnalyticsError>;
}

/// An `AnalyticsStore` for deployments with no analytics warehouse wired
/// up; every customer resolves to a zeroed profile rather than failing
/// ticket ingestion outright.
pub struct EmptyAnalyticsStore;

#[async_trait]
impl AnalyticsStore for EmptyAnalyticsStore {
    async fn get_profile(&self, customer_id: &str) -> Result<CustomerProfileRow, AnalyticsError> {
        Ok(CustomerProfileRow {
            customer_id: customer_id.to_string(),
            archetype_id: None,
            dominant_segments: Vec::new(),
            business: crate::model::BusinessMetrics::default(),
            churn_score: 0.0,
            tags: Vec::new(),
            low_engagement_with_history: false,
            price_sensitive: false,
            frequent_purchaser: false,
            high_return_rate: false,
        })
    }
}

/// Derive communication-style hints from an archetype's segment flags
/// (§4.6 step 3). Order: price sensitivity, purchase frequency, shopping
/// maturity, return behavior.
fn communication_style_hints(row: &CustomerProfileRow) -> Vec<String> {
    let mut hints = Vec::new();
    if row.price_sensitive {
        hints.push("price_sensitive".to_string());
    }
    if row.frequent_purchaser {
        hints.push("frequent_purchaser".to_string());
    }
    if row.business.total_orders == 0 {
        hints.push("new_account_zero_orders".to_string());
    } else if row.low_engagement_with_history {
        hints.push("low_engagement_with_prior_orders".to_string());
    }
    if row.high_return_rate {
        hints.push("high_return_rate".to_string());
    }
    hints
}

fn row_to_analytics(row: CustomerProfileRow) -> CustomerAnalytics {
    let is_vip = crate::model::tags_indicate_vip(&row.tags);
    CustomerAnalytics {
        customer_id: row.customer_id.clone(),
        business: row.business.clone(),
        churn: Some(ChurnProfile {
            score: row.churn_score,
            risk_level: ChurnRiskLevel::from_score(row.churn_score),
        }),
        dominant_segments: row.dominant_segments.clone(),
        archetype_id: row.archetype_id.clone(),
        communication_style_hints: communication_style_hints(&row),
        is_vip,
        tags: row.tags.clone(),
    }
}

/// Analytics access service (C6), backed by a cache and a store.
///
/// Scoped to the tenant identified by C4 for the request: every cache key
/// this service builds carries that tenant's id (§8), so a customer-id
/// string can never collide across tenants in the cache.
pub struct AnalyticsService<'a> {
    store: &'a dyn AnalyticsStore,
    cache: &'a Cache,
    tenant_id: Uuid,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(store: &'a dyn AnalyticsStore, cache: &'a Cache, tenant_id: Uuid) -> Self {
        Self { store, cache, tenant_id }
    }

    /// `GetCustomerAnalytics(customer_id)` (§4.6).
    pub async fn get_customer_analytics(
        &self,
        customer_id: &str,
    ) -> Result<CustomerAnalytics, AnalyticsError> {
        let key = CacheKey::new(Some(self.tenant_id), "customer_analytics", customer_id);
        if let Some(cached) = self.cache.get_json::<CustomerAnalytics>(&key) {
            return Ok(cached);
        }

        let row = self.store.get_profile(customer_id).await?;
        let analytics = row_to_analytics(row);
        self.cache.set_json(&key, &analytics, CUSTOMER_PROFILE_TTL);
        Ok(analytics)
    }

    /// `GetChurnPrediction(customer_id)`: narrower read, 30-minute TTL,
    /// same cache-then-store fallback shape (§4.6).
    pub async fn get_churn_prediction(
        &self,
        customer_id: &str,
    ) -> Result<ChurnProfile, AnalyticsError> {
        let key = CacheKey::new(Some(self.tenant_id), "churn_prediction", customer_id);
        if let Some(cached) = self.cache.get_json::<ChurnProfile>(&key) {
            return Ok(cached);
        }

        let row = self.store.get_profile(customer_id).await?;
        let profile = ChurnProfile {
            score: row.churn_score,
            risk_level: ChurnRiskLevel::from_score(row.churn_score),
        };
        self.cache.set_json(&key, &profile, CHURN_PREDICTION_TTL);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(CustomerProfileRow);

    #[async_trait]
    impl AnalyticsStore for FixedStore {
        async fn get_profile(&self, _customer_id: &str) -> Result<CustomerProfileRow, AnalyticsError> {
            Ok(self.0.clone())
        }
    }

    fn sample_row() -> CustomerProfileRow {
        CustomerProfileRow {
            customer_id: "cust-1".into(),
            archetype_id: Some("loyal-crafter".into()),
            dominant_segments: vec!["crafts".into()],
            business: BusinessMetrics {
                lifetime_value: 1500.0,
                total_orders: 4,
                average_order_value: 375.0,
                days_since_last_purchase: Some(10),
                tenure_days: Some(400),
            },
            churn_score: 0.42,
            tags: vec!["LCC_Member".into()],
            low_engagement_with_history: false,
            price_sensitive: true,
            frequent_purchaser: false,
            high_return_rate: false,
        }
    }

    #[tokio::test]
    async fn test_get_customer_analytics_computes_churn_band() {
        let store = FixedStore(sample_row());
        let cache = Cache::new();
        let service = AnalyticsService::new(&store, &cache, Uuid::new_v4());
        let analytics = service.get_customer_analytics("cust-1").await.unwrap();
        assert_eq!(analytics.churn.unwrap().risk_level, ChurnRiskLevel::Medium);
        assert!(analytics.is_vip);
    }

    #[tokio::test]
    async fn test_get_customer_analytics_populates_cache() {
        let store = FixedStore(sample_row());
        let cache = Cache::new();
        let tenant_id = Uuid::new_v4();
        let service = AnalyticsService::new(&store, &cache, tenant_id);
        service.get_customer_analytics("cust-1").await.unwrap();
        let key = CacheKey::new(Some(tenant_id), "customer_analytics", "cust-1");
        assert!(cache.exists(&key));
    }

    #[tokio::test]
    async fn test_get_customer_analytics_does_not_collide_across_tenants() {
        let store_a = FixedStore(sample_row());
        let mut other = sample_row();
        other.business.lifetime_value = 9999.0;
        let store_b = FixedStore(other);
        let cache = Cache::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let service_a = AnalyticsService::new(&store_a, &cache, tenant_a);
        let service_b = AnalyticsService::new(&store_b, &cache, tenant_b);

        let analytics_a = service_a.get_customer_analytics("cust-1").await.unwrap();
        let analytics_b = service_b.get_customer_analytics("cust-1").await.unwrap();

        assert_eq!(analytics_a.business.lifetime_value, 1500.0);
        assert_eq!(analytics_b.business.lifetime_value, 9999.0);
    }

    #[test]
    fn test_communication_style_hints_new_account() {
        let mut row = sample_row();
        row.business.total_orders = 0;
        row.low_engagement_with_history = false;
        let hints = communication_style_hints(&row);
        assert!(hints.contains(&"new_account_zero_orders".to_string()));
        assert!(!hints.contains(&"low_engagement_with_prior_orders".to_string()));
    }

    #[test]
    fn test_communication_style_hints_low_engagement_with_history() {
        let mut row = sample_row();
        row.business.total_orders = 6;
        row.low_engagement_with_history = true;
        let hints = communication_style_hints(&row);
        assert!(hints.contains(&"low_engagement_with_prior_orders".to_string()));
        assert!(!hints.contains(&"new_account_zero_orders".to_string()));
    }

    #[tokio::test]
    async fn test_empty_analytics_store_zeroed_profile() {
        let cache = Cache::new();
        let service = AnalyticsService::new(&EmptyAnalyticsStore, &cache, Uuid::new_v4());
        let analytics = service.get_customer_analytics("cust-1").await.unwrap();
        assert_eq!(analytics.business.lifetime_value, 0.0);
        assert!(!analytics.is_vip);
    }
}
