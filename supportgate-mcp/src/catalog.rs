//! The closed tool catalog the NL-query router may dispatch to (§4.12).
//!
//! Two surfaces exist side by side; a feature flag (`USE_CONSOLIDATED_MCP_TOOLS`,
//! §6) selects which one is advertised to the model adapter. Both are fixed
//! enumerations — there is no plugin registry (§9 design note).

use serde::{Deserialize, Serialize};

/// Consolidated (v2) tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolV2 {
    QueryCustomers,
    QuerySegments,
    ForecastBusinessMetrics,
    PlanCampaign,
    AnalyzeProducts,
}

/// Legacy (v1) tool surface, kept for tenants not yet migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolV1 {
    AnalyzeCustomers,
    AnalyzeSegments,
    ForecastMetrics,
    TargetCampaign,
    LookupCustomer,
    AnalyzeBehavior,
    GetRecommendations,
    AnalyzeProducts,
}

impl ToolV2 {
    pub const ALL: [ToolV2; 5] = [
        ToolV2::QueryCustomers,
        ToolV2::QuerySegments,
        ToolV2::ForecastBusinessMetrics,
        ToolV2::PlanCampaign,
        ToolV2::AnalyzeProducts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolV2::QueryCustomers => "query_customers",
            ToolV2::QuerySegments => "query_segments",
            ToolV2::ForecastBusinessMetrics => "forecast_business_metrics",
            ToolV2::PlanCampaign => "plan_campaign",
            ToolV2::AnalyzeProducts => "analyze_products",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl ToolV1 {
    pub const ALL: [ToolV1; 8] = [
        ToolV1::AnalyzeCustomers,
        ToolV1::AnalyzeSegments,
        ToolV1::ForecastMetrics,
        ToolV1::TargetCampaign,
        ToolV1::LookupCustomer,
        ToolV1::AnalyzeBehavior,
        ToolV1::GetRecommendations,
        ToolV1::AnalyzeProducts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolV1::AnalyzeCustomers => "analyze_customers",
            ToolV1::AnalyzeSegments => "analyze_segments",
            ToolV1::ForecastMetrics => "forecast_metrics",
            ToolV1::TargetCampaign => "target_campaign",
            ToolV1::LookupCustomer => "lookup_customer",
            ToolV1::AnalyzeBehavior => "analyze_behavior",
            ToolV1::GetRecommendations => "get_recommendations",
            ToolV1::AnalyzeProducts => "analyze_products",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Which surface is currently active for a tenant/process (§6
/// `USE_CONSOLIDATED_MCP_TOOLS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogVersion {
    V1,
    V2,
}

impl CatalogVersion {
    pub fn from_flag(use_consolidated: bool) -> Self {
        if use_consolidated {
            CatalogVersion::V2
        } else {
            CatalogVersion::V1
        }
    }

    /// Tool names advertised to the model adapter and echoed in the
    /// unavailable-adapter fallback message (§4.12).
    pub fn tool_names(&self) -> Vec<&'static str> {
        match self {
            CatalogVersion::V2 => ToolV2::ALL.iter().map(|t| t.name()).collect(),
            CatalogVersion::V1 => ToolV1::ALL.iter().map(|t| t.name()).collect(),
        }
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        match self {
            CatalogVersion::V2 => ToolV2::from_name(tool_name).is_some(),
            CatalogVersion::V1 => ToolV1::from_name(tool_name).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_tool_names_round_trip() {
        for tool in ToolV2::ALL {
            assert_eq!(ToolV2::from_name(tool.name()), Some(tool));
        }
    }

    #[test]
    fn test_v1_tool_names_round_trip() {
        for tool in ToolV1::ALL {
            assert_eq!(ToolV1::from_name(tool.name()), Some(tool));
        }
    }

    #[test]
    fn test_catalog_version_from_flag() {
        assert_eq!(CatalogVersion::from_flag(true), CatalogVersion::V2);
        assert_eq!(CatalogVersion::from_flag(false), CatalogVersion::V1);
    }

    #[test]
    fn test_catalog_contains() {
        let v2 = CatalogVersion::V2;
        assert!(v2.contains("query_customers"));
        assert!(!v2.contains("analyze_customers"));
    }
}
