//! The model adapter capability interface consulted by the router (§9: a
//! single capability interface `{Recommend, Draft, RouteQuery}` behind
//! which implementations are swapped without touching C8-C12).

use async_trait::async_trait;
use serde_json::Value;

/// What the adapter decided for a natural-language operator question.
#[derive(Debug, Clone)]
pub enum RoutedQuery {
    /// The adapter selected a tool and produced one argument object.
    Tool { tool_name: String, arguments: Value },
    /// The adapter had no tool match and returned free text instead.
    FreeText(String),
}

/// The `RouteQuery` facet of the language-model adapter capability (§9).
/// `Recommend` and `Draft` are consumed by the ticket service
/// (`supportgate-tickets`), not here.
#[async_trait]
pub trait QueryModelAdapter: Send + Sync {
    async fn route_query(&self, question: &str, available_tools: &[&str]) -> Option<RoutedQuery>;
}

/// An adapter that is never configured; `route_query` always reports
/// unavailable so the router falls back to its fixed message (§4.12).
pub struct UnavailableAdapter;

#[async_trait]
impl QueryModelAdapter for UnavailableAdapter {
    async fn route_query(&self, _question: &str, _available_tools: &[&str]) -> Option<RoutedQuery> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_adapter_returns_none() {
        let adapter = UnavailableAdapter;
        assert!(adapter.route_query("how many VIPs churned?", &["query_customers"]).await.is_none());
    }
}
