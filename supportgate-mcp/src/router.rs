//! NL-Query Router (C12, §4.12).
//!
//! Validates the operator's free-text question, asks the adapter to select
//! one tool from the active closed catalog, then performs a pure dispatch
//! to the matching analytics primitive. The router never invents data: it
//! either returns what the dispatcher returned, the adapter's free text
//! verbatim, or the fixed unavailable-adapter fallback.

use serde::Serialize;
use serde_json::Value;

use crate::adapter::{QueryModelAdapter, RoutedQuery};
use crate::catalog::CatalogVersion;
use crate::error::RouterError;

/// Pure dispatch from a selected tool name + arguments to its analytics
/// primitive. Implemented in the service layer that owns C6/C10/C11; this
/// crate only defines the contract (§9: router is "a pure dispatch", not
/// where the primitives live).
#[async_trait::async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, tool_name: &str, arguments: Value) -> Result<Value, RouterError>;
}

/// A `ToolDispatcher` for deployments with no analytics primitives wired
/// up yet; every dispatch fails rather than fabricating a result.
pub struct UnavailableDispatcher;

#[async_trait::async_trait]
impl ToolDispatcher for UnavailableDispatcher {
    async fn dispatch(&self, tool_name: &str, _arguments: Value) -> Result<Value, RouterError> {
        Err(RouterError::DispatchFailed {
            message: format!("no dispatcher is configured for tool {tool_name}"),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "query_type")]
pub enum QueryResponse {
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_name: String,
        result: Value,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "general_response")]
    GeneralResponse { text: String },
    #[serde(rename = "unavailable")]
    Unavailable { message: String },
}

pub struct NlQueryRouter<'a> {
    adapter: &'a dyn QueryModelAdapter,
    dispatcher: &'a dyn ToolDispatcher,
    catalog: CatalogVersion,
}

impl<'a> NlQueryRouter<'a> {
    pub fn new(adapter: &'a dyn QueryModelAdapter, dispatcher: &'a dyn ToolDispatcher, catalog: CatalogVersion) -> Self {
        Self {
            adapter,
            dispatcher,
            catalog,
        }
    }

    /// Route a free-text operator question (§4.12).
    pub async fn route(&self, question: &str) -> Result<QueryResponse, RouterError> {
        let tool_names = self.catalog.tool_names();

        let Some(routed) = self.adapter.route_query(question, &tool_names).await else {
            return Ok(QueryResponse::Unavailable {
                message: format!(
                    "no language model adapter is configured; supported endpoints: {}",
                    tool_names.join(", ")
                ),
            });
        };

        match routed {
            RoutedQuery::FreeText(text) => Ok(QueryResponse::GeneralResponse { text }),
            RoutedQuery::Tool { tool_name, arguments } => {
                if !self.catalog.contains(&tool_name) {
                    tracing::warn!(tool_name, "adapter selected a tool outside the active catalog");
                    return Err(RouterError::UnknownTool { tool_name });
                }
                tracing::debug!(tool_name, "dispatching routed query");
                let result = self.dispatcher.dispatch(&tool_name, arguments).await?;
                Ok(QueryResponse::ToolResult {
                    tool_name,
                    result,
                    timestamp: chrono::Utc::now(),
                })
            }
        }
    }

    /// Direct dispatch for `POST /api/mcp/query` (§6): body already names
    /// the tool, no adapter consulted.
    pub async fn dispatch_named(&self, tool_name: &str, arguments: Value) -> Result<QueryResponse, RouterError> {
        if !self.catalog.contains(tool_name) {
            return Err(RouterError::UnknownTool {
                tool_name: tool_name.to_string(),
            });
        }
        let result = self.dispatcher.dispatch(tool_name, arguments).await?;
        Ok(QueryResponse::ToolResult {
            tool_name: tool_name.to_string(),
            result,
            timestamp: chrono::Utc::now(),
        })
    }
}
