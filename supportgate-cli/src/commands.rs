//! CLI subcommand handlers: thin HTTP calls against the gateway's admin
//! surface, printed as pretty JSON the way an operator would want to paste
//! into a ticket or runbook.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::TenantAction;

pub struct AdminClient {
    base_url: String,
    admin_key: String,
    http: reqwest::Client,
}

impl AdminClient {
    pub fn new(base_url: String, admin_key: String) -> Self {
        Self { base_url, admin_key, http: reqwest::Client::new() }
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        tracing::debug!(path, "GET gateway admin endpoint");
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("X-Admin-Key", &self.admin_key)
            .send()
            .await?;
        respond(response).await
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        tracing::debug!(path, "POST gateway admin endpoint");
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("X-Admin-Key", &self.admin_key)
            .json(&body)
            .send()
            .await?;
        respond(response).await
    }

    async fn patch(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        tracing::debug!(path, "PATCH gateway admin endpoint");
        let response = self
            .http
            .patch(format!("{}{path}", self.base_url))
            .header("X-Admin-Key", &self.admin_key)
            .json(&body)
            .send()
            .await?;
        respond(response).await
    }
}

async fn respond(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        Ok(body)
    } else {
        tracing::warn!(%status, "gateway admin endpoint returned an error");
        anyhow::bail!("gateway returned {status}: {body}")
    }
}

pub async fn handle_tenant(client: &AdminClient, action: TenantAction) -> anyhow::Result<()> {
    match action {
        TenantAction::Create { slug, name, crm_provider, webhook_secret, api_key, environment } => {
            let body = json!({
                "slug": slug,
                "name": name,
                "crm_provider": crm_provider,
                "crm_config": { "webhook_secret": webhook_secret },
                "api_key": api_key,
                "environment": environment,
            });
            let tenant = client.post("/api/admin/tenants", body).await?;
            println!("{}", serde_json::to_string_pretty(&tenant)?);
            Ok(())
        }
        TenantAction::List => {
            let tenants = client.get("/api/admin/tenants").await?;
            println!("{}", serde_json::to_string_pretty(&tenants)?);
            Ok(())
        }
        TenantAction::RotateCrmConfig { tenant_id, webhook_secret } => {
            handle_rotate_crm_config(client, tenant_id, webhook_secret).await
        }
    }
}

async fn handle_rotate_crm_config(client: &AdminClient, tenant_id: Uuid, webhook_secret: String) -> anyhow::Result<()> {
    let body = json!({ "crm_config": { "webhook_secret": webhook_secret } });
    let tenant = client.patch(&format!("/api/admin/tenants/{tenant_id}/crm-config"), body).await?;
    println!("{}", serde_json::to_string_pretty(&tenant)?);
    Ok(())
}

pub async fn handle_counters(client: &AdminClient) -> anyhow::Result<()> {
    let counters = client.get("/api/admin/counters").await?;
    println!("{}", serde_json::to_string_pretty(&counters)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_client_builds_urls_from_base() {
        let client = AdminClient::new("http://localhost:9000".to_string(), "k".to_string());
        assert_eq!(client.base_url, "http://localhost:9000");
    }
}
