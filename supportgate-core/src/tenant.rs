//! Tenant Registry (C1, §4.1).
//!
//! Resolves a tenant by slug, API-key hash, or webhook identifier, and
//! decrypts its CRM config on demand. Decryption is a separate explicit
//! call per §4.1 so that a lookup alone never touches the encryption key.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::encryption::ConfigEncryptor;
use crate::error::TenantError;
use crate::model::{CrmConfig, Environment, Provider, Tenant};
use crate::util::hex;

/// Read access to the tenant registry (§4.1). Implementations talk to the
/// relational store; that store is an external collaborator (§1) and is not
/// specified here.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> Result<Tenant, TenantError>;
    async fn get_by_api_key_hash(&self, hash_hex: &str) -> Result<Tenant, TenantError>;
    async fn find_by_webhook_identifier(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Tenant, TenantError>;
    async fn list_active(&self, env: Option<Environment>) -> Result<Vec<Tenant>, TenantError>;
}

/// Hash an API key the same way the registry indexes `api_key_hash` (§4.4
/// step 2: "compute SHA-256 hex").
pub fn hash_api_key(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    hex::encode(&digest)
}

/// Decrypt a tenant's CRM config using the process encryption key (§4.1).
///
/// Fails with `ConfigDecryptFailed` if the ciphertext is invalid or the key
/// does not match — never logs the decrypted bytes, even on error.
pub fn decrypt_crm_config(
    tenant: &Tenant,
    encryptor: &ConfigEncryptor,
) -> Result<CrmConfig, TenantError> {
    let plaintext = encryptor.decrypt(&tenant.crm_config_ciphertext)?;
    serde_json::from_slice(&plaintext).map_err(|e| TenantError::ConfigDecryptFailed {
        message: e.to_string(),
    })
}

/// Fields an operator supplies when provisioning a new tenant (§3: "created
/// by provisioning tool"). `crm_config_ciphertext` is produced by the caller
/// (it holds the `ConfigEncryptor`); this layer never sees plaintext.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
    pub crm_provider: Provider,
    pub crm_config_ciphertext: Vec<u8>,
    pub webhook_identifiers: HashMap<String, String>,
    pub api_key_hash: String,
    pub environment: Environment,
}

/// Write access to the tenant registry, separate from the read-mostly
/// `TenantRegistry` trait the request path uses (§4.1 lookups are a hot
/// path; provisioning is not). Implemented by the same in-memory store here;
/// a real deployment backs both traits with the same relational table.
#[async_trait]
pub trait TenantAdmin: Send + Sync {
    async fn create_tenant(&self, input: NewTenant) -> Result<Tenant, TenantError>;
    async fn rotate_crm_config(&self, tenant_id: Uuid, ciphertext: Vec<u8>) -> Result<Tenant, TenantError>;
    async fn list_all(&self) -> Result<Vec<Tenant>, TenantError>;
}

/// An in-memory `TenantRegistry`/`TenantAdmin` for tests, local development,
/// and as the default when no relational store is wired up.
#[derive(Default)]
pub struct InMemoryTenantRegistry {
    tenants: RwLock<Vec<Tenant>>,
}

impl InMemoryTenantRegistry {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self { tenants: RwLock::new(tenants) }
    }
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn get_by_slug(&self, slug: &str) -> Result<Tenant, TenantError> {
        self.tenants
            .read()
            .await
            .iter()
            .find(|t| t.slug == slug)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(slug.to_string()))
    }

    async fn get_by_api_key_hash(&self, hash_hex: &str) -> Result<Tenant, TenantError> {
        // Callers store the raw key; the registry index is over its hash. In
        // tests, tenants carry their hash in `settings["api_key_hash"]`.
        self.tenants
            .read()
            .await
            .iter()
            .find(|t| {
                t.settings
                    .get("api_key_hash")
                    .and_then(|v| v.as_str())
                    .map(|h| h == hash_hex)
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("api_key_hash:{hash_hex}")))
    }

    async fn find_by_webhook_identifier(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Tenant, TenantError> {
        self.tenants
            .read()
            .await
            .iter()
            .find(|t| t.webhook_identifiers.get(key).map(|v| v == value).unwrap_or(false))
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("{key}={value}")))
    }

    async fn list_active(&self, env: Option<Environment>) -> Result<Vec<Tenant>, TenantError> {
        Ok(self
            .tenants
            .read()
            .await
            .iter()
            .filter(|t| t.is_active)
            .filter(|t| env.map(|e| t.environment == e).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TenantAdmin for InMemoryTenantRegistry {
    async fn create_tenant(&self, input: NewTenant) -> Result<Tenant, TenantError> {
        let mut guard = self.tenants.write().await;
        if guard.iter().any(|t| t.slug == input.slug) {
            return Err(TenantError::SlugTaken(input.slug));
        }
        let now = Utc::now();
        let mut settings = HashMap::new();
        settings.insert("api_key_hash".to_string(), serde_json::Value::String(input.api_key_hash));
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: input.slug,
            name: input.name,
            legacy_store_id: None,
            crm_provider: input.crm_provider,
            crm_config_ciphertext: input.crm_config_ciphertext,
            webhook_identifiers: input.webhook_identifiers,
            features: HashMap::new(),
            settings,
            is_active: true,
            environment: input.environment,
            created_at: now,
            updated_at: now,
        };
        guard.push(tenant.clone());
        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant created");
        Ok(tenant)
    }

    async fn rotate_crm_config(&self, tenant_id: Uuid, ciphertext: Vec<u8>) -> Result<Tenant, TenantError> {
        let mut guard = self.tenants.write().await;
        let tenant = guard
            .iter_mut()
            .find(|t| t.id == tenant_id)
            .ok_or_else(|| TenantError::NotFound(tenant_id.to_string()))?;
        tenant.crm_config_ciphertext = ciphertext;
        tenant.updated_at = Utc::now();
        tracing::info!(%tenant_id, "crm config rotated");
        Ok(tenant.clone())
    }

    async fn list_all(&self) -> Result<Vec<Tenant>, TenantError> {
        Ok(self.tenants.read().await.clone())
    }
}
