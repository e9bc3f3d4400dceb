//! Ticket persistence contract (C11) and an in-memory test double.
//!
//! An external collaborator (§1): this crate only consumes the shape. All
//! operations are implicitly tenant-scoped by `tenant_id`; no query may
//! cross tenants (§8 testable property).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use supportgate_core::model::{AiRecommendation, Ticket, TicketMessage, TicketNote};
use uuid::Uuid;

use crate::error::TicketError;

#[derive(Debug, Clone, Default)]
pub struct TicketFilters {
    pub status: Option<supportgate_core::model::TicketStatus>,
    pub priority: Option<supportgate_core::model::Priority>,
    pub channel: Option<String>,
    pub assigned_to: Option<String>,
    pub customer_id: Option<String>,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn next_ticket_number(&self, tenant_id: Uuid) -> String;
    async fn insert_ticket(&self, ticket: Ticket, initial_message: TicketMessage) -> Result<(), TicketError>;
    async fn get_ticket(&self, tenant_id: Uuid, id_or_number: &str) -> Result<Ticket, TicketError>;
    async fn list_tickets(&self, tenant_id: Uuid, filters: &TicketFilters) -> Result<Vec<Ticket>, TicketError>;
    async fn update_ticket(&self, tenant_id: Uuid, ticket: Ticket) -> Result<(), TicketError>;
    async fn append_message(&self, message: TicketMessage) -> Result<(), TicketError>;
    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, TicketError>;
    async fn add_note(&self, note: TicketNote) -> Result<(), TicketError>;
    async fn list_notes(&self, ticket_id: Uuid) -> Result<Vec<TicketNote>, TicketError>;
    async fn clear_messages_after_first(&self, ticket_id: Uuid) -> Result<(), TicketError>;
    async fn get_recommendation(&self, ticket_id: Uuid) -> Result<Option<AiRecommendation>, TicketError>;
    async fn save_recommendation(&self, recommendation: AiRecommendation) -> Result<(), TicketError>;
}

#[derive(Default)]
struct Inner {
    tickets: HashMap<Uuid, Ticket>,
    messages: HashMap<Uuid, Vec<TicketMessage>>,
    notes: HashMap<Uuid, Vec<TicketNote>>,
    recommendations: HashMap<Uuid, AiRecommendation>,
    counters: HashMap<Uuid, u64>,
}

/// An in-memory `TicketStore` for tests and local development.
#[derive(Default)]
pub struct InMemoryTicketStore {
    inner: Mutex<Inner>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn looks_like_uuid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn next_ticket_number(&self, tenant_id: Uuid) -> String {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        let counter = inner.counters.entry(tenant_id).or_insert(0);
        *counter += 1;
        format!("T-{:03}", counter)
    }

    async fn insert_ticket(&self, ticket: Ticket, initial_message: TicketMessage) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        if inner
            .tickets
            .values()
            .any(|t| t.tenant_id == ticket.tenant_id && t.ticket_number == ticket.ticket_number)
        {
            return Err(TicketError::DuplicateTicketNumber(ticket.ticket_number));
        }
        let id = ticket.id;
        inner.tickets.insert(id, ticket);
        inner.messages.entry(id).or_default().push(initial_message);
        Ok(())
    }

    async fn get_ticket(&self, tenant_id: Uuid, id_or_number: &str) -> Result<Ticket, TicketError> {
        let inner = self.inner.lock().expect("ticket store mutex poisoned");
        let found = if looks_like_uuid(id_or_number) {
            let id = Uuid::parse_str(id_or_number).expect("checked by looks_like_uuid");
            inner.tickets.get(&id).filter(|t| t.tenant_id == tenant_id)
        } else {
            inner
                .tickets
                .values()
                .find(|t| t.tenant_id == tenant_id && t.ticket_number == id_or_number)
        };
        found.cloned().ok_or_else(|| TicketError::NotFound(id_or_number.to_string()))
    }

    async fn list_tickets(&self, tenant_id: Uuid, filters: &TicketFilters) -> Result<Vec<Ticket>, TicketError> {
        let inner = self.inner.lock().expect("ticket store mutex poisoned");
        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| filters.status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| filters.priority.map(|p| p == t.priority).unwrap_or(true))
            .filter(|t| {
                filters
                    .channel
                    .as_ref()
                    .map(|c| c == &t.channel)
                    .unwrap_or(true)
            })
            .filter(|t| {
                filters
                    .assigned_to
                    .as_ref()
                    .map(|a| t.assigned_to.as_deref() == Some(a.as_str()))
                    .unwrap_or(true)
            })
            .filter(|t| {
                filters
                    .customer_id
                    .as_ref()
                    .map(|c| c == &t.customer_id)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn update_ticket(&self, tenant_id: Uuid, ticket: Ticket) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        let existing = inner
            .tickets
            .get(&ticket.id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| TicketError::NotFound(ticket.id.to_string()))?;
        if existing.ticket_number != ticket.ticket_number {
            return Err(TicketError::Validation("ticket_number is immutable".into()));
        }
        inner.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn append_message(&self, message: TicketMessage) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        let ticket_id = message.ticket_id;
        if let Some(ticket) = inner.tickets.get_mut(&ticket_id) {
            ticket.updated_at = message.created_at;
        } else {
            return Err(TicketError::NotFound(ticket_id.to_string()));
        }
        inner.messages.entry(ticket_id).or_default().push(message);
        Ok(())
    }

    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, TicketError> {
        let inner = self.inner.lock().expect("ticket store mutex poisoned");
        let mut messages = inner.messages.get(&ticket_id).cloned().unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn add_note(&self, note: TicketNote) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        inner.notes.entry(note.ticket_id).or_default().push(note);
        Ok(())
    }

    async fn list_notes(&self, ticket_id: Uuid) -> Result<Vec<TicketNote>, TicketError> {
        let inner = self.inner.lock().expect("ticket store mutex poisoned");
        Ok(inner.notes.get(&ticket_id).cloned().unwrap_or_default())
    }

    async fn clear_messages_after_first(&self, ticket_id: Uuid) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        if let Some(messages) = inner.messages.get_mut(&ticket_id) {
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            messages.truncate(1);
        }
        inner.recommendations.remove(&ticket_id);
        Ok(())
    }

    async fn get_recommendation(&self, ticket_id: Uuid) -> Result<Option<AiRecommendation>, TicketError> {
        let inner = self.inner.lock().expect("ticket store mutex poisoned");
        Ok(inner.recommendations.get(&ticket_id).cloned())
    }

    async fn save_recommendation(&self, recommendation: AiRecommendation) -> Result<(), TicketError> {
        let mut inner = self.inner.lock().expect("ticket store mutex poisoned");
        inner.recommendations.insert(recommendation.ticket_id, recommendation);
        Ok(())
    }
}
