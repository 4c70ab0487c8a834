use async_trait::async_trait;
use lead_core::types::{ContactId, ConversationId};

use crate::error::Result;
use crate::types::{
    AppointmentHandle, AppointmentRequest, Channel, Contact, ContactUpdate, Conversation,
    CrmMessage, Note, SentMessageHandle, Slot,
};

/// Typed operations against the CRM, per spec §4.1. The HTTP mapping is an
/// implementation detail of each `CrmClient` — the graph runtime and
/// specialists only ever see this trait.
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact>;

    async fn update_contact(&self, contact_id: &ContactId, fields: ContactUpdate) -> Result<Contact>;

    async fn add_note(&self, contact_id: &ContactId, body: &str) -> Result<Note>;

    async fn list_conversations(&self, contact_id: &ContactId) -> Result<Vec<Conversation>>;

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<CrmMessage>>;

    /// Splits `body` into <=300-char chunks along sentence boundaries; each
    /// chunk is sent as one CRM call, in order. Returns the handle of the
    /// last chunk sent.
    async fn send_message(
        &self,
        contact_id: &ContactId,
        body: &str,
        channel: Channel,
    ) -> Result<SentMessageHandle>;

    async fn list_free_slots(
        &self,
        calendar_id: &str,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
        tz: &str,
    ) -> Result<Vec<Slot>>;

    async fn create_appointment(&self, request: AppointmentRequest) -> Result<AppointmentHandle>;
}
