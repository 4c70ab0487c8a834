use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lead_core::config::CrmConfig;
use lead_core::types::{ContactId, ConversationId};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::client::CrmClient;
use crate::error::{CrmError, Result};
use crate::split::split_message;
use crate::types::{
    AppointmentHandle, AppointmentRequest, Channel, Contact, ContactUpdate, Conversation,
    CrmMessage, Note, SentMessageHandle, Slot,
};

/// Base retry delay. Schedule: base * 2^attempt + jitter(0..3s), capped at 60s.
const RETRY_BASE_SECS: u64 = 4;
const RETRY_CAP_SECS: u64 = 60;
const MAX_ATTEMPTS: u32 = 5;
const JITTER_CEIL_SECS: u64 = 3;

/// `reqwest`-backed [`CrmClient`] implementation.
///
/// Every call goes through [`with_retry`] except idempotency-sensitive
/// writes whose caller (the responder) owns the resend decision — retries
/// here only cover the single HTTP attempt, not cross-turn resends.
pub struct HttpCrmClient {
    client: Client,
    base_url: String,
    api_token: String,
    location_id: String,
}

impl HttpCrmClient {
    pub fn new(config: &CrmConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .expect("reqwest client builds with validated timeouts");

        Self {
            client,
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
            location_id: config.location_id.clone(),
        }
    }

    fn auth_header(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_token)
    }

    /// Classify a response into Ok(body) or a typed [`CrmError`], reading
    /// `Retry-After` for 429s.
    async fn classify(resp: reqwest::Response) -> std::result::Result<reqwest::Response, CrmError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status.as_u16() == 404 {
            return Err(CrmError::NotFound);
        }
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(RETRY_BASE_SECS);
            return Err(CrmError::RateLimited { retry_after_secs });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(CrmError::AuthFailed);
        }
        if status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CrmError::Transient(text));
        }
        let text = resp.text().await.unwrap_or_default();
        Err(CrmError::Permanent(format!("{}: {}", status, text)))
    }
}

/// Retries `op` up to [`MAX_ATTEMPTS`] times for transient/rate-limited
/// errors. `Retry-After` (when present on a rate-limited error) overrides
/// the computed delay. Auth and permanent errors are never retried.
async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay_secs = RETRY_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt == MAX_ATTEMPTS => {
                if attempt > 1 {
                    warn!(op = op_name, attempt, error = %e, "crm call failed, giving up");
                }
                return Err(e);
            }
            Err(CrmError::RateLimited { retry_after_secs }) => {
                warn!(op = op_name, attempt, retry_after_secs, "rate limited, honoring Retry-After");
                sleep(Duration::from_secs(retry_after_secs)).await;
            }
            Err(e) => {
                let wait = delay_secs + jitter_secs();
                warn!(op = op_name, attempt, error = %e, wait_secs = wait, "transient crm error, retrying");
                sleep(Duration::from_secs(wait)).await;
                delay_secs = (delay_secs * 2).min(RETRY_CAP_SECS);
            }
        }
    }

    unreachable!("retry loop exited without returning")
}

/// 0..JITTER_CEIL_SECS jitter derived from the system clock's sub-second
/// component, avoiding a dedicated RNG dependency for such a small range.
fn jitter_secs() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos as u64) % (JITTER_CEIL_SECS + 1)
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact> {
        with_retry("get_contact", || async {
            let url = format!("{}/contacts/{}", self.base_url, contact_id);
            let resp = self
                .auth_header(self.client.get(&url))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            parse_contact(contact_id, &body)
        })
        .await
    }

    async fn update_contact(&self, contact_id: &ContactId, fields: ContactUpdate) -> Result<Contact> {
        with_retry("update_contact", || async {
            let url = format!("{}/contacts/{}", self.base_url, contact_id);
            let resp = self
                .auth_header(self.client.put(&url))
                .json(&json!({
                    "name": fields.name,
                    "email": fields.email,
                    "phone": fields.phone,
                    "customFields": fields.custom_fields,
                }))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            parse_contact(contact_id, &body)
        })
        .await
    }

    async fn add_note(&self, contact_id: &ContactId, body_text: &str) -> Result<Note> {
        with_retry("add_note", || async {
            let url = format!("{}/contacts/{}/notes", self.base_url, contact_id);
            let resp = self
                .auth_header(self.client.post(&url))
                .json(&json!({ "body": body_text }))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            Ok(Note {
                id: body["id"].as_str().unwrap_or_default().to_string(),
                body: body_text.to_string(),
                created_at: Utc::now(),
            })
        })
        .await
    }

    async fn list_conversations(&self, contact_id: &ContactId) -> Result<Vec<Conversation>> {
        with_retry("list_conversations", || async {
            let url = format!(
                "{}/conversations/search?contactId={}&locationId={}",
                self.base_url, contact_id, self.location_id
            );
            let resp = self
                .auth_header(self.client.get(&url))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let conversations = body["conversations"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| {
                    Some(Conversation {
                        id: ConversationId::from(c["id"].as_str()?),
                        contact_id: contact_id.clone(),
                    })
                })
                .collect();
            Ok(conversations)
        })
        .await
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<CrmMessage>> {
        with_retry("list_messages", || async {
            let url = format!(
                "{}/conversations/{}/messages?limit={}",
                self.base_url, conversation_id, limit
            );
            let resp = self
                .auth_header(self.client.get(&url))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            Ok(parse_messages(&body))
        })
        .await
    }

    async fn send_message(
        &self,
        contact_id: &ContactId,
        body_text: &str,
        channel: Channel,
    ) -> Result<SentMessageHandle> {
        let chunks = split_message(body_text);
        let mut last_handle = None;

        for chunk in chunks {
            let handle = with_retry("send_message", || async {
                let url = format!("{}/conversations/messages", self.base_url);
                let resp = self
                    .auth_header(self.client.post(&url))
                    .json(&json!({
                        "contactId": contact_id.as_str(),
                        "type": channel_wire_name(channel),
                        "message": chunk,
                    }))
                    .send()
                    .await
                    .map_err(|e| CrmError::Transient(e.to_string()))?;
                let resp = Self::classify(resp).await?;
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| CrmError::Transient(e.to_string()))?;
                Ok(SentMessageHandle {
                    message_id: body["messageId"].as_str().unwrap_or_default().to_string(),
                })
            })
            .await?;
            last_handle = Some(handle);
        }

        last_handle.ok_or_else(|| CrmError::Permanent("empty message body".into()))
    }

    async fn list_free_slots(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: &str,
    ) -> Result<Vec<Slot>> {
        with_retry("list_free_slots", || async {
            let url = format!(
                "{}/calendars/{}/free-slots?startDate={}&endDate={}&timezone={}",
                self.base_url,
                calendar_id,
                start.timestamp_millis(),
                end.timestamp_millis(),
                tz
            );
            let resp = self
                .auth_header(self.client.get(&url))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            Ok(parse_slots(&body))
        })
        .await
    }

    async fn create_appointment(&self, request: AppointmentRequest) -> Result<AppointmentHandle> {
        with_retry("create_appointment", || async {
            let url = format!("{}/calendars/events/appointments", self.base_url);
            let resp = self
                .auth_header(self.client.post(&url))
                .json(&json!({
                    "locationId": self.location_id,
                    "contactId": request.contact_id.as_str(),
                    "startTime": request.start.to_rfc3339(),
                    "endTime": request.end.to_rfc3339(),
                    "title": request.title,
                    "appointmentStatus": "confirmed",
                    "meetingLocationType": request.meeting_type,
                }))
                .send()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            let resp = Self::classify(resp).await?;
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CrmError::Transient(e.to_string()))?;
            Ok(AppointmentHandle {
                appointment_id: body["id"].as_str().unwrap_or_default().to_string(),
            })
        })
        .await
    }
}

fn channel_wire_name(channel: Channel) -> &'static str {
    match channel {
        Channel::WhatsApp => "WhatsApp",
        Channel::Sms => "SMS",
    }
}

fn parse_contact(contact_id: &ContactId, body: &serde_json::Value) -> Result<Contact> {
    let contact = &body["contact"];
    let mut custom_fields = std::collections::HashMap::new();
    if let Some(fields) = contact["customFields"].as_array() {
        for f in fields {
            if let (Some(id), Some(value)) = (f["id"].as_str(), f["value"].as_str()) {
                custom_fields.insert(id.to_string(), value.to_string());
            }
        }
    }
    let tags = contact["tags"]
        .as_array()
        .map(|t| t.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    Ok(Contact {
        id: contact_id.clone(),
        name: contact["name"].as_str().map(String::from),
        email: contact["email"].as_str().map(String::from),
        phone: contact["phone"].as_str().map(String::from),
        custom_fields,
        tags,
    })
}

fn parse_messages(body: &serde_json::Value) -> Vec<CrmMessage> {
    body["messages"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let direction = match m["direction"].as_str()? {
                "inbound" => crate::types::MessageDirection::Inbound,
                _ => crate::types::MessageDirection::Outbound,
            };
            Some(CrmMessage {
                id: lead_core::types::CrmMessageId::from(m["id"].as_str()?),
                direction,
                body: m["body"].as_str().unwrap_or_default().to_string(),
                timestamp: m["dateAdded"]
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
            })
        })
        .collect()
}

fn parse_slots(body: &serde_json::Value) -> Vec<Slot> {
    body["slots"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| {
            let start = s["startTime"].as_str()?;
            let end = s["endTime"].as_str()?;
            Some(Slot {
                start: DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc),
                end: DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..50 {
            assert!(jitter_secs() <= JITTER_CEIL_SECS);
        }
    }

    #[tokio::test]
    async fn with_retry_gives_up_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CrmError::Permanent("bad request".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CrmError::Transient("timeout".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(CrmError::Transient("timeout".into()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
