//! Webhook ingress — POST /webhooks/crm.
//!
//! Accepts the CRM's inbound-message payload per spec §6: `contactId`,
//! optional `conversationId`/`locationId`, and a `body`. Authenticated per
//! `RouterConfig::webhook.auth_mode` before the body is ever parsed.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use lead_core::config::WebhookAuthMode;
use lead_core::types::{ContactId, ConversationId, LocationId};
use lead_graph::InboundMessage;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(rename = "contactId")]
    contact_id: String,
    #[serde(rename = "conversationId")]
    conversation_id: Option<String>,
    #[serde(rename = "locationId")]
    location_id: Option<String>,
    body: String,
}

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match &state.config.webhook.auth_mode {
        WebhookAuthMode::HmacSha256 => {
            verify_hmac_sha256(&headers, &raw_body, state.config.webhook.secret.as_deref())
                .map_err(auth_error)?;
        }
        WebhookAuthMode::BearerToken => {
            verify_bearer_token(&headers, state.config.webhook.secret.as_deref()).map_err(auth_error)?;
        }
        WebhookAuthMode::None => {}
    }

    let payload: WebhookBody = serde_json::from_slice(&raw_body).map_err(|e| {
        warn!(error = %e, "invalid JSON in webhook body");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    info!(contact_id = %payload.contact_id, "webhook arrived");

    let inbound = InboundMessage {
        contact_id: ContactId::from(payload.contact_id),
        conversation_id: payload.conversation_id.map(ConversationId::from),
        location_id: payload.location_id.map(LocationId::from),
        body: payload.body,
    };

    state.runtime.handle_turn(inbound).await.map_err(|e| {
        warn!(error = %e, code = e.code(), "turn failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal error", "code": e.code()})),
        )
    })?;

    Ok(Json(json!({"ok": true})))
}

/// Pulls a header, lowercased-name lookup already handled by `HeaderMap`,
/// and reports which header was missing if it wasn't there or wasn't ASCII.
fn require_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| format!("missing {name} header"))
}

/// GitHub-style HMAC-SHA256: `X-Hub-Signature-256: sha256=<hex>` over the raw body.
fn verify_hmac_sha256(headers: &HeaderMap, body: &Bytes, secret: Option<&str>) -> Result<(), String> {
    let secret = secret.ok_or_else(|| "no HMAC secret configured".to_string())?;

    let sig_hex = require_header(headers, "x-hub-signature-256")?
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed X-Hub-Signature-256 header".to_string())?;
    let expected = hex::decode(sig_hex).map_err(|_| "X-Hub-Signature-256 is not valid hex".to_string())?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "HMAC signature mismatch".to_string())
}

/// Static bearer token in `Authorization: Bearer <token>`.
fn verify_bearer_token(headers: &HeaderMap, secret: Option<&str>) -> Result<(), String> {
    let expected = secret.ok_or_else(|| "no bearer token configured".to_string())?;

    let token = require_header(headers, "authorization")?
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    (token == expected).then_some(()).ok_or_else(|| "bearer token mismatch".to_string())
}

fn auth_error(reason: String) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "webhook authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}
