use std::collections::HashSet;

use lead_core::types::{Message, MessageOrigin, MessageRole};
use lead_crm::types::{CrmMessage, MessageDirection};

/// Closed set of CRM system-generated phrases. Messages whose
/// (case-insensitive, trimmed) content equals or starts with one of these
/// are dropped before intelligence/specialists ever see them.
const CRM_SYSTEM_PHRASES: &[&str] = &[
    "opportunity created",
    "appointment scheduled",
    "tag added",
    "contact created",
    "task created",
    "note added",
];

const MAX_CRM_HISTORY: usize = 50;

/// Merges inbound message, checkpoint messages, and CRM history into a
/// deduplicated, ordered sequence, per spec §4.3.
///
/// `crm_history` is the caller-fetched (up to [`MAX_CRM_HISTORY`]) recent
/// messages for the conversation, already in CRM chronological order —
/// fetching them is the caller's concern (an I/O suspension point per §5),
/// this function is pure.
pub fn reconcile(
    checkpoint_messages: &[Message],
    crm_history: Option<&[CrmMessage]>,
    inbound_body: &str,
) -> Vec<Message> {
    let mut merged: Vec<Message> = checkpoint_messages.to_vec();

    if checkpoint_messages.is_empty() {
        if let Some(history) = crm_history {
            for crm_msg in history.iter().take(MAX_CRM_HISTORY) {
                if is_system_phrase(&crm_msg.body) {
                    continue;
                }
                merged.push(Message {
                    role: match crm_msg.direction {
                        MessageDirection::Inbound => MessageRole::Customer,
                        MessageDirection::Outbound => MessageRole::Agent,
                    },
                    agent_name: None,
                    content: crm_msg.body.clone(),
                    crm_message_id: Some(crm_msg.id.clone()),
                    timestamp: crm_msg.timestamp,
                    origin: MessageOrigin::CrmHistory,
                });
            }
        }
    }

    merged.push(Message::customer(inbound_body, MessageOrigin::Webhook));

    dedup_preserving_order(merged)
}

fn is_system_phrase(content: &str) -> bool {
    let normalized = content.trim().to_lowercase();
    CRM_SYSTEM_PHRASES
        .iter()
        .any(|phrase| normalized == *phrase || normalized.starts_with(phrase))
}

/// Deduplicate by `(role, normalized_content, crm_message_id?)`, preserving
/// order of first occurrence, then stable-sort by timestamp when every
/// entry has one.
fn dedup_preserving_order(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<Message> = Vec::with_capacity(messages.len());

    for msg in messages {
        let key = msg.dedup_key();
        if seen.insert(key) {
            deduped.push(msg);
        }
    }

    if deduped.iter().all(|m| m.timestamp.is_some()) {
        deduped.sort_by_key(|m| m.timestamp);
    }

    deduped
}
