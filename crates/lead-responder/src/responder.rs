use tracing::warn;

use lead_core::types::{ConversationState, MessageRole};
use lead_crm::client::CrmClient;
use lead_crm::types::Channel;
use lead_events::{EventBus, RouterEvent};

use crate::pacing;

/// Selects, paces, and sends the turn's reply, per spec §4.8. Applies its
/// result directly to `state` (`last_sent_message`/`message_sent`) rather
/// than returning a patch — by this point in the turn there is no further
/// routing decision left to make.
pub async fn respond(crm: &dyn CrmClient, state: &mut ConversationState, channel: Channel, events: &EventBus) {
    let Some(selected) = select_reply(state) else {
        return;
    };

    if state.last_sent_message.as_deref() == Some(selected.as_str()) {
        events.emit(RouterEvent::DuplicateSuppressed {
            thread_id: state.thread_id.clone(),
        });
        state.message_sent = false;
        return;
    }

    let parts = split_parts(&selected);

    for (i, part) in parts.iter().enumerate() {
        let delay = if i > 0 {
            pacing::split_delay_for(part)
        } else {
            pacing::delay_for(part)
        };
        tokio::time::sleep(delay).await;

        if let Err(e) = crm.send_message(&state.contact_id, part, channel).await {
            warn!(error = %e, thread_id = %state.thread_id, "crm send failed");
            events.emit(RouterEvent::SendFailure {
                thread_id: state.thread_id.clone(),
                reason: e.to_string(),
            });
            state.message_sent = false;
            return;
        }
    }

    state.last_sent_message = Some(selected);
    state.message_sent = true;
}

/// Newest-to-oldest scan for the first agent-authored message in the turn.
fn select_reply(state: &ConversationState) -> Option<String> {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Agent && m.agent_name.is_some())
        .map(|m| m.content.clone())
}

/// Blank-line-separated parts, each sent as its own CRM message; C1's
/// 300-char chunking still applies within each part.
fn split_parts(content: &str) -> Vec<&str> {
    let parts: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        vec![content]
    } else {
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let parts = split_parts("Hola Diego!\n\nMañana tengo un espacio a las 3pm.");
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn single_part_when_no_blank_line() {
        let parts = split_parts("Hola Diego!");
        assert_eq!(parts, vec!["Hola Diego!"]);
    }
}
