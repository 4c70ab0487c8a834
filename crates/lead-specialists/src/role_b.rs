use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use lead_core::types::{ConversationState, EscalationReason, SpecialistRole};
use lead_graph::{Node, StatePatch};
use lead_llm::{GenerationRequest, Generator, GeneratorMessage, GeneratorRole};

use crate::prompts;
use crate::role_a::last_customer_message;

/// Qualification — warm leads (score 5..7). Confirms what is already known
/// and, while the budget is unconfirmed, anchors the conversation on the
/// standard $300/mo plan per spec §4.6.
pub struct RoleB {
    generator: Arc<dyn Generator>,
}

impl RoleB {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node for RoleB {
    fn role(&self) -> SpecialistRole {
        SpecialistRole::B
    }

    #[instrument(skip(self, state), fields(thread_id = %state.thread_id))]
    async fn run(&self, state: &ConversationState) -> StatePatch {
        if state.lead_score >= 8 {
            return StatePatch::Escalate(if state.extracted_data.email.is_some() {
                EscalationReason::NeedsAppointment
            } else {
                EscalationReason::WrongAgent
            });
        }

        if state.lead_score < 5 {
            return StatePatch::Escalate(EscalationReason::WrongAgent);
        }

        let Some(last_customer) = last_customer_message(state) else {
            return StatePatch::Error;
        };

        let budget_confirmed = state.extracted_data.budget.is_some();
        let anchor = if budget_confirmed {
            "El presupuesto ya está confirmado; no repitas la oferta de $300/mes."
        } else {
            "El presupuesto aún no está confirmado; ofrece el plan estándar de $300/mes como punto de partida."
        };

        let system_prompt = format!("{}\n\n{}", prompts::QUALIFICATION, anchor);

        let request = GenerationRequest {
            system_prompt,
            messages: vec![GeneratorMessage {
                role: GeneratorRole::User,
                content: last_customer,
            }],
            max_tokens: 300,
        };

        match self.generator.generate(request).await {
            Ok(result) => StatePatch::Reply(result.reply_text),
            Err(e) => {
                warn!(error = %e, "generator error in qualification");
                StatePatch::Escalate(EscalationReason::Error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_core::types::{ContactId, ExtractedData, Message, MessageOrigin, ThreadId};
    use lead_llm::GenerationResult;

    struct FixedReply(&'static str);

    #[async_trait]
    impl Generator for FixedReply {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResult, lead_llm::GeneratorError> {
            Ok(GenerationResult {
                reply_text: self.0.to_string(),
                tool_calls: vec![],
            })
        }
    }

    fn base_state(score: u8) -> ConversationState {
        let mut s = ConversationState::new(ThreadId("t".into()), ContactId::from("c1"));
        s.lead_score = score;
        s.messages
            .push(Message::customer("sí me interesa", MessageOrigin::Webhook));
        s
    }

    #[tokio::test]
    async fn escalates_wrong_agent_outside_score_band() {
        let role = RoleB::new(Arc::new(FixedReply("ok")));
        let state = base_state(2);
        assert_eq!(
            role.run(&state).await,
            StatePatch::Escalate(EscalationReason::WrongAgent)
        );
    }

    #[tokio::test]
    async fn escalates_needs_appointment_when_hot_with_email() {
        let role = RoleB::new(Arc::new(FixedReply("ok")));
        let mut state = base_state(8);
        state.extracted_data = ExtractedData {
            email: Some("a@b.com".into()),
            ..Default::default()
        };
        assert_eq!(
            role.run(&state).await,
            StatePatch::Escalate(EscalationReason::NeedsAppointment)
        );
    }

    #[tokio::test]
    async fn escalates_wrong_agent_when_hot_without_email() {
        let role = RoleB::new(Arc::new(FixedReply("ok")));
        let state = base_state(9);
        assert_eq!(
            role.run(&state).await,
            StatePatch::Escalate(EscalationReason::WrongAgent)
        );
    }

    #[tokio::test]
    async fn replies_within_band() {
        let role = RoleB::new(Arc::new(FixedReply("¿cuál es tu presupuesto?")));
        let state = base_state(6);
        assert_eq!(
            role.run(&state).await,
            StatePatch::Reply("¿cuál es tu presupuesto?".to_string())
        );
    }
}
