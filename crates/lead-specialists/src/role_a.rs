use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use lead_core::types::{ConversationState, EscalationReason, MessageRole, SpecialistRole};
use lead_graph::{Node, StatePatch};
use lead_llm::{GenerationRequest, Generator, GeneratorMessage, GeneratorRole};

use crate::prompts;

/// Fields role A collects, in the priority order spec §4.6 asks them.
const MISSING_FIELD_PRIORITY: [&str; 4] = ["name", "business_type", "goal", "budget"];

/// Discovery — cold leads (score 0..4). Greets once, then asks for exactly
/// one missing field per turn until name/business_type/goal/budget are all
/// known, at which point it hands off to qualification.
pub struct RoleA {
    generator: Arc<dyn Generator>,
}

impl RoleA {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node for RoleA {
    fn role(&self) -> SpecialistRole {
        SpecialistRole::A
    }

    #[instrument(skip(self, state), fields(thread_id = %state.thread_id))]
    async fn run(&self, state: &ConversationState) -> StatePatch {
        if !(0..=4).contains(&state.lead_score) {
            return StatePatch::Escalate(EscalationReason::WrongAgent);
        }

        let missing = MISSING_FIELD_PRIORITY
            .iter()
            .find(|field| state.extracted_data.get(field).is_none());

        let Some(field) = missing else {
            return StatePatch::Escalate(EscalationReason::NeedsQualification);
        };

        let Some(last_customer) = last_customer_message(state) else {
            return StatePatch::Error;
        };

        let already_greeted = state
            .messages
            .iter()
            .any(|m| m.role == MessageRole::Agent && m.agent_name == Some(SpecialistRole::A));

        let opening = if already_greeted {
            "No repitas el saludo; continúa la conversación."
        } else {
            "Es el primer mensaje de este agente; saluda brevemente antes de preguntar."
        };

        let system_prompt = format!(
            "{}\n\n{} Este turno pregunta específicamente por el campo que falta: '{}'.",
            prompts::DISCOVERY,
            opening,
            field,
        );

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
                warn!(error = %e, "generator error in discovery");
                StatePatch::Escalate(EscalationReason::Error)
            }
        }
    }
}

pub(crate) fn last_customer_message(state: &ConversationState) -> Option<String> {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Customer)
        .map(|m| m.content.clone())
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

    fn base_state() -> ConversationState {
        let mut s = ConversationState::new(ThreadId("t".into()), ContactId::from("c1"));
        s.messages
            .push(Message::customer("hola quiero info", MessageOrigin::Webhook));
        s
    }

    #[tokio::test]
    async fn escalates_when_all_fields_present() {
        let role = RoleA::new(Arc::new(FixedReply("hola")));
        let mut state = base_state();
        state.extracted_data = ExtractedData {
            name: Some("Diego".into()),
            business_type: Some("restaurante".into()),
            goal: Some("más clientes".into()),
            budget: Some("300".into()),
            ..Default::default()
        };
        let patch = role.run(&state).await;
        assert_eq!(patch, StatePatch::Escalate(EscalationReason::NeedsQualification));
    }

    #[tokio::test]
    async fn escalates_wrong_agent_outside_score_band() {
        let role = RoleA::new(Arc::new(FixedReply("hola")));
        let mut state = base_state();
        state.lead_score = 9;
        let patch = role.run(&state).await;
        assert_eq!(patch, StatePatch::Escalate(EscalationReason::WrongAgent));
    }

    #[tokio::test]
    async fn replies_with_generator_output_when_field_missing() {
        let role = RoleA::new(Arc::new(FixedReply("¿Cuál es tu nombre?")));
        let state = base_state();
        let patch = role.run(&state).await;
        assert_eq!(patch, StatePatch::Reply("¿Cuál es tu nombre?".to_string()));
    }
}
