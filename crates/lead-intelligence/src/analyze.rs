use std::panic::{self, AssertUnwindSafe};

use tracing::{instrument, warn};

use lead_core::types::ConversationState;

use crate::extractor::{self, ExtractionResult};
use crate::scorer::{self, ScoreResult};

/// Outcome of one turn's intelligence pass. `ScoreUnchanged` is returned
/// both for a genuinely quiet turn and for an internal failure — per
/// spec §4.4's "Failure" clause, a broken extraction must never block the
/// turn, it must just leave the score where it was.
#[derive(Debug, Clone, PartialEq)]
pub enum IntelligenceOutcome {
    Updated {
        extraction: ExtractionResult,
        score: ScoreResult,
    },
    ScoreUnchanged,
}

/// Runs extraction and scoring for the current turn against `state`,
/// mutating neither — the caller applies [`extractor::merge`] and the
/// resulting score itself once it has decided to commit the turn.
///
/// `previous_agent_message` is the most recent agent message in
/// `state.messages`, used only by the budget-confirmation detector.
#[instrument(skip(state, inbound_message, previous_agent_message), fields(thread_id = %state.thread_id))]
pub fn analyze(
    state: &ConversationState,
    inbound_message: &str,
    previous_agent_message: Option<&str>,
) -> IntelligenceOutcome {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut extraction = extractor::extract(inbound_message);
        if extraction.budget.is_none() {
            extraction.budget = extractor::detect_budget_confirmation(inbound_message, previous_agent_message);
        }
        let budget_confirmed_this_turn = extraction.budget.is_some()
            && state.extracted_data.budget.is_none()
            && previous_agent_message.is_some();

        let mut merged = state.extracted_data.clone();
        extractor::merge(&mut merged, &extraction);

        let score = scorer::compute_score(
            &merged,
            state.messages.len() + 1,
            state.lead_score,
            budget_confirmed_this_turn,
        );

        (extraction, score)
    }));

    match outcome {
        Ok((extraction, score)) => {
            if extraction.is_empty() && !score.changed {
                IntelligenceOutcome::ScoreUnchanged
            } else {
                IntelligenceOutcome::Updated { extraction, score }
            }
        }
        Err(_) => {
            warn!(thread_id = %state.thread_id, "intelligence pass panicked, emitting score_unchanged");
            IntelligenceOutcome::ScoreUnchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_core::types::{ContactId, ThreadId};

    fn fresh_state() -> ConversationState {
        ConversationState::new(ThreadId("t1".to_string()), ContactId::from("c1"))
    }

    #[test]
    fn updates_on_extractable_message() {
        let state = fresh_state();
        let outcome = analyze(&state, "Hola, soy Diego y tengo un restaurante", None);
        match outcome {
            IntelligenceOutcome::Updated { extraction, score } => {
                assert!(extraction.name.is_some());
                assert!(score.score >= 1);
            }
            IntelligenceOutcome::ScoreUnchanged => panic!("expected an update"),
        }
    }

    #[test]
    fn reports_unchanged_on_empty_message() {
        let state = fresh_state();
        let outcome = analyze(&state, "hola", None);
        assert_eq!(outcome, IntelligenceOutcome::ScoreUnchanged);
    }

    #[test]
    fn budget_confirmation_floors_score_through_analyze() {
        let mut state = fresh_state();
        state.messages.push(lead_core::types::Message::from_agent(
            lead_core::types::SpecialistRole::B,
            "Mis soluciones empiezan en $300/mes, ¿te funciona?",
        ));
        let outcome = analyze(
            &state,
            "si",
            Some("Mis soluciones empiezan en $300/mes, ¿te funciona?"),
        );
        match outcome {
            IntelligenceOutcome::Updated { score, .. } => assert_eq!(score.score, 6),
            IntelligenceOutcome::ScoreUnchanged => panic!("expected a floor-raised score"),
        }
    }
}
