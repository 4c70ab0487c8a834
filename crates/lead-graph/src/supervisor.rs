use lead_core::types::{ConversationState, EscalationReason, RoutingDecision, SpecialistRole};
use lead_intelligence::scorer::budget_is_high_value;

/// Bound on supervisor<->specialist round trips within one turn, per §4.5.
pub const MAX_ROUTING_ATTEMPTS: u8 = 3;

/// Routing decision table per §4.5, first-match-wins. An explicit
/// escalation signal from the previous specialist invocation is checked
/// before the score table — `state.escalation_reason` is cleared by
/// [`lead_core::types::ConversationState::start_turn`] at the start of the
/// turn, so it only reflects the current turn's specialist output.
pub fn decide(state: &ConversationState) -> RoutingDecision {
    let score = state.lead_score;

    if state.routing_attempts >= MAX_ROUTING_ATTEMPTS {
        let fallback = state.current_agent.unwrap_or(SpecialistRole::A);
        return RoutingDecision {
            next_agent: fallback,
            task_description: "fallback: answer with available info".to_string(),
            reason: "routing_attempts exhausted".to_string(),
            score_at_decision: score,
        };
    }

    if let Some(reason) = state.escalation_reason {
        match reason {
            EscalationReason::NeedsAppointment => {
                return RoutingDecision {
                    next_agent: SpecialistRole::C,
                    task_description: "book appointment".to_string(),
                    reason: "escalation: needs_appointment".to_string(),
                    score_at_decision: score,
                };
            }
            EscalationReason::WrongAgent if score < 5 => {
                return RoutingDecision {
                    next_agent: SpecialistRole::A,
                    task_description: "discover: collect name/business/goal".to_string(),
                    reason: "escalation: wrong_agent, score<5".to_string(),
                    score_at_decision: score,
                };
            }
            EscalationReason::NeedsQualification => {
                return RoutingDecision {
                    next_agent: SpecialistRole::B,
                    task_description: "qualify: confirm budget and goal".to_string(),
                    reason: "escalation: needs_qualification".to_string(),
                    score_at_decision: score,
                };
            }
            EscalationReason::Error => {
                // §7: a generator_error escalates; the supervisor falls back
                // to role A. If the turn is already at A, `run_routing_loop`
                // ends the turn before `decide` is consulted again.
                return RoutingDecision {
                    next_agent: SpecialistRole::A,
                    task_description: "fallback: answer with available info".to_string(),
                    reason: "escalation: error, fallback to A".to_string(),
                    score_at_decision: score,
                };
            }
            EscalationReason::WrongAgent | EscalationReason::CustomerConfused | EscalationReason::Error => {
                // Falls through to the ordinary score table below.
            }
        }
    }

    let extracted = &state.extracted_data;
    let budget_at_least_300 = extracted.budget.as_deref().is_some_and(budget_is_high_value);

    if score >= 8 && extracted.email.is_some() && extracted.name.is_some() && budget_at_least_300 {
        return RoutingDecision {
            next_agent: SpecialistRole::C,
            task_description: "book appointment".to_string(),
            reason: "score>=8, email+name+budget>=300".to_string(),
            score_at_decision: score,
        };
    }

    if score >= 8 {
        return RoutingDecision {
            next_agent: SpecialistRole::C,
            task_description: "confirm remaining details and book".to_string(),
            reason: "score>=8".to_string(),
            score_at_decision: score,
        };
    }

    if score >= 5 {
        return RoutingDecision {
            next_agent: SpecialistRole::B,
            task_description: "qualify: confirm budget and goal".to_string(),
            reason: "score>=5".to_string(),
            score_at_decision: score,
        };
    }

    RoutingDecision {
        next_agent: SpecialistRole::A,
        task_description: "discover: collect name/business/goal".to_string(),
        reason: "default".to_string(),
        score_at_decision: score,
    }
}
