use async_trait::async_trait;

use lead_core::types::{ConversationState, EscalationReason, SpecialistRole};

/// A specialist's outcome for one invocation, per spec §4.6. The runtime
/// applies exactly one of these to `state` — a node never mutates state
/// directly, so its behavior is testable against a plain
/// `ConversationState` value.
#[derive(Debug, Clone, PartialEq)]
pub enum StatePatch {
    /// A user-visible reply authored by the node's role.
    Reply(String),
    /// A booked-appointment confirmation; also ends the turn.
    BookingConfirmed(String),
    /// No reply; ask the supervisor to route again this turn.
    Escalate(EscalationReason),
    /// An unexpected failure inside the node. No reply, no escalation
    /// reroute — the turn simply produces no outbound.
    Error,
}

/// One specialist role, per spec §4.6's "(state) -> StatePatch" shape.
/// `lead-specialists` implements this; `lead-graph` only holds the trait
/// object and never depends on a concrete role implementation — wiring
/// happens at the edge (`lead-gateway`).
#[async_trait]
pub trait Node: Send + Sync {
    fn role(&self) -> SpecialistRole;

    async fn run(&self, state: &ConversationState) -> StatePatch;
}
