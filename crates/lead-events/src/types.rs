use lead_core::types::{EscalationReason, SpecialistRole, ThreadId};

/// The closed set of observational signals the core emits, per spec §7 and
/// §4.2–§4.8. Transport (metrics/traces) is external — these are plain
/// values, never control-flow hooks: nothing here can block or rewrite a
/// turn — there is no `HookAction`-style veto or rewrite path here.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    /// Extraction or scoring failed; the stage no-opped and the turn
    /// continued unaffected.
    ScoreUnchanged { thread_id: ThreadId },
    /// Two turns produced an identical selected reply; the second send was
    /// suppressed.
    DuplicateSuppressed { thread_id: ThreadId },
    /// `routing_attempts >= 3` within one turn; the supervisor picked a
    /// fallback role instead of looping further.
    RoutingLoop { thread_id: ThreadId, attempts: u8 },
    /// The graph runtime's per-turn step bound was hit; it short-circuited
    /// to the responder with `should_end = true`.
    StepBudgetExceeded { thread_id: ThreadId, steps: u32 },
    /// A specialist escalated because the external generator timed out or
    /// returned a protocol error.
    GeneratorError { thread_id: ThreadId, reason: EscalationReason },
    /// The CRM send at turn end failed; `message_sent` stays `false` and
    /// there is no resend within this turn.
    SendFailure { thread_id: ThreadId, reason: String },
    /// A specialist escalated back to the supervisor within the turn.
    Escalation {
        thread_id: ThreadId,
        from: SpecialistRole,
        reason: EscalationReason,
    },
}

impl RouterEvent {
    /// Stable name for structured logging and metrics labeling.
    pub fn name(&self) -> &'static str {
        match self {
            RouterEvent::ScoreUnchanged { .. } => "score_unchanged",
            RouterEvent::DuplicateSuppressed { .. } => "duplicate_suppressed",
            RouterEvent::RoutingLoop { .. } => "routing_loop",
            RouterEvent::StepBudgetExceeded { .. } => "step_budget_exceeded",
            RouterEvent::GeneratorError { .. } => "generator_error",
            RouterEvent::SendFailure { .. } => "send_failure",
            RouterEvent::Escalation { .. } => "escalation",
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        match self {
            RouterEvent::ScoreUnchanged { thread_id }
            | RouterEvent::DuplicateSuppressed { thread_id }
            | RouterEvent::RoutingLoop { thread_id, .. }
            | RouterEvent::StepBudgetExceeded { thread_id, .. }
            | RouterEvent::GeneratorError { thread_id, .. }
            | RouterEvent::SendFailure { thread_id, .. }
            | RouterEvent::Escalation { thread_id, .. } => thread_id,
        }
    }
}
