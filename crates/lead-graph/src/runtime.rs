use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use lead_checkpoint::CheckpointStore;
use lead_core::types::{
    ContactId, ConversationId, ConversationState, LocationId, Message, MessageRole, SpecialistRole, ThreadId,
};
use lead_core::{Result, RouterError};
use lead_crm::types::Channel;
use lead_crm::CrmClient;
use lead_events::{EventBus, RouterEvent};
use lead_intelligence::IntelligenceOutcome;

use crate::node::{Node, StatePatch};
use crate::supervisor::{self, MAX_ROUTING_ATTEMPTS};

/// Node-entry bound per turn, per spec §4.7.
pub const STEP_BOUND: u32 = 12;
/// Soft turn deadline, per spec §5. On expiry the turn is discarded and no
/// checkpoint is written.
const TURN_DEADLINE: Duration = Duration::from_secs(60);
/// Cap on CRM history fetched by the reconciler, per spec §4.3.
const CRM_HISTORY_LIMIT: usize = 50;

/// The webhook-derived record the core actually needs, per spec §6.
pub struct InboundMessage {
    pub contact_id: ContactId,
    pub conversation_id: Option<ConversationId>,
    pub location_id: Option<LocationId>,
    pub body: String,
}

/// Everything the runtime needs, constructed once at startup and shared
/// across turns. `specialists`
/// is indexed by [`SpecialistRole`] via [`RuntimeConfig::node_for`].
pub struct RuntimeConfig {
    pub crm: Arc<dyn CrmClient>,
    pub checkpoint: Arc<dyn CheckpointStore>,
    pub events: Arc<EventBus>,
    pub specialists: [Arc<dyn Node>; 3],
    pub channel: Channel,
}

impl RuntimeConfig {
    fn node_for(&self, role: SpecialistRole) -> &Arc<dyn Node> {
        match role {
            SpecialistRole::A => &self.specialists[0],
            SpecialistRole::B => &self.specialists[1],
            SpecialistRole::C => &self.specialists[2],
        }
    }
}

/// Fixed-DAG turn executor, per spec §4.7: reconciler -> intelligence ->
/// supervisor -> {A|B|C} -> responder, with a supervisor back-edge guarded
/// by `needs_rerouting || needs_escalation` and `routing_attempts < 3`.
///
/// Turns for the same `thread_id` are serialized by `locks`; turns for
/// different `thread_id`s run fully in parallel, via a per-thread-id
/// `DashMap` of async mutexes.
pub struct GraphRuntime {
    config: RuntimeConfig,
    locks: DashMap<ThreadId, Arc<AsyncMutex<()>>>,
}

impl GraphRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            locks: DashMap::new(),
        }
    }

    #[instrument(skip(self, inbound), fields(contact_id = %inbound.contact_id))]
    pub async fn handle_turn(&self, inbound: InboundMessage) -> Result<()> {
        let thread_id = ThreadId::derive(&inbound.contact_id, inbound.conversation_id.as_ref());
        let lock = self
            .locks
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        match tokio::time::timeout(TURN_DEADLINE, self.run_turn(thread_id.clone(), inbound)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(thread_id = %thread_id, "turn exceeded deadline, discarded without checkpoint write");
                Err(RouterError::Cancelled)
            }
        }
    }

    async fn run_turn(&self, thread_id: ThreadId, inbound: InboundMessage) -> Result<()> {
        let mut state = self
            .config
            .checkpoint
            .load(&thread_id)
            .await
            .map_err(RouterError::from)?
            .unwrap_or_else(|| ConversationState::new(thread_id.clone(), inbound.contact_id.clone()));

        state.start_turn();
        if state.conversation_id.is_none() {
            state.conversation_id = inbound.conversation_id.clone();
        }
        if state.location_id.is_none() {
            state.location_id = inbound.location_id.clone();
        }

        self.reconcile(&mut state, &inbound).await;
        self.run_intelligence(&mut state, &inbound.body);
        self.run_routing_loop(&mut state).await;
        lead_responder::respond(&*self.config.crm, &mut state, self.config.channel, &self.config.events).await;

        self.config
            .checkpoint
            .save(&thread_id, &state)
            .await
            .map_err(RouterError::from)?;
        Ok(())
    }

    /// Fetches CRM history only when the checkpoint had nothing and a
    /// `conversation_id` is known, per spec §4.3. A fetch failure degrades
    /// to an empty history rather than failing the turn — the reconciler
    /// still has the inbound message to work with.
    async fn reconcile(&self, state: &mut ConversationState, inbound: &InboundMessage) {
        let crm_history = if state.messages.is_empty() {
            match &inbound.conversation_id {
                Some(conversation_id) => match self.config.crm.list_messages(conversation_id, CRM_HISTORY_LIMIT).await {
                    Ok(history) => Some(history),
                    Err(e) => {
                        warn!(error = %e, thread_id = %state.thread_id, "crm history fetch failed, continuing without it");
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };

        state.messages = lead_reconcile::reconcile(&state.messages, crm_history.as_deref(), &inbound.body);
    }

    fn run_intelligence(&self, state: &mut ConversationState, inbound_body: &str) {
        let previous_agent_message = state
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Agent)
            .map(|m| m.content.clone());

        match lead_intelligence::analyze(state, inbound_body, previous_agent_message.as_deref()) {
            IntelligenceOutcome::Updated { extraction, score } => {
                lead_intelligence::extractor::merge(&mut state.extracted_data, &extraction);
                if let Some(entry) = lead_intelligence::scorer::history_entry(&score, state.lead_score) {
                    state.score_history.push(entry);
                }
                state.lead_score = score.score;
            }
            IntelligenceOutcome::ScoreUnchanged => {
                self.config.events.emit(RouterEvent::ScoreUnchanged {
                    thread_id: state.thread_id.clone(),
                });
            }
        }
    }

    /// Runs the supervisor -> specialist back-edge loop until a specialist
    /// produces a reply/booking, an error, or a bound is hit.
    async fn run_routing_loop(&self, state: &mut ConversationState) {
        let mut steps: u32 = 0;

        loop {
            if steps >= STEP_BOUND {
                self.config.events.emit(RouterEvent::StepBudgetExceeded {
                    thread_id: state.thread_id.clone(),
                    steps,
                });
                state.should_end = true;
                return;
            }

            let decision = supervisor::decide(state);
            state.current_agent = Some(decision.next_agent);
            state.next_agent = Some(decision.next_agent);
            state.agent_task = Some(decision.task_description.clone());

            let node = self.config.node_for(decision.next_agent);
            let patch = node.run(state).await;
            steps += 1;

            match patch {
                StatePatch::Reply(content) => {
                    state.messages.push(Message::from_agent(decision.next_agent, content));
                    state.needs_rerouting = false;
                    state.needs_escalation = false;
                    return;
                }
                StatePatch::BookingConfirmed(content) => {
                    state.messages.push(Message::from_agent(decision.next_agent, content));
                    state.should_end = true;
                    return;
                }
                StatePatch::Escalate(reason) => {
                    // §7: a generator_error at role A has nowhere left to
                    // fall back to — the turn ends without a reply rather
                    // than looping the supervisor back onto A again.
                    if reason == lead_core::types::EscalationReason::Error
                        && state.current_agent == Some(SpecialistRole::A)
                    {
                        state.should_end = true;
                        return;
                    }

                    state.escalation_reason = Some(reason);
                    state.needs_escalation = true;
                    state.needs_rerouting = true;
                    state.routing_attempts += 1;

                    if state.routing_attempts >= MAX_ROUTING_ATTEMPTS {
                        self.config.events.emit(RouterEvent::RoutingLoop {
                            thread_id: state.thread_id.clone(),
                            attempts: state.routing_attempts,
                        });
                    }
                }
                StatePatch::Error => return,
            }
        }
    }
}
