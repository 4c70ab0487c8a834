use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lead_checkpoint::CheckpointStore;
use lead_core::types::{
    ContactId, ConversationId, ConversationState, EscalationReason, SpecialistRole, ThreadId,
};
use lead_crm::types::{
    AppointmentHandle, AppointmentRequest, Channel, Contact, ContactUpdate, Conversation, CrmMessage, Note,
    SentMessageHandle, Slot,
};
use lead_crm::{CrmClient, CrmError};
use lead_events::EventBus;
use lead_graph::{GraphRuntime, InboundMessage, Node, RuntimeConfig, StatePatch};

/// Records every `send_message` call; every other operation is a
/// not-exercised stub, per spec's scope for this runtime's test surface.
#[derive(Default)]
struct FakeCrm {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn get_contact(&self, contact_id: &ContactId) -> lead_crm::Result<Contact> {
        Ok(Contact {
            id: contact_id.clone(),
            name: None,
            email: None,
            phone: None,
            custom_fields: HashMap::new(),
            tags: Vec::new(),
        })
    }

    async fn update_contact(&self, contact_id: &ContactId, _fields: ContactUpdate) -> lead_crm::Result<Contact> {
        self.get_contact(contact_id).await
    }

    async fn add_note(&self, _contact_id: &ContactId, body: &str) -> lead_crm::Result<Note> {
        Ok(Note {
            id: "n1".to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn list_conversations(&self, _contact_id: &ContactId) -> lead_crm::Result<Vec<Conversation>> {
        Ok(Vec::new())
    }

    async fn list_messages(&self, _conversation_id: &ConversationId, _limit: usize) -> lead_crm::Result<Vec<CrmMessage>> {
        Ok(Vec::new())
    }

    async fn send_message(&self, _contact_id: &ContactId, body: &str, _channel: Channel) -> lead_crm::Result<SentMessageHandle> {
        self.sent.lock().unwrap().push(body.to_string());
        Ok(SentMessageHandle {
            message_id: "m1".to_string(),
        })
    }

    async fn list_free_slots(
        &self,
        _calendar_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _tz: &str,
    ) -> lead_crm::Result<Vec<Slot>> {
        Ok(Vec::new())
    }

    async fn create_appointment(&self, _request: AppointmentRequest) -> lead_crm::Result<AppointmentHandle> {
        Err(CrmError::Permanent("not exercised in these tests".to_string()))
    }
}

#[derive(Default)]
struct FakeCheckpoint {
    states: Mutex<HashMap<ThreadId, ConversationState>>,
}

#[async_trait]
impl CheckpointStore for FakeCheckpoint {
    async fn load(&self, thread_id: &ThreadId) -> lead_checkpoint::Result<Option<ConversationState>> {
        Ok(self.states.lock().unwrap().get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> lead_checkpoint::Result<()> {
        self.states.lock().unwrap().insert(thread_id.clone(), state.clone());
        Ok(())
    }
}

/// Always replies with a fixed string, tagged with `role`.
struct RepliesWith {
    role: SpecialistRole,
    text: &'static str,
}

#[async_trait]
impl Node for RepliesWith {
    fn role(&self) -> SpecialistRole {
        self.role
    }

    async fn run(&self, _state: &ConversationState) -> StatePatch {
        StatePatch::Reply(self.text.to_string())
    }
}

/// Escalates `wrong_agent` on its first three calls, then replies — used
/// to drive the routing-loop bound (spec §8 scenario E) without looping
/// forever the way a genuinely broken specialist would.
struct EscalatesThenReplies {
    role: SpecialistRole,
    calls: AtomicU8,
}

#[async_trait]
impl Node for EscalatesThenReplies {
    fn role(&self) -> SpecialistRole {
        self.role
    }

    async fn run(&self, _state: &ConversationState) -> StatePatch {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= 3 {
            StatePatch::Escalate(EscalationReason::WrongAgent)
        } else {
            StatePatch::Reply("fallback: here's what I have so far".to_string())
        }
    }
}

fn runtime_with(
    crm: Arc<FakeCrm>,
    checkpoint: Arc<FakeCheckpoint>,
    specialists: [Arc<dyn Node>; 3],
) -> GraphRuntime {
    GraphRuntime::new(RuntimeConfig {
        crm,
        checkpoint,
        events: Arc::new(EventBus::new()),
        specialists,
        channel: Channel::WhatsApp,
    })
}

#[tokio::test]
async fn scenario_a_first_message_routes_to_discovery() {
    let crm = Arc::new(FakeCrm::default());
    let checkpoint = Arc::new(FakeCheckpoint::default());
    let specialists: [Arc<dyn Node>; 3] = [
        Arc::new(RepliesWith {
            role: SpecialistRole::A,
            text: "Hola! Cuentame mas de tu restaurante.",
        }),
        Arc::new(RepliesWith {
            role: SpecialistRole::B,
            text: "unused",
        }),
        Arc::new(RepliesWith {
            role: SpecialistRole::C,
            text: "unused",
        }),
    ];
    let runtime = runtime_with(crm.clone(), checkpoint.clone(), specialists);

    let contact_id = ContactId::from("c1");
    runtime
        .handle_turn(InboundMessage {
            contact_id: contact_id.clone(),
            conversation_id: None,
            location_id: None,
            body: "Hola, tengo un restaurante y estoy perdiendo clientes".to_string(),
        })
        .await
        .unwrap();

    let thread_id = ThreadId::derive(&contact_id, None);
    let state = checkpoint.states.lock().unwrap().get(&thread_id).cloned().unwrap();

    assert_eq!(state.extracted_data.business_type.as_deref(), Some("restaurante"));
    assert!(state.lead_score >= 4);
    assert_eq!(state.current_agent, Some(SpecialistRole::A));
    assert_eq!(state.routing_attempts, 0);
    assert_eq!(crm.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_e_routing_loop_bound_falls_back_after_three_attempts() {
    let crm = Arc::new(FakeCrm::default());
    let checkpoint = Arc::new(FakeCheckpoint::default());
    let escalator = Arc::new(EscalatesThenReplies {
        role: SpecialistRole::A,
        calls: AtomicU8::new(0),
    });
    let specialists: [Arc<dyn Node>; 3] = [
        escalator.clone(),
        Arc::new(RepliesWith {
            role: SpecialistRole::B,
            text: "unused",
        }),
        Arc::new(RepliesWith {
            role: SpecialistRole::C,
            text: "unused",
        }),
    ];
    let runtime = runtime_with(crm.clone(), checkpoint.clone(), specialists);

    let contact_id = ContactId::from("c2");
    runtime
        .handle_turn(InboundMessage {
            contact_id: contact_id.clone(),
            conversation_id: None,
            location_id: None,
            body: "hola".to_string(),
        })
        .await
        .unwrap();

    let thread_id = ThreadId::derive(&contact_id, None);
    let state = checkpoint.states.lock().unwrap().get(&thread_id).cloned().unwrap();

    assert_eq!(state.routing_attempts, 3);
    assert_eq!(crm.sent.lock().unwrap().len(), 1);
    assert_eq!(escalator.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn idempotent_send_suppresses_duplicate_reply() {
    let crm = Arc::new(FakeCrm::default());
    let checkpoint = Arc::new(FakeCheckpoint::default());
    let specialists: [Arc<dyn Node>; 3] = [
        Arc::new(RepliesWith {
            role: SpecialistRole::A,
            text: "misma respuesta",
        }),
        Arc::new(RepliesWith {
            role: SpecialistRole::B,
            text: "unused",
        }),
        Arc::new(RepliesWith {
            role: SpecialistRole::C,
            text: "unused",
        }),
    ];
    let runtime = runtime_with(crm.clone(), checkpoint.clone(), specialists);
    let contact_id = ContactId::from("c3");

    for _ in 0..2 {
        runtime
            .handle_turn(InboundMessage {
                contact_id: contact_id.clone(),
                conversation_id: None,
                location_id: None,
                body: "hola".to_string(),
            })
            .await
            .unwrap();
    }

    let thread_id = ThreadId::derive(&contact_id, None);
    let state = checkpoint.states.lock().unwrap().get(&thread_id).cloned().unwrap();

    assert_eq!(crm.sent.lock().unwrap().len(), 1);
    assert!(!state.message_sent);
}
