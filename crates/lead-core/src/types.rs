use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier for the durable conversation scope.
///
/// Derived deterministically by [`ThreadId::derive`] — never generated
/// randomly, so the same logical conversation always maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// `conv-<conversation_id>` when the CRM supplied one, else
    /// `contact-<contact_id>`. Stable across all messages of one conversation.
    pub fn derive(contact_id: &ContactId, conversation_id: Option<&ConversationId>) -> Self {
        match conversation_id {
            Some(cid) => Self(format!("conv-{}", cid.0)),
            None => Self(format!("contact-{}", contact_id.0)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(ContactId);
opaque_id!(ConversationId);
opaque_id!(LocationId);
opaque_id!(CrmMessageId);

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Customer,
    Agent,
    System,
}

/// Where a [`Message`] entered the conversation log from.
///
/// Used by the reconciler to decide precedence and by tests to assert
/// provenance without re-deriving it from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Webhook,
    CrmHistory,
    Checkpoint,
    Specialist,
    SystemNote,
}

/// The three specialist roles, in escalation order A -> B -> C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistRole {
    /// Discovery — cold leads, score 0..4.
    A,
    /// Qualification — warm leads, score 5..7.
    B,
    /// Closing / appointment booking — hot leads, score 8..10.
    C,
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialistRole::A => write!(f, "A"),
            SpecialistRole::B => write!(f, "B"),
            SpecialistRole::C => write!(f, "C"),
        }
    }
}

/// Lead category derived from `lead_score` at read time. Never stored —
/// always computed from `lead_score` so the two can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadCategory {
    Cold,
    Warm,
    Hot,
}

impl LeadCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => LeadCategory::Cold,
            5..=7 => LeadCategory::Warm,
            _ => LeadCategory::Hot,
        }
    }

    pub fn suggested_agent(self) -> SpecialistRole {
        match self {
            LeadCategory::Cold => SpecialistRole::A,
            LeadCategory::Warm => SpecialistRole::B,
            LeadCategory::Hot => SpecialistRole::C,
        }
    }
}

/// A single entry in a conversation's message log.
///
/// Never mutated in place once appended — replaced only via the
/// reconciler's deduplication pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    /// Set when `role == Agent`; identifies which specialist produced it.
    pub agent_name: Option<SpecialistRole>,
    pub content: String,
    pub crm_message_id: Option<CrmMessageId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: MessageOrigin,
}

impl Message {
    pub fn customer(content: impl Into<String>, origin: MessageOrigin) -> Self {
        Self {
            role: MessageRole::Customer,
            agent_name: None,
            content: content.into(),
            crm_message_id: None,
            timestamp: None,
            origin,
        }
    }

    pub fn from_agent(role: SpecialistRole, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Agent,
            agent_name: Some(role),
            content: content.into(),
            crm_message_id: None,
            timestamp: None,
            origin: MessageOrigin::Specialist,
        }
    }

    /// Case-insensitive, trimmed content used as half of the dedup key.
    pub fn normalized_content(&self) -> String {
        self.content.trim().to_lowercase()
    }

    /// Equivalence key the reconciler deduplicates on: role + normalized
    /// content. `crm_message_id` deliberately does not participate — a
    /// webhook-origin message never carries one, so keying on it would let
    /// an inbound echo of an already-seen message slip past dedup (spec §8
    /// scenario F: a webhook repeat of the last customer message, with no
    /// id at all, must still collapse into the existing entry).
    pub fn dedup_key(&self) -> (MessageRole, String) {
        (self.role, self.normalized_content())
    }
}

/// Structured fields extracted from free Spanish text. Values are sticky —
/// once set, a later turn may only overwrite with a new high-confidence
/// extraction; they are never cleared to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub name: Option<String>,
    pub business_type: Option<String>,
    pub budget: Option<String>,
    pub goal: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ExtractedData {
    pub fn has_all_of(&self, fields: &[&str]) -> bool {
        fields.iter().all(|f| self.get(f).is_some())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "name" => self.name.as_deref(),
            "business_type" => self.business_type.as_deref(),
            "budget" => self.budget.as_deref(),
            "goal" => self.goal.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            _ => None,
        }
    }
}

/// One append-only entry in `score_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub score: u8,
    pub previous_score: u8,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Reason a specialist hands a turn back to the supervisor within the
/// same turn, per §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    WrongAgent,
    NeedsQualification,
    NeedsAppointment,
    CustomerConfused,
    Error,
}

/// Transient routing output of the supervisor for the current turn. Not
/// persisted between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub next_agent: SpecialistRole,
    pub task_description: String,
    pub reason: String,
    pub score_at_decision: u8,
}

/// The durable unit written to the checkpoint store at turn end, keyed by
/// `thread_id`. See spec §3 for the field-by-field invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,
    pub contact_id: ContactId,
    pub conversation_id: Option<ConversationId>,
    pub location_id: Option<LocationId>,
    pub messages: Vec<Message>,
    pub extracted_data: ExtractedData,
    /// Integer in [0,10]. Monotonic non-decreasing across turns of the
    /// same thread — a turn may only raise or keep it.
    pub lead_score: u8,
    pub score_history: Vec<ScoreHistoryEntry>,
    pub current_agent: Option<SpecialistRole>,
    pub next_agent: Option<SpecialistRole>,
    pub agent_task: Option<String>,
    /// Supervisor<->specialist round trips within the current turn. Bounded <= 3.
    pub routing_attempts: u8,
    pub needs_rerouting: bool,
    pub needs_escalation: bool,
    pub escalation_reason: Option<EscalationReason>,
    pub should_end: bool,
    pub last_sent_message: Option<String>,
    pub message_sent: bool,
}

impl ConversationState {
    pub fn new(thread_id: ThreadId, contact_id: ContactId) -> Self {
        Self {
            thread_id,
            contact_id,
            conversation_id: None,
            location_id: None,
            messages: Vec::new(),
            extracted_data: ExtractedData::default(),
            lead_score: 0,
            score_history: Vec::new(),
            current_agent: None,
            next_agent: None,
            agent_task: None,
            routing_attempts: 0,
            needs_rerouting: false,
            needs_escalation: false,
            escalation_reason: None,
            should_end: false,
            last_sent_message: None,
            message_sent: false,
        }
    }

    /// Clears the transient, turn-scoped fields at the start of a new turn.
    /// Persisted fields (messages, extracted_data, lead_score, score_history,
    /// last_sent_message) are untouched.
    pub fn start_turn(&mut self) {
        self.current_agent = None;
        self.next_agent = None;
        self.agent_task = None;
        self.routing_attempts = 0;
        self.needs_rerouting = false;
        self.needs_escalation = false;
        self.escalation_reason = None;
        self.should_end = false;
    }

    pub fn lead_category(&self) -> LeadCategory {
        LeadCategory::from_score(self.lead_score)
    }
}
