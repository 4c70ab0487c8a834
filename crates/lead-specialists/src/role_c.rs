use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use tracing::{instrument, warn};

use lead_core::types::{ConversationState, EscalationReason, SpecialistRole};
use lead_crm::types::AppointmentRequest;
use lead_crm::CrmClient;
use lead_graph::{Node, StatePatch};
use lead_llm::{GenerationRequest, Generator, GeneratorMessage, GeneratorRole};

use crate::prompts;
use crate::role_a::last_customer_message;
use crate::time_parse::{self, ParsedTime};

const APPOINTMENT_DURATION_MINUTES: i64 = 30;
const SLOT_WINDOW_DAYS: i64 = 7;
const SLOTS_OFFERED: usize = 3;

/// Closing — hot leads (score 8..10). Assumes the lead is qualified: asks
/// for an email if missing, otherwise either books a time the customer
/// just confirmed or offers a short list of concrete free slots.
pub struct RoleC {
    generator: Arc<dyn Generator>,
    crm: Arc<dyn CrmClient>,
    calendar_id: String,
    tz_offset_hours: i32,
}

impl RoleC {
    pub fn new(
        generator: Arc<dyn Generator>,
        crm: Arc<dyn CrmClient>,
        calendar_id: String,
        tz_offset_hours: i32,
    ) -> Self {
        Self {
            generator,
            crm,
            calendar_id,
            tz_offset_hours,
        }
    }

    fn now_local(&self) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.tz_offset_hours * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Utc::now().with_timezone(&offset)
    }
}

#[async_trait]
impl Node for RoleC {
    fn role(&self) -> SpecialistRole {
        SpecialistRole::C
    }

    #[instrument(skip(self, state), fields(thread_id = %state.thread_id))]
    async fn run(&self, state: &ConversationState) -> StatePatch {
        if !(8..=10).contains(&state.lead_score) {
            return StatePatch::Escalate(EscalationReason::WrongAgent);
        }

        let Some(last_customer) = last_customer_message(state) else {
            return StatePatch::Error;
        };

        if state.extracted_data.email.is_none() {
            return self.ask_for_email(&last_customer).await;
        }

        let now = self.now_local();
        match time_parse::parse(&last_customer, now) {
            ParsedTime::At(dt) => self.book_if_available(state, dt).await,
            ParsedTime::Unrecognized => self.offer_slots(now).await,
        }
    }
}

impl RoleC {
    async fn ask_for_email(&self, last_customer: &str) -> StatePatch {
        let system_prompt = format!(
            "{}\n\nTodavía no tienes el correo del cliente; pídelo antes de ofrecer horarios.",
            prompts::CLOSING
        );
        let request = GenerationRequest {
            system_prompt,
            messages: vec![GeneratorMessage {
                role: GeneratorRole::User,
                content: last_customer.to_string(),
            }],
            max_tokens: 200,
        };
        match self.generator.generate(request).await {
            Ok(result) => StatePatch::Reply(result.reply_text),
            Err(e) => {
                warn!(error = %e, "generator error asking for email");
                StatePatch::Escalate(EscalationReason::Error)
            }
        }
    }

    async fn offer_slots(&self, now: DateTime<FixedOffset>) -> StatePatch {
        let window_start = now.with_timezone(&Utc);
        let window_end = window_start + ChronoDuration::days(SLOT_WINDOW_DAYS);
        let tz_label = format!("UTC{:+03}:00", self.tz_offset_hours);

        match self
            .crm
            .list_free_slots(&self.calendar_id, window_start, window_end, &tz_label)
            .await
        {
            Ok(slots) => {
                let offered: Vec<_> = slots.into_iter().take(SLOTS_OFFERED).collect();
                if offered.is_empty() {
                    return StatePatch::Reply(
                        "No encuentro horarios disponibles esta semana. ¿Buscamos la próxima?".to_string(),
                    );
                }
                let options = offered
                    .iter()
                    .map(|slot| format!("- {}", format_slot(slot.start, self.tz_offset_hours)))
                    .collect::<Vec<_>>()
                    .join("\n");
                StatePatch::Reply(format!(
                    "Tengo estos horarios disponibles:\n{}\n¿Cuál te queda mejor?",
                    options
                ))
            }
            Err(e) => {
                warn!(error = %e, "crm list_free_slots failed");
                StatePatch::Escalate(EscalationReason::Error)
            }
        }
    }

    /// Confirms `start_local` still falls inside a slot the CRM reports free
    /// before booking it — a customer-named time is a request, not a fact.
    async fn book_if_available(&self, state: &ConversationState, start_local: DateTime<FixedOffset>) -> StatePatch {
        let start = start_local.with_timezone(&Utc);
        let end = start + ChronoDuration::minutes(APPOINTMENT_DURATION_MINUTES);
        let tz_label = format!("UTC{:+03}:00", self.tz_offset_hours);

        let slots = match self
            .crm
            .list_free_slots(&self.calendar_id, start, end, &tz_label)
            .await
        {
            Ok(slots) => slots,
            Err(e) => {
                warn!(error = %e, "crm list_free_slots failed");
                return StatePatch::Escalate(EscalationReason::Error);
            }
        };

        if slots.iter().any(|slot| slot.start <= start && start < slot.end) {
            self.book(state, start).await
        } else {
            StatePatch::Reply(
                "Ese horario ya no está disponible. ¿Buscamos otra hora de la semana?".to_string(),
            )
        }
    }

    async fn book(&self, state: &ConversationState, start: DateTime<Utc>) -> StatePatch {
        let end = start + ChronoDuration::minutes(APPOINTMENT_DURATION_MINUTES);
        let contact_name = state.extracted_data.name.as_deref().unwrap_or("cliente");

        let request = AppointmentRequest {
            contact_id: state.contact_id.clone(),
            start,
            end,
            title: format!("Llamada de descubrimiento con {}", contact_name),
            meeting_type: "discovery_call".to_string(),
        };

        match self.crm.create_appointment(request).await {
            Ok(_handle) => StatePatch::BookingConfirmed(format!(
                "¡Listo! Quedó agendada tu cita para {}.",
                format_slot(start, self.tz_offset_hours)
            )),
            Err(e) => {
                warn!(error = %e, "crm create_appointment failed");
                StatePatch::Escalate(EscalationReason::Error)
            }
        }
    }
}

fn format_slot(start_utc: DateTime<Utc>, tz_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(tz_offset_hours * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let local = start_utc.with_timezone(&offset);
    use chrono::{Datelike, Timelike};
    format!(
        "{} {} de {} a las {:02}:{:02}",
        spanish_weekday(local.weekday()),
        local.day(),
        spanish_month(local.month()),
        local.hour(),
        local.minute(),
    )
}

fn spanish_weekday(w: chrono::Weekday) -> &'static str {
    match w {
        chrono::Weekday::Mon => "lunes",
        chrono::Weekday::Tue => "martes",
        chrono::Weekday::Wed => "miércoles",
        chrono::Weekday::Thu => "jueves",
        chrono::Weekday::Fri => "viernes",
        chrono::Weekday::Sat => "sábado",
        chrono::Weekday::Sun => "domingo",
    }
}

fn spanish_month(m: u32) -> &'static str {
    const MONTHS: [&str; 12] = [
        "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
        "octubre", "noviembre", "diciembre",
    ];
    MONTHS[(m.saturating_sub(1) as usize).min(11)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lead_core::types::{ContactId, ConversationId, ExtractedData, Message, MessageOrigin, ThreadId};
    use lead_crm::error::Result as CrmResult;
    use lead_crm::types::{
        AppointmentHandle, Contact, ContactUpdate, Conversation, CrmMessage, Note, SentMessageHandle, Slot,
    };
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

    struct FakeCrm {
        slots: Vec<Slot>,
    }

    #[async_trait]
    impl CrmClient for FakeCrm {
        async fn get_contact(&self, _contact_id: &ContactId) -> CrmResult<Contact> {
            unimplemented!()
        }
        async fn update_contact(&self, _contact_id: &ContactId, _fields: ContactUpdate) -> CrmResult<Contact> {
            unimplemented!()
        }
        async fn add_note(&self, _contact_id: &ContactId, _body: &str) -> CrmResult<Note> {
            unimplemented!()
        }
        async fn list_conversations(&self, _contact_id: &ContactId) -> CrmResult<Vec<Conversation>> {
            unimplemented!()
        }
        async fn list_messages(&self, _conversation_id: &ConversationId, _limit: usize) -> CrmResult<Vec<CrmMessage>> {
            unimplemented!()
        }
        async fn send_message(
            &self,
            _contact_id: &ContactId,
            _body: &str,
            _channel: lead_crm::types::Channel,
        ) -> CrmResult<SentMessageHandle> {
            unimplemented!()
        }
        async fn list_free_slots(
            &self,
            _calendar_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _tz: &str,
        ) -> CrmResult<Vec<Slot>> {
            Ok(self.slots.clone())
        }
        async fn create_appointment(&self, _request: AppointmentRequest) -> CrmResult<AppointmentHandle> {
            Ok(AppointmentHandle {
                appointment_id: "appt-1".to_string(),
            })
        }
    }

    fn base_state() -> ConversationState {
        let mut s = ConversationState::new(ThreadId("t".into()), ContactId::from("c1"));
        s.lead_score = 9;
        s.extracted_data = ExtractedData {
            email: Some("a@b.com".into()),
            name: Some("Diego".into()),
            ..Default::default()
        };
        s
    }

    #[tokio::test]
    async fn escalates_wrong_agent_outside_score_band() {
        let role = RoleC::new(Arc::new(FixedReply("ok")), Arc::new(FakeCrm { slots: vec![] }), "cal1".into(), 0);
        let mut state = base_state();
        state.lead_score = 3;
        assert_eq!(
            role.run(&state).await,
            StatePatch::Escalate(EscalationReason::WrongAgent)
        );
    }

    #[tokio::test]
    async fn asks_for_email_when_missing() {
        let role = RoleC::new(
            Arc::new(FixedReply("¿cuál es tu correo?")),
            Arc::new(FakeCrm { slots: vec![] }),
            "cal1".into(),
            0,
        );
        let mut state = base_state();
        state.extracted_data.email = None;
        state
            .messages
            .push(Message::customer("quiero agendar", MessageOrigin::Webhook));
        assert_eq!(
            role.run(&state).await,
            StatePatch::Reply("¿cuál es tu correo?".to_string())
        );
    }

    #[tokio::test]
    async fn offers_slots_when_no_time_named() {
        let slot = Slot {
            start: Utc::now() + ChronoDuration::days(1),
            end: Utc::now() + ChronoDuration::days(1) + ChronoDuration::minutes(30),
        };
        let role = RoleC::new(
            Arc::new(FixedReply("unused")),
            Arc::new(FakeCrm { slots: vec![slot] }),
            "cal1".into(),
            0,
        );
        let mut state = base_state();
        state
            .messages
            .push(Message::customer("quiero agendar una cita", MessageOrigin::Webhook));
        match role.run(&state).await {
            StatePatch::Reply(text) => assert!(text.contains("horarios")),
            other => panic!("expected a slot offer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn books_when_named_time_matches_a_free_slot() {
        let tomorrow_3pm = (Utc::now() + ChronoDuration::days(1))
            .date_naive()
            .and_hms_opt(15, 0, 0)
            .unwrap()
            .and_utc();
        let slot = Slot {
            start: tomorrow_3pm,
            end: tomorrow_3pm + ChronoDuration::minutes(30),
        };
        let role = RoleC::new(
            Arc::new(FixedReply("unused")),
            Arc::new(FakeCrm { slots: vec![slot] }),
            "cal1".into(),
            0,
        );
        let mut state = base_state();
        state
            .messages
            .push(Message::customer("mañana a las 3pm está bien", MessageOrigin::Webhook));
        match role.run(&state).await {
            StatePatch::BookingConfirmed(text) => assert!(text.contains("cita")),
            other => panic!("expected a booking confirmation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn asks_for_another_time_when_named_time_has_no_matching_slot() {
        let role = RoleC::new(
            Arc::new(FixedReply("unused")),
            Arc::new(FakeCrm { slots: vec![] }),
            "cal1".into(),
            0,
        );
        let mut state = base_state();
        state
            .messages
            .push(Message::customer("mañana a las 3pm está bien", MessageOrigin::Webhook));
        match role.run(&state).await {
            StatePatch::Reply(text) => assert!(text.contains("disponible")),
            other => panic!("expected a clarification reply, got {other:?}"),
        }
    }
}
