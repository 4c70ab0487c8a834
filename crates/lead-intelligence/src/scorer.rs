use chrono::Utc;

use lead_core::types::{ExtractedData, ScoreHistoryEntry};

/// Floor applied to the score the turn a budget is confirmed, per §4.4.
const BUDGET_CONFIRMED_FLOOR: u8 = 6;

/// Minimum explicit amount that earns the higher budget bonus.
const HIGH_VALUE_BUDGET_THRESHOLD: u32 = 300;

/// Message-count threshold for the engagement bonus.
const ENGAGEMENT_MESSAGE_COUNT: usize = 10;

/// Result of one turn's scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: u8,
    pub changed: bool,
    pub reason: String,
}

/// True only for a bare explicit amount (all ASCII digits, e.g. `"300"`) —
/// approximate (`"~300"`), range (`"300-500"`), minimum (`"300+"`), and
/// maximum (`"≤500"`) forms all earn the ordinary `+1` instead, since the
/// customer never committed to a specific number in those phrasings.
pub fn budget_is_high_value(budget: &str) -> bool {
    budget
        .chars()
        .all(|c| c.is_ascii_digit())
        .then(|| budget.parse::<u32>().ok())
        .flatten()
        .map(|n| n >= HIGH_VALUE_BUDGET_THRESHOLD)
        .unwrap_or(false)
}

/// Additive 0..10 scorer per §4.4: base 1, +1 name, +2 business_type,
/// +1 goal, +1 budget (+3 instead if explicit and >= $300), +1 email
/// (when present and not the literal `"none"`), +1 engagement bonus past
/// [`ENGAGEMENT_MESSAGE_COUNT`] messages. Monotonically clamped against
/// `previous_score`, then floored at [`BUDGET_CONFIRMED_FLOOR`] when a
/// budget was confirmed this turn.
pub fn compute_score(
    extracted: &ExtractedData,
    message_count: usize,
    previous_score: u8,
    budget_confirmed_this_turn: bool,
) -> ScoreResult {
    let mut total: u32 = 1;
    let mut parts = vec!["base(+1)".to_string()];

    if extracted.name.is_some() {
        total += 1;
        parts.push("name(+1)".to_string());
    }
    if extracted.business_type.is_some() {
        total += 2;
        parts.push("business_type(+2)".to_string());
    }
    if extracted.goal.is_some() {
        total += 1;
        parts.push("goal(+1)".to_string());
    }
    if let Some(budget) = extracted.budget.as_deref() {
        if budget_is_high_value(budget) {
            total += 3;
            parts.push("budget>=300(+3)".to_string());
        } else {
            total += 1;
            parts.push("budget(+1)".to_string());
        }
    }
    if extracted
        .email
        .as_deref()
        .is_some_and(|e| !e.eq_ignore_ascii_case("none"))
    {
        total += 1;
        parts.push("email(+1)".to_string());
    }
    if message_count > ENGAGEMENT_MESSAGE_COUNT {
        total += 1;
        parts.push("engagement(+1)".to_string());
    }

    let total = (total.min(10)) as u8;
    let mut score = total.max(previous_score);

    if budget_confirmed_this_turn && score < BUDGET_CONFIRMED_FLOOR {
        score = BUDGET_CONFIRMED_FLOOR;
        parts.push(format!("budget_confirmed_floor({})", BUDGET_CONFIRMED_FLOOR));
    }

    ScoreResult {
        score,
        changed: score != previous_score,
        reason: parts.join(", "),
    }
}

/// Appends a [`ScoreHistoryEntry`] only when the score actually moved —
/// the history is a change log, not a per-turn snapshot.
pub fn history_entry(result: &ScoreResult, previous_score: u8) -> Option<ScoreHistoryEntry> {
    result.changed.then(|| ScoreHistoryEntry {
        score: result.score,
        previous_score,
        timestamp: Utc::now(),
        reason: result.reason.clone(),
    })
}
