use std::time::Duration;

const THINKING_BASE: f64 = 0.8;
const CHARS_PER_SEC: f64 = 35.0;
const MIN_DELAY: f64 = 1.2;
const MAX_DELAY: f64 = 4.5;
const QUESTION_BONUS: f64 = 0.5;
const LONG_MESSAGE_BONUS: f64 = 0.7;
const LONG_MESSAGE_WORD_COUNT: usize = 20;

/// Inter-part delay multiplier for a split message's later parts — the
/// "thinking" component only applies once.
const SPLIT_DELAY_FACTOR: f64 = 0.6;

/// Simulated typing delay before sending `content`. Deliberately
/// deterministic — one fixed rate for every role, no per-persona jitter —
/// so delays stay reproducible against fixed scenario bounds.
pub fn delay_for(content: &str) -> Duration {
    let len = content.chars().count() as f64;
    let word_count = content.split_whitespace().count();

    let mut seconds = THINKING_BASE + len / CHARS_PER_SEC;
    if content.contains('?') {
        seconds += QUESTION_BONUS;
    }
    if word_count > LONG_MESSAGE_WORD_COUNT {
        seconds += LONG_MESSAGE_BONUS;
    }

    let clamped = seconds.clamp(MIN_DELAY, MAX_DELAY);
    Duration::from_secs_f64(clamped)
}

/// Shortened delay used between parts of a blank-line-split message.
pub fn split_delay_for(content: &str) -> Duration {
    Duration::from_secs_f64(delay_for(content).as_secs_f64() * SPLIT_DELAY_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_hits_the_floor() {
        assert_eq!(delay_for("ok").as_secs_f64(), MIN_DELAY);
    }

    #[test]
    fn question_mark_adds_bonus() {
        let plain = delay_for("cuantos empleados tienes").as_secs_f64();
        let question = delay_for("cuantos empleados tienes?").as_secs_f64();
        assert!(question > plain);
    }

    #[test]
    fn very_long_message_hits_the_ceiling() {
        let long = "a".repeat(500);
        assert_eq!(delay_for(&long).as_secs_f64(), MAX_DELAY);
    }

    #[test]
    fn split_delay_is_shorter() {
        let content = "hola, soy tu agente";
        assert!(split_delay_for(content) < delay_for(content));
    }
}
