use once_cell::sync::Lazy;
use regex::Regex;

use lead_core::types::ExtractedData;

/// Minimum confidence required for an extracted value to be accepted.
pub const ACCEPT_THRESHOLD: f32 = 0.7;

/// Generic business nouns that are never accepted as `business_type`,
/// however they are mentioned — the customer has to name an actual kind
/// of business.
const REJECTED_BUSINESS_TERMS: &[&str] = &["negocio", "empresa", "local", "comercio"];

/// Closed business vocabulary: canonical name -> accepted spellings
/// (including the typo variants a Spanish-speaking customer commonly
/// types). The fuzzy fallback matches against every variation, not just
/// the canonical spelling.
const BUSINESS_VOCABULARY: &[(&str, &[&str])] = &[
    ("restaurante", &["restaurante", "restaurant", "resto", "restauran", "restorante", "restarante", "resturante"]),
    ("tienda", &["tienda", "store", "shop", "tiendita", "tieda"]),
    ("salon", &["salon", "salón", "saloon", "peluqueria", "peluquería", "peluqeria"]),
    ("barberia", &["barbería", "barberia", "barber", "barbero"]),
    ("clinica", &["clínica", "clinica", "clinic", "consultorio", "consulta"]),
    ("agencia", &["agencia", "agency", "oficina"]),
    ("hotel", &["hotel", "motel", "hostal", "hospedaje"]),
    ("gym", &["gym", "gimnasio", "fitness", "crossfit", "gimansio"]),
    ("spa", &["spa", "masaje", "masajes"]),
    ("cafe", &["café", "cafe", "cafetería", "cafeteria", "coffee"]),
    ("pizzeria", &["pizzería", "pizzeria", "pizza"]),
    ("panaderia", &["panadería", "panaderia", "bakery", "pan"]),
    ("farmacia", &["farmacia", "pharmacy", "drogueria"]),
    ("bar", &["bar", "cantina", "cerveceria", "cervecería"]),
    ("taller", &["taller", "mecanico", "mecánico", "garage"]),
    ("estetica", &["estética", "estetica", "belleza", "beauty"]),
    ("dentista", &["dentista", "dental", "odontologia", "odontología"]),
];

/// Similarity floor for the fuzzy business-type fallback.
const FUZZY_SIMILARITY_THRESHOLD: f64 = 0.80;

const STOPWORDS: &[&str] = &["si", "sí", "no", "ok", "dale", "claro", "perfecto"];

/// Bare affirmations recognized by the budget-confirmation detector.
pub const AFFIRMATIONS: &[&str] = &["si", "sí", "claro", "ok", "dale", "perfecto"];

static NAME_SOY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:soy|me llamo|mi nombre es)\s+([a-záéíóúñ]+(?:\s+[a-záéíóúñ]+)?)").unwrap()
});
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\(?\d{3}\)?[\s.-]?)?\d{3}[\s.-]?\d{4}\b").unwrap()
});
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}\s*(?:am|pm)?\b").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").unwrap());

static BUDGET_EXPLICIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?(\d{2,6})|(\d{2,6})\s*(?:al mes|mensual(?:es)?|por mes)").unwrap());
static BUDGET_APPROX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:unos|como|m[aá]s o menos)\s+(\d{2,6})").unwrap()
});
static BUDGET_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)entre\s+(\d{2,6})\s+y\s+(\d{2,6})").unwrap());
static BUDGET_MIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2,6})\s*o\s*m[aá]s").unwrap());
static BUDGET_MAX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)hasta\s+(\d{2,6})").unwrap());

static GOAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:necesito|quiero|no puedo|para|estoy)\s+(.+)").unwrap()
});

static BUSINESS_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:tengo un[a]?|mi|en mi|para mi|soy dueñ[oa] de un[a]?|trabajo en un[a]?|negocio de)\s+([a-záéíóúñ]+)",
    )
    .unwrap()
});

/// One field's extraction hit before merging into `ExtractedData`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub value: String,
    pub confidence: f32,
}

/// Output of a single turn's extraction pass, pre-merge. Only fields with
/// `Some` hits whose confidence cleared [`ACCEPT_THRESHOLD`] are present —
/// rejection already happened inside each `extract_*` function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub name: Option<Hit>,
    pub business_type: Option<Hit>,
    pub budget: Option<Hit>,
    pub goal: Option<Hit>,
    pub email: Option<Hit>,
    pub phone: Option<Hit>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.business_type.is_none()
            && self.budget.is_none()
            && self.goal.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }
}

/// Confidence model shared by every field: start at 0.7, adjust for the
/// shape of the match, accept only if the final score clears
/// [`ACCEPT_THRESHOLD`].
fn score(value: &str, word_boundary: bool, strong_context: bool) -> f32 {
    let mut confidence: f32 = 0.7;
    if word_boundary {
        confidence += 0.1;
    }
    if strong_context {
        confidence += 0.15;
    }
    if value.trim().chars().count() < 4 {
        confidence -= 0.2;
    }
    if STOPWORDS.contains(&value.trim().to_lowercase().as_str()) {
        confidence -= 0.3;
    }
    confidence.clamp(0.0, 1.0)
}

fn accept(value: String, word_boundary: bool, strong_context: bool) -> Option<Hit> {
    let confidence = score(&value, word_boundary, strong_context);
    (confidence >= ACCEPT_THRESHOLD).then_some(Hit { value, confidence })
}

/// Extracts the current inbound message's `name`, per spec §4.4.
pub fn extract_name(message: &str) -> Option<Hit> {
    if let Some(caps) = NAME_SOY_RE.captures(message) {
        let value = caps.get(1)?.as_str().trim().to_string();
        return accept(value, true, true);
    }

    // Email-prefix fallback: "john.doe@x.com" -> "john doe".
    if let Some(m) = EMAIL_RE.find(message) {
        let local = m.as_str().split('@').next().unwrap_or_default();
        let guess = local.replace(['.', '_', '+'], " ").trim().to_string();
        if !guess.is_empty() {
            return accept(guess, true, false);
        }
    }

    None
}

/// Extracts `business_type`, rejecting generic nouns and applying the
/// fuzzy-match fallback when nothing in the closed vocabulary matches
/// exactly.
pub fn extract_business_type(message: &str) -> Option<Hit> {
    let lower = message.to_lowercase();

    if let Some(caps) = BUSINESS_CONTEXT_RE.captures(&lower) {
        let candidate = caps.get(1)?.as_str();
        if REJECTED_BUSINESS_TERMS.contains(&candidate) {
            return None;
        }
        if let Some(canonical) = lookup_business(candidate) {
            return accept(canonical, true, true);
        }
    }

    for word in lower.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.len() < 4 || REJECTED_BUSINESS_TERMS.contains(&word) {
            continue;
        }
        if let Some(canonical) = lookup_business(word) {
            return accept(canonical, true, false);
        }
    }

    None
}

/// Exact vocabulary match first, then Jaro-Winkler fuzzy fallback against
/// every known spelling variant.
fn lookup_business(word: &str) -> Option<String> {
    for (canonical, variants) in BUSINESS_VOCABULARY {
        if variants.contains(&word) {
            return Some((*canonical).to_string());
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for (canonical, variants) in BUSINESS_VOCABULARY {
        for variant in *variants {
            let similarity = strsim::jaro_winkler(word, variant);
            if similarity >= FUZZY_SIMILARITY_THRESHOLD
                && best.map(|(_, s)| similarity > s).unwrap_or(true)
            {
                best = Some((canonical, similarity));
            }
        }
    }
    best.map(|(canonical, _)| canonical.to_string())
}

/// Extracts `budget`, rejecting digits that are actually a time-of-day or
/// a date. Stores a plain digit run for an explicit amount, and a suffixed
/// form for approximate/range/minimum/maximum phrasing — see
/// [`crate::scorer::budget_is_high_value`] for why the distinction matters.
pub fn extract_budget(message: &str) -> Option<Hit> {
    let cleaned = TIME_RE.replace_all(message, "");
    let cleaned = DATE_RE.replace_all(&cleaned, "");

    if let Some(caps) = BUDGET_EXPLICIT_RE.captures(&cleaned) {
        let digits = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let had_dollar_sign = caps.get(1).is_some();
        return accept(digits.to_string(), true, had_dollar_sign);
    }

    if let Some(caps) = BUDGET_RANGE_RE.captures(&cleaned) {
        let low = caps.get(1)?.as_str();
        let high = caps.get(2)?.as_str();
        return accept(format!("{}-{}", low, high), true, false);
    }

    if let Some(caps) = BUDGET_MIN_RE.captures(&cleaned) {
        let digits = caps.get(1)?.as_str();
        return accept(format!("{}+", digits), true, false);
    }

    if let Some(caps) = BUDGET_MAX_RE.captures(&cleaned) {
        let digits = caps.get(1)?.as_str();
        return accept(format!("≤{}", digits), true, false);
    }

    if let Some(caps) = BUDGET_APPROX_RE.captures(&cleaned) {
        let digits = caps.get(1)?.as_str();
        return accept(format!("~{}", digits), true, false);
    }

    None
}

/// Extracts `goal`: need/problem/purpose phrasing, minimum 10 characters.
pub fn extract_goal(message: &str) -> Option<Hit> {
    let caps = GOAL_RE.captures(message)?;
    let value = caps.get(1)?.as_str().trim().trim_end_matches('.').to_string();
    if value.chars().count() < 10 {
        return None;
    }
    accept(value, true, true)
}

pub fn extract_email(message: &str) -> Option<Hit> {
    let m = EMAIL_RE.find(message)?;
    accept(m.as_str().to_string(), true, false)
}

pub fn extract_phone(message: &str) -> Option<Hit> {
    let m = PHONE_RE.find(message)?;
    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return None;
    }
    accept(m.as_str().to_string(), true, false)
}

/// Runs every field extractor over the current inbound message only (not
/// the whole history), per spec §4.4.
pub fn extract(message: &str) -> ExtractionResult {
    ExtractionResult {
        name: extract_name(message),
        business_type: extract_business_type(message),
        budget: extract_budget(message),
        goal: extract_goal(message),
        email: extract_email(message),
        phone: extract_phone(message),
    }
}

/// Budget-confirmation detector: a bare affirmation following a prior
/// agent budget offer synthesizes `budget = "<N>+"` at confidence 0.9.
pub fn detect_budget_confirmation(current_message: &str, previous_agent_message: Option<&str>) -> Option<Hit> {
    let normalized = current_message.trim().trim_end_matches(['.', '!']).to_lowercase();
    if !AFFIRMATIONS.contains(&normalized.as_str()) {
        return None;
    }

    let offer = previous_agent_message?;
    let offered_amount = BUDGET_EXPLICIT_RE
        .captures(offer)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())?;

    Some(Hit {
        value: format!("{}+", offered_amount),
        confidence: 0.9,
    })
}

/// Merge rule from spec §4.4: overwrite only on an accepted hit, otherwise
/// keep the existing value. Never clears a field to `None`.
pub fn merge(existing: &mut ExtractedData, result: &ExtractionResult) {
    if let Some(hit) = &result.name {
        existing.name = Some(hit.value.clone());
    }
    if let Some(hit) = &result.business_type {
        existing.business_type = Some(hit.value.clone());
    }
    if let Some(hit) = &result.budget {
        existing.budget = Some(hit.value.clone());
    }
    if let Some(hit) = &result.goal {
        existing.goal = Some(hit.value.clone());
    }
    if let Some(hit) = &result.email {
        existing.email = Some(hit.value.clone());
    }
    if let Some(hit) = &result.phone {
        existing.phone = Some(hit.value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_from_self_introduction() {
        let hit = extract_name("Hola, soy Diego").unwrap();
        assert_eq!(hit.value, "Diego");
        assert!(hit.confidence >= ACCEPT_THRESHOLD);
    }

    #[test]
    fn extracts_business_type_from_possessive() {
        let hit = extract_business_type("tengo un restaurante y estoy perdiendo clientes").unwrap();
        assert_eq!(hit.value, "restaurante");
    }

    #[test]
    fn fuzzy_match_tolerates_typos() {
        let hit = extract_business_type("mi resturante está lento").unwrap();
        assert_eq!(hit.value, "restaurante");
    }

    #[test]
    fn rejects_generic_business_terms() {
        assert!(extract_business_type("tengo un negocio").is_none());
        assert!(extract_business_type("mi empresa crece").is_none());
    }

    #[test]
    fn extracts_explicit_dollar_budget() {
        let hit = extract_budget("mis planes empiezan en $300").unwrap();
        assert_eq!(hit.value, "300");
    }

    #[test]
    fn rejects_time_of_day_as_budget() {
        assert!(extract_budget("nos vemos a las 3:00").is_none());
    }

    #[test]
    fn extracts_budget_range() {
        let hit = extract_budget("tengo entre 300 y 500 disponibles").unwrap();
        assert_eq!(hit.value, "300-500");
    }

    #[test]
    fn goal_requires_minimum_length() {
        assert!(extract_goal("quiero ayuda con mi negocio").is_some());
        assert!(extract_goal("para ya").is_none());
    }

    #[test]
    fn goal_extracts_tail_after_estoy() {
        let hit = extract_goal("tengo un restaurante y estoy perdiendo clientes").unwrap();
        assert_eq!(hit.value, "perdiendo clientes");
    }

    #[test]
    fn budget_confirmation_requires_prior_offer() {
        assert!(detect_budget_confirmation("si", None).is_none());
        let hit = detect_budget_confirmation(
            "si",
            Some("Mis soluciones empiezan en $300/mes, ¿te funciona?"),
        )
        .unwrap();
        assert_eq!(hit.value, "300+");
        assert_eq!(hit.confidence, 0.9);
    }

    #[test]
    fn merge_never_clears_existing_value() {
        let mut data = ExtractedData {
            name: Some("Diego".to_string()),
            ..Default::default()
        };
        merge(&mut data, &ExtractionResult::default());
        assert_eq!(data.name.as_deref(), Some("Diego"));
    }
}
