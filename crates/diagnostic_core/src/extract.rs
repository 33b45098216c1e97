//! crates/diagnostic_core/src/extract.rs
//!
//! Heuristic extractors that turn free-text answers into partial `CollectedInfo`.
//! Every function is pure; the caller merges the result into the session.

use crate::domain::{CollectedInfo, QuestionId};
use crate::questions;
use regex::Regex;
use std::sync::LazyLock;

const MAX_FIELD_CHARS: usize = 300;

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*(?:años|anos|año|years?|yrs?|y/o)\b").unwrap()
});
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,3})\b").unwrap());
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+|un|una|a|an|one|two|three|dos|tres)\s+(días?|dias?|days?|semanas?|weeks?|meses|mes|months?|años|año|years?)\b",
    )
    .unwrap()
});
static TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[.,]\d+)?)\s*(minutos?|mins?|minutes?|horas?|hours?|hrs?|h)\b").unwrap()
});
static WATER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(litros?|liters?|litres?|l|vasos?|glasses?|botellas?|bottles?)\b",
    )
    .unwrap()
});
static SLEEP_HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[.,]\d+)?)\s*(?:horas?|hours?|hrs?|h)\b").unwrap()
});
static MEDICATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tomo|estoy tomando|tomando|take|taking|i'm on|uso)\s+(.+)").unwrap()
});

/// Food families recognised in answers, keyed by canonical name.
static FOOD_FAMILIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("dairy", r"leche|lácteos?|lacteos?|quesos?|yogures?|yogur|nata|lactosa|milk|dairy|cheese|yogh?urt|lactose|cream"),
        ("gluten", r"gluten|pan(?:es)?|trigo|harinas?|pasta|bollería|bread|wheat|flour"),
        ("legumes", r"legumbres?|lentejas|garbanzos|frijoles|judías|alubias|beans|legumes?|lentils|chickpeas"),
        ("fried_fatty", r"fritos?|fritas?|frituras?|grasas?|grasientos?|fried|fatty|greasy|grease"),
        ("spicy", r"picantes?|chiles?|spicy|hot sauce|chilli|chili"),
        ("sugar", r"azúcar|azucar|dulces?|bollos|sugar|sweets|desserts?|candy"),
        ("alcohol", r"alcohol|vino|cervezas?|wine|beer|liquor"),
        ("coffee", r"café|cafe|coffee|espresso"),
    ]
    .into_iter()
    .map(|(family, words)| (family, Regex::new(&format!(r"(?i)\b(?:{words})\b")).unwrap()))
    .collect()
});

/// Words dropped from the front of an occupation phrase.
const OCCUPATION_FILLERS: &[&str] = &[
    "tengo", "y", "e", "and", "i", "i'm", "im", "am", "a", "an", "un", "una", "soy", "trabajo",
    "como", "de", "en", "work", "working", "as", "in", "old", "edad", "me", "dedico", "al", "la",
    "el", "my", "job", "is", "mi", "trabajo:", "profesión", "profession", "actualmente",
    "currently",
];

const NEGATIVE_ANSWERS: &[&str] = &[
    "no", "nada", "ninguno", "ninguna", "none", "nothing", "nope", "never", "nunca", "n/a",
];

/// Runs the extractor attached to `question_id`. Unknown ids yield an empty result.
pub fn extract_info_from_answer(
    question_id: QuestionId,
    answer: &str,
    current: &CollectedInfo,
) -> CollectedInfo {
    match questions::find(question_id) {
        Some(question) => (question.extract)(answer, current),
        None => CollectedInfo::default(),
    }
}

pub fn age_and_occupation(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let (age, remainder) = if let Some(caps) = AGE_RE.captures(answer) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let mut rest = String::with_capacity(answer.len());
        rest.push_str(&answer[..whole.start]);
        rest.push(' ');
        rest.push_str(&answer[whole.end..]);
        (caps[1].parse::<u32>().ok(), rest)
    } else if let Some(caps) = LEADING_NUMBER_RE.captures(answer) {
        let end = caps.get(0).map_or(0, |m| m.end());
        (caps[1].parse::<u32>().ok(), answer[end..].to_string())
    } else {
        (None, answer.to_string())
    };

    CollectedInfo {
        age,
        occupation: occupation_from(&remainder),
        ..Default::default()
    }
}

fn occupation_from(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .filter(|t| !t.is_empty())
        .collect();

    let start = tokens
        .iter()
        .position(|t| !OCCUPATION_FILLERS.contains(&t.to_lowercase().as_str()))?;
    let occupation = tokens[start..].join(" ");
    (!occupation.is_empty()).then(|| clip(&occupation))
}

pub fn main_problem(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    CollectedInfo {
        main_problem: non_empty(answer),
        ..Default::default()
    }
}

pub fn duration(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let lower = answer.to_lowercase();
    let duration = if let Some(m) = DURATION_RE.find(answer) {
        Some(m.as_str().to_string())
    } else if ["siempre", "toda la vida", "always", "all my life", "forever"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Some("always".to_string())
    } else {
        non_empty(answer)
    };
    CollectedInfo {
        duration,
        ..Default::default()
    }
}

pub fn diet(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    CollectedInfo {
        diet: non_empty(answer),
        ..Default::default()
    }
}

pub fn bad_foods(answer: &str, current: &CollectedInfo) -> CollectedInfo {
    let bad_foods = FOOD_FAMILIES
        .iter()
        .filter(|(family, re)| {
            re.is_match(answer) && !current.bad_foods.iter().any(|known| known == family)
        })
        .map(|(family, _)| family.to_string())
        .collect();
    CollectedInfo {
        bad_foods,
        ..Default::default()
    }
}

pub fn reaction_timing(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let lower = answer.to_lowercase();
    let reaction_timing = if let Some(m) = TIMING_RE.find(answer) {
        Some(m.as_str().to_string())
    } else if ["inmediat", "enseguida", "al momento", "right away", "immediate", "straight away"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Some("immediate".to_string())
    } else {
        non_empty(answer)
    };
    CollectedInfo {
        reaction_timing,
        ..Default::default()
    }
}

pub fn water_intake(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let water_intake = WATER_RE
        .find(answer)
        .map(|m| m.as_str().to_string())
        .or_else(|| non_empty(answer));
    CollectedInfo {
        water_intake,
        ..Default::default()
    }
}

pub fn exercise(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let exercise = if is_negative(answer) {
        Some("none".to_string())
    } else {
        non_empty(answer)
    };
    CollectedInfo {
        exercise,
        ..Default::default()
    }
}

pub fn sleep(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let sleep_hours = SLEEP_HOURS_RE
        .captures(answer)
        .and_then(|caps| parse_decimal(&caps[1]))
        .or_else(|| first_number(answer).filter(|h| (1.0..=16.0).contains(h)));

    let lower = answer.to_lowercase();
    let poor_sleep = [
        "mal",
        "fatal",
        "insomnio",
        "me despierto",
        "poor",
        "bad",
        "badly",
        "insomnia",
        "wake up",
    ];
    let sleep_quality = if poor_sleep.iter().any(|w| contains_word(&lower, w)) {
        Some("poor".to_string())
    } else if ["regular", "normal", "ok", "okay", "so-so", "más o menos"]
        .iter()
        .any(|w| contains_word(&lower, w))
    {
        Some("fair".to_string())
    } else if ["bien", "genial", "good", "well", "great"]
        .iter()
        .any(|w| contains_word(&lower, w))
    {
        Some("good".to_string())
    } else {
        None
    };

    CollectedInfo {
        sleep_hours: sleep_hours.map(|h| h as f32),
        sleep_quality,
        ..Default::default()
    }
}

pub fn stress(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    let lower = answer.to_lowercase();
    let stress_level = first_number(answer)
        .map(|n| n.round().clamp(1.0, 10.0) as u8)
        .or_else(|| {
            if ["mucho", "muchísimo", "alto", "altísimo", "high", "a lot", "very"]
                .iter()
                .any(|w| contains_word(&lower, w))
            {
                Some(8)
            } else if ["medio", "moderado", "regular", "moderate", "medium", "some"]
                .iter()
                .any(|w| contains_word(&lower, w))
            {
                Some(5)
            } else if ["poco", "bajo", "nada", "low", "little", "none"]
                .iter()
                .any(|w| contains_word(&lower, w))
            {
                Some(3)
            } else {
                None
            }
        });
    CollectedInfo {
        stress_level,
        ..Default::default()
    }
}

pub fn medical_history(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    if is_negative(answer) {
        return CollectedInfo {
            medical_conditions: Some("none".to_string()),
            ..Default::default()
        };
    }
    let medications = MEDICATION_RE
        .captures(answer)
        .map(|caps| clip(caps[1].trim().trim_end_matches('.')));
    CollectedInfo {
        medical_conditions: non_empty(answer),
        medications,
        ..Default::default()
    }
}

pub fn motivation(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    CollectedInfo {
        motivation: first_number(answer).map(|n| n.round().clamp(1.0, 10.0) as u8),
        ..Default::default()
    }
}

pub fn goal(answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    CollectedInfo {
        goal: non_empty(answer),
        ..Default::default()
    }
}

/// Used by questions whose content is not text (the photo question).
pub fn nothing(_answer: &str, _current: &CollectedInfo) -> CollectedInfo {
    CollectedInfo::default()
}

//=========================================================================================
// Helpers
//=========================================================================================

fn clip(text: &str) -> String {
    text.chars().take(MAX_FIELD_CHARS).collect()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| clip(trimmed))
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER_RE
        .captures(text)
        .and_then(|caps| parse_decimal(&caps[1]))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .match_indices(word)
        .any(|(start, matched)| {
            let before = haystack[..start].chars().next_back();
            let after = haystack[start + matched.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}

fn is_negative(answer: &str) -> bool {
    let lower = answer.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '/')
        .filter(|w| !w.is_empty())
        .collect();
    match words.first() {
        Some(first) => NEGATIVE_ANSWERS.contains(first) && words.len() <= 4,
        None => false,
    }
}
