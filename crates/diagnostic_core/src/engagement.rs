//! crates/diagnostic_core/src/engagement.rs
//!
//! Scores how invested the user is in the conversation.
//!
//! Each answer is turned into a handful of observations that are blended into
//! running averages (`(old + new) / 2`), so the score follows recent behaviour
//! instead of accumulating forever.

use crate::domain::{DiagnosticMode, EngagementScore, EngagementSignals, Language};
use crate::i18n;

/// Scores at or above this value switch to the deep mode.
pub const DEEP_THRESHOLD: u8 = 70;
/// Scores at or above this value (and below [`DEEP_THRESHOLD`]) use the standard mode.
pub const STANDARD_THRESHOLD: u8 = 40;

/// Neutral score used before the first answer.
pub const INITIAL_SCORE: u8 = 50;

const DROP_THRESHOLD: i16 = 20;
const RISE_THRESHOLD: i16 = 15;

const WEIGHT_LENGTH: f64 = 0.25;
const WEIGHT_DETAIL: f64 = 0.25;
const WEIGHT_EMOTIONAL: f64 = 0.20;
const WEIGHT_QUESTIONS: f64 = 0.15;
const WEIGHT_SPEED: f64 = 0.15;

impl DiagnosticMode {
    /// Maps an engagement total onto a mode using the shared thresholds.
    pub fn from_score(total: u8) -> Self {
        if total >= DEEP_THRESHOLD {
            DiagnosticMode::Deep
        } else if total >= STANDARD_THRESHOLD {
            DiagnosticMode::Standard
        } else {
            DiagnosticMode::Express
        }
    }
}

/// Returns the neutral starting score.
pub fn initialize() -> EngagementScore {
    EngagementScore {
        total: INITIAL_SCORE,
        mode: DiagnosticMode::Standard,
        signals: EngagementSignals::default(),
    }
}

/// Shorthand for [`DiagnosticMode::from_score`].
pub fn calculate_mode(total: u8) -> DiagnosticMode {
    DiagnosticMode::from_score(total)
}

/// Folds one answer into the current score.
pub fn analyze_response(
    answer: &str,
    elapsed_ms: u64,
    current: &EngagementScore,
    language: Language,
) -> EngagementScore {
    let previous = &current.signals;
    let words = word_count(answer);

    let signals = EngagementSignals {
        answer_length: blend(previous.answer_length, words as f64),
        response_speed: blend(previous.response_speed, elapsed_ms as f64),
        emotional_words: previous.emotional_words + count_emotional_words(answer, language),
        detail_level: blend(previous.detail_level, detail_bucket(words)),
        user_questions: previous.user_questions + u32::from(is_user_question(answer, language)),
        total_time_ms: previous.total_time_ms.saturating_add(elapsed_ms),
    };

    let total = weighted_total(&signals);
    EngagementScore {
        total,
        mode: calculate_mode(total),
        signals,
    }
}

/// True when engagement fell by more than 20 points.
pub fn is_engagement_dropping(previous_total: u8, current_total: u8) -> bool {
    i16::from(previous_total) - i16::from(current_total) > DROP_THRESHOLD
}

/// True when engagement rose by more than 15 points.
pub fn is_engagement_increasing(previous_total: u8, current_total: u8) -> bool {
    i16::from(current_total) - i16::from(previous_total) > RISE_THRESHOLD
}

/// One-line description of a score, for logs.
pub fn summary(score: &EngagementScore) -> String {
    let s = &score.signals;
    format!(
        "engagement={} mode={} avg_words={:.1} avg_response_ms={:.0} emotional={} detail={:.0} questions={} total_time_ms={}",
        score.total,
        score.mode.as_str(),
        s.answer_length,
        s.response_speed,
        s.emotional_words,
        s.detail_level,
        s.user_questions,
        s.total_time_ms,
    )
}

fn blend(old: f64, new: f64) -> f64 {
    (old + new) / 2.0
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn detail_bucket(words: usize) -> f64 {
    match words {
        0..=5 => 20.0,
        6..=15 => 40.0,
        16..=30 => 60.0,
        31..=50 => 80.0,
        _ => 100.0,
    }
}

fn count_emotional_words(text: &str, language: Language) -> u32 {
    let lower = text.to_lowercase();
    i18n::emotional_words(language)
        .iter()
        .map(|term| lower.matches(term).count() as u32)
        .sum()
}

fn is_user_question(text: &str, language: Language) -> bool {
    if text.contains('?') || text.contains('¿') {
        return true;
    }
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| i18n::interrogative_words(language).contains(&word))
}

fn speed_score(avg_ms: f64) -> f64 {
    if avg_ms <= 0.0 {
        return 50.0;
    }
    let seconds = avg_ms / 1000.0;
    if seconds < 3.0 {
        30.0
    } else if seconds <= 30.0 {
        100.0
    } else if seconds <= 60.0 {
        80.0
    } else if seconds <= 120.0 {
        60.0
    } else {
        20.0
    }
}

fn weighted_total(signals: &EngagementSignals) -> u8 {
    let length = (signals.answer_length * 2.0).min(100.0);
    let detail = signals.detail_level.clamp(0.0, 100.0);
    let emotional = (f64::from(signals.emotional_words) * 20.0).min(100.0);
    let questions = (f64::from(signals.user_questions) * 33.0).min(100.0);
    let speed = speed_score(signals.response_speed);

    let total = length * WEIGHT_LENGTH
        + detail * WEIGHT_DETAIL
        + emotional * WEIGHT_EMOTIONAL
        + questions * WEIGHT_QUESTIONS
        + speed * WEIGHT_SPEED;

    total.round().clamp(0.0, 100.0) as u8
}
