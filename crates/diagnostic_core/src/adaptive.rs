//! crates/diagnostic_core/src/adaptive.rs
//!
//! Chooses the next question and decides when the conversation has asked enough.

use crate::domain::{CollectedInfo, DiagnosticMode, QuestionId};
use crate::questions::{Question, QUESTIONS};

/// Below this engagement the conversation stops as soon as the minimum is reached.
pub const LOW_ENGAGEMENT: u8 = 30;
/// At or above this engagement the conversation keeps going up to the maximum.
pub const HIGH_ENGAGEMENT: u8 = 60;

/// Question count bounds for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionLimits {
    pub min: usize,
    pub max: usize,
}

pub fn limits(mode: DiagnosticMode) -> QuestionLimits {
    match mode {
        DiagnosticMode::Express => QuestionLimits { min: 5, max: 7 },
        DiagnosticMode::Standard => QuestionLimits { min: 8, max: 12 },
        DiagnosticMode::Deep => QuestionLimits { min: 10, max: 14 },
    }
}

/// Returns the first question, in id order, that has not been asked, is enabled
/// for `mode` and applies to what is known so far.
pub fn get_next_question(
    mode: DiagnosticMode,
    info: &CollectedInfo,
    asked: &[QuestionId],
) -> Option<&'static Question> {
    QUESTIONS.iter().find(|question| {
        !asked.contains(&question.id)
            && question.priority.enabled_in(mode)
            && question.applies_to(info)
    })
}

pub fn should_continue(mode: DiagnosticMode, asked_count: usize, engagement: u8) -> bool {
    let QuestionLimits { min, max } = limits(mode);
    if asked_count < min {
        return true;
    }
    if asked_count >= max {
        return false;
    }
    if engagement < LOW_ENGAGEMENT {
        return false;
    }
    if engagement >= HIGH_ENGAGEMENT {
        return true;
    }
    asked_count < min + 2
}

/// Proposes a richer mode when engagement warrants it. Never downgrades.
pub fn suggest_mode_change(current: DiagnosticMode, engagement: u8) -> Option<DiagnosticMode> {
    let suggested = DiagnosticMode::from_score(engagement);
    match (current, suggested) {
        (DiagnosticMode::Express, DiagnosticMode::Standard | DiagnosticMode::Deep) => {
            Some(DiagnosticMode::Standard)
        }
        (DiagnosticMode::Standard, DiagnosticMode::Deep) => Some(DiagnosticMode::Deep),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn express_stops_at_max_regardless_of_engagement() {
        assert!(!should_continue(DiagnosticMode::Express, 7, 100));
        assert!(!should_continue(DiagnosticMode::Express, 7, 0));
    }

    #[test]
    fn below_min_always_continues() {
        assert!(should_continue(DiagnosticMode::Standard, 7, 0));
        assert!(should_continue(DiagnosticMode::Deep, 0, 0));
    }

    #[test]
    fn standard_min_with_low_engagement_stops_early() {
        assert!(!should_continue(DiagnosticMode::Standard, 8, 25));
    }

    #[test]
    fn middle_band_uses_min_plus_two() {
        assert!(should_continue(DiagnosticMode::Standard, 8, 45));
        assert!(should_continue(DiagnosticMode::Standard, 9, 45));
        assert!(!should_continue(DiagnosticMode::Standard, 10, 45));
        assert!(should_continue(DiagnosticMode::Standard, 11, 60));
    }

    #[test]
    fn next_question_skips_asked_and_disabled() {
        let info = CollectedInfo::default();
        let first = get_next_question(DiagnosticMode::Express, &info, &[]).unwrap();
        assert_eq!(first.id, 1);

        let next = get_next_question(DiagnosticMode::Express, &info, &[1, 2, 3]).unwrap();
        assert_eq!(next.id, 5, "question 4 is standard priority");

        let next = get_next_question(DiagnosticMode::Standard, &info, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(next.id, 7, "question 6 needs known bad foods");
    }

    #[test]
    fn next_question_never_repeats() {
        for mode in [DiagnosticMode::Express, DiagnosticMode::Standard, DiagnosticMode::Deep] {
            let info = CollectedInfo {
                bad_foods: vec!["dairy".into()],
                ..Default::default()
            };
            let mut asked = Vec::new();
            while let Some(question) = get_next_question(mode, &info, &asked) {
                assert!(!asked.contains(&question.id));
                asked.push(question.id);
            }
            let expected = match mode {
                DiagnosticMode::Express => 7,
                DiagnosticMode::Standard => 13,
                DiagnosticMode::Deep => 14,
            };
            assert_eq!(asked.len(), expected);
        }
    }

    #[test]
    fn mode_changes_only_upgrade() {
        assert_eq!(
            suggest_mode_change(DiagnosticMode::Express, 55),
            Some(DiagnosticMode::Standard)
        );
        assert_eq!(
            suggest_mode_change(DiagnosticMode::Express, 90),
            Some(DiagnosticMode::Standard)
        );
        assert_eq!(
            suggest_mode_change(DiagnosticMode::Standard, 75),
            Some(DiagnosticMode::Deep)
        );
        assert_eq!(suggest_mode_change(DiagnosticMode::Deep, 10), None);
        assert_eq!(suggest_mode_change(DiagnosticMode::Standard, 20), None);
    }
}
