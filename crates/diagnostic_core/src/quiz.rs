//! crates/diagnostic_core/src/quiz.rs
//!
//! The quiz flow: the same question bank answered in one pass, without the
//! adaptive sequencing. Each answer gets a 1..=3 severity score.

use crate::domain::{AnsweredQuestion, Language, QuizAnswer};
use crate::questions;

const HIGH_SEVERITY: &[&str] = &[
    "siempre", "todos los días", "a diario", "cada día", "mucho", "muchísimo", "constante",
    "fatal", "insoportable", "always", "every day", "daily", "constant", "a lot", "severe",
    "terrible", "unbearable",
];

const MEDIUM_SEVERITY: &[&str] = &[
    "a veces", "a menudo", "frecuente", "bastante", "algunas veces", "moderad", "sometimes",
    "often", "frequent", "quite", "moderate", "occasionally",
];

/// Heuristic severity of a quiz answer: 3 for constant/severe, 2 for recurring, else 1.
pub fn score_answer(answer: &str) -> u8 {
    let lower = answer.to_lowercase();
    if HIGH_SEVERITY.iter().any(|w| lower.contains(w)) {
        3
    } else if MEDIUM_SEVERITY.iter().any(|w| lower.contains(w)) {
        2
    } else {
        1
    }
}

/// Reasons a quiz submission is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizValidationError {
    #[error("unknown question id {0}")]
    UnknownQuestion(u8),
    #[error("answer must not be empty")]
    EmptyAnswer,
}

pub fn validate_answer(question_id: u8, answer: &str) -> Result<(), QuizValidationError> {
    if questions::find(question_id).is_none() {
        return Err(QuizValidationError::UnknownQuestion(question_id));
    }
    if answer.trim().is_empty() {
        return Err(QuizValidationError::EmptyAnswer);
    }
    Ok(())
}

/// Point sum and the percentage of the maximum possible severity.
pub fn total_score(answers: &[QuizAnswer]) -> (i32, f64) {
    let sum: i32 = answers.iter().map(|a| i32::from(a.points)).sum();
    if answers.is_empty() {
        return (0, 0.0);
    }
    let max = 3.0 * answers.len() as f64;
    let percentage = (f64::from(sum) / max * 100.0 * 10.0).round() / 10.0;
    (sum, percentage)
}

/// Pairs stored quiz answers with their question text, in question order.
pub fn as_answered_questions(answers: &[QuizAnswer], language: Language) -> Vec<AnsweredQuestion> {
    let mut sorted: Vec<&QuizAnswer> = answers.iter().collect();
    sorted.sort_by_key(|a| a.question_id);
    sorted
        .into_iter()
        .filter_map(|a| {
            questions::find(a.question_id).map(|q| AnsweredQuestion {
                question_id: a.question_id,
                question: q.text(language).to_string(),
                answer: a.answer.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn answer(question_id: u8, text: &str) -> QuizAnswer {
        QuizAnswer {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            question_id,
            answer: text.to_string(),
            points: score_answer(text),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn severity_scoring() {
        assert_eq!(score_answer("Me pasa siempre después de comer"), 3);
        assert_eq!(score_answer("sometimes after dinner"), 2);
        assert_eq!(score_answer("casi nunca"), 1);
    }

    #[test]
    fn totals_and_percentage() {
        let answers = vec![answer(2, "siempre"), answer(3, "a veces"), answer(5, "no")];
        assert_eq!(total_score(&answers), (6, 66.7));
        assert_eq!(total_score(&[]), (0, 0.0));
    }

    #[test]
    fn validation_rejects_unknown_and_empty() {
        assert_eq!(validate_answer(42, "x"), Err(QuizValidationError::UnknownQuestion(42)));
        assert_eq!(validate_answer(2, "  "), Err(QuizValidationError::EmptyAnswer));
        assert_eq!(validate_answer(2, "gases"), Ok(()));
    }

    #[test]
    fn answered_questions_follow_question_order() {
        let answers = vec![answer(5, "leche"), answer(2, "gases")];
        let pairs = as_answered_questions(&answers, Language::En);
        assert_eq!(pairs[0].question_id, 2);
        assert!(pairs[1].question.starts_with("Are there foods"));
    }
}
