//! crates/diagnostic_core/src/questions.rs
//!
//! The question bank: one ordered collection of question records, each carrying
//! its block, priority class, optional applicability predicate and the extractor
//! that turns its free-text answer into structured facts.

use crate::domain::{CollectedInfo, DiagnosticMode, Language, QuestionId};
use crate::extract;
use serde::Serialize;

/// Thematic grouping of consecutive questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Block {
    Profile,
    Problem,
    Diet,
    Lifestyle,
    Health,
    Motivation,
    Photo,
}

impl Block {
    pub fn as_str(&self) -> &'static str {
        match self {
            Block::Profile => "profile",
            Block::Problem => "problem",
            Block::Diet => "diet",
            Block::Lifestyle => "lifestyle",
            Block::Health => "health",
            Block::Motivation => "motivation",
            Block::Photo => "photo",
        }
    }
}

/// Which diagnostic modes ask a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Essential,
    Standard,
    Deep,
}

impl Priority {
    /// Express asks only essential questions, standard adds standard ones, deep asks everything.
    pub fn enabled_in(self, mode: DiagnosticMode) -> bool {
        match mode {
            DiagnosticMode::Express => self == Priority::Essential,
            DiagnosticMode::Standard => self != Priority::Deep,
            DiagnosticMode::Deep => true,
        }
    }
}

pub type Predicate = fn(&CollectedInfo) -> bool;
pub type Extractor = fn(&str, &CollectedInfo) -> CollectedInfo;

pub struct Question {
    pub id: QuestionId,
    pub block: Block,
    pub priority: Priority,
    pub text_es: &'static str,
    pub text_en: &'static str,
    pub applies_if: Option<Predicate>,
    pub extract: Extractor,
    /// The question invites the user to attach a photo.
    pub accepts_image: bool,
}

impl Question {
    pub fn text(&self, language: Language) -> &'static str {
        match language {
            Language::Es => self.text_es,
            Language::En => self.text_en,
        }
    }

    pub fn applies_to(&self, info: &CollectedInfo) -> bool {
        self.applies_if.map_or(true, |predicate| predicate(info))
    }
}

impl std::fmt::Debug for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Question")
            .field("id", &self.id)
            .field("block", &self.block)
            .field("priority", &self.priority)
            .finish()
    }
}

/// A question as presented to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub block: Block,
    pub text: String,
    pub accepts_image: bool,
}

impl QuestionView {
    pub fn new(question: &Question, language: Language) -> Self {
        Self {
            id: question.id,
            block: question.block,
            text: question.text(language).to_string(),
            accepts_image: question.accepts_image,
        }
    }
}

/// The question that invites a photo upload.
pub const IMAGE_QUESTION_ID: QuestionId = 14;

fn has_bad_foods(info: &CollectedInfo) -> bool {
    !info.bad_foods.is_empty()
}

fn lacks_image_analysis(info: &CollectedInfo) -> bool {
    info.image_analysis.is_none()
}

pub static QUESTIONS: &[Question] = &[
    Question {
        id: 1,
        block: Block::Profile,
        priority: Priority::Essential,
        text_es: "Para empezar, ¿cuántos años tienes y a qué te dedicas?",
        text_en: "To start, how old are you and what do you do for a living?",
        applies_if: None,
        extract: extract::age_and_occupation,
        accepts_image: false,
    },
    Question {
        id: 2,
        block: Block::Problem,
        priority: Priority::Essential,
        text_es: "¿Cuál es el principal problema digestivo que te gustaría resolver? (hinchazón, gases, estreñimiento, acidez...)",
        text_en: "What is the main digestive problem you'd like to solve? (bloating, gas, constipation, heartburn...)",
        applies_if: None,
        extract: extract::main_problem,
        accepts_image: false,
    },
    Question {
        id: 3,
        block: Block::Problem,
        priority: Priority::Essential,
        text_es: "¿Desde cuándo te ocurre?",
        text_en: "How long has this been happening?",
        applies_if: None,
        extract: extract::duration,
        accepts_image: false,
    },
    Question {
        id: 4,
        block: Block::Diet,
        priority: Priority::Standard,
        text_es: "¿Cómo es un día normal de comidas para ti?",
        text_en: "What does a normal day of meals look like for you?",
        applies_if: None,
        extract: extract::diet,
        accepts_image: false,
    },
    Question {
        id: 5,
        block: Block::Diet,
        priority: Priority::Essential,
        text_es: "¿Hay alimentos que notes que te sientan mal? (lácteos, pan, legumbres, fritos...)",
        text_en: "Are there foods you notice don't agree with you? (dairy, bread, legumes, fried food...)",
        applies_if: None,
        extract: extract::bad_foods,
        accepts_image: false,
    },
    Question {
        id: 6,
        block: Block::Diet,
        priority: Priority::Standard,
        text_es: "Cuando comes esos alimentos, ¿cuánto tardas en notar las molestias?",
        text_en: "When you eat those foods, how long does it take before you notice discomfort?",
        applies_if: Some(has_bad_foods),
        extract: extract::reaction_timing,
        accepts_image: false,
    },
    Question {
        id: 7,
        block: Block::Lifestyle,
        priority: Priority::Standard,
        text_es: "¿Cuánta agua bebes al día, aproximadamente?",
        text_en: "Roughly how much water do you drink per day?",
        applies_if: None,
        extract: extract::water_intake,
        accepts_image: false,
    },
    Question {
        id: 8,
        block: Block::Lifestyle,
        priority: Priority::Deep,
        text_es: "¿Haces algún tipo de ejercicio? ¿Con qué frecuencia?",
        text_en: "Do you do any kind of exercise? How often?",
        applies_if: None,
        extract: extract::exercise,
        accepts_image: false,
    },
    Question {
        id: 9,
        block: Block::Lifestyle,
        priority: Priority::Standard,
        text_es: "¿Cuántas horas duermes y cómo describirías tu descanso?",
        text_en: "How many hours do you sleep and how would you describe your rest?",
        applies_if: None,
        extract: extract::sleep,
        accepts_image: false,
    },
    Question {
        id: 10,
        block: Block::Lifestyle,
        priority: Priority::Essential,
        text_es: "Del 1 al 10, ¿qué nivel de estrés sueles tener en tu día a día?",
        text_en: "From 1 to 10, how much stress do you usually have in your daily life?",
        applies_if: None,
        extract: extract::stress,
        accepts_image: false,
    },
    Question {
        id: 11,
        block: Block::Health,
        priority: Priority::Standard,
        text_es: "¿Tienes alguna condición médica diagnosticada o tomas alguna medicación?",
        text_en: "Do you have any diagnosed medical condition or take any medication?",
        applies_if: None,
        extract: extract::medical_history,
        accepts_image: false,
    },
    Question {
        id: 12,
        block: Block::Motivation,
        priority: Priority::Essential,
        text_es: "Del 1 al 10, ¿cuánta motivación tienes para mejorar tu digestión ahora mismo?",
        text_en: "From 1 to 10, how motivated are you to improve your digestion right now?",
        applies_if: None,
        extract: extract::motivation,
        accepts_image: false,
    },
    Question {
        id: 13,
        block: Block::Motivation,
        priority: Priority::Essential,
        text_es: "Si pudieras cambiar una sola cosa de tu digestión en los próximos meses, ¿cuál sería?",
        text_en: "If you could change just one thing about your digestion in the coming months, what would it be?",
        applies_if: None,
        extract: extract::goal,
        accepts_image: false,
    },
    Question {
        id: IMAGE_QUESTION_ID,
        block: Block::Photo,
        priority: Priority::Standard,
        text_es: "Si quieres, envíame una foto de tu lengua con buena luz: aporta pistas sobre tu digestión. Si prefieres no hacerlo, escribe \"continuar\".",
        text_en: "If you like, send me a well-lit photo of your tongue: it gives clues about your digestion. If you'd rather not, just type \"continue\".",
        applies_if: Some(lacks_image_analysis),
        extract: extract::nothing,
        accepts_image: true,
    },
];

pub fn find(id: QuestionId) -> Option<&'static Question> {
    QUESTIONS.iter().find(|question| question.id == id)
}

pub fn first() -> &'static Question {
    &QUESTIONS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ascending() {
        for pair in QUESTIONS.windows(2) {
            assert!(pair[0].id < pair[1].id, "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn priorities_follow_mode_inclusion() {
        assert!(Priority::Essential.enabled_in(DiagnosticMode::Express));
        assert!(!Priority::Standard.enabled_in(DiagnosticMode::Express));
        assert!(Priority::Standard.enabled_in(DiagnosticMode::Standard));
        assert!(!Priority::Deep.enabled_in(DiagnosticMode::Standard));
        assert!(Priority::Deep.enabled_in(DiagnosticMode::Deep));
    }

    #[test]
    fn reaction_timing_only_applies_after_bad_foods() {
        let question = find(6).unwrap();
        assert!(!question.applies_to(&CollectedInfo::default()));
        let info = CollectedInfo {
            bad_foods: vec!["dairy".into()],
            ..Default::default()
        };
        assert!(question.applies_to(&info));
    }

    #[test]
    fn image_question_is_flagged() {
        let question = find(IMAGE_QUESTION_ID).unwrap();
        assert!(question.accepts_image);
        assert_eq!(question.block, Block::Photo);
    }
}
