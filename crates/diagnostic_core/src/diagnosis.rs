//! crates/diagnostic_core/src/diagnosis.rs
//!
//! Builds the prompts sent to the language model: the final diagnosis and the
//! short empathic comment shown between questions.

use crate::domain::{AnsweredQuestion, CollectedInfo, Language};

const DIAGNOSIS_INSTRUCTIONS: &str = r#"You are an empathetic digestive-health coach writing a personalized assessment for someone who just completed a digestive-health questionnaire.

Structure of your reply:
1. A warm, personalized greeting using the person's name when it is known.
2. Three or four key points. Each point starts with a relevant emoji followed by a short **bold title**, and explains one digestive-health theme you observed in the answers (for example: gut microbiota balance, food sensitivities, stress and the gut-brain axis, hydration, sleep and digestive rhythm, eating habits).
3. An integrative conclusion that connects the points into one picture.
4. A paragraph presenting a holistic solution: that these factors can be addressed together through nutrition, habits and emotional balance, with guidance.
5. A short motivational close.

Rules:
- Length between 300 and 450 words.
- Stay strictly on digestive-health themes.
- Do NOT give an explicit action plan, day-by-day steps or meal plans.
- Do NOT mention medication names or recommend drugs or supplements by name.
- Do not diagnose diseases; speak about patterns and tendencies.
- Write the whole reply in the language requested below."#;

const COMMENT_INSTRUCTIONS: &str = r#"You are a warm digestive-health assistant running a questionnaire. The user just answered a question.
Reply with ONE or TWO short sentences (max 35 words) that acknowledge the answer with empathy and, when natural, add a tiny relevant insight.
Do not ask any question, do not give advice lists, do not mention medication names.
Reply in the language requested below."#;

/// A system/user prompt pair ready to send to a chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn language_name(language: Language) -> &'static str {
    match language {
        Language::Es => "Spanish",
        Language::En => "English",
    }
}

/// Builds the diagnosis prompt from everything the conversation collected.
pub fn build_diagnosis_prompt(
    user_name: Option<&str>,
    answers: &[AnsweredQuestion],
    image_analysis: Option<&str>,
    language: Language,
    info: Option<&CollectedInfo>,
) -> Prompt {
    let mut user = String::new();
    user.push_str(&format!("Reply language: {}\n", language_name(language)));
    user.push_str(&format!("Name: {}\n\n", user_name.unwrap_or("(not provided)")));

    user.push_str("QUESTIONNAIRE ANSWERS:\n");
    for (i, answered) in answers.iter().enumerate() {
        user.push_str(&format!(
            "{}. Q: {}\n   A: {}\n",
            i + 1,
            answered.question,
            answered.answer.trim()
        ));
    }

    if let Some(analysis) = image_analysis.filter(|a| !a.trim().is_empty()) {
        user.push_str("\nTONGUE PHOTO OBSERVATIONS:\n");
        user.push_str(analysis.trim());
        user.push('\n');
    }

    if let Some(info) = info {
        let entries = info.entries();
        if !entries.is_empty() {
            user.push_str("\nSTRUCTURED PROFILE:\n");
            for (label, value) in entries {
                user.push_str(&format!("- {label}: {value}\n"));
            }
        }
    }

    user.push_str("\nWrite the personalized digestive-health assessment now.");

    Prompt {
        system: DIAGNOSIS_INSTRUCTIONS.to_string(),
        user,
    }
}

/// Builds the prompt for the short empathic comment after an answer.
pub fn build_comment_prompt(question: &str, answer: &str, language: Language) -> Prompt {
    Prompt {
        system: COMMENT_INSTRUCTIONS.to_string(),
        user: format!(
            "Reply language: {}\nQUESTION: {}\nANSWER: {}",
            language_name(language),
            question,
            answer.trim()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_prompt_embeds_answers_image_and_profile() {
        let answers = vec![AnsweredQuestion {
            question_id: 2,
            question: "¿Cuál es tu problema principal?".into(),
            answer: "  hinchazón después de comer ".into(),
        }];
        let info = CollectedInfo {
            age: Some(32),
            bad_foods: vec!["dairy".into()],
            ..Default::default()
        };

        let prompt = build_diagnosis_prompt(
            Some("Ana"),
            &answers,
            Some("Lengua con capa blanquecina"),
            Language::Es,
            Some(&info),
        );

        assert!(prompt.system.contains("300 and 450 words"));
        assert!(prompt.user.contains("Reply language: Spanish"));
        assert!(prompt.user.contains("Name: Ana"));
        assert!(prompt.user.contains("A: hinchazón después de comer\n"));
        assert!(prompt.user.contains("TONGUE PHOTO OBSERVATIONS"));
        assert!(prompt.user.contains("- age: 32"));
        assert!(prompt.user.contains("- bad foods: dairy"));
    }

    #[test]
    fn blank_image_analysis_is_omitted() {
        let prompt = build_diagnosis_prompt(None, &[], Some("   "), Language::En, None);
        assert!(!prompt.user.contains("TONGUE PHOTO"));
        assert!(prompt.user.contains("Name: (not provided)"));
        assert!(!prompt.user.contains("STRUCTURED PROFILE"));
    }
}
