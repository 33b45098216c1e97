//! crates/diagnostic_core/src/domain.rs
//!
//! Defines the core data structures for the diagnostic funnel.
//! Flow state and collected facts are serde-serializable because the session
//! stores them as a single JSON document.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a question in the question bank.
pub type QuestionId = u8;

/// How long a session stays usable after creation.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Supported conversation languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Parses a language code such as `es`, `en-US` or `EN`. Unknown codes fall back to Spanish.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Language::En,
            _ => Language::Es,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }
}

//=========================================================================================
// Collected information
//=========================================================================================

/// Structured facts extracted from free-text answers.
///
/// Every field is optional; merging a partial result never clears a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diet: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bad_foods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_timing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_intake: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<String>,
}

impl CollectedInfo {
    /// Merges a partial extraction result into `self`.
    ///
    /// Set fields in `partial` replace the current value, unset fields are ignored
    /// and list fields are unioned, so the bag can only grow.
    pub fn merge(&mut self, partial: CollectedInfo) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.age, partial.age);
        take(&mut self.occupation, partial.occupation);
        take(&mut self.main_problem, partial.main_problem);
        take(&mut self.duration, partial.duration);
        take(&mut self.diet, partial.diet);
        take(&mut self.reaction_timing, partial.reaction_timing);
        take(&mut self.water_intake, partial.water_intake);
        take(&mut self.exercise, partial.exercise);
        take(&mut self.sleep_hours, partial.sleep_hours);
        take(&mut self.sleep_quality, partial.sleep_quality);
        take(&mut self.stress_level, partial.stress_level);
        take(&mut self.medical_conditions, partial.medical_conditions);
        take(&mut self.medications, partial.medications);
        take(&mut self.goal, partial.goal);
        take(&mut self.motivation, partial.motivation);
        take(&mut self.image_analysis, partial.image_analysis);

        for food in partial.bad_foods {
            if !self.bad_foods.contains(&food) {
                self.bad_foods.push(food);
            }
        }
    }

    /// Returns the populated fields as `(label, value)` pairs, in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(age) = self.age {
            out.push(("age", age.to_string()));
        }
        let text_fields: [(&'static str, &Option<String>); 12] = [
            ("occupation", &self.occupation),
            ("main problem", &self.main_problem),
            ("duration", &self.duration),
            ("diet", &self.diet),
            ("reaction timing", &self.reaction_timing),
            ("water intake", &self.water_intake),
            ("exercise", &self.exercise),
            ("sleep quality", &self.sleep_quality),
            ("medical conditions", &self.medical_conditions),
            ("medications", &self.medications),
            ("goal", &self.goal),
            ("image analysis", &self.image_analysis),
        ];
        for (label, value) in text_fields {
            if let Some(value) = value {
                out.push((label, value.clone()));
            }
        }
        if !self.bad_foods.is_empty() {
            out.push(("bad foods", self.bad_foods.join(", ")));
        }
        if let Some(hours) = self.sleep_hours {
            out.push(("sleep hours", hours.to_string()));
        }
        if let Some(stress) = self.stress_level {
            out.push(("stress level (1-10)", stress.to_string()));
        }
        if let Some(motivation) = self.motivation {
            out.push(("motivation (1-10)", motivation.to_string()));
        }
        out
    }
}

//=========================================================================================
// Engagement
//=========================================================================================

/// How many and which questions the conversation asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticMode {
    Express,
    #[default]
    Standard,
    Deep,
}

impl DiagnosticMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticMode::Express => "express",
            DiagnosticMode::Standard => "standard",
            DiagnosticMode::Deep => "deep",
        }
    }
}

/// The raw, blended observations behind an engagement score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementSignals {
    /// Running average of words per answer.
    pub answer_length: f64,
    /// Running average of response time in milliseconds.
    pub response_speed: f64,
    /// Accumulated count of emotional words.
    pub emotional_words: u32,
    /// Running average of the 20..=100 detail bucket.
    pub detail_level: f64,
    /// Number of answers that contained a question from the user.
    pub user_questions: u32,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementScore {
    /// Always within `0..=100`.
    pub total: u8,
    pub mode: DiagnosticMode,
    pub signals: EngagementSignals,
}

//=========================================================================================
// Flow state
//=========================================================================================

/// A single question/answer exchange of the diagnostic conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub question: String,
    pub answer: String,
}

/// The step of the diagnostic conversation, with exactly the data valid for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FlowStep {
    Initial,
    AskingQuestions {
        question_id: QuestionId,
        question_index: usize,
    },
    PdfQuestion {
        diagnosis_content: String,
    },
    Cta {
        diagnosis_content: String,
        wants_pdf: bool,
    },
    Completed {
        diagnosis_content: String,
    },
}

impl FlowStep {
    pub fn name(&self) -> &'static str {
        match self {
            FlowStep::Initial => "initial",
            FlowStep::AskingQuestions { .. } => "asking_questions",
            FlowStep::PdfQuestion { .. } => "pdf_question",
            FlowStep::Cta { .. } => "cta",
            FlowStep::Completed { .. } => "completed",
        }
    }
}

/// Everything the flow controller needs to resume a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub step: FlowStep,
    pub language: Language,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub collected_info: CollectedInfo,
    #[serde(default)]
    pub asked_question_ids: Vec<QuestionId>,
    #[serde(default)]
    pub answers: Vec<AnsweredQuestion>,
    pub engagement: EngagementScore,
    pub mode: DiagnosticMode,
    #[serde(default)]
    pub last_prompt_at: Option<DateTime<Utc>>,
}

impl FlowState {
    /// Index of the question currently awaiting an answer, zero before the first one.
    pub fn current_question_index(&self) -> usize {
        match &self.step {
            FlowStep::AskingQuestions { question_index, .. } => *question_index,
            FlowStep::Initial => 0,
            _ => self.asked_question_ids.len(),
        }
    }

    pub fn diagnosis_content(&self) -> Option<&str> {
        match &self.step {
            FlowStep::PdfQuestion { diagnosis_content }
            | FlowStep::Cta {
                diagnosis_content, ..
            }
            | FlowStep::Completed { diagnosis_content } => Some(diagnosis_content.as_str()),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.step, FlowStep::Cta { .. } | FlowStep::Completed { .. })
    }
}

//=========================================================================================
// Persisted records
//=========================================================================================

/// One user's run through the funnel.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub language: Language,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
    pub flow_state: FlowState,
    pub image_analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn expiry_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::hours(SESSION_TTL_HOURS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Fields accepted when creating a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub language: Language,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
}

/// Partial update of a session's contact details.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub language: Option<Language>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// A single chat message, as shown in the conversation history.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An answer submitted through the quiz flow.
#[derive(Debug, Clone)]
pub struct QuizAnswer {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: QuestionId,
    pub answer: String,
    /// Heuristic severity, `1..=3`.
    pub points: u8,
    pub created_at: DateTime<Utc>,
}

/// The generated diagnosis for a session; at most one per session.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub score: Option<i32>,
    pub percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A single-use discount issued when a session completes the funnel.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountCode {
    pub id: Uuid,
    pub session_id: Uuid,
    pub code: String,
    pub percentage: u8,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An image attached to a chat message or upload.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Base64 payload without the `data:` prefix.
    pub base64: String,
    pub mime_type: String,
}

/// What is pushed to the CRM when a lead progresses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdate {
    pub session_id: Uuid,
    pub wordpress_lead_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub language: Language,
    pub diagnostic_mode: DiagnosticMode,
    pub engagement_score: u8,
    pub collected_info: CollectedInfo,
    pub diagnosis: Option<String>,
    pub discount_code: Option<String>,
}
