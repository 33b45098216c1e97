//! crates/diagnostic_core/src/flow.rs
//!
//! The diagnostic conversation state machine.
//!
//! `initial → asking_questions → pdf_question → cta → completed`
//!
//! Every incoming message produces exactly one `FlowResponse` carrying the reply
//! text and the new state. Language-model failures degrade to canned copy and
//! never block a transition.

use crate::adaptive;
use crate::domain::{
    AnsweredQuestion, CollectedInfo, FlowState, FlowStep, ImageData, Language,
};
use crate::engagement;
use crate::i18n::{self, OccupationKind};
use crate::ports::{DiagnosisGenerationService, EmpathyCommentService, ImageAnalysisService};
use crate::questions::{self, Question, QuestionView};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Placeholder stored as the answer when only a photo was sent.
const PHOTO_ANSWER: &str = "[photo]";

static OCCUPATION_PATTERNS: LazyLock<Vec<(OccupationKind, Regex)>> = LazyLock::new(|| {
    [
        (
            OccupationKind::Healthcare,
            r"(?i)enfermer|médic|medic|doctor|sanitari|hospital|farmac|fisio|nurse|physician|healthcare|pharmac|caregiver|dentist",
        ),
        (
            OccupationKind::Office,
            r"(?i)oficina|administrativ|programador|desarrollador|ingenier|contable|abogad|comercial|secretari|office|developer|programmer|engineer|accountant|lawyer|manager|analyst|consultant|designer",
        ),
        (
            OccupationKind::Education,
            r"(?i)profesor|maestr|docente|educador|teacher|professor|lecturer|tutor",
        ),
        (
            OccupationKind::Physical,
            r"(?i)construcci|albañil|camarer|cociner|repartidor|conductor|mecánic|agricult|limpieza|construction|waiter|waitress|cook|chef|driver|mechanic|farmer|cleaner|warehouse",
        ),
        (
            OccupationKind::Student,
            r"(?i)estudi|universi|student|studying",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// What kind of reply the flow produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Welcome,
    Question,
    Diagnosis,
    Cta,
    Completed,
    ValidationError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub message: String,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub new_state: FlowState,
    pub next_question: Option<QuestionView>,
    /// Set when this message produced a new photo analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<String>,
    pub is_complete: bool,
}

/// One user message as seen by the flow.
#[derive(Debug, Clone, Copy)]
pub struct IncomingMessage<'a> {
    pub text: &'a str,
    pub image: Option<&'a ImageData>,
    /// Time since the previous prompt was shown, zero when unknown.
    pub elapsed_ms: u64,
}

impl FlowState {
    /// A fresh conversation that has not asked anything yet.
    pub fn new(language: Language, user_name: Option<String>) -> Self {
        let engagement = engagement::initialize();
        Self {
            step: FlowStep::Initial,
            language,
            user_name,
            collected_info: CollectedInfo::default(),
            asked_question_ids: Vec::new(),
            answers: Vec::new(),
            mode: engagement.mode,
            engagement,
            last_prompt_at: None,
        }
    }
}

/// Rejects only empty input and single symbols; everything else is accepted.
pub fn is_valid_answer(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.chars().any(char::is_alphanumeric) || trimmed.chars().count() >= 2
}

pub fn classify_occupation(occupation: &str) -> OccupationKind {
    OCCUPATION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(occupation))
        .map_or(OccupationKind::Other, |(kind, _)| *kind)
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_affirmative(text: &str, language: Language) -> bool {
    let lower = text.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.first().is_some_and(|w| *w == "no") {
        return false;
    }
    i18n::affirmative_words(language).iter().any(|term| {
        if term.contains(' ') {
            lower.contains(term)
        } else {
            words.contains(term)
        }
    })
}

/// Drives the conversation. Holds only the language-model ports; state travels
/// in and out with each call.
#[derive(Clone)]
pub struct DiagnosticFlow {
    comments: Arc<dyn EmpathyCommentService>,
    diagnoses: Arc<dyn DiagnosisGenerationService>,
    images: Arc<dyn ImageAnalysisService>,
}

impl DiagnosticFlow {
    pub fn new(
        comments: Arc<dyn EmpathyCommentService>,
        diagnoses: Arc<dyn DiagnosisGenerationService>,
        images: Arc<dyn ImageAnalysisService>,
    ) -> Self {
        Self {
            comments,
            diagnoses,
            images,
        }
    }

    /// Produces the personalized welcome for a new conversation.
    pub fn initialize(&self, language: Language, user_name: Option<String>) -> FlowResponse {
        let message = i18n::welcome(language, user_name.as_deref());
        FlowResponse {
            message,
            response_type: ResponseType::Welcome,
            new_state: FlowState::new(language, user_name),
            next_question: None,
            image_analysis: None,
            is_complete: false,
        }
    }

    pub async fn process_message(
        &self,
        state: &FlowState,
        incoming: IncomingMessage<'_>,
    ) -> FlowResponse {
        match &state.step {
            FlowStep::Initial => self.start(state),
            FlowStep::AskingQuestions {
                question_id,
                question_index,
            } => {
                self.answer_question(state, *question_id, *question_index, incoming)
                    .await
            }
            FlowStep::PdfQuestion { diagnosis_content } => {
                let wants_pdf = is_affirmative(incoming.text, state.language);
                let mut new_state = state.clone();
                new_state.step = FlowStep::Cta {
                    diagnosis_content: diagnosis_content.clone(),
                    wants_pdf,
                };
                FlowResponse {
                    message: i18n::cta_message(state.language, wants_pdf),
                    response_type: ResponseType::Cta,
                    new_state,
                    next_question: None,
                    image_analysis: None,
                    is_complete: true,
                }
            }
            FlowStep::Cta {
                diagnosis_content, ..
            }
            | FlowStep::Completed { diagnosis_content } => {
                let mut new_state = state.clone();
                new_state.step = FlowStep::Completed {
                    diagnosis_content: diagnosis_content.clone(),
                };
                FlowResponse {
                    message: i18n::completed_message(state.language).to_string(),
                    response_type: ResponseType::Completed,
                    new_state,
                    next_question: None,
                    image_analysis: None,
                    is_complete: true,
                }
            }
        }
    }

    fn start(&self, state: &FlowState) -> FlowResponse {
        let mut new_state = state.clone();
        let first = adaptive::get_next_question(
            new_state.mode,
            &new_state.collected_info,
            &new_state.asked_question_ids,
        )
        .unwrap_or_else(questions::first);

        new_state.asked_question_ids.push(first.id);
        new_state.step = FlowStep::AskingQuestions {
            question_id: first.id,
            question_index: 0,
        };

        let message = join_parts(&[
            i18n::start_intro(state.language),
            i18n::block_transition(state.language, first.block),
            first.text(state.language),
        ]);
        self.question_response(message, new_state, first)
    }

    async fn answer_question(
        &self,
        state: &FlowState,
        question_id: u8,
        question_index: usize,
        incoming: IncomingMessage<'_>,
    ) -> FlowResponse {
        let language = state.language;
        let question = questions::find(question_id);
        let image = incoming
            .image
            .filter(|_| question.is_some_and(|q| q.accepts_image));

        if !is_valid_answer(incoming.text) && image.is_none() {
            debug!(question_id, "rejected empty answer");
            return FlowResponse {
                message: i18n::validation_feedback(language).to_string(),
                response_type: ResponseType::ValidationError,
                new_state: state.clone(),
                next_question: None,
                image_analysis: None,
                is_complete: false,
            };
        }

        let mut new_state = state.clone();
        let mut image_analysis = None;

        if let Some(image) = image {
            match self.images.analyze_image(image, language).await {
                Ok(analysis) if !analysis.trim().is_empty() => {
                    new_state.collected_info.image_analysis = Some(analysis.clone());
                    image_analysis = Some(analysis);
                }
                Ok(_) => warn!(question_id, "image analysis came back empty"),
                Err(e) => warn!(question_id, "image analysis failed, continuing without it: {}", e),
            }
        }

        let answer_text = if incoming.text.trim().is_empty() {
            PHOTO_ANSWER
        } else {
            incoming.text.trim()
        };

        let partial = match question {
            Some(q) => (q.extract)(answer_text, &new_state.collected_info),
            None => {
                warn!(question_id, "flow state points at an unknown question");
                CollectedInfo::default()
            }
        };
        let occupation_insight = question
            .filter(|q| q.id == questions::first().id)
            .and_then(|_| Some((partial.age?, partial.occupation.clone()?)))
            .map(|(age, occupation)| {
                i18n::occupation_insight(language, classify_occupation(&occupation), age)
            });
        new_state.collected_info.merge(partial);

        let question_text = question.map_or("", |q| q.text(language));
        new_state.answers.push(AnsweredQuestion {
            question_id,
            question: question_text.to_string(),
            answer: answer_text.to_string(),
        });

        self.update_engagement(&mut new_state, incoming.text, incoming.elapsed_ms);

        let asked_count = new_state.asked_question_ids.len();
        let keep_going =
            adaptive::should_continue(new_state.mode, asked_count, new_state.engagement.total);
        let next = if keep_going {
            adaptive::get_next_question(
                new_state.mode,
                &new_state.collected_info,
                &new_state.asked_question_ids,
            )
        } else {
            None
        };

        let mut response = match next {
            Some(next) => {
                let lead = match occupation_insight {
                    Some(insight) => insight,
                    None => self.comment(question_text, answer_text, language).await,
                };
                let transition = match question {
                    Some(q) if q.block == next.block => "",
                    _ => i18n::block_transition(language, next.block),
                };
                let message = join_parts(&[lead.as_str(), transition, next.text(language)]);

                new_state.asked_question_ids.push(next.id);
                new_state.step = FlowStep::AskingQuestions {
                    question_id: next.id,
                    question_index: question_index + 1,
                };
                self.question_response(message, new_state, next)
            }
            None => self.finish(new_state, question_text, answer_text).await,
        };
        response.image_analysis = image_analysis;
        response
    }

    fn update_engagement(&self, state: &mut FlowState, text: &str, elapsed_ms: u64) {
        let previous = state.engagement.total;
        state.engagement =
            engagement::analyze_response(text, elapsed_ms, &state.engagement, state.language);
        let current = state.engagement.total;

        if engagement::is_engagement_dropping(previous, current) {
            info!(previous, current, "engagement dropping");
        } else if engagement::is_engagement_increasing(previous, current) {
            info!(previous, current, "engagement increasing");
        }

        if let Some(upgraded) = adaptive::suggest_mode_change(state.mode, current) {
            info!(from = state.mode.as_str(), to = upgraded.as_str(), "upgrading diagnostic mode");
            state.mode = upgraded;
        }
        debug!("{}", engagement::summary(&state.engagement));
    }

    async fn finish(
        &self,
        mut state: FlowState,
        question_text: &str,
        answer_text: &str,
    ) -> FlowResponse {
        let language = state.language;
        let comment = self.comment(question_text, answer_text, language).await;

        info!(
            answers = state.answers.len(),
            mode = state.mode.as_str(),
            "generating diagnosis"
        );
        let diagnosis = match self
            .diagnoses
            .generate_diagnosis(
                state.user_name.as_deref(),
                &state.answers,
                state.collected_info.image_analysis.as_deref(),
                language,
                Some(&state.collected_info),
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("diagnosis generation returned empty text, using fallback");
                i18n::diagnosis_fallback(language).to_string()
            }
            Err(e) => {
                warn!("diagnosis generation failed, using fallback: {}", e);
                i18n::diagnosis_fallback(language).to_string()
            }
        };

        let message = join_parts(&[
            comment.as_str(),
            diagnosis.as_str(),
            i18n::pdf_prompt(language),
        ]);
        state.step = FlowStep::PdfQuestion {
            diagnosis_content: diagnosis,
        };
        FlowResponse {
            message,
            response_type: ResponseType::Diagnosis,
            new_state: state,
            next_question: None,
            image_analysis: None,
            is_complete: false,
        }
    }

    async fn comment(&self, question: &str, answer: &str, language: Language) -> String {
        match self.comments.generate_comment(question, answer, language).await {
            Ok(comment) if !comment.trim().is_empty() => comment.trim().to_string(),
            Ok(_) => i18n::comment_fallback(language).to_string(),
            Err(e) => {
                warn!("comment generation failed, using fallback: {}", e);
                i18n::comment_fallback(language).to_string()
            }
        }
    }

    fn question_response(
        &self,
        message: String,
        new_state: FlowState,
        next: &Question,
    ) -> FlowResponse {
        let view = QuestionView::new(next, new_state.language);
        FlowResponse {
            message,
            response_type: ResponseType::Question,
            new_state,
            next_question: Some(view),
            image_analysis: None,
            is_complete: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnsweredQuestion, DiagnosticMode};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubComments {
        fail: bool,
    }

    #[async_trait]
    impl EmpathyCommentService for StubComments {
        async fn generate_comment(&self, _q: &str, _a: &str, _l: Language) -> PortResult<String> {
            if self.fail {
                Err(PortError::Unexpected("model unavailable".into()))
            } else {
                Ok("Entiendo perfectamente.".into())
            }
        }
    }

    struct StubDiagnosis {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DiagnosisGenerationService for StubDiagnosis {
        async fn generate_diagnosis(
            &self,
            user_name: Option<&str>,
            answers: &[AnsweredQuestion],
            _image_analysis: Option<&str>,
            _language: Language,
            _info: Option<&CollectedInfo>,
        ) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "Hola {}, he analizado tus {} respuestas.",
                user_name.unwrap_or("amiga"),
                answers.len()
            ))
        }
    }

    struct StubImages {
        fail: bool,
    }

    #[async_trait]
    impl ImageAnalysisService for StubImages {
        async fn analyze_image(
            &self,
            _image: &ImageData,
            _language: Language,
        ) -> PortResult<String> {
            if self.fail {
                Err(PortError::Unexpected("vision down".into()))
            } else {
                Ok("Lengua con una ligera capa blanca.".into())
            }
        }
    }

    fn flow_with(comments_fail: bool, images_fail: bool) -> (DiagnosticFlow, Arc<StubDiagnosis>) {
        let diagnoses = Arc::new(StubDiagnosis {
            calls: AtomicUsize::new(0),
        });
        let flow = DiagnosticFlow::new(
            Arc::new(StubComments { fail: comments_fail }),
            diagnoses.clone(),
            Arc::new(StubImages { fail: images_fail }),
        );
        (flow, diagnoses)
    }

    fn text(text: &str) -> IncomingMessage<'_> {
        IncomingMessage {
            text,
            image: None,
            elapsed_ms: 12_000,
        }
    }

    async fn started(flow: &DiagnosticFlow) -> FlowState {
        let welcome = flow.initialize(Language::Es, Some("Ana".into()));
        let response = flow.process_message(&welcome.new_state, text("sí, vamos")).await;
        response.new_state
    }

    #[test]
    fn validation_is_permissive() {
        assert!(!is_valid_answer(""));
        assert!(!is_valid_answer("   "));
        assert!(!is_valid_answer("?"));
        assert!(is_valid_answer("??"));
        assert!(is_valid_answer("a"));
        assert!(is_valid_answer("no"));
    }

    #[test]
    fn occupations_are_classified() {
        assert_eq!(classify_occupation("enfermera"), OccupationKind::Healthcare);
        assert_eq!(classify_occupation("auxiliar de enfermería"), OccupationKind::Healthcare);
        assert_eq!(classify_occupation("auxiliar administrativo"), OccupationKind::Office);
        assert_eq!(classify_occupation("office manager"), OccupationKind::Office);
        assert_eq!(classify_occupation("profesora de primaria"), OccupationKind::Education);
        assert_eq!(classify_occupation("camarero"), OccupationKind::Physical);
        assert_eq!(classify_occupation("estudiante"), OccupationKind::Student);
        assert_eq!(classify_occupation("artista"), OccupationKind::Other);
    }

    #[test]
    fn affirmative_detection() {
        assert!(is_affirmative("Sí, por favor", Language::Es));
        assert!(is_affirmative("yes please", Language::En));
        assert!(!is_affirmative("no, gracias", Language::Es));
        assert!(!is_affirmative("ahora no", Language::Es));
    }

    #[tokio::test]
    async fn welcome_is_personalized() {
        let (flow, _) = flow_with(false, false);
        let welcome = flow.initialize(Language::Es, Some("Ana".into()));
        assert_eq!(welcome.response_type, ResponseType::Welcome);
        assert!(welcome.message.contains("Ana"));
        assert_eq!(welcome.new_state.step, FlowStep::Initial);
        assert_eq!(welcome.new_state.engagement.total, 50);
    }

    #[tokio::test]
    async fn first_message_asks_first_question() {
        let (flow, _) = flow_with(false, false);
        let welcome = flow.initialize(Language::En, None);
        let response = flow.process_message(&welcome.new_state, text("ok")).await;

        assert_eq!(response.response_type, ResponseType::Question);
        assert_eq!(response.next_question.as_ref().map(|q| q.id), Some(1));
        assert!(response.message.contains(questions::first().text_en));
        assert_eq!(response.new_state.asked_question_ids, vec![1]);
        assert_eq!(response.new_state.current_question_index(), 0);
    }

    #[tokio::test]
    async fn empty_answer_keeps_state() {
        let (flow, _) = flow_with(false, false);
        let state = started(&flow).await;
        let response = flow.process_message(&state, text("")).await;

        assert_eq!(response.response_type, ResponseType::ValidationError);
        assert_eq!(
            response.new_state.current_question_index(),
            state.current_question_index()
        );
        assert_eq!(response.new_state, state);
        assert_eq!(response.message, i18n::validation_feedback(Language::Es));
    }

    #[tokio::test]
    async fn age_and_occupation_answer_gets_occupation_insight() {
        let (flow, _) = flow_with(false, false);
        let state = started(&flow).await;
        let response = flow
            .process_message(&state, text("32 años y soy enfermera"))
            .await;

        let info = &response.new_state.collected_info;
        assert_eq!(info.age, Some(32));
        assert!(info.occupation.as_deref().unwrap().contains("enfermera"));

        let insight =
            i18n::occupation_insight(Language::Es, OccupationKind::Healthcare, 32);
        let next_text = questions::find(2).unwrap().text_es;
        let insight_at = response.message.find(&insight).expect("insight present");
        let question_at = response.message.find(next_text).expect("next question present");
        assert!(insight_at < question_at);
        assert!(!response.message.contains("Entiendo perfectamente."));
        assert!(response
            .message
            .contains(i18n::block_transition(Language::Es, questions::Block::Problem)));
        assert_eq!(response.new_state.current_question_index(), 1);
    }

    #[tokio::test]
    async fn answer_without_age_uses_model_comment() {
        let (flow, _) = flow_with(false, false);
        let state = started(&flow).await;
        let response = flow.process_message(&state, text("soy diseñadora")).await;
        assert!(response.message.starts_with("Entiendo perfectamente."));
    }

    #[tokio::test]
    async fn comment_failure_falls_back() {
        let (flow, _) = flow_with(true, false);
        let state = started(&flow).await;
        let response = flow.process_message(&state, text("prefiero no decirlo")).await;
        assert_eq!(response.response_type, ResponseType::Question);
        assert!(response.message.starts_with(i18n::comment_fallback(Language::Es)));
    }

    #[tokio::test]
    async fn full_conversation_reaches_diagnosis_then_cta() {
        let (flow, diagnoses) = flow_with(false, false);
        let mut state = started(&flow).await;
        let mut last = None;

        for _ in 0..20 {
            let answer = text("Me pasa a menudo, sobre todo por la tarde después de comer");
            let response = flow.process_message(&state, answer).await;
            state = response.new_state.clone();
            if response.response_type == ResponseType::Diagnosis {
                last = Some(response);
                break;
            }
            assert_eq!(response.response_type, ResponseType::Question);
        }

        let response = last.expect("conversation should end in a diagnosis");
        assert_eq!(diagnoses.calls.load(Ordering::SeqCst), 1);
        assert!(!response.new_state.diagnosis_content().unwrap_or_default().is_empty());
        assert!(response.message.contains(i18n::pdf_prompt(Language::Es)));
        assert!(response.message.contains("Hola Ana"));
        assert_eq!(response.new_state.step.name(), "pdf_question");

        let cta = flow.process_message(&response.new_state, text("sí")).await;
        assert_eq!(cta.response_type, ResponseType::Cta);
        assert!(cta.is_complete);
        assert!(matches!(cta.new_state.step, FlowStep::Cta { wants_pdf: true, .. }));

        let done = flow.process_message(&cta.new_state, text("gracias")).await;
        assert_eq!(done.response_type, ResponseType::Completed);
        assert_eq!(done.message, i18n::completed_message(Language::Es));
        assert_eq!(done.new_state.step.name(), "completed");
        assert_eq!(
            done.new_state.diagnosis_content(),
            response.new_state.diagnosis_content()
        );
    }

    fn at_image_question() -> FlowState {
        let mut state = FlowState::new(Language::Es, None);
        state.mode = DiagnosticMode::Deep;
        state.asked_question_ids = (1..=questions::IMAGE_QUESTION_ID).collect();
        state.step = FlowStep::AskingQuestions {
            question_id: questions::IMAGE_QUESTION_ID,
            question_index: 13,
        };
        state
    }

    #[tokio::test]
    async fn photo_is_analyzed_and_stored() {
        let (flow, _) = flow_with(false, false);
        let image = ImageData {
            base64: "aGVsbG8=".into(),
            mime_type: "image/jpeg".into(),
        };
        let response = flow
            .process_message(
                &at_image_question(),
                IncomingMessage {
                    text: "",
                    image: Some(&image),
                    elapsed_ms: 30_000,
                },
            )
            .await;

        assert_eq!(response.response_type, ResponseType::Diagnosis);
        assert_eq!(
            response.image_analysis.as_deref(),
            Some("Lengua con una ligera capa blanca.")
        );
        assert_eq!(
            response.new_state.collected_info.image_analysis.as_deref(),
            Some("Lengua con una ligera capa blanca.")
        );
        assert_eq!(response.new_state.answers.last().unwrap().answer, PHOTO_ANSWER);
    }

    #[tokio::test]
    async fn failed_photo_analysis_does_not_block() {
        let (flow, _) = flow_with(false, true);
        let image = ImageData {
            base64: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        };
        let response = flow
            .process_message(
                &at_image_question(),
                IncomingMessage {
                    text: "aquí la tienes",
                    image: Some(&image),
                    elapsed_ms: 30_000,
                },
            )
            .await;

        assert_eq!(response.response_type, ResponseType::Diagnosis);
        assert!(response.image_analysis.is_none());
        assert!(response.new_state.collected_info.image_analysis.is_none());
    }

    #[tokio::test]
    async fn engaged_user_is_upgraded_but_never_downgraded() {
        let (flow, _) = flow_with(false, false);
        let mut state = started(&flow).await;
        state.mode = DiagnosticMode::Deep;

        let response = flow.process_message(&state, text("no")).await;
        assert_eq!(response.new_state.mode, DiagnosticMode::Deep);
    }
}
