pub mod adaptive;
pub mod diagnosis;
pub mod discount;
pub mod domain;
pub mod engagement;
pub mod extract;
pub mod flow;
pub mod i18n;
pub mod ports;
pub mod questions;
pub mod quiz;

pub use domain::{
    AnsweredQuestion, ChatMessage, CollectedInfo, Diagnosis, DiagnosticMode, DiscountCode,
    EngagementScore, EngagementSignals, FlowState, FlowStep, ImageData, Language, LeadUpdate,
    MessageRole, NewSession, QuizAnswer, Session, SessionUpdate,
};
pub use flow::{DiagnosticFlow, FlowResponse, IncomingMessage, ResponseType};
pub use ports::{
    CrmSyncService, DatabaseService, DiagnosisGenerationService, EmpathyCommentService,
    ImageAnalysisService, PortError, PortResult,
};
