//! crates/diagnostic_core/src/i18n.rs
//!
//! Localized copy used by the conversation: welcome and closing messages,
//! block transitions, occupation insights, fallbacks and word lists.

use crate::domain::Language;
use crate::questions::Block;

pub fn emotional_words(language: Language) -> &'static [&'static str] {
    match language {
        Language::Es => &[
            "siento", "frustrad", "preocupad", "ansiedad", "miedo", "triste", "angusti",
            "desesper", "agobiad", "harta", "harto", "cansad", "dolor", "molest", "vergüenza",
            "nervios", "estrés", "estres", "odio", "sufr",
        ],
        Language::En => &[
            "feel", "frustrat", "worried", "worry", "anxious", "anxiety", "afraid", "fear",
            "sad", "desperate", "overwhelm", "tired", "exhausted", "pain", "embarrass",
            "nervous", "stress", "hate", "suffer", "upset",
        ],
    }
}

pub fn interrogative_words(language: Language) -> &'static [&'static str] {
    match language {
        Language::Es => &[
            "qué", "cómo", "cuándo", "dónde", "cuál", "cuáles", "cuánto", "cuánta", "cuántos",
            "quién", "porqué",
        ],
        Language::En => &["what", "how", "why", "when", "where", "which", "who", "should", "could"],
    }
}

pub fn welcome(language: Language, user_name: Option<&str>) -> String {
    match (language, user_name) {
        (Language::Es, Some(name)) => format!(
            "¡Hola {name}! 👋 Soy tu asistente de salud digestiva. Te haré unas preguntas sobre tus \
             hábitos y síntomas para preparar un diagnóstico personalizado. Responde con tus propias \
             palabras, no hay respuestas incorrectas. ¿Empezamos?"
        ),
        (Language::Es, None) => "¡Hola! 👋 Soy tu asistente de salud digestiva. Te haré unas preguntas \
             sobre tus hábitos y síntomas para preparar un diagnóstico personalizado. Responde con tus \
             propias palabras, no hay respuestas incorrectas. ¿Empezamos?"
            .to_string(),
        (Language::En, Some(name)) => format!(
            "Hi {name}! 👋 I'm your digestive health assistant. I'll ask you a few questions about your \
             habits and symptoms to prepare a personalized assessment. Answer in your own words, there \
             are no wrong answers. Shall we start?"
        ),
        (Language::En, None) => "Hi! 👋 I'm your digestive health assistant. I'll ask you a few questions \
             about your habits and symptoms to prepare a personalized assessment. Answer in your own \
             words, there are no wrong answers. Shall we start?"
            .to_string(),
    }
}

pub fn start_intro(language: Language) -> &'static str {
    match language {
        Language::Es => "¡Perfecto! Empecemos.",
        Language::En => "Great! Let's begin.",
    }
}

pub fn validation_feedback(language: Language) -> &'static str {
    match language {
        Language::Es => "No he podido entender tu respuesta. ¿Podrías escribirla de nuevo con un poco más de detalle?",
        Language::En => "I couldn't understand your answer. Could you write it again with a bit more detail?",
    }
}

pub fn block_transition(language: Language, block: Block) -> &'static str {
    match (language, block) {
        (Language::Es, Block::Profile) => "Primero, conozcámonos un poco.",
        (Language::Es, Block::Problem) => "Ahora hablemos de lo que te trae por aquí.",
        (Language::Es, Block::Diet) => "Pasemos a tu alimentación, una pieza clave de tu digestión.",
        (Language::Es, Block::Lifestyle) => "Veamos ahora tu estilo de vida: hidratación, movimiento y descanso.",
        (Language::Es, Block::Health) => "Unas preguntas sobre tu salud general.",
        (Language::Es, Block::Motivation) => "Ya casi terminamos. Hablemos de tus objetivos.",
        (Language::Es, Block::Photo) => "Un último paso opcional antes de tu diagnóstico.",
        (Language::En, Block::Profile) => "First, let's get to know each other a little.",
        (Language::En, Block::Problem) => "Now let's talk about what brings you here.",
        (Language::En, Block::Diet) => "Let's move on to your diet, a key piece of your digestion.",
        (Language::En, Block::Lifestyle) => "Now let's look at your lifestyle: hydration, movement and rest.",
        (Language::En, Block::Health) => "A few questions about your general health.",
        (Language::En, Block::Motivation) => "We're almost done. Let's talk about your goals.",
        (Language::En, Block::Photo) => "One last optional step before your assessment.",
    }
}

pub fn comment_fallback(language: Language) -> &'static str {
    match language {
        Language::Es => "Gracias por compartirlo, es muy útil para entender tu caso.",
        Language::En => "Thank you for sharing that, it really helps me understand your situation.",
    }
}

pub fn diagnosis_fallback(language: Language) -> &'static str {
    match language {
        Language::Es => "Gracias por completar el cuestionario. Ahora mismo no he podido preparar tu análisis \
             detallado, pero tus respuestas están guardadas y nuestro equipo podrá revisarlas contigo.",
        Language::En => "Thank you for completing the questionnaire. I couldn't prepare your detailed analysis \
             right now, but your answers are saved and our team can review them with you.",
    }
}

pub fn pdf_prompt(language: Language) -> &'static str {
    match language {
        Language::Es => "📄 ¿Quieres descargar tu diagnóstico en PDF para consultarlo cuando quieras?",
        Language::En => "📄 Would you like to download your assessment as a PDF to keep it handy?",
    }
}

pub fn cta_message(language: Language, wants_pdf: bool) -> String {
    let pdf_line = match (language, wants_pdf) {
        (Language::Es, true) => "Tu PDF está listo para descargar. ",
        (Language::En, true) => "Your PDF is ready to download. ",
        (_, false) => "",
    };
    match language {
        Language::Es => format!(
            "{pdf_line}Como agradecimiento por tu tiempo, tienes un 30% de descuento en nuestro programa \
             de salud digestiva durante los próximos 7 días. ¡Tu digestión te lo agradecerá! 🌿"
        ),
        Language::En => format!(
            "{pdf_line}As a thank you for your time, you get a 30% discount on our digestive health \
             program for the next 7 days. Your gut will thank you! 🌿"
        ),
    }
}

pub fn completed_message(language: Language) -> &'static str {
    match language {
        Language::Es => "Tu diagnóstico ya está listo. Da el siguiente paso y empieza hoy tu programa con tu descuento. 🌿",
        Language::En => "Your assessment is ready. Take the next step and start your program today with your discount. 🌿",
    }
}

/// Occupation families with a dedicated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupationKind {
    Office,
    Healthcare,
    Education,
    Physical,
    Student,
    Other,
}

pub fn occupation_insight(language: Language, kind: OccupationKind, age: u32) -> String {
    match (language, kind) {
        (Language::Es, OccupationKind::Office) => format!(
            "Con {age} años y un trabajo de oficina, pasar muchas horas sentado y comer con prisa frente a la \
             pantalla puede ralentizar tu digestión. Es algo muy habitual y tiene solución."
        ),
        (Language::Es, OccupationKind::Healthcare) => format!(
            "Con {age} años y trabajando en el ámbito sanitario, los turnos cambiantes y las comidas a \
             deshoras ponen a prueba tu sistema digestivo. Cuidas de los demás; ahora toca cuidarte a ti."
        ),
        (Language::Es, OccupationKind::Education) => format!(
            "Con {age} años y dedicándote a la enseñanza, el estrés de las clases y los horarios ajustados \
             suelen reflejarse en la digestión."
        ),
        (Language::Es, OccupationKind::Physical) => format!(
            "Con {age} años y un trabajo físicamente exigente, tu cuerpo necesita una digestión eficiente \
             para rendir. Comer rápido o a deshoras es un factor frecuente en tu caso."
        ),
        (Language::Es, OccupationKind::Student) => format!(
            "Con {age} años y estudiando, los horarios irregulares y el estrés de los exámenes afectan más \
             de lo que parece a tu digestión."
        ),
        (Language::Es, OccupationKind::Other) => format!(
            "Gracias. Con {age} años, tu rutina diaria influye mucho en cómo digieres. Vamos a verlo en detalle."
        ),
        (Language::En, OccupationKind::Office) => format!(
            "At {age} and working in an office, long hours sitting and rushed meals at the screen can slow \
             down your digestion. It's very common and it can be improved."
        ),
        (Language::En, OccupationKind::Healthcare) => format!(
            "At {age} and working in healthcare, changing shifts and irregular meals put your digestive \
             system to the test. You take care of others; now it's time to take care of yourself."
        ),
        (Language::En, OccupationKind::Education) => format!(
            "At {age} and working in education, classroom stress and tight schedules often show up in \
             your digestion."
        ),
        (Language::En, OccupationKind::Physical) => format!(
            "At {age} and with a physically demanding job, your body needs efficient digestion to perform. \
             Eating fast or at odd hours is a frequent factor in your case."
        ),
        (Language::En, OccupationKind::Student) => format!(
            "At {age} and studying, irregular schedules and exam stress affect your digestion more than \
             it seems."
        ),
        (Language::En, OccupationKind::Other) => format!(
            "Thank you. At {age}, your daily routine has a big influence on how you digest. Let's look at it in detail."
        ),
    }
}

/// Words that mark a positive reply to a yes/no prompt.
pub fn affirmative_words(language: Language) -> &'static [&'static str] {
    match language {
        Language::Es => &["sí", "si", "claro", "vale", "por supuesto", "ok", "dale", "quiero"],
        Language::En => &["yes", "yeah", "sure", "ok", "please", "of course", "yep"],
    }
}
