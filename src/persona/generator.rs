//! The generation pipeline: prompt the text model, recover a JSON object
//! from whatever it answered, validate it into the session's persona and
//! attach an avatar when the user has not uploaded one.
//!
//! The session is only touched after the model output parsed, so a failed
//! run leaves the previous persona exactly as it was.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::avatar::{AvatarAcquirer, AvatarHints};
use crate::config::PERSONA_PROMPT_TEMPLATE;
use crate::export::AvatarProvider;
use crate::llm::{GeminiTextGenerator, TextGenerationError, TextGenerator};
use crate::persona::record::{PersonaField, Photo};
use crate::persona::schema::{Gender, Interest, Platform, Vocabulary};
use crate::state::AppState;
use crate::utils::timing::{complete_run_timer, start_run_timer};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid JSON response from AI. Raw response:\n{raw}")]
    InvalidJson { raw: String },
    #[error("Error communicating with the generation service: {0}")]
    Transport(String),
    #[error("AI generation failed: {0}")]
    Failed(String),
}

impl From<TextGenerationError> for GenerationError {
    fn from(err: TextGenerationError) -> Self {
        match err {
            TextGenerationError::Transport(message) => GenerationError::Transport(message),
            TextGenerationError::Provider(message) => GenerationError::Failed(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// A user upload was present; no provider was called.
    KeptUpload,
    Acquired(AvatarProvider),
    Unavailable {
        provider: AvatarProvider,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub applied_fields: Vec<PersonaField>,
    pub photo: PhotoOutcome,
}

pub fn build_persona_prompt() -> String {
    PERSONA_PROMPT_TEMPLATE
        .replace("{interests}", &Interest::labels().join(", "))
        .replace("{platforms}", &Platform::labels().join(", "))
        .replace("{genders}", &Gender::labels().join(", "))
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_persona_payload(raw: &str) -> Result<Map<String, Value>, GenerationError> {
    let invalid = || GenerationError::InvalidJson {
        raw: raw.to_string(),
    };
    match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(invalid()),
    }
}

pub struct PersonaGenerator {
    text: Box<dyn TextGenerator>,
    avatars: AvatarAcquirer,
}

impl PersonaGenerator {
    pub fn new(text: Box<dyn TextGenerator>, avatars: AvatarAcquirer) -> Self {
        PersonaGenerator { text, avatars }
    }

    pub fn from_config() -> Self {
        PersonaGenerator::new(
            Box::new(GeminiTextGenerator::from_config()),
            AvatarAcquirer::from_config(),
        )
    }

    pub async fn generate(&self, state: &mut AppState) -> Result<GenerationReport, GenerationError> {
        let provider = state.settings.avatar_provider;
        let mut timer = start_run_timer(
            "generate_persona",
            provider.id(),
            state.settings.template.id(),
        );

        match self.run(state).await {
            Ok(report) => {
                let detail = format!(
                    "fields={} photo={:?}",
                    report.applied_fields.len(),
                    report.photo
                );
                complete_run_timer(&mut timer, "success", Some(detail));
                Ok(report)
            }
            Err(err) => {
                let status = match &err {
                    GenerationError::InvalidJson { .. } => "invalid_json",
                    GenerationError::Transport(_) => "transport_error",
                    GenerationError::Failed(_) => "error",
                };
                warn!("Persona generation failed: {}", err);
                complete_run_timer(&mut timer, status, None);
                Err(err)
            }
        }
    }

    async fn run(&self, state: &mut AppState) -> Result<GenerationReport, GenerationError> {
        let prompt = build_persona_prompt();
        let raw = self.text.generate(&prompt).await?;
        let payload = parse_persona_payload(&raw)?;

        let mut persona = state.persona.clone();
        let applied_fields = persona.merge_generated(&payload);
        info!(
            "Model {} produced {} usable persona field(s)",
            self.text.model(),
            applied_fields.len()
        );

        let photo = if persona.has_uploaded_photo() {
            info!("Using uploaded photo...");
            PhotoOutcome::KeptUpload
        } else {
            let provider = state.settings.avatar_provider;
            let hints = AvatarHints {
                name: persona.name.clone(),
                age: persona.age,
                gender: persona.gender,
                occupation: persona.occupation.clone(),
            };
            match self.avatars.acquire(provider, &hints).await {
                Ok(bytes) => {
                    persona.photo = Some(Photo {
                        bytes,
                        source: provider.into(),
                    });
                    PhotoOutcome::Acquired(provider)
                }
                Err(err) => {
                    persona.photo = None;
                    PhotoOutcome::Unavailable {
                        provider,
                        reason: err.to_string(),
                    }
                }
            }
        };

        state.persona = persona;
        state.submitted = true;
        Ok(GenerationReport {
            applied_fields,
            photo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::avatar::{AvatarError, AvatarSource};
    use crate::export::Template;
    use crate::llm::media::tests::tiny_png;
    use crate::persona::record::PhotoSource;
    use crate::state::GenerationSettings;

    const PERSONA_JSON: &str = r#"{
        "name": "Alex Chen",
        "age": 28,
        "gender": "Non-Binary",
        "occupation": "UX Designer",
        "location": "Berlin",
        "goals": "Improve accessibility in tech products",
        "frustrations": "Slow design approval processes",
        "motivations": "Creating inclusive digital experiences",
        "needs": "Better collaboration tools",
        "skills": "Figma, User Research",
        "pain_points": "Limited budget for user testing",
        "tech_savviness": 4,
        "interests": ["Design", "Technology"],
        "platforms": ["Desktop", "Tablet"]
    }"#;

    struct ScriptedText(Result<String, fn() -> TextGenerationError>);

    #[async_trait]
    impl TextGenerator for ScriptedText {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, TextGenerationError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(make_error) => Err(make_error()),
            }
        }
    }

    struct RecordingAvatar {
        provider: AvatarProvider,
        outcome: Result<Vec<u8>, String>,
        calls: Arc<AtomicUsize>,
        last_hints: Arc<Mutex<Option<AvatarHints>>>,
    }

    #[async_trait]
    impl AvatarSource for RecordingAvatar {
        fn provider(&self) -> AvatarProvider {
            self.provider
        }

        async fn fetch(&self, hints: &AvatarHints) -> Result<Vec<u8>, AvatarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_hints.lock().unwrap() = Some(hints.clone());
            self.outcome.clone().map_err(AvatarError)
        }
    }

    struct Harness {
        generator: PersonaGenerator,
        calls: Arc<AtomicUsize>,
        last_hints: Arc<Mutex<Option<AvatarHints>>>,
    }

    fn harness(text: Result<String, fn() -> TextGenerationError>, avatar: Result<Vec<u8>, String>) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let last_hints = Arc::new(Mutex::new(None));
        let avatars = AvatarAcquirer::new(vec![Box::new(RecordingAvatar {
            provider: AvatarProvider::RandomUser,
            outcome: avatar,
            calls: calls.clone(),
            last_hints: last_hints.clone(),
        })]);
        Harness {
            generator: PersonaGenerator::new(Box::new(ScriptedText(text)), avatars),
            calls,
            last_hints,
        }
    }

    fn session() -> AppState {
        AppState::new(GenerationSettings {
            avatar_provider: AvatarProvider::RandomUser,
            template: Template::Modern,
        })
    }

    #[test]
    fn fenced_output_parses_like_bare_json() {
        let fenced = format!("```json\n{PERSONA_JSON}\n```");
        assert_eq!(
            parse_persona_payload(&fenced).unwrap(),
            parse_persona_payload(PERSONA_JSON).unwrap()
        );
        let bare_fence = format!("```\n{PERSONA_JSON}\n```\n");
        assert_eq!(
            parse_persona_payload(&bare_fence).unwrap(),
            parse_persona_payload(PERSONA_JSON).unwrap()
        );
    }

    #[test]
    fn strip_code_fence_handles_single_line_and_plain_text() {
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn non_object_json_is_rejected_with_raw_text() {
        match parse_persona_payload("[1, 2, 3]") {
            Err(GenerationError::InvalidJson { raw }) => assert_eq!(raw, "[1, 2, 3]"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn prompt_lists_every_vocabulary() {
        let prompt = build_persona_prompt();
        assert!(prompt.contains(
            "Interests MUST be from: Technology, Design, Music, Sports, Reading, Travel, Gaming, Fitness"
        ));
        assert!(prompt.contains("Platforms MUST be from: Mobile, Desktop, Tablet, Smartwatch, VR/AR"));
        assert!(prompt.contains("Gender MUST be from: Male, Female, Non-Binary, Other"));
        assert!(prompt.contains("\"pain_points\""));
    }

    #[tokio::test]
    async fn successful_run_merges_fields_and_photo() {
        let photo = tiny_png(2, 2);
        let h = harness(Ok(format!("```json\n{PERSONA_JSON}\n```")), Ok(photo.clone()));
        let mut state = session();

        let report = h.generator.generate(&mut state).await.unwrap();

        assert_eq!(report.applied_fields.len(), 14);
        assert_eq!(report.photo, PhotoOutcome::Acquired(AvatarProvider::RandomUser));
        assert!(state.submitted);
        assert_eq!(state.persona.name, "Alex Chen");
        assert_eq!(state.persona.gender, Gender::NonBinary);
        assert_eq!(state.persona.tech_savviness, 4);
        assert_eq!(state.persona.interests, vec![Interest::Design, Interest::Technology]);
        let stored = state.persona.photo.as_ref().unwrap();
        assert_eq!(stored.bytes, photo);
        assert_eq!(stored.source, PhotoSource::RandomUser);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_json_leaves_state_untouched() {
        let h = harness(Ok("not json at all".to_string()), Ok(tiny_png(1, 1)));
        let mut state = session();
        state.persona.name = "Existing".to_string();
        let before = state.clone();

        let err = h.generator.generate(&mut state).await.unwrap_err();

        match err {
            GenerationError::InvalidJson { raw } => assert_eq!(raw, "not json at all"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(state, before);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_reported_and_state_kept() {
        let h = harness(
            Err(|| TextGenerationError::Transport("connection refused".to_string())),
            Ok(tiny_png(1, 1)),
        );
        let mut state = session();
        let before = state.clone();

        let err = h.generator.generate(&mut state).await.unwrap_err();

        assert!(matches!(err, GenerationError::Transport(ref message) if message == "connection refused"));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn provider_failure_is_a_generic_generation_error() {
        let h = harness(
            Err(|| TextGenerationError::Provider("No text returned".to_string())),
            Ok(tiny_png(1, 1)),
        );
        let mut state = session();
        let err = h.generator.generate(&mut state).await.unwrap_err();
        assert_eq!(err.to_string(), "AI generation failed: No text returned");
        assert!(!state.submitted);
    }

    #[tokio::test]
    async fn uploaded_photo_takes_precedence() {
        let h = harness(Ok(PERSONA_JSON.to_string()), Ok(tiny_png(1, 1)));
        let mut state = session();
        let upload = tiny_png(5, 5);
        state
            .attach_uploaded_photo(upload.clone(), 1024 * 1024)
            .unwrap();

        let report = h.generator.generate(&mut state).await.unwrap();

        assert_eq!(report.photo, PhotoOutcome::KeptUpload);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        let stored = state.persona.photo.as_ref().unwrap();
        assert_eq!(stored.bytes, upload);
        assert_eq!(stored.source, PhotoSource::Upload);
        assert_eq!(state.persona.name, "Alex Chen");
    }

    #[tokio::test]
    async fn missing_avatar_still_populates_fields() {
        let h = harness(
            Ok(PERSONA_JSON.to_string()),
            Err("Failed to fetch random user data for photo.".to_string()),
        );
        let mut state = session();

        let report = h.generator.generate(&mut state).await.unwrap();

        match report.photo {
            PhotoOutcome::Unavailable { provider, reason } => {
                assert_eq!(provider, AvatarProvider::RandomUser);
                assert!(reason.contains("Failed to fetch random user data"));
            }
            other => panic!("unexpected photo outcome: {other:?}"),
        }
        assert!(state.persona.photo.is_none());
        assert!(state.submitted);
        assert_eq!(state.persona.occupation, "UX Designer");
        assert_eq!(state.persona.pain_points, "Limited budget for user testing");
        assert_eq!(state.persona.platforms, vec![Platform::Desktop, Platform::Tablet]);
    }

    #[tokio::test]
    async fn avatar_hints_use_validated_values() {
        let h = harness(
            Ok(r#"{"name": "Sam", "gender": "Robot", "occupation": "Pilot", "age": "44"}"#.to_string()),
            Ok(tiny_png(1, 1)),
        );
        let mut state = session();

        h.generator.generate(&mut state).await.unwrap();

        let hints = h.last_hints.lock().unwrap().clone().unwrap();
        assert_eq!(
            hints,
            AvatarHints {
                name: "Sam".to_string(),
                age: 44,
                gender: Gender::Other,
                occupation: "Pilot".to_string(),
            }
        );
        assert_eq!(state.persona.tech_savviness, 3);
    }
}
