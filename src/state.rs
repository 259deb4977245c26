use tracing::info;

use crate::config::CONFIG;
use crate::export::{AvatarProvider, Template};
use crate::llm::media::is_image;
use crate::persona::record::{PersonaField, PersonaRecord, Photo, PhotoSource};

const REQUIRED_FIELDS: [PersonaField; 3] = [
    PersonaField::Name,
    PersonaField::Occupation,
    PersonaField::Goals,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationSettings {
    pub avatar_provider: AvatarProvider,
    pub template: Template,
}

impl GenerationSettings {
    pub fn from_config() -> Self {
        GenerationSettings {
            avatar_provider: CONFIG.avatar_provider,
            template: CONFIG.template,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhotoUploadError {
    #[error("File size must be under {limit} bytes (got {size}).")]
    TooLarge { size: usize, limit: usize },
    #[error("Uploaded file is not a recognised image.")]
    NotAnImage,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// The single in-memory session: the persona being built plus the choices
/// that steer generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub persona: PersonaRecord,
    pub submitted: bool,
    pub settings: GenerationSettings,
}

impl AppState {
    pub fn new(settings: GenerationSettings) -> Self {
        AppState {
            persona: PersonaRecord::default(),
            submitted: false,
            settings,
        }
    }

    pub fn reset(&mut self) {
        self.persona = PersonaRecord::default();
        self.submitted = false;
    }

    pub fn attach_uploaded_photo(
        &mut self,
        bytes: Vec<u8>,
        limit: usize,
    ) -> Result<(), PhotoUploadError> {
        if bytes.len() > limit {
            return Err(PhotoUploadError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
        if !is_image(&bytes) {
            return Err(PhotoUploadError::NotAnImage);
        }

        info!("Attached uploaded photo ({} bytes)", bytes.len());
        self.persona.photo = Some(Photo {
            bytes,
            source: PhotoSource::Upload,
        });
        Ok(())
    }

    pub fn submit(&mut self) -> Result<(), SubmitError> {
        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| {
                self.persona
                    .text_value(*field)
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|field| field.key())
            .collect();

        if !missing.is_empty() {
            return Err(SubmitError::MissingFields(missing));
        }
        self.submitted = true;
        Ok(())
    }
}
