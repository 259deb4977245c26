//! Best-effort avatar acquisition.
//!
//! Each provider is an [`AvatarSource`]; the [`AvatarAcquirer`] dispatches to
//! the one selected for the session. Every call is attempted exactly once and
//! a failure is only ever a "no photo" outcome with a readable cause.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::export::AvatarProvider;
use crate::llm::media::MediaError;
use crate::persona::schema::{Gender, Vocabulary};
use crate::utils::timing::log_llm_timing;

pub mod huggingface;
pub mod random_user;
pub mod stability;

pub use huggingface::HuggingFaceSource;
pub use random_user::RandomUserSource;
pub use stability::StabilitySource;

#[derive(Debug, thiserror::Error)]
#[error("Avatar generation failed: {0}")]
pub struct AvatarError(pub String);

impl From<MediaError> for AvatarError {
    fn from(err: MediaError) -> Self {
        AvatarError(err.to_string())
    }
}

/// The persona attributes a provider may use to shape the photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarHints {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub occupation: String,
}

impl AvatarHints {
    pub fn gender_label(&self) -> &'static str {
        self.gender.label()
    }
}

#[async_trait]
pub trait AvatarSource: Send + Sync {
    fn provider(&self) -> AvatarProvider;

    /// Returns PNG bytes.
    async fn fetch(&self, hints: &AvatarHints) -> Result<Vec<u8>, AvatarError>;
}

pub struct AvatarAcquirer {
    sources: Vec<Box<dyn AvatarSource>>,
}

impl AvatarAcquirer {
    pub fn new(sources: Vec<Box<dyn AvatarSource>>) -> Self {
        AvatarAcquirer { sources }
    }

    pub fn from_config() -> Self {
        let timeout = Duration::from_secs(CONFIG.image_timeout_seconds.max(1));
        AvatarAcquirer::new(vec![
            Box::new(RandomUserSource::new(
                CONFIG.randomuser_endpoint.clone(),
                timeout,
            )),
            Box::new(StabilitySource::new(
                CONFIG.stability_endpoint.clone(),
                CONFIG.stability_api_key.clone(),
                timeout,
            )),
            Box::new(HuggingFaceSource::new(
                CONFIG.huggingface_endpoint.clone(),
                CONFIG.huggingface_token.clone(),
                timeout,
            )),
        ])
    }

    pub async fn acquire(
        &self,
        strategy: AvatarProvider,
        hints: &AvatarHints,
    ) -> Result<Vec<u8>, AvatarError> {
        let Some(source) = self
            .sources
            .iter()
            .find(|source| source.provider() == strategy)
        else {
            return Err(AvatarError(format!(
                "no avatar source registered for '{}'",
                strategy.id()
            )));
        };

        let metadata = json!({ "gender": hints.gender_label() });
        let result = log_llm_timing(
            strategy.id(),
            strategy.id(),
            "acquire_avatar",
            Some(metadata),
            || source.fetch(hints),
        )
        .await;

        match &result {
            Ok(bytes) => info!(
                "Acquired avatar from {} ({} bytes)",
                strategy.id(),
                bytes.len()
            ),
            Err(err) => warn!("Avatar from {} unavailable: {}", strategy.id(), err),
        }
        result
    }
}
