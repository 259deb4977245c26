use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use tracing::{info, warn};

use crate::avatar::{AvatarError, AvatarHints, AvatarSource};
use crate::config::STABILITY_PROMPT_TEMPLATE;
use crate::export::AvatarProvider;
use crate::llm::media::{reencode_png, truncate_for_log};
use crate::persona::schema::Gender;
use crate::utils::http::get_http_client;

pub const STABILITY_SEED: u32 = 42;
pub const STABILITY_REQUEST_SIDE: u32 = 512;
pub const AVATAR_THUMBNAIL_SIDE: u32 = 256;

#[derive(Debug, Clone)]
pub struct StabilitySource {
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl StabilitySource {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Self {
        StabilitySource {
            endpoint,
            api_key,
            timeout,
        }
    }
}

pub fn build_prompt(hints: &AvatarHints) -> String {
    let gender = hints.gender_label();
    STABILITY_PROMPT_TEMPLATE
        .replace("{name}", &hints.name)
        .replace("{gender_lower}", &gender.to_lowercase())
        .replace("{occupation_lower}", &hints.occupation.to_lowercase())
        .replace("{gender}", gender)
}

/// Excludes cues of the opposite gender plus the usual artefacts.
pub fn negative_prompt(gender: Gender) -> String {
    let exclusion = match gender {
        Gender::Male => "woman, female, makeup, dress, earrings",
        Gender::Female => "man, male, beard, mustache",
        Gender::NonBinary | Gender::Other => "gender-stereotypical",
    };
    format!("{exclusion}, cartoon, anime, blurry, deformed, text, watermark")
}

#[async_trait]
impl AvatarSource for StabilitySource {
    fn provider(&self) -> AvatarProvider {
        AvatarProvider::Stability
    }

    async fn fetch(&self, hints: &AvatarHints) -> Result<Vec<u8>, AvatarError> {
        if self.api_key.trim().is_empty() {
            return Err(AvatarError(
                "Missing Stability API key (STABILITY_API_KEY).".to_string(),
            ));
        }

        info!("Generating Stability avatar for {}", hints.name);
        let side = STABILITY_REQUEST_SIDE.to_string();
        let form = Form::new()
            .text("prompt", build_prompt(hints))
            .text("negative_prompt", negative_prompt(hints.gender))
            .text("output_format", "png")
            .text("width", side.clone())
            .text("height", side)
            .text("seed", STABILITY_SEED.to_string());

        let response = get_http_client()
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "image/*")
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|err| AvatarError(format!("API Error: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Stability API error: status={}, body={}",
                status,
                truncate_for_log(&body, 800)
            );
            return Err(AvatarError(format!("API Error: status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| AvatarError(format!("API Error: {err}")))?;
        Ok(reencode_png(&bytes, Some(AVATAR_THUMBNAIL_SIDE))?)
    }
}
