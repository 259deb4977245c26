use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::avatar::{AvatarError, AvatarHints, AvatarSource};
use crate::config::HUGGINGFACE_PROMPT_TEMPLATE;
use crate::export::AvatarProvider;
use crate::llm::media::{reencode_png, truncate_for_log};
use crate::utils::http::get_http_client;

#[derive(Debug, Clone)]
pub struct HuggingFaceSource {
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl HuggingFaceSource {
    pub fn new(endpoint: String, token: String, timeout: Duration) -> Self {
        HuggingFaceSource {
            endpoint,
            token,
            timeout,
        }
    }
}

pub fn build_prompt(hints: &AvatarHints) -> String {
    HUGGINGFACE_PROMPT_TEMPLATE
        .replace("{name}", &hints.name)
        .replace("{age}", &hints.age.to_string())
        .replace("{gender}", hints.gender_label())
        .replace("{occupation}", &hints.occupation)
}

#[async_trait]
impl AvatarSource for HuggingFaceSource {
    fn provider(&self) -> AvatarProvider {
        AvatarProvider::HuggingFace
    }

    async fn fetch(&self, hints: &AvatarHints) -> Result<Vec<u8>, AvatarError> {
        info!("Generating AI avatar with Hugging Face for {}", hints.name);
        let mut request = get_http_client()
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({ "inputs": build_prompt(hints) }));
        // The inference API also serves anonymous callers at a lower rate.
        if !self.token.trim().is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await.map_err(|err| {
            AvatarError(format!(
                "Error generating AI avatar with Stable Diffusion: {err}"
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Hugging Face API error: status={}, body={}",
                status,
                truncate_for_log(&body, 800)
            );
            return Err(AvatarError(format!(
                "Error generating AI avatar with Stable Diffusion: status {status}"
            )));
        }

        let bytes = response.bytes().await.map_err(|err| {
            AvatarError(format!(
                "Error generating AI avatar with Stable Diffusion: {err}"
            ))
        })?;
        Ok(reencode_png(&bytes, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::schema::Gender;

    #[test]
    fn prompt_carries_every_hint() {
        let prompt = build_prompt(&AvatarHints {
            name: "Priya Nair".to_string(),
            age: 41,
            gender: Gender::Female,
            occupation: "Nurse Manager".to_string(),
        });
        assert!(prompt.contains("1. PERSON: Priya Nair (41 years old)"));
        assert!(prompt.contains("2. GENDER: Female (strictly follow this)"));
        assert!(prompt.contains("3. OCCUPATION: Nurse Manager"));
        assert!(prompt.contains("- Female-typical facial features"));
    }
}
