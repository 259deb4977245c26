use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::export::{AvatarProvider, Template};

pub const DEFAULT_MAX_PHOTO_UPLOAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_timeout_seconds: u64,
    pub stability_api_key: String,
    pub stability_endpoint: String,
    pub huggingface_token: String,
    pub huggingface_endpoint: String,
    pub randomuser_endpoint: String,
    pub image_timeout_seconds: u64,
    pub avatar_provider: AvatarProvider,
    pub template: Template,
    pub max_photo_upload_bytes: usize,
    /// Fallback notices gathered while loading. `CONFIG` is first touched
    /// before the subscriber exists, so `main` logs these once it does.
    pub warnings: Vec<String>,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_avatar_provider(value: String, warnings: &mut Vec<String>) -> AvatarProvider {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return AvatarProvider::default();
    }
    AvatarProvider::from_id(trimmed).unwrap_or_else(|| {
        warnings.push(format!(
            "Unknown AVATAR_PROVIDER value '{}'; defaulting to {}.",
            value,
            AvatarProvider::default().id()
        ));
        AvatarProvider::default()
    })
}

fn normalize_template(value: String, warnings: &mut Vec<String>) -> Template {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Template::default();
    }
    Template::from_id(trimmed).unwrap_or_else(|| {
        warnings.push(format!(
            "Unknown PERSONA_TEMPLATE value '{}'; defaulting to {}.",
            value,
            Template::default().id()
        ));
        Template::default()
    })
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut warnings = Vec::new();
        let avatar_provider =
            normalize_avatar_provider(env_string("AVATAR_PROVIDER", "randomuser"), &mut warnings);
        let template = normalize_template(env_string("PERSONA_TEMPLATE", "basic"), &mut warnings);

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_endpoint: env_string(
                "GEMINI_ENDPOINT",
                "https://generativelanguage.googleapis.com/v1beta/models",
            ),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 0),
            stability_api_key: env_string("STABILITY_API_KEY", ""),
            stability_endpoint: env_string(
                "STABILITY_ENDPOINT",
                "https://api.stability.ai/v2beta/stable-image/generate/core",
            ),
            huggingface_token: env_string("HUGGINGFACE_TOKEN", ""),
            huggingface_endpoint: env_string(
                "HUGGINGFACE_ENDPOINT",
                "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0",
            ),
            randomuser_endpoint: env_string("RANDOMUSER_ENDPOINT", "https://randomuser.me/api/"),
            image_timeout_seconds: env_u64("IMAGE_TIMEOUT_SECONDS", 10),
            avatar_provider,
            template,
            max_photo_upload_bytes: env_usize(
                "MAX_PHOTO_UPLOAD_BYTES",
                DEFAULT_MAX_PHOTO_UPLOAD_BYTES,
            ),
            warnings,
        })
    }
}

pub const PERSONA_PROMPT_TEMPLATE: &str = r#"Generate a realistic user persona with these REQUIREMENTS:
- Interests MUST be from: {interests}
- Platforms MUST be from: {platforms}
- Gender MUST be from: {genders}
- Tech savviness MUST be 1-5
- Return valid JSON format like this example:
{
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

pub const STABILITY_PROMPT_TEMPLATE: &str = r#"Professional corporate headshot of {name}, {gender_lower} {occupation_lower}.
Hyper-realistic studio portrait with:
- Strictly {gender_lower}-appearing subject
- {gender}-appropriate business attire
- Neutral gray background
- High detail (512x512 resolution)
- Professional hairstyle
- Confident expression

Technical requirements:
- Photorealistic style
- No artistic filters
- No visible jewelry (unless culturally appropriate)
- Crisp focus on facial features"#;

pub const HUGGINGFACE_PROMPT_TEMPLATE: &str = r#"Generate a professional profile photo matching these SPECIFIC characteristics:
1. PERSON: {name} ({age} years old)
2. GENDER: {gender} (strictly follow this)
3. OCCUPATION: {occupation}

STYLE REQUIREMENTS:
- Corporate headshot, hyper-realistic
- Gender-appropriate professional attire
- {gender}-typical facial features
- Studio lighting, neutral gray background
- High detail (256x256 resolution)

RULES:
- MUST respect specified gender
- NO gender ambiguity
- NO artistic interpretations
- Focus on professional appearance"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_avatar_provider_falls_back_with_a_notice() {
        let mut warnings = Vec::new();
        assert_eq!(
            normalize_avatar_provider("dalle".into(), &mut warnings),
            AvatarProvider::RandomUser
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("AVATAR_PROVIDER"));
        assert!(warnings[0].contains("dalle"));
    }

    #[test]
    fn unknown_template_falls_back_with_a_notice() {
        let mut warnings = Vec::new();
        assert_eq!(
            normalize_template("poster".into(), &mut warnings),
            Template::Basic
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("poster"));
    }

    #[test]
    fn known_and_blank_values_are_silent() {
        let mut warnings = Vec::new();
        assert_eq!(
            normalize_avatar_provider(" Stability ".into(), &mut warnings),
            AvatarProvider::Stability
        );
        assert_eq!(
            normalize_template("".into(), &mut warnings),
            Template::Basic
        );
        assert_eq!(
            normalize_template("CREATIVE".into(), &mut warnings),
            Template::Creative
        );
        assert!(warnings.is_empty());
    }
}
