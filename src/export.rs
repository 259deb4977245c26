use anyhow::Result;

use crate::persona::record::PersonaRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Template {
    #[default]
    Basic,
    Modern,
    Professional,
    Creative,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Self::Basic,
        Self::Modern,
        Self::Professional,
        Self::Creative,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Modern => "modern",
            Self::Professional => "professional",
            Self::Creative => "creative",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Basic => "Simple clean layout",
            Self::Modern => "Modern card with icons",
            Self::Professional => "Corporate style",
            Self::Creative => "Colorful creative layout",
        }
    }

    pub fn from_id(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|template| template.id() == lowered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarProvider {
    #[default]
    RandomUser,
    Stability,
    HuggingFace,
}

impl AvatarProvider {
    pub const ALL: [AvatarProvider; 3] = [Self::RandomUser, Self::Stability, Self::HuggingFace];

    pub fn id(self) -> &'static str {
        match self {
            Self::RandomUser => "randomuser",
            Self::Stability => "stability",
            Self::HuggingFace => "huggingface",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::RandomUser => "From Random User Website API",
            Self::Stability => "AI Model",
            Self::HuggingFace => "Stable Diffusion XL Base Model",
        }
    }

    pub fn from_id(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|provider| provider.id() == lowered)
    }
}

/// Pretty JSON of the persona fields. The photo is never included.
pub fn to_json(record: &PersonaRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(record)?)
}

pub fn export_file_stem(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "persona".to_string();
    }
    trimmed.to_lowercase().replace(' ', "_")
}
