use serde::Serialize;
use serde_json::{Map, Value};

use crate::export::AvatarProvider;
use crate::persona::schema::{
    normalize_age, normalize_gender, normalize_list_field, normalize_tech_savviness,
    normalize_text, Gender, Interest, Platform, DEFAULT_TECH_SAVVINESS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    Upload,
    RandomUser,
    Stability,
    HuggingFace,
}

impl PhotoSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::RandomUser => "randomuser",
            Self::Stability => "stability",
            Self::HuggingFace => "huggingface",
        }
    }
}

impl From<AvatarProvider> for PhotoSource {
    fn from(provider: AvatarProvider) -> Self {
        match provider {
            AvatarProvider::RandomUser => Self::RandomUser,
            AvatarProvider::Stability => Self::Stability,
            AvatarProvider::HuggingFace => Self::HuggingFace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub source: PhotoSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaRecord {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub occupation: String,
    pub location: String,
    pub goals: String,
    pub frustrations: String,
    pub motivations: String,
    pub needs: String,
    pub skills: String,
    pub pain_points: String,
    pub tech_savviness: u8,
    pub interests: Vec<Interest>,
    pub platforms: Vec<Platform>,
    #[serde(skip)]
    pub photo: Option<Photo>,
}

impl Default for PersonaRecord {
    fn default() -> Self {
        PersonaRecord {
            name: String::new(),
            age: 0,
            gender: Gender::default(),
            occupation: String::new(),
            location: String::new(),
            goals: String::new(),
            frustrations: String::new(),
            motivations: String::new(),
            needs: String::new(),
            skills: String::new(),
            pain_points: String::new(),
            tech_savviness: DEFAULT_TECH_SAVVINESS,
            interests: Vec::new(),
            platforms: Vec::new(),
            photo: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaField {
    Name,
    Age,
    Gender,
    Occupation,
    Location,
    Goals,
    Frustrations,
    Motivations,
    Needs,
    Skills,
    PainPoints,
    TechSavviness,
    Interests,
    Platforms,
}

impl PersonaField {
    pub const ALL: [PersonaField; 14] = [
        Self::Name,
        Self::Age,
        Self::Gender,
        Self::Occupation,
        Self::Location,
        Self::Goals,
        Self::Frustrations,
        Self::Motivations,
        Self::Needs,
        Self::Skills,
        Self::PainPoints,
        Self::TechSavviness,
        Self::Interests,
        Self::Platforms,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Occupation => "occupation",
            Self::Location => "location",
            Self::Goals => "goals",
            Self::Frustrations => "frustrations",
            Self::Motivations => "motivations",
            Self::Needs => "needs",
            Self::Skills => "skills",
            Self::PainPoints => "pain_points",
            Self::TechSavviness => "tech_savviness",
            Self::Interests => "interests",
            Self::Platforms => "platforms",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|field| field.key() == lowered)
    }
}

impl PersonaRecord {
    /// Applies one field through the normalizers. Returns `false` when the
    /// value was unusable and the field kept its previous content.
    pub fn apply_value(&mut self, field: PersonaField, value: &Value) -> bool {
        match field {
            PersonaField::Age => match normalize_age(value) {
                Some(age) => self.age = age,
                None => return false,
            },
            PersonaField::Gender => self.gender = normalize_gender(value),
            PersonaField::TechSavviness => self.tech_savviness = normalize_tech_savviness(value),
            PersonaField::Interests => self.interests = normalize_list_field(value),
            PersonaField::Platforms => self.platforms = normalize_list_field(value),
            text_field => {
                let Some(text) = normalize_text(value) else {
                    return false;
                };
                let Some(slot) = self.text_slot(text_field) else {
                    return false;
                };
                *slot = text;
            }
        }
        true
    }

    /// A direct user edit. Lists are given comma-separated.
    pub fn set_field(&mut self, field: PersonaField, raw: &str) -> bool {
        self.apply_value(field, &Value::String(raw.to_string()))
    }

    /// Overwrites every recognized field present in `payload`; absent keys
    /// are left as they are. Returns the fields that were applied.
    pub fn merge_generated(&mut self, payload: &Map<String, Value>) -> Vec<PersonaField> {
        let mut applied = Vec::new();
        for field in PersonaField::ALL {
            if let Some(value) = payload.get(field.key()) {
                if self.apply_value(field, value) {
                    applied.push(field);
                }
            }
        }
        applied
    }

    pub fn text_value(&self, field: PersonaField) -> Option<&str> {
        let value = match field {
            PersonaField::Name => &self.name,
            PersonaField::Occupation => &self.occupation,
            PersonaField::Location => &self.location,
            PersonaField::Goals => &self.goals,
            PersonaField::Frustrations => &self.frustrations,
            PersonaField::Motivations => &self.motivations,
            PersonaField::Needs => &self.needs,
            PersonaField::Skills => &self.skills,
            PersonaField::PainPoints => &self.pain_points,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn text_slot(&mut self, field: PersonaField) -> Option<&mut String> {
        let slot = match field {
            PersonaField::Name => &mut self.name,
            PersonaField::Occupation => &mut self.occupation,
            PersonaField::Location => &mut self.location,
            PersonaField::Goals => &mut self.goals,
            PersonaField::Frustrations => &mut self.frustrations,
            PersonaField::Motivations => &mut self.motivations,
            PersonaField::Needs => &mut self.needs,
            PersonaField::Skills => &mut self.skills,
            PersonaField::PainPoints => &mut self.pain_points,
            _ => return None,
        };
        Some(slot)
    }

    pub fn has_uploaded_photo(&self) -> bool {
        matches!(
            self.photo,
            Some(Photo {
                source: PhotoSource::Upload,
                ..
            })
        )
    }
}
