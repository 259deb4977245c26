use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::avatar::{AvatarError, AvatarHints, AvatarSource};
use crate::export::AvatarProvider;
use crate::llm::media::{download_media, reencode_png};
use crate::persona::schema::Gender;
use crate::utils::http::get_http_client;

#[derive(Debug, Deserialize)]
struct RandomUserResponse {
    #[serde(default)]
    results: Vec<RandomUserProfile>,
}

#[derive(Debug, Deserialize)]
struct RandomUserProfile {
    picture: Option<RandomUserPicture>,
}

#[derive(Debug, Deserialize)]
struct RandomUserPicture {
    large: Option<String>,
}

/// Looks up one random public profile of the requested gender and uses its
/// portrait.
#[derive(Debug, Clone)]
pub struct RandomUserSource {
    endpoint: String,
    timeout: Duration,
}

impl RandomUserSource {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        RandomUserSource { endpoint, timeout }
    }
}

// The directory only knows two genders; anything else is left unfiltered.
fn gender_filter(gender: Gender) -> Option<&'static str> {
    match gender {
        Gender::Male => Some("male"),
        Gender::Female => Some("female"),
        Gender::NonBinary | Gender::Other => None,
    }
}

fn extract_photo_url(payload: RandomUserResponse) -> Result<String, AvatarError> {
    let Some(profile) = payload.results.into_iter().next() else {
        return Err(AvatarError(
            "Failed to fetch random user data for photo.".to_string(),
        ));
    };

    profile
        .picture
        .and_then(|picture| picture.large)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            AvatarError("Random user data did not contain a large photo URL.".to_string())
        })
}

#[async_trait]
impl AvatarSource for RandomUserSource {
    fn provider(&self) -> AvatarProvider {
        AvatarProvider::RandomUser
    }

    async fn fetch(&self, hints: &AvatarHints) -> Result<Vec<u8>, AvatarError> {
        info!("Fetching random user photo...");
        let client = get_http_client();
        let mut request = client.get(&self.endpoint).timeout(self.timeout);
        if let Some(gender) = gender_filter(hints.gender) {
            request = request.query(&[("gender", gender)]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AvatarError(format!("Error fetching random user photo: {err}")))?;
        if !response.status().is_success() {
            return Err(AvatarError(format!(
                "Error fetching random user photo: status {}",
                response.status()
            )));
        }

        let payload = response
            .json::<RandomUserResponse>()
            .await
            .map_err(|err| AvatarError(format!("Random user response was not valid JSON: {err}")))?;
        let photo_url = extract_photo_url(payload)?;

        let bytes = download_media(&photo_url, self.timeout).await?;
        Ok(reencode_png(&bytes, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> RandomUserResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_results_mean_no_photo() {
        let err = extract_photo_url(parse(json!({ "results": [] }))).unwrap_err();
        assert!(err.to_string().contains("Failed to fetch random user data"));

        let err = extract_photo_url(parse(json!({ "info": {} }))).unwrap_err();
        assert!(err.to_string().contains("Failed to fetch random user data"));
    }

    #[test]
    fn profile_without_large_picture_means_no_photo() {
        let payload = parse(json!({
            "results": [{ "picture": { "thumbnail": "https://example.test/t.jpg" } }]
        }));
        let err = extract_photo_url(payload).unwrap_err();
        assert!(err.to_string().contains("large photo URL"));
    }

    #[test]
    fn picks_large_picture_of_first_profile() {
        let payload = parse(json!({
            "results": [
                { "picture": { "large": "https://example.test/1.jpg" } },
                { "picture": { "large": "https://example.test/2.jpg" } }
            ]
        }));
        assert_eq!(extract_photo_url(payload).unwrap(), "https://example.test/1.jpg");
    }

    #[test]
    fn only_binary_genders_are_filtered() {
        assert_eq!(gender_filter(Gender::Male), Some("male"));
        assert_eq!(gender_filter(Gender::Female), Some("female"));
        assert_eq!(gender_filter(Gender::NonBinary), None);
        assert_eq!(gender_filter(Gender::Other), None);
    }
}
