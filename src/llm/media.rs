use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::ImageFormat;
use tracing::warn;

use crate::utils::http::get_http_client;

const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_image(data: &[u8]) -> bool {
    detect_mime_type(data)
        .map(|mime| mime.starts_with("image/"))
        .unwrap_or(false)
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("image could not be decoded: {0}")]
    Decode(String),
}

/// Single GET attempt. Failures are returned, never retried.
pub async fn download_media(url: &str, timeout: Duration) -> Result<Vec<u8>, MediaError> {
    let client = get_http_client();
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| {
            warn!(
                "Failed to fetch media {url}: {err} (timeout={}, connect={})",
                err.is_timeout(),
                err.is_connect()
            );
            MediaError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body = truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT);
        warn!("Media download failed for {url} with status {}: {}", status, body);
        return Err(MediaError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|err| MediaError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })
}

/// Decodes any supported image and re-encodes it as PNG, optionally resized
/// to an exact square with a bicubic filter.
pub fn reencode_png(data: &[u8], square: Option<u32>) -> Result<Vec<u8>, MediaError> {
    let mut decoded =
        image::load_from_memory(data).map_err(|err| MediaError::Decode(err.to_string()))?;
    if let Some(side) = square {
        decoded = decoded.resize_exact(side, side, FilterType::CatmullRom);
    }

    let mut buffer = Cursor::new(Vec::new());
    decoded
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| MediaError::Decode(err.to_string()))?;
    Ok(buffer.into_inner())
}
