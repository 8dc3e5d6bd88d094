//! Signed image uploads for coordinator photos
//! Files are forwarded to the media host under {folder}/ and served from its CDN.

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{error, info};

use crate::registration::config::MediaHostConfig;
use crate::registration::error::RegistrationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
}

#[derive(Deserialize)]
struct HostUploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct HostErrorResponse {
    error: Option<HostErrorDetail>,
}

#[derive(Deserialize)]
struct HostErrorDetail {
    message: Option<String>,
}

/// Hex SHA-1 over the signed parameters followed by the account secret.
pub fn sign_upload(folder: &str, timestamp: i64, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("folder={}&timestamp={}{}", folder, timestamp, api_secret).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ImageStorage {
    http: reqwest::Client,
    config: MediaHostConfig,
}

impl ImageStorage {
    pub fn new(config: MediaHostConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    pub fn too_large(&self) -> RegistrationError {
        RegistrationError::UploadRejected(format!(
            "File must be less than {}MB",
            self.config.max_upload_bytes / (1024 * 1024)
        ))
    }

    /// Rejects oversized files before anything leaves the server.
    pub fn check_size(&self, len: usize) -> Result<(), RegistrationError> {
        if len > self.config.max_upload_bytes {
            return Err(self.too_large());
        }
        Ok(())
    }

    /// Upload an image and return its hosted URL.
    pub async fn upload_image(
        &self,
        filename: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<UploadedImage, RegistrationError> {
        self.check_size(data.len())?;

        let size = data.len();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign_upload(&self.config.folder, timestamp, &self.config.api_secret);

        let mut file = Part::bytes(data).file_name(filename.to_string());
        if let Some(mime) = content_type {
            file = file.mime_str(mime).map_err(|e| {
                RegistrationError::UploadRejected(format!("Invalid content type: {}", e))
            })?;
        }

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .text("folder", self.config.folder.clone());

        let resp = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Upload error: {}", e);
                RegistrationError::UploadFailed("Upload failed".to_string())
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp
                .json::<HostErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "Upload failed".to_string());
            error!("Media host error ({}): {}", status, message);
            return Err(RegistrationError::UploadFailed(message));
        }

        let body: HostUploadResponse = resp.json().await.map_err(|e| {
            error!("Unreadable media host response: {}", e);
            RegistrationError::UploadFailed("Upload failed".to_string())
        })?;

        info!("Uploaded image '{}' ({} bytes): {}", filename, size, body.secure_url);
        Ok(UploadedImage {
            url: body.secure_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_covers_folder_timestamp_and_secret() {
        let mut hasher = Sha1::new();
        hasher.update(b"folder=zenith-coordinators&timestamp=1700000000abc123");
        let expected = format!("{:x}", hasher.finalize());

        let signature = sign_upload("zenith-coordinators", 1_700_000_000, "abc123");

        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 40);
        assert_ne!(signature, sign_upload("zenith-coordinators", 1_700_000_000, "other"));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let storage = ImageStorage::new(MediaHostConfig::default());
        assert!(storage.check_size(10 * 1024 * 1024).is_ok());
        let err = storage.check_size(10 * 1024 * 1024 + 1).unwrap_err();
        assert_eq!(err.public_message(), "File must be less than 10MB");
    }
}
