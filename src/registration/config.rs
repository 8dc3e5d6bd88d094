//! Configuration for the symposium registration service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::registration::error::RegistrationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Bucket,
}

/// Identity Toolkit project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://identitytoolkit.googleapis.com".to_string(),
        }
    }
}

/// Third-party image host the upload proxy forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaHostConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub base_url: String,
    pub max_upload_bytes: usize,
}

impl Default for MediaHostConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "zenith-coordinators".to_string(),
            base_url: "https://api.cloudinary.com".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub bind: String,
    pub storage: StorageBackend,
    /// Path to the service account credentials JSON file
    pub credentials_path: PathBuf,
    pub bucket_name: String,
    /// Comma separated admin emails
    pub admin_emails: String,
    pub identity: IdentityConfig,
    pub media: MediaHostConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            storage: StorageBackend::Memory,
            credentials_path: PathBuf::from("credentials/service-account.json"),
            bucket_name: String::new(),
            admin_emails: String::new(),
            identity: IdentityConfig::default(),
            media: MediaHostConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Reads the TOML file when present, then lets the environment override secrets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistrationError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| {
                RegistrationError::ConfigError(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&text).map_err(|e| {
                RegistrationError::ConfigError(format!(
                    "Failed to parse '{}': {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 7] = [
            ("ADMIN_EMAILS", &mut self.admin_emails),
            ("FIREBASE_API_KEY", &mut self.identity.api_key),
            ("FIREBASE_BUCKET", &mut self.bucket_name),
            ("CLOUDINARY_CLOUD_NAME", &mut self.media.cloud_name),
            ("CLOUDINARY_API_KEY", &mut self.media.api_key),
            ("CLOUDINARY_API_SECRET", &mut self.media.api_secret),
            ("SYMPOSIUM_BIND", &mut self.bind),
        ];

        for (key, target) in overrides {
            if let Some(value) = lookup(key) {
                info!("{} set from environment", key);
                *target = value;
            }
        }

        if let Some(path) = lookup("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_path = PathBuf::from(path);
        }
    }

    /// Credentials are only checked for presence.
    pub fn check(&self) -> Result<(), RegistrationError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str, value: &str| {
            if value.trim().is_empty() {
                missing.push(name);
            }
        };

        require("admin_emails", &self.admin_emails);
        require("identity.api_key", &self.identity.api_key);
        require("media.cloud_name", &self.media.cloud_name);
        require("media.api_key", &self.media.api_key);
        require("media.api_secret", &self.media.api_secret);
        if self.storage == StorageBackend::Bucket {
            require("bucket_name", &self.bucket_name);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError::ConfigError(format!(
                "missing settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Environment variable cloud-storage reads the service account from.
    /// Only bucket storage needs it; it must be exported before any threads start.
    pub fn service_account_env(&self) -> Option<(&'static str, &Path)> {
        match self.storage {
            StorageBackend::Bucket => Some(("SERVICE_ACCOUNT", self.credentials_path.as_path())),
            StorageBackend::Memory => None,
        }
    }

    pub fn with_bucket(mut self, bucket_name: impl Into<String>) -> Self {
        self.storage = StorageBackend::Bucket;
        self.bucket_name = bucket_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn toml_file_fills_nested_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind = "127.0.0.1:8080"
storage = "bucket"
bucket_name = "zenith.appspot.com"

[media]
cloud_name = "zenith"
"#
        )
        .unwrap();

        let config = RegistrationConfig::load(file.path()).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.storage, StorageBackend::Bucket);
        assert_eq!(config.media.cloud_name, "zenith");
        assert_eq!(config.media.folder, "zenith-coordinators");
        assert_eq!(config.media.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn environment_overrides_secrets() {
        let env = HashMap::from([
            ("ADMIN_EMAILS", "a@zenith.in,b@zenith.in"),
            ("CLOUDINARY_API_SECRET", "shh"),
        ]);
        let mut config = RegistrationConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.admin_emails, "a@zenith.in,b@zenith.in");
        assert_eq!(config.media.api_secret, "shh");
        assert!(config.identity.api_key.is_empty());
    }

    #[test]
    fn check_lists_every_missing_secret() {
        let err = RegistrationConfig::default()
            .with_bucket("")
            .check()
            .unwrap_err()
            .to_string();
        assert!(err.contains("admin_emails"));
        assert!(err.contains("media.api_secret"));
        assert!(err.contains("bucket_name"));
    }

    #[test]
    fn unreadable_config_path_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = RegistrationConfig::load(dir.path()).unwrap_err();

        assert!(matches!(err, RegistrationError::ConfigError(_)));
        let message = err.to_string();
        assert!(message.contains("Failed to read"));
        assert!(message.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn only_bucket_storage_exports_the_service_account() {
        let memory = RegistrationConfig::default();
        assert!(memory.service_account_env().is_none());

        let bucket = RegistrationConfig {
            credentials_path: PathBuf::from("keys/zenith.json"),
            ..RegistrationConfig::default()
        }
        .with_bucket("zenith.appspot.com");
        assert_eq!(
            bucket.service_account_env(),
            Some(("SERVICE_ACCOUNT", Path::new("keys/zenith.json")))
        );
    }
}
