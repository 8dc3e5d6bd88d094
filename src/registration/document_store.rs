//! Document storage backends
//! Layout:
//!   events/{event_id}/event.json
//!   events/{event_id}/registrations/{registration_id}.json
//!   messages/{message_id}.json

use async_trait::async_trait;
use cloud_storage::{Client, ListRequest};
use futures::stream::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::registration::config::RegistrationConfig;
use crate::registration::error::RegistrationError;

/// Path keyed JSON document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn write(&self, path: &str, body: Vec<u8>) -> Result<(), RegistrationError>;

    /// `Ok(None)` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, RegistrationError>;

    /// Every stored path starting with `prefix`, in lexical order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, RegistrationError>;

    async fn remove(&self, path: &str) -> Result<(), RegistrationError>;
}

pub(crate) async fn write_json<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    path: &str,
    document: &T,
) -> Result<(), RegistrationError> {
    let body = serde_json::to_vec_pretty(document)?;
    store.write(path, body).await
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &str,
) -> Result<Option<T>, RegistrationError> {
    match store.read(path).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

/// Reads every document under the given paths, skipping the ones that fail to load.
pub(crate) async fn read_all_json<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    paths: &[String],
) -> Vec<T> {
    let reads = paths.iter().map(|path| async move {
        match read_json::<T>(store, path).await {
            Ok(Some(doc)) => Some(doc),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read document {}: {}", path, e);
                None
            }
        }
    });

    futures::future::join_all(reads)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// In-process store used for local development and tests.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn write(&self, path: &str, body: Vec<u8>) -> Result<(), RegistrationError> {
        self.documents.write().await.insert(path.to_string(), body);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, RegistrationError> {
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, RegistrationError> {
        let documents = self.documents.read().await;
        Ok(documents
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn remove(&self, path: &str) -> Result<(), RegistrationError> {
        self.documents.write().await.remove(path);
        Ok(())
    }
}

/// Firebase Storage bucket holding one JSON object per document.
pub struct BucketStore {
    client: Client,
    bucket_name: String,
}

impl BucketStore {
    pub fn new(config: &RegistrationConfig) -> Result<Self, RegistrationError> {
        if config.bucket_name.is_empty() {
            return Err(RegistrationError::ConfigError(
                "bucket_name must be set for bucket storage".to_string(),
            ));
        }
        if !config.credentials_path.exists() {
            return Err(RegistrationError::CredentialsFileError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "Service account file '{}' does not exist",
                    config.credentials_path.display()
                ),
            )));
        }

        // cloud-storage reads SERVICE_ACCOUNT, exported by the binary before the runtime starts
        let client = Client::default();

        info!("BucketStore initialized with bucket: {}", config.bucket_name);

        Ok(Self {
            client,
            bucket_name: config.bucket_name.clone(),
        })
    }

    fn is_missing(err: &cloud_storage::Error) -> bool {
        let err_str = err.to_string();
        err_str.contains("404") || err_str.contains("not found") || err_str.contains("No such object")
    }
}

#[async_trait]
impl DocumentStore for BucketStore {
    async fn write(&self, path: &str, body: Vec<u8>) -> Result<(), RegistrationError> {
        self.client
            .object()
            .create(&self.bucket_name, body, path, "application/json")
            .await
            .map_err(|e| {
                RegistrationError::FirebaseApiError(format!("Failed to write {}: {}", path, e))
            })?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, RegistrationError> {
        match self.client.object().download(&self.bucket_name, path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if Self::is_missing(&e) => Ok(None),
            Err(e) => Err(RegistrationError::FirebaseApiError(format!(
                "Failed to download {}: {}",
                path, e
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, RegistrationError> {
        let request = ListRequest {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        };

        let stream = self
            .client
            .object()
            .list(&self.bucket_name, request)
            .await
            .map_err(|e| {
                RegistrationError::FirebaseApiError(format!("Failed to list {}: {}", prefix, e))
            })?;

        tokio::pin!(stream);

        let mut paths = Vec::new();
        while let Some(result) = stream.next().await {
            let object_list = result.map_err(|e| {
                RegistrationError::FirebaseApiError(format!("Error listing {}: {}", prefix, e))
            })?;
            paths.extend(
                object_list
                    .items
                    .into_iter()
                    .map(|obj| obj.name)
                    .filter(|name| name.starts_with(prefix)),
            );
        }

        paths.sort();
        Ok(paths)
    }

    async fn remove(&self, path: &str) -> Result<(), RegistrationError> {
        match self.client.object().delete(&self.bucket_name, path).await {
            Ok(()) => Ok(()),
            Err(e) if Self::is_missing(&e) => Ok(()),
            Err(e) => Err(RegistrationError::FirebaseApiError(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prefix_listing_does_not_leak_into_sibling_keys() {
        let store = MemoryStore::new();
        store.write("events/ab/event.json", b"{}".to_vec()).await.unwrap();
        store
            .write("events/ab/registrations/r1.json", b"{}".to_vec())
            .await
            .unwrap();
        store.write("events/abc/event.json", b"{}".to_vec()).await.unwrap();
        store.write("messages/m1.json", b"{}".to_vec()).await.unwrap();

        let listed = store.list("events/ab/").await.unwrap();
        assert_eq!(
            listed,
            vec!["events/ab/event.json", "events/ab/registrations/r1.json"]
        );
        assert_eq!(store.list("events/").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn removing_a_missing_document_is_not_an_error() {
        let store = MemoryStore::new();
        store.remove("messages/nope.json").await.unwrap();
        assert!(store.read("messages/nope.json").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
