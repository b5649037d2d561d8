//! Content store collaborator: fetch datasets, upload attestation documents

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::CollaboratorError;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Bytes, CollaboratorError>;

    /// Store `bytes` under `name`, returning the new content locator.
    async fn upload(&self, bytes: Bytes, name: &str) -> Result<String, CollaboratorError>;
}

/// IPFS-style gateway for reads plus an `/api/v0/add` endpoint for writes.
pub struct HttpContentStore {
    gateway_url: String,
    upload_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl HttpContentStore {
    pub fn new(gateway_url: String, upload_url: String, api_key: String) -> Self {
        Self {
            gateway_url,
            upload_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn object_url(&self, locator: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url.trim_end_matches('/'), locator)
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn fetch(&self, locator: &str) -> Result<Bytes, CollaboratorError> {
        let resp = self
            .client
            .get(self.object_url(locator))
            .send()
            .await
            .map_err(CollaboratorError::from_reqwest)?
            .error_for_status()
            .map_err(CollaboratorError::from_reqwest)?;
        resp.bytes().await.map_err(CollaboratorError::from_reqwest)
    }

    async fn upload(&self, bytes: Bytes, name: &str) -> Result<String, CollaboratorError> {
        let part = reqwest::multipart::Part::stream(bytes)
            .file_name(name.to_string())
            .mime_str("application/json")
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/api/v0/add", self.upload_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(CollaboratorError::from_reqwest)?
            .error_for_status()
            .map_err(CollaboratorError::from_reqwest)?;

        let added: AddResponse = resp.json().await.map_err(CollaboratorError::from_reqwest)?;
        if added.hash.trim().is_empty() {
            return Err(CollaboratorError::Decode("upload response without Hash".into()));
        }
        Ok(added.hash)
    }
}

/// In-process store (tests, demos). Failures can be scripted per call.
#[derive(Default)]
pub struct InMemoryContentStore {
    objects: Mutex<HashMap<String, Bytes>>,
    uploads: Mutex<Vec<(String, String)>>, // (name, locator)
    fetch_failures: Mutex<VecDeque<CollaboratorError>>,
    upload_failures: Mutex<VecDeque<CollaboratorError>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, locator: &str, bytes: impl Into<Bytes>) {
        self.objects.lock().await.insert(locator.to_string(), bytes.into());
    }

    pub async fn get(&self, locator: &str) -> Option<Bytes> {
        self.objects.lock().await.get(locator).cloned()
    }

    /// Next fetch calls fail with these errors, in order.
    pub async fn fail_fetches(&self, errs: impl IntoIterator<Item = CollaboratorError>) {
        self.fetch_failures.lock().await.extend(errs);
    }

    pub async fn fail_uploads(&self, errs: impl IntoIterator<Item = CollaboratorError>) {
        self.upload_failures.lock().await.extend(errs);
    }

    pub async fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().await.clone()
    }

    fn locator_for(bytes: &[u8]) -> String {
        format!("mem{}", hex::encode(Sha256::digest(bytes)))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch(&self, locator: &str) -> Result<Bytes, CollaboratorError> {
        if let Some(e) = self.fetch_failures.lock().await.pop_front() {
            return Err(e);
        }
        self.objects
            .lock()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| CollaboratorError::Rejected(format!("{locator} not found")))
    }

    async fn upload(&self, bytes: Bytes, name: &str) -> Result<String, CollaboratorError> {
        if let Some(e) = self.upload_failures.lock().await.pop_front() {
            return Err(e);
        }
        let locator = Self::locator_for(&bytes);
        self.objects.lock().await.insert(locator.clone(), bytes);
        self.uploads.lock().await.push((name.to_string(), locator.clone()));
        Ok(locator)
    }
}
