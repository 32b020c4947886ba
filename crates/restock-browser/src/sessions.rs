//! Persisted per-provider session state.
//!
//! A session blob is an opaque snapshot of cookies plus per-origin
//! localStorage, captured after a successful login and replayed into a
//! fresh browser before the next run. Blobs are stored one JSON file per
//! provider under the store directory.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use restock_protocols::{AdapterError, ProviderId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::error::BrowserError;
use crate::tab::PageTab;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session blob serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SessionStoreError> for AdapterError {
    fn from(e: SessionStoreError) -> Self {
        AdapterError::Browser(e.to_string())
    }
}

/// localStorage contents for one origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginState {
    pub origin: String,
    pub local_storage: Vec<(String, String)>,
}

/// Opaque persisted session snapshot for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlob {
    pub provider: ProviderId,
    /// Raw CDP cookie objects, replayed verbatim via `Storage.setCookies`.
    pub cookies: Vec<Value>,
    pub origins: Vec<OriginState>,
    pub saved_at: DateTime<Utc>,
}

impl SessionBlob {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.iter().all(|o| o.local_storage.is_empty())
    }
}

/// One JSON file per provider under `dir`.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, provider: ProviderId) -> PathBuf {
        self.dir.join(format!("{provider}.json"))
    }

    pub async fn load(&self, provider: ProviderId) -> Result<Option<SessionBlob>, SessionStoreError> {
        let path = self.path_for(provider);
        match fs::read_to_string(&path).await {
            Ok(text) => {
                let blob: SessionBlob = serde_json::from_str(&text)?;
                debug!("Loaded session blob for {provider} from {}", path.display());
                Ok(Some(blob))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, blob: &SessionBlob) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(blob.provider);
        let text = serde_json::to_string_pretty(blob)?;
        fs::write(&path, text).await?;
        debug!(
            "Saved session blob for {} ({} cookies)",
            blob.provider,
            blob.cookies.len()
        );
        Ok(())
    }

    /// Remove a provider's persisted session. Returns whether a file existed.
    pub async fn clear(&self, provider: ProviderId) -> Result<bool, SessionStoreError> {
        let path = self.path_for(provider);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl PageTab {
    /// Capture cookies and the current origin's localStorage.
    pub async fn capture_session(&self, provider: ProviderId) -> Result<SessionBlob, BrowserError> {
        let result = self.call("Storage.getCookies", None).await?;
        let cookies = result["cookies"].as_array().cloned().unwrap_or_default();

        let origin = self
            .evaluate("window.location.origin")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let storage_json = self
            .evaluate("JSON.stringify(Object.entries(window.localStorage))")
            .await?;
        let local_storage: Vec<(String, String)> = storage_json
            .as_str()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_default();

        Ok(SessionBlob {
            provider,
            cookies,
            origins: vec![OriginState {
                origin,
                local_storage,
            }],
            saved_at: Utc::now(),
        })
    }

    /// Replay a blob: cookies browser-wide, localStorage for the origin the
    /// tab currently has open.
    pub async fn restore_session(&self, blob: &SessionBlob) -> Result<(), BrowserError> {
        if !blob.cookies.is_empty() {
            self.call("Storage.setCookies", Some(json!({"cookies": blob.cookies})))
                .await?;
        }

        let origin = self
            .evaluate("window.location.origin")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        if let Some(state) = blob.origins.iter().find(|o| o.origin == origin) {
            for (key, value) in &state.local_storage {
                let script = format!(
                    "window.localStorage.setItem({}, {})",
                    serde_json::to_string(key)?,
                    serde_json::to_string(value)?
                );
                self.evaluate(&script).await?;
            }
        }

        debug!("Restored session blob for {}", blob.provider);
        Ok(())
    }
}
