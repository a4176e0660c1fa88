use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

pub const GOOGLE_PUBLIC_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

const DEFAULT_MAX_AGE: u64 = 3600;

#[derive(Error, Debug)]
pub enum KeyFetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Key fetch failed with status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("No public key with kid {0}")]
    UnknownKey(String),
}

#[derive(Clone)]
struct CachedKeys {
    keys: HashMap<String, String>,
    expires_at: Instant,
}

/// Caches Google's token-signing certificates for as long as `Cache-Control` allows.
#[derive(Clone)]
pub struct PublicKeyManager {
    client: Client,
    url: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl Default for PublicKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicKeyManager {
    pub fn new() -> Self {
        Self::new_with_url(GOOGLE_PUBLIC_KEYS_URL)
    }

    pub fn new_with_url(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get_key(&self, kid: &str) -> Result<String, KeyFetchError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = &*cache {
                if Instant::now() < cached.expires_at {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| KeyFetchError::UnknownKey(kid.to_string()))
    }

    async fn refresh_keys(&self) -> Result<(), KeyFetchError> {
        tracing::debug!(url = %self.url, "refreshing token signing keys");
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(KeyFetchError::BadStatus(response.status()));
        }

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_MAX_AGE);

        let keys: HashMap<String, String> = response.json().await?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys,
            expires_at: Instant::now() + Duration::from_secs(max_age),
        });

        Ok(())
    }
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|part| {
        part.trim()
            .strip_prefix("max-age=")
            .and_then(|age| age.parse::<u64>().ok())
    })
}
