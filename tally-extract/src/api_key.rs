//! OCR API key sources.
//!
//! A key comes from config, an environment variable, or a key-issuing
//! service. [`CachedKey`] makes any of them a fetch-once source; keys from
//! the environment or the service are fetched once per process.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::KeyConfig;
use crate::error::KeyError;

#[async_trait]
pub trait ApiKeySource: Send + Sync {
    async fn api_key(&self) -> Result<String, KeyError>;
}

pub struct StaticKey(pub String);

#[async_trait]
impl ApiKeySource for StaticKey {
    async fn api_key(&self) -> Result<String, KeyError> {
        if self.0.trim().is_empty() {
            return Err(KeyError::Missing("configured key is empty".to_string()));
        }
        Ok(self.0.clone())
    }
}

pub struct EnvKey {
    pub var: String,
}

#[async_trait]
impl ApiKeySource for EnvKey {
    async fn api_key(&self) -> Result<String, KeyError> {
        match std::env::var(&self.var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(KeyError::Env(self.var.clone())),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    api_key: Option<String>,
}

/// Asks a key-issuing service for the OCR key. The service answers a POST
/// with `{"apiKey": "..."}`.
pub struct KeyServiceClient {
    http: Client,
    url: String,
    token: Option<String>,
}

impl KeyServiceClient {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl ApiKeySource for KeyServiceClient {
    async fn api_key(&self) -> Result<String, KeyError> {
        let mut req = self.http.post(&self.url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(KeyError::Status(resp.status().as_u16()));
        }
        let body: KeyResponse = resp.json().await?;
        body.api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| KeyError::Missing(format!("no apiKey in response from {}", self.url)))
    }
}

static PROCESS_KEY: OnceCell<String> = OnceCell::const_new();

enum KeyCell {
    Owned(OnceCell<String>),
    Process(&'static OnceCell<String>),
}

/// Fetches once from the inner source, then serves the cached key.
/// Failures are not cached; the next call retries.
pub struct CachedKey {
    inner: Arc<dyn ApiKeySource>,
    cell: KeyCell,
}

impl CachedKey {
    pub fn new(inner: Arc<dyn ApiKeySource>) -> Self {
        Self {
            inner,
            cell: KeyCell::Owned(OnceCell::new()),
        }
    }

    /// Share one cached key with every other process-wide source. The first
    /// successful fetch wins.
    pub fn process_wide(inner: Arc<dyn ApiKeySource>) -> Self {
        Self {
            inner,
            cell: KeyCell::Process(&PROCESS_KEY),
        }
    }

    fn cell(&self) -> &OnceCell<String> {
        match &self.cell {
            KeyCell::Owned(cell) => cell,
            KeyCell::Process(cell) => *cell,
        }
    }
}

#[async_trait]
impl ApiKeySource for CachedKey {
    async fn api_key(&self) -> Result<String, KeyError> {
        let key = self
            .cell()
            .get_or_try_init(|| async {
                debug!("fetching OCR API key");
                let key = self.inner.api_key().await?;
                info!("OCR API key retrieved");
                Ok::<_, KeyError>(key)
            })
            .await?;
        Ok(key.clone())
    }
}

/// Build the key source described by `cfg`. A configured key is used as
/// is; anything fetched goes through the process-wide cache.
pub fn key_source_from(cfg: &KeyConfig) -> Arc<dyn ApiKeySource> {
    if let Some(key) = &cfg.api_key {
        return Arc::new(StaticKey(key.clone()));
    }
    let inner: Arc<dyn ApiKeySource> =
        if std::env::var(&cfg.env_var).is_ok_and(|v| !v.trim().is_empty()) {
            Arc::new(EnvKey {
                var: cfg.env_var.clone(),
            })
        } else if let Some(url) = &cfg.service_url {
            Arc::new(KeyServiceClient::new(url.clone(), cfg.service_token.clone()))
        } else {
            Arc::new(EnvKey {
                var: cfg.env_var.clone(),
            })
        };
    Arc::new(CachedKey::process_wide(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiKeySource for Flaky {
        async fn api_key(&self) -> Result<String, KeyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(KeyError::Status(503))
            } else {
                Ok(format!("key-{n}"))
            }
        }
    }

    #[tokio::test]
    async fn test_cached_key_retries_after_failure_then_caches() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedKey::new(flaky.clone());

        assert!(matches!(cached.api_key().await, Err(KeyError::Status(503))));
        assert_eq!(cached.api_key().await.unwrap(), "key-1");
        assert_eq!(cached.api_key().await.unwrap(), "key-1");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_process_wide_key_is_fetched_once() {
        let first_source = Arc::new(Flaky {
            calls: AtomicUsize::new(1),
        });
        let second_source = Arc::new(Flaky {
            calls: AtomicUsize::new(7),
        });

        let first = CachedKey::process_wide(first_source.clone()).api_key().await.unwrap();
        // a second extractor's source is never asked
        let second = CachedKey::process_wide(second_source.clone()).api_key().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second_source.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_static_and_env_keys() {
        assert_eq!(StaticKey("abc".into()).api_key().await.unwrap(), "abc");
        assert!(StaticKey(" ".into()).api_key().await.is_err());

        let missing = EnvKey {
            var: "TALLY_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        };
        match missing.api_key().await {
            Err(KeyError::Env(var)) => assert_eq!(var, "TALLY_TEST_KEY_THAT_IS_NEVER_SET"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configured_key_wins() {
        let cfg = KeyConfig {
            api_key: Some("from-config".to_string()),
            service_url: Some("http://127.0.0.1:9/key".to_string()),
            ..KeyConfig::default()
        };
        assert_eq!(key_source_from(&cfg).api_key().await.unwrap(), "from-config");
    }
}
