//! Memoized image acquisition shared across jobs.
//!
//! Every key is fetched at most once: concurrent `get` calls for a key that is
//! still loading wait on the same in-flight fetch. Failed fetches are retried
//! with a fixed backoff, then replaced by a transparent placeholder that is
//! cached like any other image.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use chatreel_core::{ChatreelError, ChatreelResult, FetchSettings, FrameBuffer};

use crate::emoji::emoji_url;
use crate::image_loader::load_image_from_bytes;

/// Side length of the placeholder substituted for images that cannot be loaded.
pub const PLACEHOLDER_SIZE: u32 = 100;

/// A decoded image, or the placeholder that stands in for it.
#[derive(Debug, Clone)]
pub struct Asset {
    pub key: String,
    pub image: Arc<FrameBuffer>,
    pub placeholder: bool,
}

impl Asset {
    fn placeholder(key: &str) -> Self {
        Self {
            key: key.to_string(),
            image: Arc::new(FrameBuffer::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)),
            placeholder: true,
        }
    }
}

/// Source of raw image data for asset keys.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn fetch(&self, key: &str) -> ChatreelResult<FrameBuffer>;
}

/// Resolves keys through a key → location map. Locations are `http(s)://`
/// URLs or filesystem paths; unmapped keys are used as locations directly,
/// and `emoji:` keys resolve to their glyph image URL.
pub struct LocationProvider {
    locations: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl LocationProvider {
    pub fn new(locations: BTreeMap<String, String>) -> ChatreelResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chatreel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatreelError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { locations, client })
    }

    /// Where `key` is loaded from.
    pub fn resolve(&self, key: &str) -> String {
        if let Some(location) = self.locations.get(key) {
            return location.clone();
        }
        emoji_url(key).unwrap_or_else(|| key.to_string())
    }

    async fn fetch_remote(&self, key: &str, url: &str) -> ChatreelResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChatreelError::asset(key, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatreelError::asset(key, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !is_image_content_type(&content_type) {
            return Err(ChatreelError::asset(
                key,
                format!("expected an image, got '{}'", content_type),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatreelError::asset(key, format!("failed to read body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Missing or generic content types are accepted and left to format sniffing.
fn is_image_content_type(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("image/")
        || content_type.starts_with("application/octet-stream")
        || content_type.starts_with("binary/octet-stream")
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[async_trait]
impl ImageProvider for LocationProvider {
    async fn fetch(&self, key: &str) -> ChatreelResult<FrameBuffer> {
        let location = self.resolve(key);
        let bytes = if is_remote(&location) {
            self.fetch_remote(key, &location).await?
        } else {
            let path = PathBuf::from(&location);
            tokio::fs::read(&path).await.map_err(|e| {
                ChatreelError::asset(key, format!("failed to read {}: {}", path.display(), e))
            })?
        };
        load_image_from_bytes(key, &bytes)
    }
}

/// Process-wide image cache.
pub struct AssetCache {
    provider: Arc<dyn ImageProvider>,
    policy: FetchSettings,
    entries: DashMap<String, Arc<OnceCell<Arc<Asset>>>>,
    loads: AtomicUsize,
    attempts: AtomicUsize,
}

impl AssetCache {
    pub fn new(provider: Arc<dyn ImageProvider>, policy: FetchSettings) -> Self {
        Self {
            provider,
            policy,
            entries: DashMap::new(),
            loads: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    /// The image for `key`, loading it on first use. Never fails.
    pub async fn get(&self, key: &str) -> Arc<Asset> {
        // Clone the cell out so no map shard lock is held across the await.
        let cell = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| self.load(key)).await.clone()
    }

    /// Load several keys into a frame-local set.
    pub async fn get_many<I, S>(&self, keys: I) -> AssetSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = AssetSet::default();
        for key in keys {
            let key = key.as_ref();
            if set.contains(key) {
                continue;
            }
            set.insert(self.get(key).await);
        }
        set
    }

    /// Already-loaded entry for `key`, without fetching.
    pub fn cached(&self, key: &str) -> Option<Arc<Asset>> {
        self.entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of distinct keys that have gone to the provider.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of provider calls, retries included.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn load(&self, key: &str) -> Arc<Asset> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let attempts = self.policy.retries.max(1);

        for attempt in 1..=attempts {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let result = match tokio::time::timeout(self.policy.timeout(), self.provider.fetch(key)).await {
                Ok(result) => result,
                Err(_) => Err(ChatreelError::asset(key, "timed out")),
            };

            match result {
                Ok(image) => {
                    tracing::debug!("loaded asset '{}' ({}x{})", key, image.width, image.height);
                    return Arc::new(Asset {
                        key: key.to_string(),
                        image: Arc::new(image),
                        placeholder: false,
                    });
                }
                Err(e) => {
                    tracing::warn!("asset fetch attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff()).await;
                    }
                }
            }
        }

        tracing::warn!("using placeholder for asset '{}'", key);
        Arc::new(Asset::placeholder(key))
    }
}

/// The assets one frame needs, resolved ahead of composition.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    assets: HashMap<String, Arc<Asset>>,
}

impl AssetSet {
    pub fn insert(&mut self, asset: Arc<Asset>) {
        self.assets.insert(asset.key.clone(), asset);
    }

    /// Insert a decoded image directly.
    pub fn insert_image(&mut self, key: &str, image: FrameBuffer) {
        self.insert(Arc::new(Asset {
            key: key.to_string(),
            image: Arc::new(image),
            placeholder: false,
        }));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.assets.get(key).map(|a| a.as_ref())
    }

    /// The real image for `key`; None when missing or a placeholder.
    pub fn image(&self, key: &str) -> Option<&FrameBuffer> {
        self.get(key)
            .filter(|a| !a.placeholder)
            .map(|a| a.image.as_ref())
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
