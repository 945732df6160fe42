//! Watch page and player script fetching with a per-script cipher cache

use crate::core::extract::{initial_player_response, js_url, publish_date};
use crate::core::stream::{build_streams, Stream, StreamContext, StreamQuery};
use crate::error::RtubeError;
use crate::platform::cipher::Cipher;
use crate::utils::retry::{RetryConfig, RetryExecutor};
use crate::utils::url::{extract_video_id, watch_url};
use moka::future::Cache;
use reqwest::{header::CONTENT_LENGTH, Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Player fetching configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Site root the watch page and relative script paths resolve against
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// How long a derived cipher stays cached
    pub cache_ttl: Duration,
    /// Maximum number of player scripts kept
    pub cache_capacity: u64,
    pub retry: RetryConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 16,
            retry: RetryConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Source of pages and player scripts
#[async_trait::async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Fetch a document as text
    async fn fetch_text(&self, url: &str) -> Result<String, RtubeError>;

    /// Size announced for a resource, if the server reports one
    async fn content_length(&self, url: &str) -> Result<Option<u64>, RtubeError>;
}

/// [`ScriptFetcher`] over HTTP with retries on transport failures
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryExecutor,
}

impl HttpFetcher {
    pub fn new(config: &PlayerConfig) -> Result<Self, RtubeError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            retry: RetryExecutor::new(config.retry.clone()),
        })
    }
}

#[async_trait::async_trait]
impl ScriptFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, RtubeError> {
        self.retry
            .execute(|| async move {
                debug!("GET {}", url);
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok::<_, RtubeError>(response.text().await?)
            })
            .await
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>, RtubeError> {
        self.retry
            .execute(|| async move {
                debug!("HEAD {}", url);
                let response = self.client.head(url).send().await?.error_for_status()?;
                Ok::<_, RtubeError>(response
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse().ok()))
            })
            .await
    }
}

/// Resolves videos to signed streams, deriving each player script's cipher once
pub struct PlayerStore {
    config: PlayerConfig,
    fetcher: Arc<dyn ScriptFetcher>,
    ciphers: Cache<String, Arc<Cipher>>,
}

impl PlayerStore {
    pub fn new(config: PlayerConfig) -> Result<Self, RtubeError> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: PlayerConfig, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        let ciphers = Cache::builder()
            .time_to_live(config.cache_ttl)
            .max_capacity(config.cache_capacity)
            .build();

        Self {
            config,
            fetcher,
            ciphers,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Fetch the watch page of a video URL or bare video ID
    pub async fn watch_page(&self, video_url: &str) -> Result<(String, String), RtubeError> {
        let video_id = extract_video_id(video_url)?;
        let html = self
            .fetcher
            .fetch_text(&watch_url(&self.config.base_url, &video_id))
            .await?;
        Ok((video_id, html))
    }

    /// Player script URL referenced by a watch page
    pub fn js_url(&self, html: &str) -> Result<String, RtubeError> {
        js_url(html, &self.config.base_url)
    }

    /// Cipher for the player script at `js_url`, fetched and derived on first use
    pub async fn cipher_for(&self, js_url: &str) -> Result<Arc<Cipher>, RtubeError> {
        let fetcher = Arc::clone(&self.fetcher);
        self.ciphers
            .try_get_with(js_url.to_string(), async move {
                let js = fetcher.fetch_text(js_url).await?;
                let cipher = Cipher::from_js(&js)?;
                info!("Derived cipher from {}", js_url);
                Ok::<_, RtubeError>(Arc::new(cipher))
            })
            .await
            .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(|shared| RtubeError::Generic(shared.to_string())))
    }

    /// Signed streams of a video
    pub async fn streams(&self, video_url: &str) -> Result<StreamQuery, RtubeError> {
        let (video_id, html) = self.watch_page(video_url).await?;
        let response = initial_player_response(&html)?;
        let js_url = self.js_url(&html)?;
        let cipher = self.cipher_for(&js_url).await?;

        let mut context = StreamContext::from_response(&response)
            .with_publish_date(publish_date(&html)?)
            .with_cipher(&js_url, cipher);
        if context.video_id.is_empty() {
            context.video_id = video_id;
        }

        build_streams(&response, Arc::new(context))
    }

    /// Size of a stream in bytes, asking the server when the manifest has none
    pub async fn filesize(&self, stream: &Stream) -> Result<u64, RtubeError> {
        if stream.filesize > 0 {
            return Ok(stream.filesize);
        }
        Ok(self.fetcher.content_length(&stream.url).await?.unwrap_or(0))
    }
}
