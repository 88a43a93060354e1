use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::settings::Settings;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = concat!("hn_hiring_map/", env!("CARGO_PKG_VERSION"));

/// A top-level reply as fetched, before any parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub id: u64,
    pub author: Option<String>,
    pub body: Option<String>,
    pub deleted: bool,
}

#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Ids of the thread's direct replies, in thread order.
    async fn children(&self, thread_id: u64) -> Result<Vec<u64>, SourceError>;
    async fn comment(&self, id: u64) -> Result<RawComment, SourceError>;
}

pub fn http_client(settings: &Settings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

// ── Hacker News API ──

#[derive(Debug, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kids: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl From<HnItem> for RawComment {
    fn from(item: HnItem) -> Self {
        RawComment {
            id: item.id,
            author: item.by,
            body: item.text,
            deleted: item.deleted || item.dead,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HnUser {
    #[serde(default)]
    submitted: Vec<u64>,
}

pub struct HnApiSource {
    client: reqwest::Client,
    base_url: String,
}

impl HnApiSource {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        HnApiSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn item(&self, id: u64) -> Result<HnItem, SourceError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let item: Option<HnItem> = self.get_json(&url).await?;
        item.ok_or(SourceError::NotFound(id))
    }

    /// Item ids submitted by `user`, newest first.
    pub async fn submissions(&self, user: &str) -> Result<Vec<u64>, SourceError> {
        let url = format!("{}/user/{}.json", self.base_url, user);
        let user: Option<HnUser> = self.get_json(&url).await?;
        Ok(user.map(|u| u.submitted).unwrap_or_default())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ThreadSource for HnApiSource {
    async fn children(&self, thread_id: u64) -> Result<Vec<u64>, SourceError> {
        Ok(self.item(thread_id).await?.kids)
    }

    async fn comment(&self, id: u64) -> Result<RawComment, SourceError> {
        Ok(self.item(id).await?.into())
    }
}

// ── Concurrent comment fetch ──

pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch comments on a bounded pool. Failed comments are logged and left out;
/// the rest come back in thread order regardless of completion order.
pub async fn fetch_comments(
    source: Arc<dyn ThreadSource>,
    ids: &[u64],
    concurrency: usize,
    timeout: Duration,
) -> Result<(Vec<RawComment>, FetchStats)> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = ids.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send (position, result), main loop collects
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(usize, Result<RawComment, SourceError>)>(concurrency.max(1) * 2);

    for (pos, &id) in ids.iter().enumerate() {
        let source = Arc::clone(&source);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = match sem.acquire_owned().await {
                Ok(_permit) => {
                    let what = format!("comment {}", id);
                    with_retry(&what, timeout, || source.comment(id)).await
                }
                Err(_) => return,
            };
            let _ = tx.send((pos, result)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut slots: Vec<Option<RawComment>> = vec![None; total];
    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some((pos, result)) = rx.recv().await {
        match result {
            Ok(comment) => {
                ok += 1;
                slots[pos] = Some(comment);
            }
            Err(e) => {
                errors += 1;
                warn!("Comment {} failed: {}", ids[pos], e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} comments ({} ok, {} errors)", total, ok, errors);

    let comments = slots.into_iter().flatten().collect();
    Ok((comments, FetchStats { total, ok, errors }))
}

/// Ids of the thread's replies, with the same timeout and backoff as comments.
pub async fn fetch_thread(
    source: &dyn ThreadSource,
    thread_id: u64,
    timeout: Duration,
) -> Result<Vec<u64>, SourceError> {
    let what = format!("thread {}", thread_id);
    with_retry(&what, timeout, || source.children(thread_id)).await
}

async fn with_retry<T, F, Fut>(what: &str, timeout: Duration, mut call: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(timeout.as_secs())),
        };

        match result {
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "{} on {} (attempt {}/{}), backing off {:.1}s",
                    e,
                    what,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
