//! Roster sources
//!
//! The live feed is an HTTP service (`GET {base}/events`, `GET {base}/me`);
//! the snapshot is a CSV file with a header row. Both sit behind traits so the
//! router can be exercised with in-memory sources.

use async_trait::async_trait;
use roster_common::model::SnapshotRow;
use roster_common::{Error, IdentityKey, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const LIVE: &str = "live";
const SNAPSHOT: &str = "snapshot";

const USER_AGENT: &str = concat!("roster-dash/", env!("CARGO_PKG_VERSION"));

/// Live event feed plus the current user's profile
#[async_trait]
pub trait LiveFeed: Send + Sync {
    /// Raw event records, in feed order
    async fn fetch_events(&self) -> Result<Vec<Value>>;

    /// Identity of the signed-in user, if the profile carries one
    async fn fetch_profile(&self) -> Result<Option<IdentityKey>>;
}

/// Tabular fallback source
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load(&self) -> Result<Vec<SnapshotRow>>;
}

/// Live feed over HTTP
pub struct HttpLiveFeed {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpLiveFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Fetching live feed");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::source_unavailable(LIVE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_unavailable(
                LIVE,
                format!("GET {} returned {}", path, status),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::source_unavailable(LIVE, e))
    }
}

#[async_trait]
impl LiveFeed for HttpLiveFeed {
    async fn fetch_events(&self) -> Result<Vec<Value>> {
        let body = self.get_json("events").await?;
        events_from_body(body)
    }

    async fn fetch_profile(&self) -> Result<Option<IdentityKey>> {
        let body = self.get_json("me").await?;
        Ok(profile_identity(&body))
    }
}

/// Stand-in when no live feed is configured
pub struct NoLiveFeed;

#[async_trait]
impl LiveFeed for NoLiveFeed {
    async fn fetch_events(&self) -> Result<Vec<Value>> {
        Err(Error::source_unavailable(LIVE, "no live feed configured"))
    }

    async fn fetch_profile(&self) -> Result<Option<IdentityKey>> {
        Ok(None)
    }
}

/// Accepts a bare array or `{"events": [...]}`
pub fn events_from_body(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(events) => Ok(events),
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(events)) => Ok(events),
            _ => Err(Error::source_unavailable(LIVE, "response has no events array")),
        },
        _ => Err(Error::source_unavailable(LIVE, "unexpected response shape")),
    }
}

/// `telegram_id` of a profile body, as a number or numeric string
pub fn profile_identity(profile: &Value) -> Option<IdentityKey> {
    match profile.get("telegram_id")? {
        Value::Number(number) => number.as_u64().map(IdentityKey::from),
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty() && text.chars().all(|c| c.is_ascii_digit()))
                .then(|| IdentityKey::new(text))
        }
        _ => None,
    }
}

/// CSV snapshot on disk
pub struct CsvSnapshot {
    path: Option<PathBuf>,
}

impl CsvSnapshot {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SnapshotSource for CsvSnapshot {
    async fn load(&self) -> Result<Vec<SnapshotRow>> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::source_unavailable(SNAPSHOT, "no snapshot configured"))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::source_unavailable(SNAPSHOT, format!("{}: {}", path.display(), e)))?;

        let rows = parse_snapshot(&content)?;
        debug!(path = %path.display(), rows = rows.len(), "Snapshot loaded");
        Ok(rows)
    }
}

/// Parse CSV text with a header row into snapshot rows
///
/// Header names are trimmed and lowercased. Short rows are allowed; missing
/// trailing columns are simply absent from the row.
pub fn parse_snapshot(content: &str) -> Result<Vec<SnapshotRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::source_unavailable(SNAPSHOT, e))?
        .iter()
        .map(|header| header.to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::source_unavailable(SNAPSHOT, e))?;
        let row: SnapshotRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
