use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, XcError};
use crate::key_store;
use crate::query::Query;
use crate::retry::{classify_status, FailureKind, RetryPolicy};
use crate::types::{SearchSummary, XcRecording, XcSearchResult};

pub const API_BASE: &str = "https://xeno-canto.org/api/3/recordings";

/// Page size limits enforced by the API.
pub const MIN_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 500;
pub const DEFAULT_PER_PAGE: u32 = 100;

const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("xc-dl/", env!("CARGO_PKG_VERSION"));

/// Read a string-ish field; numbers are stringified, anything else is "".
fn text(rec: &Value, key: &str) -> String {
    match &rec[key] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Like [`text`], but the key has to be present as a string or number.
fn required_text(rec: &Value, key: &str, id: u64) -> Result<String> {
    match &rec[key] {
        Value::String(_) | Value::Number(_) => Ok(text(rec, key)),
        Value::Null => Err(XcError::malformed(format!(
            "recording XC{id} is missing '{key}'"
        ))),
        other => Err(XcError::malformed(format!(
            "recording XC{id} has non-text '{key}': {other}"
        ))),
    }
}

/// Parse an XC recording from API JSON.
fn parse_recording(rec: &Value) -> Result<XcRecording> {
    let id = match &rec["id"] {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
    .ok_or_else(|| XcError::malformed(format!("recording without a valid 'id': {}", rec["id"])))?;

    let also = match &rec["also"] {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    let s = |key: &str| text(rec, key);
    Ok(XcRecording {
        id,
        gen: required_text(rec, "gen", id)?,
        sp: required_text(rec, "sp", id)?,
        ssp: s("ssp"),
        grp: s("grp"),
        en: s("en"),
        rec: s("rec"),
        cnt: s("cnt"),
        loc: s("loc"),
        lat: s("lat"),
        lon: if rec["lon"].is_null() { s("lng") } else { s("lon") },
        alt: s("alt"),
        sound_type: s("type"),
        sex: s("sex"),
        stage: s("stage"),
        method: s("method"),
        url: s("url"),
        file_url: required_text(rec, "file", id)?,
        file_name: s("file-name"),
        lic: s("lic"),
        q: s("q"),
        length: s("length"),
        time: s("time"),
        date: s("date"),
        uploaded: s("uploaded"),
        rmk: s("rmk"),
        also,
        animal_seen: s("animal-seen"),
        playback_used: s("playback-used"),
        temp: s("temp"),
        regnr: s("regnr"),
        auto: s("auto"),
        dvc: s("dvc"),
        mic: s("mic"),
        smp: s("smp"),
    })
}

/// Counters arrive as numbers or numeric strings depending on the field.
fn counter(body: &Value, key: &str) -> Option<u32> {
    body[key]
        .as_str()
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| body[key].as_u64().and_then(|n| u32::try_from(n).ok()))
}

fn required_counter(body: &Value, key: &str) -> Result<u32> {
    counter(body, key)
        .ok_or_else(|| XcError::malformed(format!("response is missing '{key}'")))
}

/// Error codes the API uses for a missing or rejected key.
const AUTH_ERROR_CODES: &[&str] = &["invalid_key", "missing_key", "unauthorized", "forbidden"];

/// Turn an `error` payload into the matching error kind.
fn api_error(err: &Value, body: &Value) -> XcError {
    let (code, message) = match err {
        Value::Object(_) => (text(err, "code"), text(err, "message")),
        Value::String(code) => (code.clone(), text(body, "message")),
        other => (other.to_string(), String::new()),
    };
    let detail = if message.is_empty() {
        code.clone()
    } else {
        format!("[{code}] {message}")
    };
    let code = code.trim().to_lowercase();
    if AUTH_ERROR_CODES.contains(&code.as_str()) {
        XcError::Authentication(detail)
    } else {
        XcError::RequestRejected {
            status: 200,
            message: detail,
        }
    }
}

/// Parse a search response from the XC API.
fn parse_search_response(body: &Value) -> Result<XcSearchResult> {
    if let Some(err) = body.get("error") {
        return Err(api_error(err, body));
    }
    if !body.is_object() {
        return Err(XcError::malformed("response is not a JSON object"));
    }

    let recordings = body["recordings"]
        .as_array()
        .ok_or_else(|| XcError::malformed("response is missing the 'recordings' array"))?
        .iter()
        .map(parse_recording)
        .collect::<Result<Vec<_>>>()?;

    Ok(XcSearchResult {
        num_recordings: required_counter(body, "numRecordings")?,
        num_species: counter(body, "numSpecies").unwrap_or(0),
        num_pages: required_counter(body, "numPages")?,
        page: required_counter(body, "page")?,
        recordings,
    })
}

/// Pull a human-readable message out of an error response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .map(|v| {
            let msg = text(&v, "message");
            if msg.is_empty() {
                text(&v["error"], "message")
            } else {
                msg
            }
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

/// One failed attempt at a page request.
enum Failure {
    Retryable { kind: FailureKind, message: String },
    Fatal(XcError),
}

/// Options for [`XcClient`]. Create with [`XcClient::builder`].
#[derive(Debug, Clone)]
pub struct XcClientBuilder {
    api_key: String,
    base_url: String,
    per_page: u32,
    page_delay: Duration,
    timeout: Duration,
    retry: RetryPolicy,
    max_results: Option<usize>,
    user_agent: String,
}

impl XcClientBuilder {
    /// Search endpoint, e.g. a mock server in tests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Results per page, 50..=500.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Pause between consecutive page requests.
    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop paging once this many recordings have been collected.
    pub fn max_results(mut self, max: Option<usize>) -> Self {
        self.max_results = max;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn build(self) -> Result<XcClient> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(XcError::Authentication(
                "API key required: pass --key or set XC_API_KEY".into(),
            ));
        }
        if !(MIN_PER_PAGE..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(XcError::config(format!(
                "per_page must be between {MIN_PER_PAGE} and {MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if self.max_results == Some(0) {
            return Err(XcError::config("max_results must be at least 1"));
        }
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| XcError::config(format!("invalid base URL '{}': {e}", self.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| XcError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(XcClient {
            http,
            api_key,
            base_url: self.base_url,
            per_page: self.per_page,
            page_delay: self.page_delay,
            retry: self.retry,
            max_results: self.max_results,
        })
    }
}

/// Authenticated client for the recordings search endpoint.
///
/// Requests are made one at a time; pages are fetched in order with a
/// fixed pause between them.
#[derive(Debug, Clone)]
pub struct XcClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    per_page: u32,
    page_delay: Duration,
    retry: RetryPolicy,
    max_results: Option<usize>,
}

impl XcClient {
    pub fn builder(api_key: impl Into<String>) -> XcClientBuilder {
        XcClientBuilder {
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
            per_page: DEFAULT_PER_PAGE,
            page_delay: DEFAULT_PAGE_DELAY,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            max_results: None,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Client with default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Client using a key from the key file or environment.
    pub fn from_env() -> Result<Self> {
        let key = key_store::resolve_key(None).ok_or_else(|| {
            XcError::Authentication(
                "no API key found: set XC_API_KEY or run `xc-dl key set`".into(),
            )
        })?;
        Self::new(key)
    }

    /// The underlying HTTP client, shared with the downloader.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetch every page of results for `query`.
    pub async fn search(&self, query: &Query) -> Result<XcSearchResult> {
        self.search_with_progress(query, |_, _| {}).await
    }

    /// Fetch every page, calling `on_progress(pages_fetched, total_pages)`
    /// after each one.
    pub async fn search_with_progress<F>(&self, query: &Query, mut on_progress: F) -> Result<XcSearchResult>
    where
        F: FnMut(u32, u32),
    {
        let mut recordings = Vec::new();
        let mut page = 1u32;
        let mut num_recordings;
        let mut num_species;
        let mut total_pages;

        loop {
            let result = self.search_page(query, page).await?;
            total_pages = result.num_pages;
            num_recordings = result.num_recordings;
            num_species = result.num_species;
            on_progress(page, total_pages);

            recordings.extend(result.recordings);
            debug!(page, total_pages, collected = recordings.len(), "page fetched");

            if let Some(max) = self.max_results {
                if recordings.len() >= max {
                    recordings.truncate(max);
                    debug!(max, "max_results reached");
                    break;
                }
            }

            if page.max(result.page) >= total_pages {
                break;
            }
            page += 1;

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        info!(
            query = %query,
            num_recordings,
            fetched = recordings.len(),
            pages = page,
            "search complete"
        );

        Ok(XcSearchResult {
            num_recordings,
            num_species,
            num_pages: total_pages,
            page,
            recordings,
        })
    }

    /// Fetch and parse a single page (1-indexed).
    pub async fn search_page(&self, query: &Query, page: u32) -> Result<XcSearchResult> {
        let body = self.get_json(query, page, self.per_page).await?;
        parse_search_response(&body)
    }

    /// Totals for `query` from a single minimal page request.
    pub async fn summary(&self, query: &Query) -> Result<SearchSummary> {
        let body = self.get_json(query, 1, MIN_PER_PAGE).await?;
        let result = parse_search_response(&body)?;
        Ok(SearchSummary {
            num_recordings: result.num_recordings,
            num_species: result.num_species,
            num_pages: result.num_pages,
        })
    }

    /// GET one page, retrying transient failures.
    async fn get_json(&self, query: &Query, page: u32, per_page: u32) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let (kind, message) = match self.try_get(query, page, per_page).await {
                Ok(body) => return Ok(body),
                Err(Failure::Fatal(err)) => return Err(err),
                Err(Failure::Retryable { kind, message }) => (kind, message),
            };

            match self.retry.next_delay(kind, attempt) {
                Some(delay) => {
                    warn!(page, attempt, %message, delay_ms = delay.as_millis() as u64, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(XcError::TransientNetwork {
                        attempts: attempt,
                        message,
                    })
                }
            }
        }
    }

    async fn try_get(&self, query: &Query, page: u32, per_page: u32) -> std::result::Result<Value, Failure> {
        debug!(query = %query, page, per_page, "GET {}", self.base_url);
        let page = page.to_string();
        let per_page = per_page.to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("query", query.as_str()),
                ("key", self.api_key.as_str()),
                ("page", page.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Failure::Retryable {
                kind: FailureKind::Transient,
                message: describe_reqwest_error(&e),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Failure::Retryable {
            kind: FailureKind::Transient,
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let code = status.as_u16();
            let message = error_message(&body);
            return Err(match classify_status(code) {
                FailureKind::Auth => Failure::Fatal(XcError::Authentication(format!(
                    "HTTP {code}: {message}"
                ))),
                FailureKind::Rejected => Failure::Fatal(XcError::RequestRejected {
                    status: code,
                    message,
                }),
                kind => Failure::Retryable {
                    kind,
                    message: format!("HTTP {code}: {message}"),
                },
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| Failure::Fatal(XcError::malformed(format!("invalid JSON: {e}"))))
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("HTTP request failed: {e}")
    }
}
