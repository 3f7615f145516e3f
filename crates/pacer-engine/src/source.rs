//! Message sources for `load_queue`.
//!
//! A source yields an ordered list of items; the engine only swaps its queue
//! after the source has been read completely, so a failed read never leaves a
//! half-replaced queue behind.

use std::path::PathBuf;
use std::time::Duration;

use pacer_core::{parse_lines, DispatchError, DispatchResult};
use pacer_delivery::BoxFuture;
use reqwest::Client;
use tracing::{debug, warn};

/// Default timeout for fetching a remote source.
const HTTP_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplier of queue items.
pub trait MessageSource: Send + Sync {
    /// Human-readable description for logs and events.
    fn describe(&self) -> String;

    /// Read the source into trimmed, non-blank items.
    fn load(&self) -> BoxFuture<'_, DispatchResult<Vec<String>>>;
}

/// Line-oriented text file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MessageSource for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load(&self) -> BoxFuture<'_, DispatchResult<Vec<String>>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                warn!(path = %self.path.display(), error = %e, "Failed to read message file");
                DispatchError::SourceUnavailable(format!("{}: {e}", self.path.display()))
            })?;
            let items = parse_lines(&text);
            debug!(path = %self.path.display(), count = items.len(), "Message file read");
            Ok(items)
        })
    }
}

/// Line-oriented text document fetched over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> DispatchResult<Self> {
        let client = Client::builder()
            .timeout(HTTP_SOURCE_TIMEOUT)
            .build()
            .map_err(|e| DispatchError::SourceUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl MessageSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn load(&self) -> BoxFuture<'_, DispatchResult<Vec<String>>> {
        Box::pin(async move {
            let response = self.client.get(&self.url).send().await.map_err(|e| {
                warn!(url = %self.url, error = %e, "Failed to fetch message source");
                DispatchError::SourceUnavailable(format!("{}: {e}", self.url))
            })?;

            let status = response.status();
            if !status.is_success() {
                warn!(url = %self.url, status = status.as_u16(), "Message source returned error");
                return Err(DispatchError::SourceUnavailable(format!(
                    "{}: HTTP {status}",
                    self.url
                )));
            }

            let text = response.text().await.map_err(|e| {
                DispatchError::SourceUnavailable(format!("{}: {e}", self.url))
            })?;
            Ok(parse_lines(&text))
        })
    }
}

/// Items supplied directly by the caller.
#[derive(Debug, Clone)]
pub struct InlineSource {
    items: Vec<String>,
}

impl InlineSource {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }
}

impl MessageSource for InlineSource {
    fn describe(&self) -> String {
        format!("inline:{}", self.items.len())
    }

    fn load(&self) -> BoxFuture<'_, DispatchResult<Vec<String>>> {
        // Each entry may itself span lines.
        let items = self
            .items
            .iter()
            .flat_map(|item| parse_lines(item))
            .collect();
        Box::pin(async move { Ok(items) })
    }
}

/// Parsed source reference as received from the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Url(String),
}

impl SourceLocator {
    /// Interpret a locator string: `http(s)://` is a URL, anything else a path.
    pub fn parse(raw: &str) -> DispatchResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "source locator is required".to_string(),
            ));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(Self::Url(raw.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))))
        }
    }

    /// Build the matching source.
    pub fn into_source(self) -> DispatchResult<Box<dyn MessageSource>> {
        match self {
            Self::File(path) => Ok(Box::new(FileSource::new(path))),
            Self::Url(url) => Ok(Box::new(HttpSource::new(url)?)),
        }
    }
}
