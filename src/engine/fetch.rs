// src/engine/fetch.rs
//
// Remote artwork download.
//
// A URL only reaches the network as a `ValidatedUrl`, which can only be built
// by `ValidatedUrl::parse`: scheme must be http/https and the host non-empty.
// The body is read in fixed chunks against a byte cap, so a hostile server
// can never make us buffer more than `max_bytes + READ_CHUNK`.

use crate::error::IngestError;
use std::fmt;
use std::io::{ErrorKind, Read};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type FetchResult<T> = std::result::Result<T, IngestError>;

/// Overall request timeout (connect + headers + body).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 64 * 1024;
const USER_AGENT: &str = concat!("artwork-ingest/", env!("CARGO_PKG_VERSION"));

/// A URL that passed scheme/host validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedUrl(Url);

impl ValidatedUrl {
    pub fn parse(raw: &str) -> FetchResult<Self> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| IngestError::invalid_url(trimmed.to_string(), e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(IngestError::invalid_url(
                    trimmed.to_string(),
                    format!("scheme '{other}' is not allowed, use http or https"),
                ))
            }
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(IngestError::invalid_url(
                    trimmed.to_string(),
                    "URL has no host",
                ))
            }
        }

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> &str {
        // parse() guarantees a host
        self.0.host_str().unwrap_or_default()
    }
}

impl FromStr for ValidatedUrl {
    type Err = IngestError;

    fn from_str(s: &str) -> FetchResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-owned cancellation flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> FetchResult<()> {
        if self.is_cancelled() {
            Err(IngestError::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Blocking HTTP client for artwork downloads. Holds no per-request state.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        // Redirects stay off: the validated host is the only host contacted,
        // a 3xx is reported like any other non-2xx status.
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }

    /// Single GET of `url`, returning at most `max_bytes` of body.
    pub fn fetch(
        &self,
        url: &ValidatedUrl,
        max_bytes: u64,
        cancel: &CancelToken,
    ) -> FetchResult<Vec<u8>> {
        cancel.check()?;
        debug!(url = %url, max_bytes, "downloading artwork");

        let response = match self.agent.get(url.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                warn!(url = %url, status, "artwork download rejected");
                return Err(IngestError::download_failed(status));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(classify_transport(url, &transport.to_string()));
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            warn!(url = %url, status, "artwork download rejected");
            return Err(IngestError::download_failed(status));
        }

        check_content_type(response.header("Content-Type"))?;

        if let Some(declared) = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            if declared > max_bytes {
                return Err(IngestError::response_too_large(max_bytes));
            }
        }

        // The reader owns the connection; it is dropped (and the socket
        // closed) when this function returns, on every path.
        let reader = response.into_reader();
        read_bounded(reader, max_bytes, cancel).map_err(|err| match err {
            ReadError::Cancelled => IngestError::cancelled(),
            ReadError::TooLarge => IngestError::response_too_large(max_bytes),
            ReadError::Io(e) if is_timeout(&e) => IngestError::download_timeout(url.to_string()),
            ReadError::Io(e) => {
                IngestError::download_transport(format!("failed to read response body: {e}"))
            }
        })
    }
}

/// Content-Type is optional; when present it must be `image/*`.
pub(crate) fn check_content_type(content_type: Option<&str>) -> FetchResult<()> {
    match content_type {
        None => Ok(()),
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        Some(ct) => Err(IngestError::unexpected_content_type(ct.to_string())),
    }
}

#[derive(Debug)]
pub(crate) enum ReadError {
    Cancelled,
    TooLarge,
    Io(std::io::Error),
}

/// Read `reader` to the end, failing as soon as more than `max_bytes` arrive.
pub(crate) fn read_bounded<R: Read>(
    mut reader: R,
    max_bytes: u64,
    cancel: &CancelToken,
) -> std::result::Result<Vec<u8>, ReadError> {
    let mut body = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        if cancel.is_cancelled() {
            return Err(ReadError::Cancelled);
        }
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(body),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadError::Io(e)),
        };
        if body.len() as u64 + n as u64 > max_bytes {
            return Err(ReadError::TooLarge);
        }
        body.extend_from_slice(&chunk[..n]);
    }
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
        || error.to_string().to_ascii_lowercase().contains("timed out")
}

fn classify_transport(url: &ValidatedUrl, message: &str) -> IngestError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        warn!(url = %url, "artwork download timed out");
        IngestError::download_timeout(url.to_string())
    } else {
        warn!(url = %url, error = message, "artwork download failed");
        IngestError::download_transport(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    mod url_validation {
        use super::*;

        #[test]
        fn accepts_http_and_https() {
            let url = ValidatedUrl::parse("https://img.example.com/a.jpg").unwrap();
            assert_eq!(url.host(), "img.example.com");
            assert!(ValidatedUrl::parse("http://example.com/x.png").is_ok());
            assert!(ValidatedUrl::parse("  HTTPS://Example.com/x.png ").is_ok());
        }

        #[test]
        fn rejects_other_schemes() {
            for raw in [
                "file:///etc/passwd",
                "ftp://example.com/a.jpg",
                "gopher://example.com",
                "data:image/png;base64,AAAA",
                "javascript:alert(1)",
            ] {
                let err = ValidatedUrl::parse(raw).unwrap_err();
                assert!(matches!(err, IngestError::InvalidUrl { .. }), "{raw}");
            }
        }

        #[test]
        fn rejects_missing_host_and_garbage() {
            for raw in ["http://", "http://:8080/a.jpg", "not a url", ""] {
                assert!(ValidatedUrl::parse(raw).is_err(), "{raw}");
            }
        }

        #[test]
        fn from_str_matches_parse() {
            let url: ValidatedUrl = "https://example.com/a.png".parse().unwrap();
            assert_eq!(url.to_string(), "https://example.com/a.png");
        }
    }

    mod body_limits {
        use super::*;

        #[test]
        fn reads_body_under_cap() {
            let body = vec![7u8; 1000];
            let out = read_bounded(Cursor::new(body.clone()), 1000, &CancelToken::new()).unwrap();
            assert_eq!(out, body);
        }

        #[test]
        fn stops_when_cap_exceeded() {
            let body = vec![7u8; READ_CHUNK * 4];
            let err = read_bounded(Cursor::new(body), 1000, &CancelToken::new()).unwrap_err();
            assert!(matches!(err, ReadError::TooLarge));
        }

        #[test]
        fn honors_cancellation() {
            let token = CancelToken::new();
            token.cancel();
            let err = read_bounded(Cursor::new(vec![1u8; 10]), 100, &token).unwrap_err();
            assert!(matches!(err, ReadError::Cancelled));
        }

        #[test]
        fn content_type_rules() {
            assert!(check_content_type(None).is_ok());
            assert!(check_content_type(Some("image/jpeg")).is_ok());
            assert!(check_content_type(Some("Image/PNG; q=1")).is_ok());
            let err = check_content_type(Some("text/html; charset=utf-8")).unwrap_err();
            assert!(matches!(err, IngestError::UnexpectedContentType { .. }));
        }
    }

    #[test]
    fn cancelled_token_short_circuits_before_network() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());

        // Port 9 (discard) on a reserved TEST-NET address: never contacted.
        let url = ValidatedUrl::parse("http://192.0.2.1:9/a.jpg").unwrap();
        let err = HttpFetcher::new().fetch(&url, 1024, &token).unwrap_err();
        assert_eq!(err, IngestError::Cancelled);
    }
}
