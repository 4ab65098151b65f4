//! HTTP-based fetcher using a blocking reqwest client.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use tracing::debug;

use super::{FetchError, FetchResult, Fetcher};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on the body buffer reserved up front from Content-Length.
const MAX_PREALLOC: u64 = 16 * BUFFER_SIZE as u64;

/// Fetcher backed by a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher with the default timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HTTP fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("patchsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Read the whole response body.
    fn read_body(&self, url: &str, mut response: Response) -> FetchResult<Bytes> {
        // Content-Length is untrusted; the buffer grows past the cap as data arrives.
        let capacity = response
            .content_length()
            .map(|len| len.min(MAX_PREALLOC) as usize)
            .unwrap_or(BUFFER_SIZE);
        let mut body = Vec::with_capacity(capacity);

        response
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: format!("Read error: {}", e),
            })?;

        Ok(Bytes::from(body))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = self.read_body(url, response)?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    fn exists(&self, url: &str) -> FetchResult<bool> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "HEAD");
        Ok(status.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response on a local port and return its URL.
    fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response);
            }
        });

        format!("http://{}/list.txt", addr)
    }

    #[test]
    fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_fetcher_with_timeout() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(fetcher.timeout().as_secs(), 60);
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost (discard) is essentially never listening for HTTP.
        let result = fetcher.fetch("http://127.0.0.1:9/index.txt");
        assert!(matches!(
            result,
            Err(FetchError::Transport { .. }) | Err(FetchError::Timeout { .. })
        ));
    }

    #[test]
    fn test_fetch_reads_body() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n1 a.gpf\n");
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();

        let body = fetcher.fetch(&url).unwrap();
        assert_eq!(&body[..], b"1 a.gpf\n");
    }

    #[test]
    fn test_huge_content_length_is_transport_error() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 9223372036854775808\r\nConnection: close\r\n\r\nabc",
        );
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();

        let result = fetcher.fetch(&url);
        assert!(matches!(
            result,
            Err(FetchError::Transport { .. }) | Err(FetchError::Timeout { .. })
        ));
    }
}
