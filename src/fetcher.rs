// =============================================================================
// fetcher.rs - THE DOCUMENT RETRIEVER
// =============================================================================
//
// One job: turn a URL into bytes plus a verdict on what those bytes are.
//
// The actual HTTP happens behind the `HttpTransport` trait. In production
// that's reqwest with rustls; in tests it's a HashMap pretending to be the
// internet. The fetcher on top validates status and body and decides the
// document kind, and it never retries. If a host is down, the company gets a
// FAILED row and the batch moves on.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConfigError, FetchError, TransportError};
use crate::models::{DocumentKind, SourceDocument};

/// What a transport hands back for a completed request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// URL after redirects. Relative links on the page resolve against this,
    /// not against whatever we originally asked for.
    pub final_url: Url,
}

/// The seam between the pipeline and the network.
///
/// Implementations must return errors as values; nothing may panic or
/// propagate across this boundary.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// The production transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            content_type,
            bytes: bytes.to_vec(),
            final_url,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Fetches documents with a fixed timeout and header set.
#[derive(Clone)]
pub struct DocumentFetcher {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
    headers: Vec<(String, String)>,
}

impl DocumentFetcher {
    /// The timeout must be positive.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        timeout: Duration,
        headers: Vec<(String, String)>,
    ) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::NotPositive { field: "request_timeout" });
        }
        Ok(Self {
            transport,
            timeout,
            headers,
        })
    }

    /// Parse `raw` and fetch it. An unparsable URL is reported the same way a
    /// dead host is.
    pub async fn fetch_str(&self, raw: &str) -> Result<SourceDocument, FetchError> {
        let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        self.fetch(&url).await
    }

    pub async fn fetch(&self, url: &Url) -> Result<SourceDocument, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        debug!(url = %url, timeout_secs = self.timeout.as_secs_f64(), "fetching");

        let response = self
            .transport
            .get(url, self.timeout, &self.headers)
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "fetch failed at the network layer");
                FetchError::Network(e)
            })?;

        if !(200..300).contains(&response.status) {
            warn!(url = %url, status = response.status, "fetch returned non-success status");
            return Err(FetchError::Http {
                status: response.status,
            });
        }

        if response.bytes.is_empty() {
            warn!(url = %url, "fetch returned an empty body");
            return Err(FetchError::EmptyBody);
        }

        let kind = DocumentKind::detect(
            response.content_type.as_deref(),
            &response.final_url,
            &response.bytes,
        );

        debug!(
            url = %response.final_url,
            kind = %kind,
            bytes = response.bytes.len(),
            content_type = response.content_type.as_deref().unwrap_or("-"),
            "fetched document"
        );

        Ok(SourceDocument {
            url: response.final_url,
            kind,
            bytes: response.bytes,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::testing::FakeTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fetcher(transport: Arc<dyn HttpTransport>, timeout: Duration) -> DocumentFetcher {
        DocumentFetcher::new(transport, timeout, vec![("User-Agent".into(), "Mozilla/5.0".into())])
            .unwrap()
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let transport = Arc::new(FakeTransport::new());
        assert!(DocumentFetcher::new(transport, Duration::ZERO, vec![]).is_err());
    }

    #[tokio::test]
    async fn test_fetch_pdf_by_content_type() {
        let transport = FakeTransport::new().with_body(
            "https://ir.example.com/download?id=1",
            "application/pdf",
            b"%PDF-1.7 ...",
        );
        let doc = fetcher(Arc::new(transport), Duration::from_secs(5))
            .fetch_str("https://ir.example.com/download?id=1")
            .await
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.bytes, b"%PDF-1.7 ...");
    }

    #[tokio::test]
    async fn test_fetch_http_error_carries_status() {
        let transport = FakeTransport::new().with_status("https://ir.example.com/gone", 404);
        let err = fetcher(Arc::new(transport), Duration::from_secs(5))
            .fetch_str("https://ir.example.com/gone")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::HttpError);
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let transport = FakeTransport::new().with_body("https://ir.example.com/empty", "text/html", b"");
        let err = fetcher(Arc::new(transport), Duration::from_secs(5))
            .fetch_str("https://ir.example.com/empty")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyBody);
    }

    #[tokio::test]
    async fn test_invalid_url_and_scheme_are_network_errors() {
        let f = fetcher(Arc::new(FakeTransport::new()), Duration::from_secs(5));
        let err = f.fetch_str("not a url").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NetworkError);
        let err = f.fetch_str("ftp://example.com/report.pdf").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_reqwest_transport_times_out_on_silent_server() {
        // Accepts the connection, reads the request, and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        });

        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let err = fetcher(transport, Duration::from_millis(300))
            .fetch_str(&format!("http://{addr}/report.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_status_and_content_type() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let body = "<html><body>Scope 1: 10 tCO2e</body></html>";
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let doc = fetcher(transport, Duration::from_secs(5))
            .fetch_str(&format!("http://{addr}/ir"))
            .await
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Html);
        assert!(String::from_utf8_lossy(&doc.bytes).contains("Scope 1"));
    }
}
