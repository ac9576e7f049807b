//! Same-origin file proxy for assets the browser cannot fetch directly
//! because of CORS. Only hosts on the configured allow-list are reachable,
//! and redirects are not followed so a listed host cannot bounce the
//! request elsewhere. Bodies are read chunk by chunk and abandoned as soon as
//! they pass the size cap.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::ServerError;

/// Body and content type relayed from upstream.
#[derive(Debug)]
pub struct ProxiedFile {
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub struct FileProxy {
    client: reqwest::Client,
    allowed_hosts: Vec<String>,
    max_bytes: usize,
}

impl FileProxy {
    pub fn new(allowed_hosts: Vec<String>, max_bytes: usize) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("folio-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServerError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allowed_hosts,
            max_bytes,
        })
    }

    /// Parse `raw` and check it against the allow-list.
    pub fn check_url(&self, raw: &str) -> Result<Url, ServerError> {
        if self.allowed_hosts.is_empty() {
            return Err(ServerError::Forbidden("File proxy is disabled".into()));
        }

        let url = Url::parse(raw).map_err(|e| ServerError::BadRequest(format!("Invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServerError::BadRequest(format!(
                "Unsupported scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ServerError::BadRequest("URL has no host".into()))?
            .to_ascii_lowercase();

        let allowed = self
            .allowed_hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")));
        if !allowed {
            warn!(host = %host, "Proxy request to host outside allow-list");
            return Err(ServerError::Forbidden(format!("Host not allowed: {host}")));
        }

        Ok(url)
    }

    pub async fn fetch(&self, raw: &str) -> Result<ProxiedFile, ServerError> {
        let url = self.check_url(raw)?;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ServerError::BadGateway(format!("Fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::BadGateway(format!("Upstream returned {status}")));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(ServerError::PayloadTooLarge {
                    size: len as usize,
                    max: self.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ServerError::BadGateway(format!("Failed to read body: {e}")))?
        {
            let size = body.len() + chunk.len();
            if size > self.max_bytes {
                warn!(url = %url, size, max = self.max_bytes, "Proxied body over size cap");
                return Err(ServerError::PayloadTooLarge {
                    size,
                    max: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        debug!(url = %url, size = body.len(), "Proxied file");
        Ok(ProxiedFile { content_type, body })
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    const CHUNK: usize = 64 * 1024;

    fn proxy(hosts: &[&str]) -> FileProxy {
        FileProxy::new(hosts.iter().map(|h| h.to_string()).collect(), 1024).unwrap()
    }

    #[test]
    fn test_allow_list_matches_host_and_subdomains() {
        let p = proxy(&["example.com"]);
        assert!(p.check_url("https://example.com/a.png").is_ok());
        assert!(p.check_url("https://img.EXAMPLE.com/a.png").is_ok());
        assert!(matches!(
            p.check_url("https://badexample.com/a.png"),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            p.check_url("https://example.com.evil.net/a.png"),
            Err(ServerError::Forbidden(_))
        ));
    }

    #[test]
    fn test_rejects_bad_urls() {
        let p = proxy(&["example.com"]);
        assert!(matches!(p.check_url("not a url"), Err(ServerError::BadRequest(_))));
        assert!(matches!(
            p.check_url("file:///etc/passwd"),
            Err(ServerError::BadRequest(_))
        ));
    }

    /// Serve one connection on localhost: read the request head, then hand
    /// the socket to `respond`. Returns a URL pointing at it.
    async fn upstream<F, Fut>(respond: F) -> String
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            respond(socket).await;
        });
        format!("http://{addr}/file")
    }

    #[tokio::test]
    async fn test_fetch_relays_body_and_content_type() {
        let url = upstream(|mut socket| async move {
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
                )
                .await;
        })
        .await;

        let file = proxy(&["127.0.0.1"]).fetch(&url).await.unwrap();
        assert_eq!(file.body.as_ref(), b"hello");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_fetch_stops_reading_unbounded_chunked_body() {
        let url = upstream(|mut socket| async move {
            let head = b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head).await.is_err() {
                return;
            }
            let chunk = vec![b'x'; CHUNK];
            for _ in 0..1024 {
                let framed = [format!("{CHUNK:x}\r\n").as_bytes(), &chunk[..], &b"\r\n"[..]].concat();
                if socket.write_all(&framed).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        })
        .await;

        match proxy(&["127.0.0.1"]).fetch(&url).await {
            Err(ServerError::PayloadTooLarge { size, max }) => {
                assert_eq!(max, 1024);
                assert!(size > max && size <= max + CHUNK, "read {size} bytes");
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_declared_length_over_cap() {
        let url = upstream(|mut socket| async move {
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5000\r\nConnection: close\r\n\r\n")
                .await;
            let _ = socket.write_all(&[b'x'; 5000]).await;
        })
        .await;

        assert!(matches!(
            proxy(&["127.0.0.1"]).fetch(&url).await,
            Err(ServerError::PayloadTooLarge { size: 5000, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_maps_upstream_error_to_bad_gateway() {
        let url = upstream(|mut socket| async move {
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        })
        .await;

        assert!(matches!(
            proxy(&["127.0.0.1"]).fetch(&url).await,
            Err(ServerError::BadGateway(_))
        ));
    }

    #[test]
    fn test_empty_allow_list_disables_proxy() {
        let p = proxy(&[]);
        assert!(matches!(
            p.check_url("https://example.com/"),
            Err(ServerError::Forbidden(_))
        ));
    }
}
