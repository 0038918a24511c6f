use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokendist_core::AppError;

/// Display fields taken from a token's off-chain JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata, AppError>;
}

/// Plain HTTP GET of the token URI.
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    ipfs_gateway: String,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration, ipfs_gateway: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("metadata HTTP client: {e}")))?;
        Ok(Self::with_client(client, ipfs_gateway))
    }

    pub fn with_client(client: reqwest::Client, ipfs_gateway: impl Into<String>) -> Self {
        let mut ipfs_gateway = ipfs_gateway.into();
        if !ipfs_gateway.ends_with('/') {
            ipfs_gateway.push('/');
        }
        Self {
            client,
            ipfs_gateway,
        }
    }

    /// `ipfs://` URIs go through the gateway; anything else is requested as is.
    pub fn resolve_url(&self, uri: &str) -> String {
        match uri.strip_prefix("ipfs://") {
            Some(path) => {
                let path = path.strip_prefix("ipfs/").unwrap_or(path);
                format!("{}{}", self.ipfs_gateway, path)
            }
            None => uri.to_string(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata, AppError> {
        let url = self.resolve_url(uri);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Metadata(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Metadata(format!("GET {url}: HTTP {status}")));
        }

        resp.json::<TokenMetadata>()
            .await
            .map_err(|e| AppError::Metadata(format!("GET {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serve exactly one canned HTTP response on a local port.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/meta/1.json")
    }

    fn fetcher() -> HttpMetadataFetcher {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap();
        HttpMetadataFetcher::with_client(client, "https://gateway.test/ipfs")
    }

    #[test]
    fn ipfs_uris_use_the_gateway() {
        let f = fetcher();
        assert_eq!(f.resolve_url("ipfs://QmAbc/1.json"), "https://gateway.test/ipfs/QmAbc/1.json");
        assert_eq!(f.resolve_url("ipfs://ipfs/QmAbc"), "https://gateway.test/ipfs/QmAbc");
        assert_eq!(f.resolve_url("https://x.io/1"), "https://x.io/1");
    }

    #[tokio::test]
    async fn reads_name_and_image() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 50\r\nConnection: close\r\n\r\n{\"name\":\"Sword\",\"image\":\"ipfs://img\",\"extra\":true}",
        )
        .await;

        let meta = fetcher().fetch(&url).await.unwrap();
        assert_eq!(meta.name.as_deref(), Some("Sword"));
        assert_eq!(meta.image.as_deref(), Some("ipfs://img"));
    }

    #[tokio::test]
    async fn server_error_is_a_metadata_error() {
        let url = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(matches!(fetcher().fetch(&url).await, Err(AppError::Metadata(_))));
    }
}
