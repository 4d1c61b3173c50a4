/*
[INPUT]:  Feed endpoints and the configured transport
[OUTPUT]: Connected byte streams, TLS-wrapped unless plain was requested
[POS]:    Feed layer - socket establishment
[UPDATE]: When changing TLS roots, crypto provider or connect behavior
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::http::{NordnetError, Result};
use crate::types::{FeedEndpoint, FeedTransport};

/// Any duplex byte stream a feed can run over
pub trait FeedIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> FeedIo for T {}

pub type BoxedFeedIo = Box<dyn FeedIo>;

/// Opens feed sockets, either plain TCP or TLS via `rustls`.
#[derive(Clone)]
pub enum FeedConnector {
    Plain,
    Tls(TlsConnector),
}

impl fmt::Debug for FeedConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedConnector::Plain => f.write_str("FeedConnector::Plain"),
            FeedConnector::Tls(_) => f.write_str("FeedConnector::Tls"),
        }
    }
}

impl FeedConnector {
    pub fn new(transport: FeedTransport) -> Result<Self> {
        match transport {
            FeedTransport::Plain => Ok(FeedConnector::Plain),
            FeedTransport::Tls => Ok(Self::with_tls_config(Arc::new(create_tls_config()?))),
        }
    }

    pub fn with_tls_config(config: Arc<rustls::ClientConfig>) -> Self {
        FeedConnector::Tls(TlsConnector::from(config))
    }

    /// Connect to `endpoint`; TCP connect and TLS handshake together are bounded by `timeout`
    pub async fn connect(&self, endpoint: &FeedEndpoint, timeout: Duration) -> Result<BoxedFeedIo> {
        match tokio::time::timeout(timeout, self.establish(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(NordnetError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn establish(&self, endpoint: &FeedEndpoint) -> Result<BoxedFeedIo> {
        let kind = endpoint.kind;
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| NordnetError::feed(kind, format!("connect to {endpoint} failed: {e}")))?;
        stream.set_nodelay(true)?;

        match self {
            FeedConnector::Plain => {
                let io: BoxedFeedIo = Box::new(stream);
                Ok(io)
            }
            FeedConnector::Tls(connector) => {
                let domain = server_name(&endpoint.host).ok_or_else(|| {
                    NordnetError::feed(kind, format!("invalid TLS server name {}", endpoint.host))
                })?;
                let tls = connector.connect(domain, stream).await.map_err(|e| {
                    NordnetError::feed(kind, format!("TLS handshake with {endpoint} failed: {e}"))
                })?;
                debug!(%kind, host = %endpoint.host, "feed TLS established");
                let io: BoxedFeedIo = Box::new(tls);
                Ok(io)
            }
        }
    }
}

fn server_name(host: &str) -> Option<ServerName<'static>> {
    // rustls expects IPv6 addresses without the surrounding [] brackets
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    ServerName::try_from(host.to_string()).ok()
}

/// Client config trusting the webpki root store, using the `ring` provider reqwest also uses
pub fn create_tls_config() -> Result<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| NordnetError::Config(format!("TLS configuration failed: {e}")))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::types::FeedKind;

    #[test]
    fn test_server_name_parsing() {
        assert!(server_name("pub.api.test.nordnet.se").is_some());
        assert!(server_name("[::1]").is_some());
        assert!(server_name("127.0.0.1").is_some());
        assert!(server_name("not a host").is_none());
    }

    #[test]
    fn test_tls_connector_builds() {
        let connector = FeedConnector::new(FeedTransport::Tls).unwrap();
        assert!(matches!(connector, FeedConnector::Tls(_)));
    }

    #[tokio::test]
    async fn test_plain_connect_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hi\n").await.unwrap();
        });

        let endpoint = FeedEndpoint {
            kind: FeedKind::Public,
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut io = FeedConnector::Plain
            .connect(&endpoint, Duration::from_secs(5))
            .await
            .unwrap();

        let mut buf = [0u8; 3];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_is_feed_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = FeedEndpoint {
            kind: FeedKind::Private,
            host: "127.0.0.1".to_string(),
            port,
        };
        let err = FeedConnector::Plain
            .connect(&endpoint, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NordnetError::Feed { kind: FeedKind::Private, .. }));
    }
}
