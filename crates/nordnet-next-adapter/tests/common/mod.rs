/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for nordnet-next-adapter tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nordnet_next_adapter::{FeedTransport, Nordnet, NordnetConfig, PublicKeySource};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PUBLIC_PEM: &str = include_str!("../fixtures/test_public.pem");
pub const PRIVATE_PEM: &str = include_str!("../fixtures/test_private.pem");

const WAIT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client against `server` using plain feed sockets
pub fn client_for(server: &MockServer, shorten_expires: Duration) -> Nordnet {
    Nordnet::new(config_for(server).with_shorten_expires(shorten_expires)).unwrap()
}

pub fn config_for(server: &MockServer) -> NordnetConfig {
    NordnetConfig::new(PublicKeySource::Pem(PUBLIC_PEM.to_string()))
        .with_base_url(format!("{}/next/2/", server.uri()))
        .with_feed_transport(FeedTransport::Plain)
}

pub fn login_body(session_key: &str, expires_in: u64, public_port: u16, private_port: u16) -> Value {
    json!({
        "session_key": session_key,
        "expires_in": expires_in,
        "environment": "test",
        "country": "SE",
        "public_feed": {"hostname": "127.0.0.1", "port": public_port, "encrypted": false},
        "private_feed": {"hostname": "127.0.0.1", "port": private_port, "encrypted": false}
    })
}

pub async fn mount_login(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/next/2/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answers each login with a fresh key: `sk-1`, `sk-2`, ...
pub struct SequentialLogin {
    count: AtomicUsize,
    expires_in: u64,
    public_port: u16,
    private_port: u16,
}

impl SequentialLogin {
    pub fn new(expires_in: u64, public_port: u16, private_port: u16) -> Self {
        Self {
            count: AtomicUsize::new(0),
            expires_in,
            public_port,
            private_port,
        }
    }
}

impl Respond for SequentialLogin {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200)
            .set_body_json(login_body(
                &format!("sk-{n}"),
                self.expires_in,
                self.public_port,
                self.private_port,
            ))
            .set_delay(Duration::from_millis(20))
    }
}

/// Line-oriented TCP server standing in for a feed gateway.
///
/// Records every line clients send, tagged with the connection index, and can
/// push lines back to any accepted connection.
pub struct MockFeedGateway {
    pub port: u16,
    lines: mpsc::UnboundedReceiver<(usize, String)>,
    writers: Arc<Mutex<Vec<OwnedWriteHalf>>>,
}

impl MockFeedGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, lines) = mpsc::unbounded_channel();
        let writers = Arc::new(Mutex::new(Vec::new()));

        let accepted = writers.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (read, write) = socket.into_split();
                let index = {
                    let mut writers = accepted.lock().await;
                    writers.push(write);
                    writers.len() - 1
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(read).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send((index, line));
                    }
                });
            }
        });

        Self { port, lines, writers }
    }

    /// Next line received on any connection
    pub async fn next_line(&mut self) -> (usize, String) {
        tokio::time::timeout(WAIT, self.lines.recv())
            .await
            .expect("timed out waiting for a feed line")
            .expect("gateway stopped")
    }

    pub async fn connections(&self) -> usize {
        self.writers.lock().await.len()
    }

    /// Write raw bytes; errors from connections the client already closed are ignored
    pub async fn push_to(&self, connection: usize, raw: &[u8]) {
        let mut writers = self.writers.lock().await;
        let writer = &mut writers[connection];
        if writer.write_all(raw).await.is_ok() {
            let _ = writer.flush().await;
        }
    }

    /// Send to the most recent connection
    pub async fn push(&self, raw: &[u8]) {
        let last = self.connections().await - 1;
        self.push_to(last, raw).await;
    }

    /// Half-close a connection; the client sees end of stream
    pub async fn hang_up(&self, connection: usize) {
        let mut writers = self.writers.lock().await;
        let _ = writers[connection].shutdown().await;
    }
}

/// Mock login plus both feed gateways
pub struct TestApi {
    pub server: MockServer,
    pub public: MockFeedGateway,
    pub private: MockFeedGateway,
}

impl TestApi {
    /// Login always answers with `session_key` valid for `expires_in` seconds
    pub async fn start(session_key: &str, expires_in: u64) -> Self {
        let api = Self::start_without_login().await;
        mount_login(
            &api.server,
            login_body(session_key, expires_in, api.public.port, api.private.port),
        )
        .await;
        api
    }

    pub async fn start_without_login() -> Self {
        Self {
            server: setup_mock_server().await,
            public: MockFeedGateway::start().await,
            private: MockFeedGateway::start().await,
        }
    }

    pub fn client(&self) -> Nordnet {
        client_for(&self.server, Duration::from_secs(1))
    }
}

pub fn login_line(session_key: &str) -> String {
    format!(r#"{{"cmd":"login","args":{{"session_key":"{session_key}","service":"NEXTAPI"}}}}"#)
}
