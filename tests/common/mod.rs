//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use httpnote::config::NoteConfig;
use httpnote::http::HttpServer;
use httpnote::lifecycle::Shutdown;
use httpnote::observability::MemorySink;
use tokio::net::TcpListener;

/// A running server on an ephemeral port. Dropping it leaves the task
/// running; call `stop` to shut it down.
pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Start a server recording into a `MemorySink`.
pub async fn start_server(encode_bytes: bool) -> TestServer {
    let mut config = NoteConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.capture.encode_bytes = encode_bytes;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, sink.clone());
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer { addr, sink, shutdown }
}

/// Client without pooling so every test request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
