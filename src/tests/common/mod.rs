// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::service::VendorConfig;
use crate::login::{LoginError, LoginProvider};
use crate::store::Token;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Vendor settings pointing at a mock server.
pub fn vendor_config(base_url: &str) -> VendorConfig {
    VendorConfig {
        base_url: base_url.to_string(),
        cabinet_path: "/api/cabinet".to_string(),
        command_path: "/api/command/sendCommandBySign".to_string(),
        referer: "https://backend.example.test/device/list".to_string(),
        oid: "3526".to_string(),
        command_sign: "SendCompulsoryBorrowDevice".to_string(),
        sequence: 1,
        timeout_ms: Some(2_000),
    }
}

/// Login provider that replays a fixed script of results and counts calls.
/// `Err(reason)` entries become `LoginError::Rejected(reason)`; once the script
/// runs out every further login is rejected.
pub struct ScriptedLogin {
    script: Mutex<VecDeque<Result<String, String>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedLogin {
    pub fn new(script: &[Result<&str, &str>]) -> Self {
        Self {
            script: Mutex::new(
                script
                    .iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginProvider for ScriptedLogin {
    async fn perform_login(&self) -> Result<Token, LoginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match next {
            Some(Ok(raw)) => Token::new(raw).ok_or_else(|| LoginError::InvalidResponse("blank token".to_string())),
            Some(Err(reason)) => Err(LoginError::Rejected(reason)),
            None => Err(LoginError::Rejected("script exhausted".to_string())),
        }
    }
}
