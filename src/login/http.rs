use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::login::{LoginError, LoginProvider, LoginResponse};
use crate::store::Token;

/// Token endpoint that runs the login on our behalf.
#[derive(Debug, Clone)]
pub struct HttpLogin {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpLogin {
    pub fn new(client: Client, url: String, headers: HashMap<String, String>) -> Self {
        Self { client, url, headers }
    }
}

#[async_trait]
impl LoginProvider for HttpLogin {
    async fn perform_login(&self) -> Result<Token, LoginError> {
        info!("requesting token from {}", self.url);
        let mut request = self.client.get(&self.url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoginError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            error!("token endpoint failed: {}", response.status());
            return Err(LoginError::Transport(format!("HTTP {}", response.status())));
        }

        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?
            .into_token()
    }
}
