//! Strategies that mint a fresh vendor token.
//!
//! A login is slow (tens of seconds for the browser flow) and the vendor
//! rate-limits it, so callers never invoke a provider directly: they go
//! through [`crate::refresh::SingleFlightRefresher`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::service::LoginConfig;
use crate::store::Token;

pub mod command;
pub mod http;

use self::command::{CommandLogin, CommandLoginConfig};
use self::http::HttpLogin;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login rejected: {0}")]
    Rejected(String),
    #[error("login transport error: {0}")]
    Transport(String),
    #[error("login response invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LoginProvider: Send + Sync {
    async fn perform_login(&self) -> Result<Token, LoginError>;
}

/// `{"success": true, "token": "..."}` as produced by both login strategies.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub error: Option<String>,
}

impl LoginResponse {
    pub fn into_token(self) -> Result<Token, LoginError> {
        if !self.success {
            return Err(LoginError::Rejected(
                self.error.unwrap_or_else(|| "success=false".to_string()),
            ));
        }
        self.token
            .as_deref()
            .and_then(Token::new)
            .ok_or_else(|| LoginError::InvalidResponse("response missing token".to_string()))
    }
}

pub fn build_login_provider(config: &LoginConfig, client: &Client) -> Arc<dyn LoginProvider> {
    match config {
        LoginConfig::Command {
            program,
            args,
            username,
            password,
            solver_api_key,
            env,
        } => Arc::new(CommandLogin::new(CommandLoginConfig {
            program: program.clone(),
            args: args.clone(),
            username: username.clone(),
            password: password.clone(),
            solver_api_key: solver_api_key.clone(),
            env: env.clone(),
        })),
        LoginConfig::Http { url, headers } => {
            Arc::new(HttpLogin::new(client.clone(), url.clone(), headers.clone()))
        }
    }
}
