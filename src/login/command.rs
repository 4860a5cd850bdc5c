use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::login::{LoginError, LoginProvider, LoginResponse};
use crate::store::Token;

pub const ENV_USERNAME: &str = "LOGIN_USERNAME";
pub const ENV_PASSWORD: &str = "LOGIN_PASSWORD";
pub const ENV_SOLVER_KEY: &str = "SOLVER_API_KEY";

/// Runs the interactive (browser + captcha solver) login as a child process.
///
/// Credentials are handed over through the environment; the program must
/// print a `LoginResponse` JSON object as the last non-empty line of stdout.
#[derive(Debug, Clone)]
pub struct CommandLogin {
    config: CommandLoginConfig,
}

/// Program and credentials for [`CommandLogin`].
#[derive(Debug, Clone)]
pub struct CommandLoginConfig {
    pub program: String,
    pub args: Vec<String>,
    pub username: String,
    pub password: String,
    pub solver_api_key: String,
    pub env: HashMap<String, String>,
}

impl CommandLogin {
    pub fn new(config: CommandLoginConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let config = &self.config;
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(&config.env)
            .env(ENV_USERNAME, &config.username)
            .env(ENV_PASSWORD, &config.password)
            .env(ENV_SOLVER_KEY, &config.solver_api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // a timed out login is dropped by the refresher; take the browser down with it
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl LoginProvider for CommandLogin {
    async fn perform_login(&self) -> Result<Token, LoginError> {
        let mut cmd = self.command();
        info!("running login program");

        let output = cmd
            .output()
            .await
            .map_err(|e| LoginError::Transport(format!("spawn failed: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("login program stderr: {}", stderr.trim());
        }
        if !output.status.success() {
            error!("login program exited with {}", output.status);
            return Err(LoginError::Rejected(format!("login program exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| LoginError::InvalidResponse("login program printed nothing".to_string()))?;

        serde_json::from_str::<LoginResponse>(line)
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?
            .into_token()
    }
}
