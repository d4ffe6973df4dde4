use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

pub const ENV_API_URL: &str = "CHIFUMI_API_URL";
pub const ENV_TOKEN: &str = "CHIFUMI_TOKEN";
pub const ENV_USER_ID: &str = "CHIFUMI_USER_ID";

const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: Option<String>,
    pub auth_token: Option<String>,
    pub user_id: Option<String>,
    /// Seconds to wait before reopening a dropped event stream
    pub retry_delay_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: Some("http://127.0.0.1:3000".to_string()),
            auth_token: None,
            user_id: None,
            retry_delay_secs: Some(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl Config {
    pub fn load_from(config_path: &str) -> std::result::Result<Config, Box<dyn std::error::Error>> {
        if Path::new(config_path).exists() {
            let content = fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to(&self, config_path: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        Ok(())
    }

    /// Let `CHIFUMI_*` environment variables take precedence over the file
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.server_url = Some(url);
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            self.user_id = Some(user_id);
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS))
    }
}
