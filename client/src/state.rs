use chifumi_common::bearer;

use crate::config::Config;

/// Credentials and endpoint handed to every component at construction
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub server_url: String,
    pub auth_token: String,
    pub user_id: String,
}

impl SessionState {
    pub fn new(server_url: &str, auth_token: &str, user_id: &str) -> Self {
        SessionState {
            server_url: server_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let server_url = config.server_url.as_ref().ok_or("No server URL configured")?;
        let token = config.auth_token.as_ref().ok_or("No auth token configured")?;
        let user_id = config.user_id.as_ref().ok_or("No user ID configured")?;
        Ok(Self::new(server_url, token, user_id))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    pub fn authorization(&self) -> String {
        bearer(&self.auth_token)
    }
}
