use super::ApiClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmI {
    pub user: User,
    pub organization: Organization,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// `gf_live_` for production keys, `gf_test_` for sandbox keys.
pub fn is_valid_key_format(key: &str) -> bool {
    key.starts_with("gf_live_") || key.starts_with("gf_test_")
}

impl ApiClient {
    pub async fn whoami(&self) -> Result<WhoAmI> {
        self.get("/auth/whoami").await
    }
}
