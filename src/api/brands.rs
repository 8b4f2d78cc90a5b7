use super::ApiClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApiClient {
    pub async fn list_brands(&self) -> Result<Vec<Brand>> {
        self.get("/brands").await
    }

    pub async fn get_brand(&self, id: &str) -> Result<Brand> {
        self.get(&format!("/brands/{id}")).await
    }
}
