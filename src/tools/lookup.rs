use std::sync::RwLock;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::consts::GET_RECIPES_PATH;
use crate::error::{Result, SessionError};

/// A recipe as the backend returns it. Field names vary between backend
/// versions, see [`RawRecipe::name`] and [`RawRecipe::description`].
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct RawRecipe {
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ingress: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawRecipe {
    /// `recipe_name`, then `name`, then empty.
    pub fn name(&self) -> &str {
        first_present(&[&self.recipe_name, &self.name])
    }

    /// `ingress`, then `description`, then empty.
    pub fn description(&self) -> &str {
        first_present(&[&self.ingress, &self.description])
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> &'a str {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub recipes: Vec<RawRecipe>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecipeLookup: Send + Sync {
    async fn lookup(&self, user_id: &str, query: &str) -> Result<LookupResponse>;
}

#[derive(serde::Serialize)]
struct LookupRequest<'a> {
    query: &'a str,
}

pub struct HttpRecipeLookup {
    client: reqwest::Client,
    api_url: String,
}

impl HttpRecipeLookup {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, user_id: &str) -> String {
        format!("{}{}/{}", self.api_url, GET_RECIPES_PATH, user_id)
    }
}

#[async_trait]
impl RecipeLookup for HttpRecipeLookup {
    async fn lookup(&self, user_id: &str, query: &str) -> Result<LookupResponse> {
        let response = self
            .client
            .post(self.url(user_id))
            .json(&LookupRequest { query })
            .send()
            .await
            .map_err(|e| SessionError::ToolLookup(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::ToolLookup(format!("backend returned {}", status)));
        }
        response
            .json::<LookupResponse>()
            .await
            .map_err(|e| SessionError::ToolLookup(e.to_string()))
    }
}

/// Session-scoped identity, read at the moment a lookup is about to happen.
pub trait IdentityStore: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: RwLock::new(user_id.filter(|id| !id.is_empty())),
        }
    }

    pub fn set(&self, user_id: Option<String>) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = user_id.filter(|id| !id.is_empty());
        }
    }
}

impl IdentityStore for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.read().ok().and_then(|guard| guard.clone())
    }
}
