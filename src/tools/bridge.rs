use std::sync::Arc;

use crate::tools::lookup::{IdentityStore, LookupResponse, RecipeLookup};
use crate::types::events::client::{ConversationItemCreateEvent, ResponseCreateEvent};
use crate::types::{ClientEvent, FunctionCallOutputItem, Item};

pub const NO_QUERY: &str = "No query provided";
pub const MISSING_IDENTITY: &str = "missing identity";
pub const LOOKUP_FAILED: &str = "Failed to fetch recipes";
pub const UNKNOWN_TOOL: &str = "unknown tool";

/// `Received -> Querying -> Responded | Failed`, one attempt per call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Querying,
    Responded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    call_id: String,
    query: Option<String>,
    state: InvocationState,
}

impl ToolInvocation {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecipeSummary {
    pub name: String,
    pub description: String,
}

/// The output handed back to the agent, JSON-encoded into the
/// `function_call_output` item.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ToolResult {
    pub count: usize,
    pub recipes: Vec<RecipeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn failed(marker: &str) -> Self {
        Self {
            count: 0,
            recipes: Vec::new(),
            error: Some(marker.to_string()),
        }
    }

    pub fn from_response(response: LookupResponse) -> Self {
        let recipes: Vec<RecipeSummary> = response
            .recipes
            .iter()
            .map(|recipe| RecipeSummary {
                name: recipe.name().to_string(),
                description: recipe.description().to_string(),
            })
            .collect();
        Self {
            count: recipes.len(),
            recipes,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Extracts a non-empty `query` from the call's JSON arguments.
pub fn parse_query(arguments_json: &str) -> Option<String> {
    let args: serde_json::Value = match serde_json::from_str(arguments_json) {
        Ok(args) => args,
        Err(e) => {
            tracing::warn!("failed to parse tool arguments: {}", e);
            return None;
        }
    };
    args.get("query")
        .and_then(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}

/// The two sends that answer a call, in order: the output item, then the
/// request for the agent to continue.
pub fn response_events(call_id: &str, result: &ToolResult) -> Vec<ClientEvent> {
    let output = serde_json::to_string(result).unwrap_or_else(|e| {
        tracing::error!("failed to serialize tool result: {}", e);
        format!(r#"{{"count":0,"recipes":[],"error":"{}"}}"#, LOOKUP_FAILED)
    });
    vec![
        ClientEvent::ConversationItemCreate(ConversationItemCreateEvent::new(Item::FunctionCallOutput(
            FunctionCallOutputItem::new(call_id, output),
        ))),
        ClientEvent::ResponseCreate(ResponseCreateEvent::new()),
    ]
}

#[derive(Clone)]
pub struct RecipeBridge {
    lookup: Arc<dyn RecipeLookup>,
    identity: Arc<dyn IdentityStore>,
}

impl RecipeBridge {
    pub fn new(lookup: Arc<dyn RecipeLookup>, identity: Arc<dyn IdentityStore>) -> Self {
        Self { lookup, identity }
    }

    /// Starts an invocation. Unparseable or empty arguments fail right away.
    pub fn receive(call_id: &str, arguments_json: &str) -> ToolInvocation {
        let query = parse_query(arguments_json);
        let state = if query.is_some() {
            InvocationState::Received
        } else {
            tracing::warn!("tool call {} has no query", call_id);
            InvocationState::Failed
        };
        ToolInvocation {
            call_id: call_id.to_string(),
            query,
            state,
        }
    }

    /// Runs the lookup. Never fails: every error becomes an error result.
    pub async fn execute(&self, invocation: &mut ToolInvocation) -> ToolResult {
        let Some(query) = invocation.query.clone().filter(|_| invocation.state == InvocationState::Received) else {
            invocation.state = InvocationState::Failed;
            return ToolResult::failed(NO_QUERY);
        };
        let Some(user_id) = self.identity.user_id() else {
            tracing::warn!("tool call {}: no user id in session storage", invocation.call_id);
            invocation.state = InvocationState::Failed;
            return ToolResult::failed(MISSING_IDENTITY);
        };

        invocation.state = InvocationState::Querying;
        tracing::info!("searching recipes: call_id={}, query={:?}", invocation.call_id, query);
        match self.lookup.lookup(&user_id, &query).await {
            Ok(response) => {
                invocation.state = InvocationState::Responded;
                let result = ToolResult::from_response(response);
                tracing::info!("recipe search found {} recipes", result.count);
                result
            }
            Err(e) => {
                tracing::error!("recipe search failed: {}", e);
                invocation.state = InvocationState::Failed;
                ToolResult::failed(LOOKUP_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::error::SessionError;
    use crate::tools::lookup::{MockRecipeLookup, RawRecipe, StaticIdentity};

    fn bridge(lookup: MockRecipeLookup, user_id: Option<&str>) -> RecipeBridge {
        RecipeBridge::new(Arc::new(lookup), Arc::new(StaticIdentity::new(user_id.map(str::to_string))))
    }

    #[test]
    fn query_must_be_present_and_non_empty() {
        assert_eq!(parse_query(r#"{"query":"pasta"}"#), Some("pasta".to_string()));
        assert_eq!(parse_query(r#"{"query":"  "}"#), None);
        assert_eq!(parse_query(r#"{"q":"pasta"}"#), None);
        assert_eq!(parse_query("{not json"), None);
        assert_eq!(parse_query(""), None);
    }

    #[tokio::test]
    async fn empty_query_fails_without_lookup() {
        let mut lookup = MockRecipeLookup::new();
        lookup.expect_lookup().never();
        let bridge = bridge(lookup, Some("u1"));

        let mut invocation = RecipeBridge::receive("call_1", r#"{"query":""}"#);
        assert_eq!(invocation.state(), InvocationState::Failed);
        let result = bridge.execute(&mut invocation).await;
        assert_eq!(result, ToolResult::failed(NO_QUERY));
        assert_eq!(result.count, 0);
    }

    #[tokio::test]
    async fn missing_identity_short_circuits() {
        let mut lookup = MockRecipeLookup::new();
        lookup.expect_lookup().never();
        let bridge = bridge(lookup, None);

        let mut invocation = RecipeBridge::receive("call_2", r#"{"query":"soup"}"#);
        let result = bridge.execute(&mut invocation).await;
        assert_eq!(result.error.as_deref(), Some(MISSING_IDENTITY));
        assert_eq!(invocation.state(), InvocationState::Failed);
    }

    #[tokio::test]
    async fn lookup_results_are_normalized() {
        let mut lookup = MockRecipeLookup::new();
        lookup
            .expect_lookup()
            .with(eq("u1"), eq("christmas"))
            .times(1)
            .returning(|_, _| {
                Ok(LookupResponse {
                    recipes: vec![
                        RawRecipe {
                            recipe_name: Some("Ribbe".into()),
                            ingress: Some("Crispy pork belly".into()),
                            ..RawRecipe::default()
                        },
                        RawRecipe {
                            name: Some("Pinnekjøtt".into()),
                            ..RawRecipe::default()
                        },
                    ],
                })
            });
        let bridge = bridge(lookup, Some("u1"));

        let mut invocation = RecipeBridge::receive("call_3", r#"{"query":"christmas"}"#);
        let result = bridge.execute(&mut invocation).await;
        assert_eq!(invocation.state(), InvocationState::Responded);
        assert_eq!(result.count, 2);
        assert_eq!(result.recipes[0].name, "Ribbe");
        assert_eq!(result.recipes[0].description, "Crispy pork belly");
        assert_eq!(result.recipes[1].description, "");
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn lookup_errors_become_error_results() {
        let mut lookup = MockRecipeLookup::new();
        lookup
            .expect_lookup()
            .times(1)
            .returning(|_, _| Err(SessionError::ToolLookup("connection refused".into())));
        let bridge = bridge(lookup, Some("u1"));

        let mut invocation = RecipeBridge::receive("call_4", r#"{"query":"tacos"}"#);
        let result = bridge.execute(&mut invocation).await;
        assert_eq!(result, ToolResult::failed(LOOKUP_FAILED));
        assert_eq!(invocation.state(), InvocationState::Failed);
    }

    #[test]
    fn response_is_output_then_continue() {
        let events = response_events("call_5", &ToolResult::failed(NO_QUERY));
        assert_eq!(events.len(), 2);

        let first = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(first["type"], "conversation.item.create");
        assert_eq!(first["item"]["type"], "function_call_output");
        assert_eq!(first["item"]["call_id"], "call_5");
        let output: serde_json::Value = serde_json::from_str(first["item"]["output"].as_str().unwrap()).unwrap();
        assert_eq!(output, serde_json::json!({"count": 0, "recipes": [], "error": "No query provided"}));

        let second = serde_json::to_value(&events[1]).unwrap();
        assert_eq!(second, serde_json::json!({"type": "response.create"}));
    }
}
