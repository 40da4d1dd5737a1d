//! The `get-recipes` tool: lookup collaborator and the call bridge that
//! answers the agent.
mod bridge;
mod lookup;

pub use bridge::{
    parse_query, response_events, InvocationState, RecipeBridge, RecipeSummary, ToolInvocation, ToolResult, LOOKUP_FAILED,
    MISSING_IDENTITY, NO_QUERY, UNKNOWN_TOOL,
};
pub use lookup::{HttpRecipeLookup, IdentityStore, LookupResponse, RawRecipe, RecipeLookup, StaticIdentity};

#[cfg(test)]
pub use lookup::MockRecipeLookup;
