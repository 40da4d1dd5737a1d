pub const REALTIME_ENDPOINT: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";
pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_VOICE: &str = "ash";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_SDP: &str = "application/sdp";

pub const DATA_CHANNEL_LABEL: &str = "oai-events";

pub const EPHEMERAL_TOKEN_PATH: &str = "/api/openai/agent/ephemeral-token";
pub const GET_RECIPES_PATH: &str = "/api/openai/get-recipes";

pub const RECIPE_TOOL_NAME: &str = "get-recipes";
