//! Inbound request fields: caller identity and the chat payload.

/// JSON pointer to the user text inside a chat request
pub const PROMPT_POINTER: &str = "/messages/0/content/parts/0";

/// Extract the caller identity from an `Authorization` header value.
///
/// Only `Bearer <token>` is accepted; an empty token counts as absent.
pub fn bearer_identity(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Fields of a chat request the gate cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub action: String,
    pub model: String,
    pub prompt: String,
}

/// Why a request body was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Body is not JSON
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// No user text at `messages[0].content.parts[0]`
    #[error("request body is missing the message content")]
    MissingPrompt,
}

impl ChatRequest {
    /// Parse a chat request body.
    ///
    /// `action` and `model` default to empty strings. A non-string first part
    /// (e.g. a multimodal object) is screened as its JSON text.
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        let json: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| RequestError::InvalidJson(e.to_string()))?;

        let field = |name: &str| {
            json.get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let prompt = match json.pointer(PROMPT_POINTER) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        if prompt.is_empty() {
            return Err(RequestError::MissingPrompt);
        }

        Ok(Self {
            action: field("action"),
            model: field("model"),
            prompt,
        })
    }
}
