//! Admission decisions and their caller-facing rendering.

use super::config::duration_str::format_duration;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Rate tier a request is billed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Standard premium models
    Standard,
    /// Heavy premium models (own, smaller budget)
    Heavy,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Heavy => write!(f, "heavy"),
        }
    }
}

/// Why the content filter blocked a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Text contains a configured forbidden term
    ForbiddenTerm,
    /// The moderation service flagged the text
    ModerationFlagged,
}

impl BlockReason {
    /// Short reason, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::ForbiddenTerm => "forbidden term",
            BlockReason::ModerationFlagged => "moderation flagged",
        }
    }

    /// Machine-readable code returned to callers
    pub fn code(&self) -> &'static str {
        match self {
            BlockReason::ForbiddenTerm => "forbidden_term",
            BlockReason::ModerationFlagged => "flagged_by_moderation",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            BlockReason::ForbiddenTerm => {
                "This content contains a term blocked by the administrator. Please revise it and try again."
            }
            BlockReason::ModerationFlagged => {
                "This content may violate [OpenAI Usage Policies](https://openai.com/policies/usage-policies)."
            }
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission check. Exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// Request may proceed upstream
    Admit,
    /// No bearer credential
    Unauthorized,
    /// Body unparseable or missing the prompt text
    BadRequest(String),
    /// Content filter blocked the text
    RejectContent(BlockReason),
    /// Non-premium caller asked for a premium model
    RejectEntitlement {
        /// Requested model
        model: String,
        /// Model the caller may switch to
        free_model: String,
    },
    /// Tier budget exhausted
    Throttled {
        tier: Tier,
        limit: u32,
        period: Duration,
        retry_after: Duration,
    },
}

impl AdmissionDecision {
    /// HTTP status for this decision
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionDecision::Admit => 200,
            AdmissionDecision::Unauthorized => 401,
            AdmissionDecision::BadRequest(_)
            | AdmissionDecision::RejectContent(_)
            | AdmissionDecision::RejectEntitlement { .. } => 400,
            AdmissionDecision::Throttled { .. } => 429,
        }
    }

    /// Value of the `detail` field in the response body
    pub fn detail(&self) -> serde_json::Value {
        match self {
            AdmissionDecision::Admit => serde_json::Value::String("ok".to_string()),
            AdmissionDecision::Unauthorized => {
                serde_json::Value::String("Unauthorized request, missing token.".to_string())
            }
            AdmissionDecision::BadRequest(reason) => serde_json::Value::String(reason.clone()),
            AdmissionDecision::RejectContent(reason) => serde_json::json!({
                "code": reason.code(),
                "message": reason.message(),
            }),
            AdmissionDecision::RejectEntitlement { model, free_model } => {
                serde_json::Value::String(format!(
                    "'{}' is a premium model. Please switch to the {} model to continue.",
                    model, free_model
                ))
            }
            AdmissionDecision::Throttled {
                limit,
                period,
                retry_after,
                ..
            } => serde_json::Value::String(format!(
                "You have triggered the usage frequency limit, the current limit is {} times/{}, please wait {} seconds before trying again.",
                limit,
                format_duration(*period),
                retry_after_secs(*retry_after)
            )),
        }
    }

    /// Seconds a throttled caller should wait, if throttled
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AdmissionDecision::Throttled { retry_after, .. } => Some(retry_after_secs(*retry_after)),
            _ => None,
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionDecision::Admit => "admit",
            AdmissionDecision::Unauthorized => "unauthorized",
            AdmissionDecision::BadRequest(_) => "bad_request",
            AdmissionDecision::RejectContent(_) => "reject_content",
            AdmissionDecision::RejectEntitlement { .. } => "reject_entitlement",
            AdmissionDecision::Throttled { .. } => "throttled",
        }
    }
}

/// Whole seconds, rounded up. A positive wait never reports 0.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs();
    if wait.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
