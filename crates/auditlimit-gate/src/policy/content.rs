//! Content filter: forbidden terms, then external moderation.
//!
//! Moderation failures never block a request (fail-open).

use crate::domain::BlockReason;
use crate::middleware::GateMetrics;
use crate::ports::ModerationClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verdict of the content filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentVerdict {
    Allowed,
    Blocked(BlockReason),
}

/// Screens request text before it reaches the model
pub struct ContentFilter {
    forbidden_terms: Vec<String>,
    moderation: Option<Arc<dyn ModerationClient>>,
    metrics: Arc<GateMetrics>,
}

impl ContentFilter {
    pub fn new(
        forbidden_terms: Vec<String>,
        moderation: Option<Arc<dyn ModerationClient>>,
        metrics: Arc<GateMetrics>,
    ) -> Self {
        Self {
            forbidden_terms: forbidden_terms.into_iter().filter(|t| !t.is_empty()).collect(),
            moderation,
            metrics,
        }
    }

    pub async fn check(&self, text: &str) -> ContentVerdict {
        if let Some(term) = self.forbidden_terms.iter().find(|t| text.contains(t.as_str())) {
            debug!(term = %term, "Forbidden term matched");
            return ContentVerdict::Blocked(BlockReason::ForbiddenTerm);
        }

        let Some(moderation) = &self.moderation else {
            return ContentVerdict::Allowed;
        };

        match moderation.is_flagged(text).await {
            Ok(true) => ContentVerdict::Blocked(BlockReason::ModerationFlagged),
            Ok(false) => ContentVerdict::Allowed,
            Err(e) => {
                self.metrics.record_moderation_degraded();
                warn!(error = %e, "Moderation check failed, allowing request");
                ContentVerdict::Allowed
            }
        }
    }
}
