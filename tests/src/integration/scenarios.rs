//! # Admission Scenarios
//!
//! One request at a time through `POST /audit_limit`:
//!
//! 1. Burst up to capacity, then throttle with an accurate wait
//! 2. Non-premium caller asking for a premium model
//! 3. Forbidden term, whatever the moderation setup
//! 4. Moderation outage lets clean text through
//! 5. Heavy and standard tiers keep separate budgets

#[cfg(test)]
mod tests {
    use super::super::fixtures::{config, Harness, ModerationMode};
    use axum::http::StatusCode;
    use std::time::Duration;

    const PREMIUM: &str = "gpt-4";
    const HEAVY: &str = "o1-preview";
    const FREE: &str = "gpt-4o-mini";

    // =========================================================================
    // RATE LIMITING
    // =========================================================================

    #[tokio::test]
    async fn test_burst_then_throttle_with_one_second_wait() {
        let harness = Harness::new(config(3, Duration::from_secs(3)), &["alice"], None);

        for _ in 0..3 {
            assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
        }

        let reply = harness.audit(Some("alice"), PREMIUM, "hi").await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(reply.retry_after(), Some(1));
        assert_eq!(
            reply.detail(),
            "You have triggered the usage frequency limit, the current limit is 3 times/3s, please wait 1 seconds before trying again."
        );
    }

    #[tokio::test]
    async fn test_retry_after_reported_wait_is_admitted() {
        let harness = Harness::new(config(7, Duration::from_secs(10)), &["alice"], None);

        for _ in 0..7 {
            harness.audit(Some("alice"), PREMIUM, "hi").await;
        }

        // Partially refill so the deficit is fractional
        harness.clock.advance(Duration::from_millis(300));
        let reply = harness.audit(Some("alice"), PREMIUM, "hi").await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);

        let wait = reply.retry_after().unwrap();
        assert!(wait >= 1);
        harness.clock.advance(Duration::from_secs(wait));
        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_full_period_restores_full_budget() {
        let period = Duration::from_secs(60);
        let harness = Harness::new(config(4, period), &["alice"], None);

        for _ in 0..4 {
            harness.audit(Some("alice"), PREMIUM, "hi").await;
        }
        assert_eq!(
            harness.audit(Some("alice"), PREMIUM, "hi").await.status,
            StatusCode::TOO_MANY_REQUESTS
        );

        harness.clock.advance(period);
        for _ in 0..4 {
            assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
        }
        assert_eq!(
            harness.audit(Some("alice"), PREMIUM, "hi").await.status,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_callers_do_not_share_budget() {
        let harness = Harness::new(config(1, Duration::from_secs(60)), &["alice", "bob"], None);

        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
        assert_eq!(
            harness.audit(Some("alice"), PREMIUM, "hi").await.status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(harness.audit(Some("bob"), PREMIUM, "hi").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_heavy_tier_has_its_own_budget() {
        let harness = Harness::new(config(2, Duration::from_secs(60)), &["alice"], None);

        assert_eq!(harness.audit(Some("alice"), HEAVY, "hi").await.status, StatusCode::OK);
        let reply = harness.audit(Some("alice"), HEAVY, "hi").await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(reply.detail().as_str().unwrap().contains("1 times/1m"));

        // Standard tier untouched by the drained heavy bucket
        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_free_model_is_never_throttled() {
        let harness = Harness::new(config(1, Duration::from_secs(3600)), &[], None);

        for _ in 0..20 {
            assert_eq!(harness.audit(Some("carol"), FREE, "hi").await.status, StatusCode::OK);
        }
    }

    // =========================================================================
    // ENTITLEMENT
    // =========================================================================

    #[tokio::test]
    async fn test_non_premium_rejected_for_premium_model() {
        let harness = Harness::new(config(3, Duration::from_secs(3)), &[], None);

        let reply = harness.audit(Some("dave"), PREMIUM, "hi").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.detail().as_str().unwrap().contains("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_entitlement_rejection_ignores_rate_state() {
        let harness = Harness::new(config(1, Duration::from_secs(3600)), &[], None);

        // Same rejection with a fresh or an exhausted budget elsewhere
        for _ in 0..5 {
            let reply = harness.audit(Some("dave"), PREMIUM, "hi").await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        }
        let metrics = harness.get("/metrics").await;
        assert_eq!(metrics.body["requests"]["entitlement_rejected"], 5);
        assert_eq!(metrics.body["requests"]["throttled"], 0);
        assert_eq!(metrics.body["rate_limiting"]["tracked_visitors"], 0);
    }

    #[tokio::test]
    async fn test_entitlement_is_cached() {
        let harness = Harness::new(config(10, Duration::from_secs(60)), &["alice"], None);

        for _ in 0..3 {
            harness.audit(Some("alice"), PREMIUM, "hi").await;
        }
        assert_eq!(harness.entitlement.calls(), 1);
    }

    #[tokio::test]
    async fn test_entitlement_outage_fails_closed_and_recovers() {
        let harness = Harness::new(config(10, Duration::from_secs(60)), &["alice"], None);
        harness.entitlement.set_failing(true);

        assert_eq!(
            harness.audit(Some("alice"), PREMIUM, "hi").await.status,
            StatusCode::BAD_REQUEST
        );
        // Free model still served during the outage
        assert_eq!(harness.audit(Some("alice"), FREE, "hi").await.status, StatusCode::OK);

        harness.entitlement.set_failing(false);
        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);

        let metrics = harness.get("/metrics").await;
        assert_eq!(metrics.body["dependencies"]["entitlement_degraded"], 1);
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    #[tokio::test]
    async fn test_forbidden_term_rejected_for_every_moderation_mode() {
        for mode in [None, Some(ModerationMode::Clean), Some(ModerationMode::Fail)] {
            let harness = Harness::new(config(3, Duration::from_secs(3)), &["alice"], mode);
            let reply = harness.audit(Some("alice"), PREMIUM, "abc xyz").await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST, "mode {:?}", mode);
            assert_eq!(reply.detail()["code"], "forbidden_term");
        }
    }

    #[tokio::test]
    async fn test_moderation_flag_rejects() {
        let harness = Harness::new(
            config(3, Duration::from_secs(3)),
            &["alice"],
            Some(ModerationMode::Flag),
        );
        let reply = harness.audit(Some("alice"), PREMIUM, "hello").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.detail()["code"], "flagged_by_moderation");
    }

    #[tokio::test]
    async fn test_moderation_outage_fails_open() {
        let harness = Harness::new(
            config(1, Duration::from_secs(60)),
            &["alice"],
            Some(ModerationMode::Fail),
        );

        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hello").await.status, StatusCode::OK);
        // Request reached the rate check: the second one is throttled
        assert_eq!(
            harness.audit(Some("alice"), PREMIUM, "hello").await.status,
            StatusCode::TOO_MANY_REQUESTS
        );

        let metrics = harness.get("/metrics").await;
        assert_eq!(metrics.body["dependencies"]["moderation_degraded"], 2);
    }

    #[tokio::test]
    async fn test_content_rejection_consumes_no_token() {
        let harness = Harness::new(config(1, Duration::from_secs(60)), &["alice"], None);

        harness.audit(Some("alice"), PREMIUM, "xyz").await;
        assert_eq!(harness.audit(Some("alice"), PREMIUM, "hi").await.status, StatusCode::OK);
    }

    // =========================================================================
    // CLIENT ERRORS
    // =========================================================================

    #[tokio::test]
    async fn test_missing_token() {
        let harness = Harness::new(config(3, Duration::from_secs(3)), &[], None);
        let reply = harness.audit(None, PREMIUM, "hi").await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.detail(), "Unauthorized request, missing token.");
    }

    #[tokio::test]
    async fn test_empty_text_is_bad_request() {
        let harness = Harness::new(config(3, Duration::from_secs(3)), &["alice"], None);
        let reply = harness.audit(Some("alice"), PREMIUM, "").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        // Rejected before the entitlement lookup
        assert_eq!(harness.entitlement.calls(), 0);
    }

    #[tokio::test]
    async fn test_every_response_has_request_id() {
        let harness = Harness::new(config(3, Duration::from_secs(3)), &[], None);
        let reply = harness.audit(None, PREMIUM, "hi").await;
        assert!(reply.headers.contains_key("x-request-id"));
        assert!(harness.service.metrics().requests_total.load(std::sync::atomic::Ordering::Relaxed) >= 1);
    }
}
