//! # Concurrent Admission
//!
//! Many simultaneous requests from one previously unseen caller must create
//! a single bucket and never admit more than its capacity before refill.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{audit_request, config, send, Harness};
    use axum::http::StatusCode;
    use std::time::Duration;

    const TASKS: usize = 64;
    const CAPACITY: u32 = 10;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_requests_share_one_budget() {
        let harness = Harness::new(config(CAPACITY, Duration::from_secs(3600)), &["erin"], None);

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let router = harness.router.clone();
                tokio::spawn(async move {
                    send(router, audit_request(Some("erin"), "gpt-4", "hi"))
                        .await
                        .status
                })
            })
            .collect();

        let mut admitted = 0;
        let mut throttled = 0;
        for handle in handles {
            match handle.await.unwrap() {
                StatusCode::OK => admitted += 1,
                StatusCode::TOO_MANY_REQUESTS => throttled += 1,
                other => panic!("unexpected status {}", other),
            }
        }

        assert_eq!(admitted, CAPACITY as usize);
        assert_eq!(throttled, TASKS - CAPACITY as usize);

        let metrics = harness.get("/metrics").await;
        assert_eq!(metrics.body["rate_limiting"]["tracked_visitors"], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_callers_each_get_full_budget() {
        const CALLERS: [&str; 4] = ["c1", "c2", "c3", "c4"];
        let harness = Harness::new(config(CAPACITY, Duration::from_secs(3600)), &CALLERS, None);

        let handles: Vec<_> = CALLERS
            .iter()
            .flat_map(|caller| std::iter::repeat(*caller).take(2 * CAPACITY as usize))
            .map(|caller| {
                let router = harness.router.clone();
                tokio::spawn(async move {
                    let status = send(router, audit_request(Some(caller), "gpt-4", "hi"))
                        .await
                        .status;
                    (caller, status)
                })
            })
            .collect();

        let mut admitted = std::collections::HashMap::new();
        for handle in handles {
            let (caller, status) = handle.await.unwrap();
            if status == StatusCode::OK {
                *admitted.entry(caller).or_insert(0usize) += 1;
            }
        }

        for caller in CALLERS {
            assert_eq!(admitted.get(caller), Some(&(CAPACITY as usize)), "caller {}", caller);
        }
    }
}
