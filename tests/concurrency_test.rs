// Concurrent admission against shared buckets

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use tiered_limiter::rate_limit::{DefaultCapacities, ManualClock, PolicyStore, RateLimiter, Tier};
use tiered_limiter::SessionUser;

fn limiter_with_capacity(capacity: &str) -> Arc<RateLimiter> {
    let clock = Arc::new(ManualClock::new());
    let limiter = RateLimiter::with_clock(
        PolicyStore::defaults_only(DefaultCapacities::parse_csv(capacity).unwrap()),
        clock,
    );
    Arc::new(limiter)
}

#[test]
fn test_threads_admit_exactly_capacity() {
    const CAPACITY: usize = 25;
    const CALLERS: usize = 200;

    let limiter = limiter_with_capacity(&CAPACITY.to_string());
    let barrier = Arc::new(Barrier::new(CALLERS));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                let user = SessionUser::guest();
                barrier.wait();
                if limiter.check_rate(&user, "ExportDatasetCommand") {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), CAPACITY);
    assert_eq!(limiter.registry().len(), 1);
    let stats = limiter.stats();
    assert_eq!(stats.allowed as usize, CAPACITY);
    assert_eq!(stats.denied as usize, CALLERS - CAPACITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_admit_exactly_capacity_per_key() {
    const CAPACITY: usize = 10;
    const CALLERS_PER_ACTION: usize = 50;
    let actions = ["A", "B", "C"];

    let limiter = limiter_with_capacity(&CAPACITY.to_string());
    let user = Arc::new(SessionUser::authenticated("worker", Tier(0)));

    let mut tasks = Vec::new();
    for action in actions {
        for _ in 0..CALLERS_PER_ACTION {
            let limiter = Arc::clone(&limiter);
            let user = Arc::clone(&user);
            tasks.push(tokio::spawn(async move {
                (action, limiter.check_rate(user.as_ref(), action))
            }));
        }
    }

    let mut admitted = std::collections::HashMap::new();
    for task in tasks {
        let (action, allowed) = task.await.unwrap();
        if allowed {
            *admitted.entry(action).or_insert(0usize) += 1;
        }
    }

    for action in actions {
        assert_eq!(admitted.get(action).copied(), Some(CAPACITY), "action {}", action);
    }
    assert_eq!(limiter.registry().len(), actions.len());
}

#[test]
fn test_reload_during_checks_keeps_buckets_consistent() {
    const CAPACITY: usize = 40;
    let limiter = limiter_with_capacity(&CAPACITY.to_string());
    let admitted = Arc::new(AtomicUsize::new(0));

    let checkers: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                let user = SessionUser::guest();
                for _ in 0..20 {
                    if limiter.check_rate(&user, "SubmitDatasetForReviewCommand") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    let reloader = {
        let limiter = Arc::clone(&limiter);
        std::thread::spawn(move || {
            for i in 0..20 {
                // Same tier-0 capacity each time, so the result is deterministic
                let csv = format!("{},{}", CAPACITY, i);
                limiter.init("", &csv).unwrap();
            }
        })
    };

    for h in checkers {
        h.join().unwrap();
    }
    reloader.join().unwrap();

    assert_eq!(admitted.load(Ordering::SeqCst), CAPACITY);
}
