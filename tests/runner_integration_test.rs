//! End-to-end tests for the rate-limited job runner

use std::time::{Duration, Instant};

use pacer::{JobError, QuotaConfig, Runner, RunnerConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn test_unrestricted_single_job() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
    runner.start();

    let handle = runner.submit(async { Ok("foo") });
    assert_eq!(handle.recv().await.unwrap(), "foo");

    runner.await_all().await;

    let stats = runner.stats();
    assert_eq!(stats.done, 1);
    assert_eq!(stats.errored, 0);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.in_progress, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_strictest_quota_binds() {
    init_logging();

    let cfg = RunnerConfig::with_quotas(vec![
        QuotaConfig::new(10, Duration::from_secs(1)),
        QuotaConfig::new(30, Duration::from_secs(60)),
        QuotaConfig::new(100, Duration::from_secs(3600)),
    ]);
    let runner = Runner::new(cfg).unwrap();
    runner.start();

    let handles: Vec<_> = (0..11)
        .map(|_| runner.submit(async { Ok(Instant::now()) }))
        .collect();

    let mut executed_at = Vec::with_capacity(11);
    for handle in handles {
        executed_at.push(handle.recv().await.unwrap());
    }
    executed_at.sort();

    // the 1s/10 window is the binding quota: the 11th execution waits for
    // the first admission to retire
    let spread = executed_at[10].duration_since(executed_at[0]);
    assert!(
        spread >= Duration::from_millis(900),
        "11th job ran only {:?} after the first",
        spread
    );

    runner.await_all().await;
    assert_eq!(runner.stats().done, 11);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_expiration_before_admission() {
    init_logging();

    let cfg = RunnerConfig::with_quotas(vec![QuotaConfig::new(1, Duration::from_secs(1))])
        .concurrency(1);
    let runner = Runner::new(cfg).unwrap();
    runner.start();

    let slow = runner.submit(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    });

    // give the worker time to admit the slow job and occupy the only slot
    tokio::time::sleep(Duration::from_millis(20)).await;

    let expiring: pacer::ResponseHandle<()> = runner.submit_with_timeout(
        async { unreachable!("job must expire before running") },
        Duration::from_millis(20),
    );

    assert!(slow.recv().await.is_ok());
    let err = expiring.recv().await.unwrap_err();
    assert!(matches!(err, JobError::Expired));

    runner.await_all().await;

    let stats = runner.stats();
    assert_eq!(stats.done, 1);
    assert_eq!(stats.errored, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_expired_before_dequeue() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
    runner.start();

    // occupy the only worker so the second request expires while queued
    let slow = runner.submit(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let expiring: pacer::ResponseHandle<()> = runner.submit_with_timeout(
        async { unreachable!("job must expire before running") },
        Duration::from_millis(1),
    );

    let err = expiring.recv().await.unwrap_err();
    assert!(matches!(err, JobError::Expired));
    assert!(slow.recv().await.is_ok());

    runner.await_all().await;
    assert_eq!(runner.stats().errored, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bounded_concurrency() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(2)).unwrap();
    runner.start();

    let started = Instant::now();
    let handles: Vec<_> = (0..5)
        .map(|_| {
            runner.submit(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
        })
        .collect();

    // sample the in-progress gauge while the batch drains
    let mut max_in_progress = 0;
    while runner.stats().done < 5 {
        max_in_progress = max_in_progress.max(runner.stats().in_progress);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for handle in handles {
        handle.recv().await.unwrap();
    }

    let elapsed = started.elapsed();
    assert!(max_in_progress <= 2, "observed {} concurrent jobs", max_in_progress);
    assert!(
        elapsed >= Duration::from_millis(140) && elapsed < Duration::from_millis(600),
        "batch took {:?}",
        elapsed
    );

    runner.await_all().await;
    assert_eq!(runner.stats().done, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_await_all_converges() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
    runner.start();

    let handle = runner.submit(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok("slept")
    });

    runner.await_all().await;

    let stats = runner.stats();
    assert_eq!(stats.done, 1);
    assert_eq!(stats.in_progress, 0);
    assert_eq!(stats.queued, 0);

    // the response is already delivered: receiving must not block
    let value = tokio::time::timeout(Duration::from_millis(10), handle.recv())
        .await
        .expect("response should be ready")
        .unwrap();
    assert_eq!(value, "slept");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_runner_cancels_queued_requests() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
    // never started: submissions stay queued

    let handle = runner.submit(async { Ok(1u32) });
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(runner);

    let err = handle.recv().await.unwrap_err();
    assert!(matches!(err, JobError::Cancelled));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_finishes_in_flight_work() {
    init_logging();

    let runner = Runner::new(RunnerConfig::new().concurrency(1)).unwrap();
    runner.start();

    let handle = runner.submit(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok("finished")
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    runner.stop();
    assert!(!runner.is_running());

    // the in-flight job still completes and delivers
    assert_eq!(handle.recv().await.unwrap(), "finished");
    runner.await_all().await;
    assert_eq!(runner.stats().done, 1);
}
