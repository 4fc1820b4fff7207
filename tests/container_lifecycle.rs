//! Container lifecycle tests: providers, health scans, scheduling and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lifecycle_ioc::health::SchedulerState;
use lifecycle_ioc::lifecycle::CloseFailure;
use lifecycle_ioc::{BoxError, Container, Context, HealthError, Level, NamedProviders, Provider};
use once_cell::sync::Lazy;

mod common;

struct Engine {
    horsepower: u32,
}

struct Wheels {
    count: usize,
}

struct Car {
    engine: Arc<Engine>,
    wheels: Arc<Wheels>,
}

static ENGINE: Lazy<Provider<Engine>> = Lazy::new(|| {
    Provider::new(|container: Container| async move {
        container.on_health_check(|| async { None });
        container.on_close(|| async { Ok(()) });
        Ok(Engine { horsepower: 300 })
    })
});

static WHEELS: Lazy<NamedProviders<Wheels>> = Lazy::new(NamedProviders::new);

static CAR: Lazy<Provider<Car>> = Lazy::new(|| {
    Provider::new(|container: Container| async move {
        let engine = ENGINE.get(&container).await?;
        let wheels = WHEELS
            .get_provider("sport", |_| async { Ok(Wheels { count: 4 }) })
            .get(&container)
            .await?;
        container.on_close(|| async { Ok(()) });
        Ok(Car { engine, wheels })
    })
});

fn exploding_check() -> Option<HealthError> {
    panic!("health check exploded")
}

#[tokio::test]
async fn test_dependencies_share_one_container() {
    common::init_logging();
    let container = Container::new();

    let car = CAR.get(&container).await.unwrap();
    assert_eq!(car.engine.horsepower, 300);
    assert_eq!(car.wheels.count, 4);

    // The engine built for the car is the cached one.
    let engine = ENGINE.get(&container).await.unwrap();
    assert!(Arc::ptr_eq(&engine, &car.engine));

    assert_eq!(container.instance_count(), 3);
    assert_eq!(container.closer_count(), 2);
    assert_eq!(container.health_check_count(), 1);

    container.close().await.unwrap();
    assert_eq!(container.instance_count(), 0);
    assert_eq!(container.closer_count(), 0);
}

#[tokio::test]
async fn test_close_reports_failures_and_timeouts() {
    common::init_logging();
    let container = Container::new();
    let finished = Arc::new(AtomicUsize::new(0));

    let done = finished.clone();
    container.on_close(move || async move {
        done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    container.on_close(|| async { Err::<(), BoxError>("closer2 error".into()) });
    container.on_close(|| async {
        tokio::time::sleep(Duration::from_secs(4)).await;
        Ok(())
    });

    let started = Instant::now();
    let err = container
        .close_with_context(&Context::background().with_timeout(Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(err.len(), 2);

    let text = err.to_string();
    assert!(text.contains("closer2 error"), "{}", text);
    assert!(text.contains("context deadline exceeded"), "{}", text);
    assert!(text.contains("container_lifecycle.rs:"), "{}", text);

    assert_eq!(err.failures.iter().filter(|f| f.is_timeout()).count(), 1);
    assert!(err
        .failures
        .iter()
        .any(|f| matches!(f.failure, CloseFailure::Failed(_))));
}

#[tokio::test]
async fn test_close_twice_is_a_no_op() {
    let container = Container::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    container.on_close(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    container.close().await.unwrap();
    container.close().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_closer_panic_is_reported() {
    let container = Container::new();
    container.on_close(|| async {
        if container_is_broken() {
            panic!("closer exploded");
        }
        Ok(())
    });

    let err = container.close().await.unwrap_err();
    assert!(matches!(err.failures[0].failure, CloseFailure::Panicked(_)));
}

fn container_is_broken() -> bool {
    true
}

#[tokio::test]
async fn test_health_all_clear() {
    let container = Container::new();
    assert!(container.check_health(&Context::background()).await.is_empty());

    container.on_health_check(|| async { None });
    container.on_health_check(|| async { None });
    assert!(container.check_health(&Context::background()).await.is_empty());
}

#[tokio::test]
async fn test_health_collects_errors_and_timeouts() {
    let container = Container::new();
    container.on_health_check(|| async { Some(HealthError::warn("replica lag")) });
    container.on_health_check(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        None
    });
    let slow_line = line!() - 4;

    let started = Instant::now();
    let errors = container
        .check_health(&Context::background().with_timeout(Duration::from_millis(200)))
        .await;
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(errors.len(), 2);
    // Completion order: the immediate warning comes first.
    assert_eq!(errors[0], HealthError::warn("replica lag"));
    assert_eq!(errors[1].level, Level::Error);
    assert!(errors[1]
        .message
        .contains(&format!("container_lifecycle.rs:{}", slow_line)));
    assert!(errors[1].message.ends_with("context deadline exceeded"));
}

#[tokio::test]
async fn test_health_with_done_context_is_empty() {
    let container = Container::new();
    container.on_health_check(|| async { Some(HealthError::fatal("down")) });

    let (cx, shutdown) = Context::background().with_shutdown();
    shutdown.trigger();
    assert!(container.check_health(&cx).await.is_empty());
}

#[tokio::test]
async fn test_panicking_check_is_fatal() {
    let container = Container::new();
    container.on_health_check(|| async { exploding_check() });

    let errors = container.check_health(&Context::background()).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::Fatal);
    assert!(errors[0].message.contains("panicked"));
}

#[tokio::test]
async fn test_scheduler_runs_until_close() {
    common::init_logging();
    let container = Container::new();
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = checks.clone();
    container.on_health_check(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(HealthError::info("tick"))
        }
    });

    let reports = Arc::new(AtomicUsize::new(0));
    let seen = reports.clone();
    let scheduler = container
        .run_health_check(Duration::from_millis(50), Duration::from_millis(500), move |errors| {
            assert_eq!(errors.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .unwrap();

    assert!(
        common::wait_until(Duration::from_secs(2), || reports.load(Ordering::SeqCst) >= 2)
            .await
    );
    assert_eq!(scheduler.state(), SchedulerState::Running);

    container.close().await.unwrap();
    assert!(
        common::wait_until(Duration::from_secs(1), || scheduler.is_stopped()).await
    );

    let after_close = checks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(checks.load(Ordering::SeqCst), after_close);
}

#[tokio::test]
async fn test_new_scheduler_replaces_previous() {
    let container = Container::new();
    let first = container
        .run_health_check(Duration::from_millis(20), Duration::ZERO, |_| async {})
        .unwrap();
    let second = container
        .run_health_check(Duration::from_millis(20), Duration::ZERO, |_| async {})
        .unwrap();

    assert!(common::wait_until(Duration::from_secs(1), || first.is_stopped()).await);
    assert!(!second.is_stopped());

    second.stop();
    assert!(common::wait_until(Duration::from_secs(1), || second.is_stopped()).await);
}

#[tokio::test]
async fn test_zero_period_is_rejected() {
    let container = Container::new();
    assert!(container
        .run_health_check(Duration::ZERO, Duration::ZERO, |_| async {})
        .is_err());
}
