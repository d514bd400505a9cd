//! End-to-end mirror lifecycle through the scheduler
//!
//! Each test builds the driver the way the binary does (registry lookup from
//! the configuration) and drives it with real ticks against a local bare
//! upstream.

use std::fs;
use std::time::Duration;

use mirror_core::{
    DriverRegistry, Error, Phase, Scheduler, SyncConfiguration, SyncConfigurationBuilder,
    TickOutcome,
};
use mirror_git::inspect::recorded_origin;
use mirror_test_utils::{Upstream, snapshot, snapshot_worktree};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn builder(upstream: &Upstream, dest: &TempDir) -> SyncConfigurationBuilder {
    SyncConfiguration::builder()
        .source(upstream.url())
        .destination(dest.path().to_string_lossy())
        .poll_interval(Duration::from_millis(20))
        .operation_timeout(Duration::from_secs(30))
}

fn scheduler(config: SyncConfiguration) -> Scheduler {
    let driver = DriverRegistry::default().configure(&config).unwrap();
    Scheduler::new(driver, config)
}

/// Tick until `done` holds or give up after a few seconds.
async fn tick_until(scheduler: &Scheduler, done: impl Fn() -> bool) {
    for _ in 0..50 {
        scheduler.step(Phase::Update).await.unwrap();
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_first_tick_clones_and_second_is_noop() {
    let upstream = Upstream::new();
    upstream.commit_file("main", "deploy.yaml", "replicas: 2\n", "Deploy");
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(builder(&upstream, &dest).build().unwrap());

    let first = scheduler.tick(Phase::Initialize).await.unwrap();
    assert_eq!(
        first,
        TickOutcome::Cloned {
            head: upstream.tip("main")
        }
    );
    assert_eq!(
        recorded_origin(scheduler.config().destination(), "origin").unwrap(),
        upstream.url()
    );

    let before = snapshot(dest.path());
    let second = scheduler.tick(Phase::Update).await.unwrap();
    assert_eq!(
        second,
        TickOutcome::UpToDate {
            head: upstream.tip("main"),
            reset: false
        }
    );
    assert_eq!(snapshot(dest.path()), before);
}

#[tokio::test]
async fn test_loop_picks_up_upstream_changes() {
    let upstream = Upstream::new();
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(builder(&upstream, &dest).build().unwrap());
    scheduler.step(Phase::Initialize).await.unwrap();

    upstream.commit_file("main", "deploy.yaml", "replicas: 5\n", "Scale");

    let run = tokio::time::timeout(Duration::from_millis(500), scheduler.run()).await;
    assert!(run.is_err(), "loop should keep running without errors");
    assert_eq!(
        fs::read_to_string(dest.path().join("deploy.yaml")).unwrap(),
        "replicas: 5\n"
    );
}

#[tokio::test]
async fn test_drift_is_retried_until_cleared() {
    let upstream = Upstream::new();
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(
        builder(&upstream, &dest)
            .reset_on_drift(false)
            .build()
            .unwrap(),
    );
    scheduler.step(Phase::Initialize).await.unwrap();

    fs::write(dest.path().join("README.md"), "local edit\n").unwrap();
    let tip = upstream.commit_file("main", "deploy.yaml", "replicas: 3\n", "Scale");

    assert!(matches!(
        scheduler.tick(Phase::Update).await,
        Err(Error::Drift { .. })
    ));
    assert_eq!(scheduler.step(Phase::Update).await.unwrap(), None);
    assert!(!dest.path().join("deploy.yaml").exists());

    // Operator restores the file; the next tick catches up
    fs::write(dest.path().join("README.md"), "# Upstream\n").unwrap();
    let outcome = scheduler.step(Phase::Update).await.unwrap().unwrap();
    assert_eq!(outcome.head(), tip);
}

#[tokio::test]
async fn test_deleted_metadata_heals_on_next_tick() {
    let upstream = Upstream::new();
    upstream.commit_file("main", "deploy.yaml", "replicas: 2\n", "Deploy");
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(builder(&upstream, &dest).build().unwrap());
    scheduler.step(Phase::Initialize).await.unwrap();
    let tree = snapshot_worktree(dest.path());

    fs::remove_dir_all(dest.path().join(".git")).unwrap();
    tick_until(&scheduler, || dest.path().join(".git").is_dir()).await;

    assert_eq!(snapshot_worktree(dest.path()), tree);
    assert_eq!(
        recorded_origin(scheduler.config().destination(), "origin").unwrap(),
        upstream.url()
    );
}

#[tokio::test]
async fn test_loop_stops_on_mismatch() {
    let upstream = Upstream::new();
    let other = Upstream::new();
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(builder(&upstream, &dest).build().unwrap());
    scheduler.step(Phase::Initialize).await.unwrap();

    // Swap the destination for a clone of a different repository
    mirror_fs::clear_dir(scheduler.config().destination()).unwrap();
    other.plain_clone(dest.path());
    let before = snapshot(dest.path());

    let result = tokio::time::timeout(Duration::from_secs(10), scheduler.run())
        .await
        .expect("loop should stop on a fatal error");
    assert!(matches!(result, Err(Error::ConfigMismatch { .. })));
    assert_eq!(snapshot(dest.path()), before);
}

#[tokio::test]
async fn test_startup_refuses_foreign_directory() {
    let upstream = Upstream::new();
    let dest = TempDir::new().unwrap();
    fs::create_dir(dest.path().join("data")).unwrap();
    fs::write(dest.path().join("data").join("db.sqlite"), b"\x00\x01").unwrap();
    let before = snapshot(dest.path());
    let scheduler = scheduler(builder(&upstream, &dest).build().unwrap());

    let result = scheduler.step(Phase::Initialize).await;

    match result {
        Err(e @ Error::ConfigMismatch { .. }) => assert!(e.is_fatal()),
        unexpected => panic!("expected ConfigMismatch, got {unexpected:?}"),
    }
    assert_eq!(snapshot(dest.path()), before);
}

#[tokio::test]
async fn test_tag_mirror_follows_retag() {
    let upstream = Upstream::new();
    let first = upstream.commit_file("main", "app.yaml", "version: 1\n", "Release 1");
    upstream.tag("production", first);
    let dest = TempDir::new().unwrap();
    let scheduler = scheduler(
        builder(&upstream, &dest)
            .tag(Some("production".into()))
            .build()
            .unwrap(),
    );

    assert_eq!(
        scheduler.tick(Phase::Initialize).await.unwrap().head(),
        first
    );

    let second = upstream.commit_file("main", "app.yaml", "version: 2\n", "Release 2");
    assert_eq!(scheduler.tick(Phase::Update).await.unwrap().head(), first);

    upstream.tag("production", second);
    assert_eq!(
        scheduler.tick(Phase::Update).await.unwrap(),
        TickOutcome::Updated {
            from: first,
            to: second,
            reset: false
        }
    );
}
