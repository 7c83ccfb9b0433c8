//! Integration tests for ferrolift
//!
//! Every scenario loads a real configuration file and runs full supervisors
//! against loopback servers, which resolve to folders inside a temp workspace.

use ferrolift_config::{ConfigLoader, UnitConfig, UnitSection};
use ferrolift_engine::{run_units, RunContext, ScanMode, Supervisor, UnitReport};
use ferrolift_tests::test_utils::{
    fast_options, file_count, stamp_mtimes, tree_contents, tree_mtimes, with_scan_interval,
    write_tree, Workspace,
};
use ferrolift_transport::{ConnectionManager, FileSystem, LocalFs, LoopbackConnectionManager};
use rstest::rstest;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_test::assert_err;

const TREE: &[(&str, usize)] = &[
    ("small.txt", 1024),
    ("medium.bin", 64 * 1024),
    ("large.bin", 1024 * 1024),
    ("day1/a.csv", 2048),
    ("day1/b.csv", 4096),
    ("day2/deep/c.csv", 8192),
];

fn loopback() -> Arc<dyn ConnectionManager> {
    Arc::new(LoopbackConnectionManager::new())
}

/// One-shot pass over `units` against loopback servers
async fn run_once(units: Vec<UnitConfig>) -> Vec<UnitReport> {
    run_units(
        units,
        Arc::new(RunContext::new()),
        loopback(),
        fast_options(),
        ScanMode::OneShot,
    )
    .await
}

/// Poll `condition` until it holds or `limit` passes
async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn test_download_moves_tree_and_drains_source() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote"), TREE);
    let expected = tree_contents(&ws.path("remote"));
    let stamped = stamp_mtimes(&ws.path("remote"), 1_600_000_000);

    let units = ws.units(
        &format!(
            "downloaders:\n  - {{ name: inbound, enabled: true, source: edge, source_path: '{}', target_path: '{}', worker: 3 }}\n",
            ws.path("remote").display(),
            ws.path("local").display()
        ),
        UnitSection::Downloaders,
    );

    let reports = run_once(units).await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.stats.files_transferred, TREE.len() as u64);
    assert_eq!(report.stats.sources_removed, TREE.len() as u64);
    assert_eq!(report.stats.files_failed, 0);

    assert_eq!(tree_contents(&ws.path("local")), expected);
    assert_eq!(tree_mtimes(&ws.path("local")), stamped);
    assert_eq!(file_count(&ws.path("remote")), 0);
    assert_eq!(file_count(&ws.path("staging")), 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_moves_tree_to_server() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("local"), TREE);
    let expected = tree_contents(&ws.path("local"));
    let stamped = stamp_mtimes(&ws.path("local"), 1_500_000_000);

    let units = ws.units(
        &format!(
            "uploaders:\n  - {{ name: outbound, enabled: true, target: core, source_path: '{}', target_path: '{}', worker: 2 }}\n",
            ws.path("local").display(),
            ws.path("remote").join("incoming").display()
        ),
        UnitSection::Uploaders,
    );

    let reports = run_once(units).await;

    assert_eq!(reports[0].stats.files_transferred, TREE.len() as u64);
    assert_eq!(tree_contents(&ws.path("remote").join("incoming")), expected);
    assert_eq!(tree_mtimes(&ws.path("remote").join("incoming")), stamped);
    assert_eq!(file_count(&ws.path("local")), 0);
    // Uploads write in place and never touch the staging folder.
    assert_eq!(file_count(&ws.path("staging")), 0);
    Ok(())
}

#[tokio::test]
async fn test_stream_relays_between_servers() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    let source = ws.path("remote").join("edge-out");
    let target = ws.path("remote").join("core-in");
    write_tree(&source, TREE);
    let expected = tree_contents(&source);
    let stamped = stamp_mtimes(&source, 1_400_000_000);

    let units = ws.units(
        &format!(
            "streamers:\n  - {{ name: relay, enabled: true, source: edge, target: core, source_path: '{}', target_path: '{}' }}\n",
            source.display(),
            target.display()
        ),
        UnitSection::Streamers,
    );
    assert_eq!(units[0].scan_interval, Duration::from_secs(60));

    let reports = run_once(units).await;

    assert_eq!(reports[0].stats.files_transferred, TREE.len() as u64);
    assert_eq!(tree_contents(&target), expected);
    assert_eq!(tree_mtimes(&target), stamped);
    assert_eq!(file_count(&source), 0);
    Ok(())
}

#[tokio::test]
async fn test_sync_server_mode_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote"), TREE);
    let expected = tree_contents(&ws.path("remote"));

    let body = format!(
        "syncers:\n  - {{ name: mirror, enabled: true, server: edge, mode: server, local_path: '{}', server_path: '{}', worker: 2 }}\n",
        ws.path("mirror").display(),
        ws.path("remote").display()
    );

    let first = run_once(ws.units(&body, UnitSection::Syncers)).await;
    assert_eq!(first[0].stats.files_transferred, TREE.len() as u64);
    assert_eq!(first[0].stats.sources_removed, 0);
    assert_eq!(tree_contents(&ws.path("mirror")), expected);
    // Sync never removes the source.
    assert_eq!(tree_contents(&ws.path("remote")), expected);

    let second = run_once(ws.units(&body, UnitSection::Syncers)).await;
    assert_eq!(second[0].stats.files_transferred, 0);
    assert_eq!(second[0].stats.files_skipped, TREE.len() as u64);
    Ok(())
}

#[tokio::test]
async fn test_sync_retransfers_changed_file() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote"), &[("report.csv", 100), ("stable.csv", 100)]);

    let body = format!(
        "syncers:\n  - {{ name: mirror, enabled: true, server: edge, local_path: '{}', server_path: '{}' }}\n",
        ws.path("mirror").display(),
        ws.path("remote").display()
    );
    run_once(ws.units(&body, UnitSection::Syncers)).await;
    fs::write(ws.path("remote").join("report.csv"), b"a longer replacement body")?;

    let reports = run_once(ws.units(&body, UnitSection::Syncers)).await;
    assert_eq!(reports[0].stats.files_transferred, 1);
    assert_eq!(reports[0].stats.files_skipped, 1);
    assert_eq!(
        fs::read(ws.path("mirror").join("report.csv"))?,
        b"a longer replacement body"
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_local_mode_watches_for_changes() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    let local = ws.path("local");
    let remote = ws.path("remote");
    write_tree(&local, &[("notes.txt", 10)]);

    let units = with_scan_interval(
        ws.units(
            &format!(
                "syncers:\n  - {{ name: push, enabled: true, server: core, mode: local, local_path: '{}', server_path: '{}' }}\n",
                local.display(),
                remote.display()
            ),
            UnitSection::Syncers,
        ),
        Duration::from_millis(20),
    );
    let unit = units.into_iter().next().ok_or("no unit")?;

    let ctx = Arc::new(RunContext::new());
    let supervisor = Supervisor::new(unit, Arc::clone(&ctx), loopback()).with_options(fast_options());
    let stats = supervisor.stats();
    let running = tokio::spawn(async move { supervisor.run(ScanMode::Continuous).await });

    let pushed = wait_for(Duration::from_secs(10), || {
        remote.join("notes.txt").exists() && stats.snapshot().files_transferred == 1
    })
    .await;
    assert!(pushed, "initial push did not happen");

    // Unchanged files are held back by the watch map.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stats.snapshot().files_transferred, 1);

    // Prepare the edit aside so the scanner only ever sees the final version.
    let edited = ws.path("staging").join("notes.txt");
    fs::write(&edited, b"edited with more text")?;
    let later = std::time::SystemTime::now() + Duration::from_secs(10);
    LocalFs::new().set_mtime(&edited, later)?;
    fs::rename(&edited, local.join("notes.txt"))?;
    let repushed = wait_for(Duration::from_secs(10), || {
        fs::read(remote.join("notes.txt")).map(|body| body == b"edited with more text").unwrap_or(false)
    })
    .await;
    assert!(repushed, "edited file was not pushed again");

    ctx.shutdown();
    let report = timeout(Duration::from_secs(10), running).await??;
    assert_eq!(report.stats.files_transferred, 2);
    assert!(local.join("notes.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_download_survives_failed_connects() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote"), TREE);

    let units = ws.units(
        &format!(
            "downloaders:\n  - {{ name: flaky, enabled: true, source: edge, source_path: '{}', target_path: '{}', worker: 2 }}\n",
            ws.path("remote").display(),
            ws.path("local").display()
        ),
        UnitSection::Downloaders,
    );

    let manager = Arc::new(LoopbackConnectionManager::failing_first(4));
    let reports = timeout(
        Duration::from_secs(30),
        run_units(
            units,
            Arc::new(RunContext::new()),
            Arc::clone(&manager) as Arc<dyn ConnectionManager>,
            fast_options(),
            ScanMode::OneShot,
        ),
    )
    .await?;

    assert_eq!(reports[0].stats.files_transferred, TREE.len() as u64);
    assert_eq!(file_count(&ws.path("local")), TREE.len());
    // Two workers and a scanner connected after four refusals.
    assert!(manager.attempts() >= 7);
    Ok(())
}

#[tokio::test]
async fn test_many_files_through_small_queue() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    let files: Vec<(String, usize)> = (0..60).map(|i| (format!("batch/{i:03}.dat"), 512)).collect();
    let borrowed: Vec<(&str, usize)> = files.iter().map(|(p, s)| (p.as_str(), *s)).collect();
    write_tree(&ws.path("local"), &borrowed);

    // Queue capacity is twice the worker count, far below the file count.
    let units = ws.units(
        &format!(
            "uploaders:\n  - {{ name: bulk, enabled: true, target: core, source_path: '{}', target_path: '{}', worker: 2 }}\n",
            ws.path("local").display(),
            ws.path("remote").display()
        ),
        UnitSection::Uploaders,
    );
    assert_eq!(units[0].workers.queue_capacity(), 4);

    let reports = run_once(units).await;

    assert_eq!(reports[0].files_found, 60);
    assert_eq!(reports[0].stats.files_transferred, 60);
    assert_eq!(file_count(&ws.path("remote")), 60);
    Ok(())
}

#[tokio::test]
async fn test_units_of_every_kind_run_together() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote").join("out"), &[("d.txt", 10)]);
    write_tree(&ws.path("local").join("out"), &[("u.txt", 10)]);

    let config = ws.load_config(&format!(
        "downloaders:\n  - {{ name: down, enabled: true, source: edge, source_path: '{r}/out', target_path: '{l}/in' }}\n  - {{ name: idle, enabled: false, source: edge, source_path: '{r}/none', target_path: '{l}/none' }}\nuploaders:\n  - {{ name: up, enabled: true, target: core, source_path: '{l}/out', target_path: '{r}/in' }}\n",
        r = ws.path("remote").display(),
        l = ws.path("local").display()
    ));
    let units = config.all_units()?;
    assert_eq!(units.len(), 2);

    let reports = run_once(units).await;

    assert!(reports.iter().all(|r| r.stats.files_transferred == 1));
    assert!(ws.path("local").join("in/d.txt").exists());
    assert!(ws.path("remote").join("in/u.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_serve_stops_on_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    let units = with_scan_interval(
        ws.units(
            &format!(
                "downloaders:\n  - {{ name: idle, enabled: true, source: edge, source_path: '{}', target_path: '{}', worker: 4 }}\n",
                ws.path("remote").display(),
                ws.path("local").display()
            ),
            UnitSection::Downloaders,
        ),
        Duration::from_millis(20),
    );

    let ctx = Arc::new(RunContext::new());
    let serving = tokio::spawn(run_units(
        units,
        Arc::clone(&ctx),
        loopback(),
        fast_options(),
        ScanMode::Continuous,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    write_tree(&ws.path("remote"), &[("late.bin", 4096)]);
    let local = ws.path("local");
    assert!(wait_for(Duration::from_secs(10), || local.join("late.bin").exists()).await);

    ctx.shutdown();
    let reports = timeout(Duration::from_secs(10), serving).await??;
    assert_eq!(reports[0].stats.files_transferred, 1);
    assert_eq!(file_count(&ws.path("staging")), 0);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_before_start_returns_promptly() -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::new();
    write_tree(&ws.path("remote"), TREE);
    let units = ws.units(
        &format!(
            "downloaders:\n  - {{ name: late, enabled: true, source: edge, source_path: '{}', target_path: '{}' }}\n",
            ws.path("remote").display(),
            ws.path("local").display()
        ),
        UnitSection::Downloaders,
    );

    let ctx = Arc::new(RunContext::new());
    ctx.shutdown();
    let reports = timeout(
        Duration::from_secs(10),
        run_units(units, ctx, loopback(), fast_options(), ScanMode::OneShot),
    )
    .await?;

    assert_eq!(reports[0].stats.files_transferred, 0);
    assert_eq!(file_count(&ws.path("remote")), TREE.len());
    Ok(())
}

#[rstest]
#[case::twoway_sync(
    "syncers:\n  - { name: both, enabled: true, server: edge, mode: twoway, local_path: /a, server_path: /b }\n",
    "twoway"
)]
#[case::unknown_server(
    "downloaders:\n  - { name: lost, enabled: true, source: nowhere, source_path: /a, target_path: /b }\n",
    "nowhere"
)]
#[case::zero_workers(
    "uploaders:\n  - { name: idle, enabled: true, target: core, source_path: /a, target_path: /b, worker: 0 }\n",
    "idle.worker"
)]
fn test_invalid_units_are_rejected(#[case] body: &str, #[case] needle: &str) {
    let ws = Workspace::new();
    let path = ws.dir.path().join("config.yaml");
    fs::write(&path, format!("{}{}", ws.preamble(), body)).unwrap();

    let err = assert_err!(ConfigLoader::load_from_file(&path));
    assert!(!err.is_file_error());
    assert!(err.to_string().contains(needle), "unexpected error: {err}");
}
