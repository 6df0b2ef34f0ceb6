//! Quiet-window refresh driven by the in-process timer, with paused time

use std::sync::Arc;
use std::time::Duration;

use super::test_helpers::{devices, settings, FakeGateway, RecordingPlatform, TestBridge};
use crate::bridge::{Bridge, BridgeDeps};
use crate::config::{BridgeConfig, HeartbeatPolicy};
use crate::router::TransportCommand;
use crate::state_machine::SessionState;
use crate::store::MemoryConfigStore;

const CLAIM_STEPS: [&str; 6] = [
    "active:false",
    "active:true",
    "volume:50",
    "transport:false:50",
    "focus",
    "pulse",
];

fn config(policy: HeartbeatPolicy) -> BridgeConfig {
    BridgeConfig {
        quiet_window: Duration::from_secs(30),
        refresh_interval: Duration::from_secs(60),
        heartbeat_policy: policy,
        ..BridgeConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_quiet_window_then_tick_reclaims() {
    let bridge = TestBridge::spawn_with_config(
        settings(true, true, Vec::new()),
        FakeGateway::default(),
        config(HeartbeatPolicy::AnyVolumeEvent),
    );
    bridge.handle.start().unwrap();
    bridge.snapshot().await;
    assert!(bridge.platform.take().starts_with(&CLAIM_STEPS.map(String::from)));

    tokio::time::sleep(Duration::from_secs(61)).await;
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.session_state, SessionState::Active);
    let steps = bridge.platform.take();
    assert!(steps.starts_with(&CLAIM_STEPS.map(String::from)), "{:?}", steps);
}

#[tokio::test(start_paused = true)]
async fn test_recent_volume_event_keeps_session() {
    let bridge = TestBridge::spawn_with_config(
        settings(true, true, devices(1)),
        FakeGateway::default(),
        config(HeartbeatPolicy::AnyVolumeEvent),
    );
    bridge.handle.start().unwrap();
    bridge.snapshot().await;

    tokio::time::sleep(Duration::from_secs(45)).await;
    bridge
        .handle
        .command(TransportCommand::VolumeAdjust(1))
        .unwrap();
    bridge.snapshot().await;
    bridge.platform.take();

    // Tick at 60s sees a volume event 15s old
    tokio::time::sleep(Duration::from_secs(16)).await;
    bridge.snapshot().await;
    assert_eq!(bridge.platform.claim_count(), 0);

    // Next tick at 120s: quiet again
    tokio::time::sleep(Duration::from_secs(60)).await;
    bridge.snapshot().await;
    assert_eq!(bridge.platform.claim_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_volume_is_not_a_heartbeat_when_configured() {
    let bridge = TestBridge::spawn_with_config(
        settings(true, true, Vec::new()),
        FakeGateway::default(),
        config(HeartbeatPolicy::ChangedVolumeOnly),
    );
    bridge.handle.start().unwrap();
    bridge.snapshot().await;

    tokio::time::sleep(Duration::from_secs(45)).await;
    // Volume is already 50; a claim runs here because nothing was heard yet
    bridge
        .handle
        .command(TransportCommand::VolumeSet(50))
        .unwrap();
    bridge.snapshot().await;
    bridge.platform.take();

    tokio::time::sleep(Duration::from_secs(16)).await;
    bridge.snapshot().await;
    assert_eq!(bridge.platform.claim_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backup_alarm_leaves_busy_session_alone() {
    // Default scheduler: real tokio timers for the backup alarm and periodic job
    let platform = Arc::new(RecordingPlatform::default());
    let handle = Bridge::spawn(
        BridgeDeps::new(
            Arc::new(MemoryConfigStore::new(settings(true, true, Vec::new()))),
            Arc::new(FakeGateway::default()),
            platform.clone(),
        ),
        BridgeConfig::default(),
    );
    handle.start().unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(platform.claim_count(), 1);

    for i in 0..30 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let direction = if i % 2 == 0 { 1 } else { -1 };
        handle
            .command(TransportCommand::VolumeAdjust(direction))
            .unwrap();
        handle.snapshot().await.unwrap();
    }

    assert_eq!(platform.claim_count(), 1);
    assert_eq!(handle.snapshot().await.unwrap().session_state, SessionState::Active);
    handle.shutdown().await.unwrap();
}
