//! End-to-end command routing through the bridge actor
//!
//! Each test drives a real bridge task against recording fakes and checks the
//! remote events it fires and the state it publishes.

use std::sync::atomic::Ordering;

use super::test_helpers::{devices, settings, FakeGateway, TestBridge};
use crate::config::BridgeConfig;
use crate::liveness::{MediaKey, MediaKeyEvent, WakeSource};
use crate::media::FocusChange;
use crate::router::TransportCommand;
use crate::state_machine::SessionState;
use crate::store::{ConfigStore, Device};

// ============================================================================
// Command routing
// ============================================================================

#[tokio::test]
async fn test_volume_set_targets_selected_device() {
    let bridge = TestBridge::spawn(
        settings(true, true, vec![Device::new("Lamp", "light.lamp")]),
        FakeGateway::default(),
    );
    let mut notifications = bridge.handle.subscribe();

    bridge
        .handle
        .command(TransportCommand::VolumeSet(70))
        .unwrap();

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.event_name, "device_volume");
    assert!(notification.success);

    let events = bridge.gateway.events();
    assert_eq!(events.len(), 1);
    let (event_type, data) = &events[0];
    assert_eq!(event_type, "android_device_volume");
    assert_eq!(data["entity_id"], "light.lamp");
    assert_eq!(data["volume"], 70);

    let snapshot = bridge.snapshot().await;
    assert_eq!(snapshot.playback.volume(), 70);
    assert!(snapshot.playback.is_playing);
    assert_eq!(snapshot.display.subtitle, "Vol: 70%");
}

#[tokio::test]
async fn test_play_without_devices_is_generic() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge.handle.command(TransportCommand::Play).unwrap();

    let events = bridge.wait_for_events(1).await;
    let (event_type, data) = &events[0];
    assert_eq!(event_type, "android_media_play");
    assert!(data.get("entity_id").is_none());
    assert!(bridge.snapshot().await.playback.is_playing);
}

#[tokio::test]
async fn test_previous_wraps_and_refreshes_without_action() {
    let gateway = FakeGateway::default().with_state("light.d1", "off", Some(20));
    let bridge = TestBridge::spawn(settings(true, true, devices(2)), gateway);

    bridge.handle.command(TransportCommand::Previous).unwrap();

    let snapshot = bridge
        .wait_for(|s| s.cursor == 1 && s.playback.volume() == 20)
        .await;
    assert!(!snapshot.playback.is_playing);
    assert_eq!(snapshot.display.title, "Device 1");
    assert_eq!(snapshot.display.position, Some((2, 2)));
    assert!(bridge.gateway.state_requests().contains(&"light.d1".to_string()));
    assert!(bridge.gateway.events().is_empty());
}

#[tokio::test]
async fn test_volume_without_devices_updates_state_only() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge
        .handle
        .command(TransportCommand::VolumeAdjust(-3))
        .unwrap();

    let snapshot = bridge.snapshot().await;
    assert_eq!(snapshot.playback.volume(), 35);
    assert!(snapshot.playback.is_playing);
    assert!(bridge.gateway.events().is_empty());
}

#[tokio::test]
async fn test_volume_at_limit_still_republishes_and_fires() {
    let bridge = TestBridge::spawn_with_config(
        settings(true, true, vec![Device::new("Lamp", "light.lamp")]),
        FakeGateway::default(),
        BridgeConfig {
            initial_volume: 100,
            ..BridgeConfig::default()
        },
    );
    bridge.handle.start().unwrap();
    bridge.snapshot().await;
    bridge.platform.take();

    bridge
        .handle
        .command(TransportCommand::VolumeAdjust(1))
        .unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.playback.volume(), 100);
    let steps = bridge.platform.take();
    assert!(steps.contains(&"transport:true:100".to_string()), "{:?}", steps);
    assert!(!steps.contains(&"pulse".to_string()));

    let events = bridge.wait_for_events(1).await;
    assert_eq!(events[0].0, "android_device_volume");
    assert_eq!(events[0].1["entity_id"], "light.lamp");
    assert_eq!(events[0].1["volume"], 100);
}

#[tokio::test]
async fn test_media_button_play_pause_turns_device_on() {
    let bridge = TestBridge::spawn(
        settings(true, true, vec![Device::new("Lamp", "light.lamp")]),
        FakeGateway::default(),
    );

    bridge
        .handle
        .media_button(MediaKeyEvent::down(MediaKey::PlayPause))
        .unwrap();

    let events = bridge.wait_for_events(1).await;
    assert_eq!(events[0].0, "android_device_on");
    assert_eq!(events[0].1["entity_id"], "light.lamp");
}

#[tokio::test]
async fn test_command_while_inactive_claims_first() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge.handle.command(TransportCommand::Stop).unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.session_state, SessionState::Active);
    assert!(snapshot.ownership_active);
    assert_eq!(bridge.platform.claim_count(), 1);
    assert_eq!(bridge.scheduler.arm_backup_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.wait_for_events(1).await[0].0, "android_media_stop");
}

// ============================================================================
// Activation and ownership
// ============================================================================

#[tokio::test]
async fn test_first_activation_fetches_selected_state() {
    let gateway = FakeGateway::default().with_state("light.lamp", "on", Some(80));
    let bridge = TestBridge::spawn(
        settings(true, true, vec![Device::new("Lamp", "light.lamp")]),
        gateway,
    );

    bridge.handle.wake(WakeSource::Boot).unwrap();
    let snapshot = bridge
        .wait_for(|s| s.playback.volume() == 80 && s.playback.is_playing)
        .await;
    assert_eq!(snapshot.session_state, SessionState::Active);

    bridge.handle.wake(WakeSource::HeadsetConnected).unwrap();
    bridge.snapshot().await;
    assert_eq!(bridge.gateway.state_requests(), vec!["light.lamp".to_string()]);
}

#[tokio::test]
async fn test_repeated_claims_are_idempotent() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge.handle.wake(WakeSource::BluetoothAudioConnected).unwrap();
    let once = bridge.snapshot().await;
    bridge.handle.wake(WakeSource::BluetoothAudioConnected).unwrap();
    let twice = bridge.snapshot().await;

    assert_eq!(once, twice);
    assert_eq!(twice.session_state, SessionState::Active);
    assert_eq!(bridge.platform.claim_count(), 2);
    assert!(bridge.gateway.events().is_empty());
}

#[tokio::test]
async fn test_start_enables_and_activates() {
    let bridge = TestBridge::spawn(settings(false, true, Vec::new()), FakeGateway::default());

    bridge.handle.start().unwrap();
    let snapshot = bridge.snapshot().await;

    assert!(bridge.store.load().enabled);
    assert_eq!(snapshot.session_state, SessionState::Active);
    assert!(bridge.scheduler.ensure_periodic_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_stop_tears_down_and_cancels_triggers() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());
    bridge.handle.start().unwrap();
    bridge.snapshot().await;
    bridge.platform.take();

    bridge.handle.stop().unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.session_state, SessionState::Inactive);
    assert!(!snapshot.ownership_active);
    assert!(!bridge.store.load().enabled);
    assert_eq!(
        bridge.platform.take(),
        vec!["abandon", "active:false", "release"]
    );
    assert_eq!(bridge.scheduler.cancel_periodic_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.scheduler.cancel_backup_calls.load(Ordering::SeqCst), 1);

    // Disabled now: commands go nowhere
    bridge.handle.command(TransportCommand::Play).unwrap();
    bridge.snapshot().await;
    assert!(bridge.gateway.events().is_empty());
    assert!(bridge.platform.steps().is_empty());
}

#[tokio::test]
async fn test_focus_loss_rerequests_focus() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());
    bridge.handle.start().unwrap();
    bridge.snapshot().await;
    bridge.platform.take();

    bridge.handle.focus_changed(FocusChange::LossTransient).unwrap();
    bridge.handle.focus_changed(FocusChange::Loss).unwrap();
    bridge.snapshot().await;

    assert_eq!(bridge.platform.take(), vec!["focus"]);
}

#[tokio::test]
async fn test_task_removed_arms_backup_alarm() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge.handle.task_removed().unwrap();
    bridge.snapshot().await;

    assert_eq!(bridge.scheduler.arm_backup_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.platform.claim_count(), 0);
}

#[tokio::test]
async fn test_backup_alarm_on_owned_session_only_checks_quiet_window() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());
    bridge.handle.start().unwrap();
    bridge.snapshot().await;
    bridge
        .handle
        .command(TransportCommand::VolumeAdjust(1))
        .unwrap();
    bridge.snapshot().await;
    bridge.platform.take();
    let armed = bridge.scheduler.arm_backup_calls.load(Ordering::SeqCst);

    bridge.handle.wake(WakeSource::BackupAlarm).unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.session_state, SessionState::Active);
    assert_eq!(bridge.platform.claim_count(), 0);
    assert_eq!(bridge.scheduler.arm_backup_calls.load(Ordering::SeqCst), armed);
}

#[tokio::test]
async fn test_backup_alarm_revives_inactive_bridge() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());

    bridge.handle.wake(WakeSource::BackupAlarm).unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.session_state, SessionState::Active);
    assert_eq!(bridge.platform.claim_count(), 1);
    assert_eq!(bridge.scheduler.arm_backup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_releases_session() {
    let bridge = TestBridge::spawn(settings(true, true, Vec::new()), FakeGateway::default());
    bridge.handle.start().unwrap();
    bridge.snapshot().await;

    bridge.handle.shutdown().await.unwrap();

    assert!(bridge.platform.steps().ends_with(&[
        "abandon".to_string(),
        "active:false".to_string(),
        "release".to_string()
    ]));
    assert_eq!(bridge.handle.latest().session_state, SessionState::Inactive);
    assert!(bridge.handle.snapshot().await.is_err());
}

// ============================================================================
// Roster changes
// ============================================================================

#[tokio::test]
async fn test_devices_changed_resets_out_of_range_cursor() {
    let bridge = TestBridge::spawn(settings(true, true, devices(3)), FakeGateway::default());
    bridge.handle.command(TransportCommand::Next).unwrap();
    bridge.handle.command(TransportCommand::Next).unwrap();
    assert_eq!(bridge.snapshot().await.cursor, 2);

    bridge.store.set_devices(devices(1)).unwrap();
    bridge.handle.devices_changed().unwrap();
    let snapshot = bridge.snapshot().await;

    assert_eq!(snapshot.cursor, 0);
    assert_eq!(snapshot.device_count, 1);
    assert_eq!(snapshot.display.title, "Device 0");
}

#[tokio::test]
async fn test_duplicate_entities_cycle_normally() {
    let roster = vec![
        Device::new("Lamp", "light.lamp"),
        Device::new("Lamp again", "light.lamp"),
    ];
    let bridge = TestBridge::spawn(settings(true, true, roster), FakeGateway::default());

    for expected in [1, 0, 1] {
        bridge.handle.command(TransportCommand::Next).unwrap();
        assert_eq!(bridge.snapshot().await.cursor, expected);
    }
}
