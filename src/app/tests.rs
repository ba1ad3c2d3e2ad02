use super::*;
use crate::connectivity::LinkState;
use crate::hardware::InputEvents;
use crate::modes::{CaptureMode, TimelapseSubmode};
use crate::storage::StorageState;
use crate::testing::TestRig;
use std::time::Duration;
use tokio::time::Instant;

fn orchestrator(rig: &TestRig) -> LapsecamOrchestrator {
    let mut config = rig.config.clone();
    // keep the reachability probe off the network
    config.network.probe_addr = "not-an-address".to_string();
    LapsecamOrchestrator::new(
        config,
        Devices {
            sensor: rig.sensor.clone(),
            display: rig.display.clone(),
            radio: rig.radio.clone(),
            feed: rig.feed.clone(),
            card: rig.card.clone(),
            input: rig.input.clone(),
            indicator: rig.indicator.clone(),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_start_connects_and_mounts_inserted_card() {
    let rig = TestRig::new();
    rig.radio.fail_next(1);
    let mut app = orchestrator(&rig);

    app.start().await.unwrap();

    assert_eq!(app.link().state(), LinkState::Connected);
    assert_eq!(app.storage().state(), StorageState::Mounted);
    // unreachable probe leaves the link degraded but running
    assert_eq!(
        app.get_component_state("link"),
        Some(ComponentState::Degraded)
    );
    assert_eq!(
        app.get_component_state("storage"),
        Some(ComponentState::Running)
    );
    assert!(rig
        .display
        .messages()
        .iter()
        .any(|(m, _)| m == "No Internet"));
    assert_eq!(rig.display.statuses().last().map(String::as_str), Some("JPEG"));
}

#[tokio::test(start_paused = true)]
async fn test_start_without_card() {
    let rig = TestRig::new();
    rig.card.set_present(false);
    let mut app = orchestrator(&rig);

    app.start().await.unwrap();
    assert_eq!(app.storage().state(), StorageState::Absent);
    assert_eq!(rig.card.mount_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_step_routes_shutter_to_capture() {
    let rig = TestRig::new();
    let mut app = orchestrator(&rig);
    app.start().await.unwrap();

    rig.input.push(InputEvents {
        shutter_short: true,
        ..InputEvents::default()
    });
    app.step(Instant::now()).await;

    assert_eq!(app.pipeline().stats().delivered, 1);
    assert!(rig.display.renders() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_reconnects_dropped_link_on_health_check() {
    let rig = TestRig::new();
    let mut app = orchestrator(&rig);
    app.start().await.unwrap();
    let t = Instant::now();
    app.step(t).await;
    let connects = rig.radio.connect_calls();

    rig.radio.drop_link();
    app.step(t + Duration::from_secs(1)).await;
    assert_eq!(rig.radio.connect_calls(), connects);

    app.step(t + Duration::from_secs(61)).await;
    assert_eq!(rig.radio.connect_calls(), connects + 1);
    assert_eq!(app.link().state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_diagnostics_report_is_rate_limited() {
    let rig = TestRig::new();
    let mut app = orchestrator(&rig);
    app.start().await.unwrap();
    let t = Instant::now();

    assert!(app.report_diagnostics(t));
    assert!(!app.report_diagnostics(t + Duration::from_secs(299)));
    assert!(app.report_diagnostics(t + Duration::from_secs(300)));

    // the control loop reports through the same gate
    app.step(t + Duration::from_secs(600)).await;
    assert!(!app.report_diagnostics(t + Duration::from_secs(601)));
}

#[tokio::test(start_paused = true)]
async fn test_run_exits_when_cancelled() {
    let rig = TestRig::new();
    let mut app = orchestrator(&rig);
    let token = app.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        token.cancel();
    });

    let reason = app.run().await.unwrap();
    assert_eq!(reason, ShutdownReason::UserRequest);
    assert!(rig.display.renders() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disarms_timelapse_and_unmounts() {
    let rig = TestRig::new();
    let mut app = orchestrator(&rig);
    app.start().await.unwrap();
    app.modes
        .set_mode(CaptureMode::Timelapse(TimelapseSubmode::HighPower))
        .await;

    rig.input.push(InputEvents {
        ok: true,
        ..InputEvents::default()
    });
    app.step(Instant::now()).await;
    assert!(app.modes().scheduler().is_armed());

    let exit_code = app.shutdown().await;

    assert_eq!(exit_code, 0);
    assert!(!app.modes().scheduler().is_armed());
    assert_eq!(rig.sensor.locked(), None);
    assert_eq!(rig.card.unmount_calls(), 1);
    assert_eq!(app.storage().state(), StorageState::Absent);
    let states = app.get_all_component_states();
    assert_eq!(states.len(), 3);
    assert!(states.values().all(|s| *s == ComponentState::Stopped));
}
