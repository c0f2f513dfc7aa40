use super::*;
use crate::{
    test_support::{arg, command, sample_panel, FakeTransport},
    transport::TransportError,
};

fn dispatcher_with(transport: &Arc<FakeTransport>) -> Arc<Dispatcher> {
    Dispatcher::new(transport.clone(), sample_panel())
}

fn spawn_repeating(
    dispatcher: &Arc<Dispatcher>,
    id: &'static str,
) -> tokio::task::JoinHandle<RepeatReport> {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move { dispatcher.issue_repeating(&command(id)).await })
}

fn all_but_power_enabled(panel: &Panel, enabled: bool) -> bool {
    panel
        .controls()
        .iter()
        .filter(|control| !control.descriptor.command.is_power())
        .all(|control| control.state.enabled == enabled)
}

#[tokio::test(start_paused = true)]
async fn mute_pulse_highlights_mute_control() {
    let transport = Arc::new(FakeTransport::answering(DeviceStatus::ok().with_mute(true)));
    let dispatcher = dispatcher_with(&transport);

    let outcome = dispatcher.issue_pulse(&command("mute"), None).await;

    assert_eq!(
        outcome,
        PulseOutcome::Completed(DeviceStatus::ok().with_mute(true))
    );
    let panel = dispatcher.snapshot().await;
    assert!(panel.state_of("mute", None).expect("mute").active);
    assert!(!dispatcher.is_busy());
    assert_eq!(transport.calls().await, vec!["POST /api/mute"]);
}

#[tokio::test(start_paused = true)]
async fn pulse_while_busy_sends_nothing() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);
    let release = transport.hold_next().await;

    let first = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.issue_pulse(&command("power"), None).await }
    });
    transport.wait_for_calls(1).await;
    assert!(dispatcher.is_busy());

    for _ in 0..3 {
        assert_eq!(
            dispatcher.issue_pulse(&command("mute"), None).await,
            PulseOutcome::Skipped
        );
    }
    assert_eq!(dispatcher.refresh().await, PulseOutcome::Skipped);
    assert_eq!(transport.calls().await.len(), 1);

    release.send(()).expect("release held request");
    assert!(matches!(
        first.await.expect("join"),
        PulseOutcome::Completed(_)
    ));
    assert!(!dispatcher.is_busy());

    dispatcher.issue_pulse(&command("mute"), None).await;
    assert_eq!(
        transport.calls().await,
        vec!["POST /api/power", "POST /api/mute"]
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_pulse_still_clears_busy_flag() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);
    let _release = transport.hold_next().await;

    let pending = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.issue_pulse(&command("power"), None).await }
    });
    transport.wait_for_calls(1).await;
    assert!(dispatcher.is_busy());

    pending.abort();
    let _ = pending.await;

    assert!(!dispatcher.is_busy());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_reconciles_as_not_ok_and_clears_busy() {
    let transport = Arc::new(FakeTransport::ok());
    transport
        .script(Err(TransportError::Unavailable("connection refused".into())))
        .await;
    let dispatcher = dispatcher_with(&transport);

    let outcome = dispatcher.issue_pulse(&command("power"), None).await;

    assert_eq!(outcome, PulseOutcome::Completed(DeviceStatus::not_ok()));
    assert!(!dispatcher.is_busy());
    assert!(all_but_power_enabled(&dispatcher.snapshot().await, false));
}

#[tokio::test(start_paused = true)]
async fn rejected_power_disables_all_other_controls() {
    let transport = Arc::new(FakeTransport::answering(DeviceStatus::not_ok()));
    let dispatcher = dispatcher_with(&transport);

    dispatcher.issue_pulse(&command("power"), None).await;

    let panel = dispatcher.snapshot().await;
    assert!(all_but_power_enabled(&panel, false));
    assert!(panel.state_of("power", None).expect("power").enabled);
}

#[tokio::test(start_paused = true)]
async fn power_on_marks_reported_source_and_enables_panel() {
    let transport = Arc::new(FakeTransport::answering(
        DeviceStatus::ok().with_source("hdmi1"),
    ));
    transport.script(Ok(DeviceStatus::not_ok())).await;
    let dispatcher = dispatcher_with(&transport);

    dispatcher.issue_pulse(&command("power"), None).await;
    assert!(all_but_power_enabled(&dispatcher.snapshot().await, false));

    dispatcher.issue_pulse(&command("power"), None).await;

    let panel = dispatcher.snapshot().await;
    assert!(panel.state_of("power", None).expect("power").active);
    assert!(panel.state_of("source", Some("hdmi1")).expect("hdmi1").active);
    assert!(all_but_power_enabled(&panel, true));
}

#[tokio::test(start_paused = true)]
async fn source_pulse_deactivates_other_sources() {
    let transport = Arc::new(FakeTransport::answering(
        DeviceStatus::ok().with_source("hdmi1"),
    ));
    transport
        .script(Ok(DeviceStatus::ok().with_source("hdmi2")))
        .await;
    let dispatcher = dispatcher_with(&transport);

    dispatcher
        .issue_pulse(&command("source"), Some(&arg("hdmi2")))
        .await;
    dispatcher
        .issue_pulse(&command("source"), Some(&arg("hdmi1")))
        .await;

    let panel = dispatcher.snapshot().await;
    assert!(panel.state_of("source", Some("hdmi1")).expect("hdmi1").active);
    assert!(!panel.state_of("source", Some("hdmi2")).expect("hdmi2").active);
    assert_eq!(
        transport.calls().await,
        vec!["POST /api/source/hdmi2", "POST /api/source/hdmi1"]
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_reconciles_panel_from_power_query() {
    let transport = Arc::new(FakeTransport::answering(
        DeviceStatus::ok().with_source("hdmi2").with_mute(true),
    ));
    let dispatcher = dispatcher_with(&transport);

    let outcome = dispatcher.refresh().await;

    assert!(matches!(outcome, PulseOutcome::Completed(ref status) if status.ok));
    assert_eq!(transport.calls().await, vec!["GET /api/power"]);
    let panel = dispatcher.snapshot().await;
    assert!(panel.state_of("power", None).expect("power").active);
    assert!(panel.state_of("source", Some("hdmi2")).expect("hdmi2").active);
    assert!(panel.state_of("mute", None).expect("mute").active);
}

#[tokio::test(start_paused = true)]
async fn pulse_publishes_busy_and_reconcile_events() {
    let transport = Arc::new(FakeTransport::answering(
        DeviceStatus::ok().with_source("hdmi1"),
    ));
    let dispatcher = dispatcher_with(&transport);
    let mut events = dispatcher.subscribe_events();

    dispatcher
        .issue_pulse(&command("source"), Some(&arg("hdmi1")))
        .await;

    assert_eq!(
        events.recv().await.expect("event"),
        PanelEvent::BusyChanged(true)
    );
    assert_eq!(
        events.recv().await.expect("event"),
        PanelEvent::Reconciled {
            command: command("source"),
            arg: Some(arg("hdmi1")),
            status: DeviceStatus::ok().with_source("hdmi1"),
        }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        PanelEvent::BusyChanged(false)
    );
}

#[tokio::test(start_paused = true)]
async fn release_during_first_repeat_delay_sends_one_request() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);

    let held = spawn_repeating(&dispatcher, "vu");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(dispatcher.has_active_session().await);
    assert!(dispatcher.cancel_repeating().await);

    let report = held.await.expect("join");

    assert_eq!(
        report,
        RepeatReport {
            requests: 1,
            failures: 0
        }
    );
    assert_eq!(transport.calls().await, vec!["POST /api/vu"]);
    assert!(!dispatcher.has_active_session().await);
}

#[tokio::test(start_paused = true)]
async fn release_right_after_first_delay_stops_before_next_request() {
    let transport = Arc::new(FakeTransport::ok().with_latency(Duration::ZERO));
    let dispatcher = dispatcher_with(&transport);

    let held = spawn_repeating(&dispatcher, "vu");
    tokio::time::sleep(DEFAULT_FIRST_REPEAT_DELAY).await;
    assert!(dispatcher.cancel_repeating().await);

    let report = held.await.expect("join");

    assert_eq!(report.requests, 1);
    assert_eq!(transport.calls().await, vec!["POST /api/vu"]);
}

#[tokio::test(start_paused = true)]
async fn session_cancelled_before_its_loop_sends_nothing() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);

    let session = dispatcher.begin_session().await;
    assert!(dispatcher.has_active_session().await);
    assert!(dispatcher.cancel_repeating().await);

    let report = dispatcher.issue_repeating_in(&command("vu"), session).await;

    assert_eq!(report, RepeatReport::default());
    assert!(transport.calls().await.is_empty());
    assert!(!dispatcher.has_active_session().await);
}

#[tokio::test(start_paused = true)]
async fn held_repeat_reissues_after_first_delay() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);

    let held = spawn_repeating(&dispatcher, "vu");
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(transport.count("POST /api/vu").await, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    dispatcher.cancel_repeating().await;
    let report = held.await.expect("join");

    assert!(report.requests >= 5, "only {} requests", report.requests);
    assert_eq!(transport.count("POST /api/vu").await, report.requests);
    assert!(!dispatcher.is_busy());
}

#[tokio::test(start_paused = true)]
async fn new_repeat_session_supersedes_previous_one() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);

    let first = spawn_repeating(&dispatcher, "vu");
    tokio::time::sleep(Duration::from_millis(700)).await;
    let second = spawn_repeating(&dispatcher, "vd");

    let first_report = first.await.expect("join");
    let volume_up_requests = transport.count("POST /api/vu").await;
    assert_eq!(volume_up_requests, first_report.requests);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(dispatcher.cancel_repeating().await);
    let second_report = second.await.expect("join");

    assert_eq!(transport.count("POST /api/vu").await, volume_up_requests);
    assert!(second_report.requests > 1);
    let calls = transport.calls().await;
    let first_down = calls
        .iter()
        .position(|call| call == "POST /api/vd")
        .expect("vd sent");
    assert!(calls[first_down..].iter().all(|call| call != "POST /api/vu"));
}

#[tokio::test(start_paused = true)]
async fn repeat_loop_keeps_going_through_transport_failures() {
    let transport = Arc::new(FakeTransport::ok());
    for _ in 0..2 {
        transport
            .script(Err(TransportError::Unavailable("reset by peer".into())))
            .await;
    }
    let dispatcher = dispatcher_with(&transport);

    let held = spawn_repeating(&dispatcher, "vd");
    tokio::time::sleep(Duration::from_millis(600)).await;
    dispatcher.cancel_repeating().await;
    let report = held.await.expect("join");

    assert_eq!(report.failures, 2);
    assert!(report.requests > 2);
}

#[tokio::test(start_paused = true)]
async fn repeat_bypasses_busy_flag() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);
    let release = transport.hold_next().await;

    let pulse = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.issue_pulse(&command("mute"), None).await }
    });
    transport.wait_for_calls(1).await;

    let held = spawn_repeating(&dispatcher, "vu");
    transport.wait_for_calls(2).await;
    assert!(dispatcher.is_busy());

    dispatcher.cancel_repeating().await;
    release.send(()).expect("release held request");
    held.await.expect("join");
    pulse.await.expect("join");
    assert_eq!(transport.count("POST /api/vu").await, 1);
}

#[tokio::test]
async fn release_without_session_is_a_no_op() {
    let transport = Arc::new(FakeTransport::ok());
    let dispatcher = dispatcher_with(&transport);

    assert!(!dispatcher.cancel_repeating().await);
    assert!(!dispatcher.has_active_session().await);
    assert!(transport.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_token_does_not_stop_newer_session() {
    let transport = Arc::new(FakeTransport::ok());
    let stale = DispatchSession::new();
    let stale_token = stale.token().clone();
    drop(stale);
    let current = DispatchSession::new();
    let current_token = current.token().clone();

    let repeat = tokio::spawn({
        let transport = Arc::clone(&transport);
        async move {
            run_repeating(
                &*transport,
                &command("vu"),
                current,
                DEFAULT_FIRST_REPEAT_DELAY,
            )
            .await
        }
    });
    stale_token.cancel();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!repeat.is_finished());

    current_token.cancel();
    let report = repeat.await.expect("join");
    assert!(report.requests > 1);
}
