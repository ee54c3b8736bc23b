mod common;

use aquavisor::{Alert, SupervisorError};
use common::{supervisor, Exchange, MockClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const START_BUTTON: u16 = 3;
const EMERGENCY_BUTTON: u16 = 4;
const PT_INC_SIM: u16 = 16;
const PT_DEC_SIM: u16 = 17;
const FT_DEC_SIM: u16 = 19;
const TURB_INC_SIM: u16 = 20;

fn pulses(address: u16, count: usize) -> Vec<(u16, bool)> {
    (0..count).flat_map(|_| [(address, true), (address, false)]).collect()
}

#[tokio::test(start_paused = true)]
async fn test_pulse_leaves_point_cleared() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    let begin = Instant::now();
    supervisor.pulse("start_button").await.unwrap();

    assert_eq!(mock.writes(), pulses(START_BUTTON, 1));
    assert!(!mock.coil(START_BUTTON));
    assert!(begin.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_pulse_dwell_does_not_hold_transport() {
    let mock = MockClient::new();
    let supervisor = Arc::new(supervisor(&mock));

    let pulser = Arc::clone(&supervisor);
    let pulse = tokio::spawn(async move { pulser.pulse("start_button").await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let snapshot = supervisor.snapshot().await.unwrap();
    pulse.await.unwrap().unwrap();

    // The read landed while the point was held high
    assert_eq!(snapshot.coil("start_button"), Some(true));
    assert_eq!(
        mock.log(),
        vec![
            Exchange::WriteCoil { address: START_BUTTON, value: true },
            Exchange::ReadCoils { start: 0, count: 24 },
            Exchange::ReadRegisters { start: 0, count: 4 },
            Exchange::WriteCoil { address: START_BUTTON, value: false },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_clear_reports_stuck_actuator() {
    let mock = MockClient::new();
    mock.fail_write(START_BUTTON, false);
    let supervisor = supervisor(&mock);

    let result = supervisor.pulse("start_button").await;

    match result {
        Err(SupervisorError::StuckActuator { point, .. }) => assert_eq!(point, "start_button"),
        other => panic!("expected StuckActuator, got {other:?}"),
    }
    assert!(mock.coil(START_BUTTON));
    assert_eq!(mock.writes(), pulses(START_BUTTON, 1));
}

#[tokio::test(start_paused = true)]
async fn test_failed_set_skips_clear() {
    let mock = MockClient::new();
    mock.fail_write(START_BUTTON, true);
    let supervisor = supervisor(&mock);

    let result = supervisor.pulse("start_button").await;

    assert!(matches!(result, Err(SupervisorError::Transport(_))));
    assert_eq!(mock.writes(), vec![(START_BUTTON, true)]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_point_does_no_io() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    let result = supervisor.write_discrete("self_destruct", true).await;

    assert!(matches!(result, Err(SupervisorError::UnknownPoint(name)) if name == "self_destruct"));
    assert!(mock.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_adjust_pressure_up_three_steps() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    supervisor.adjust_parameter("pressure", "up", 3).await.unwrap();

    assert_eq!(mock.writes(), pulses(PT_INC_SIM, 3));
    assert_eq!(mock.register(0), 65);
}

#[tokio::test(start_paused = true)]
async fn test_adjust_zero_steps_is_a_no_op() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    supervisor.adjust_parameter("level", "down", 0).await.unwrap();
    assert!(mock.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_adjust_rejects_unknown_names_without_io() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    assert!(matches!(
        supervisor.adjust_parameter("bogus", "up", 1).await,
        Err(SupervisorError::UnknownParameter(p)) if p == "bogus"
    ));
    assert!(matches!(
        supervisor.adjust_parameter("flow", "sideways", 1).await,
        Err(SupervisorError::UnknownDirection(d)) if d == "sideways"
    ));
    assert!(mock.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_adjust_continues_after_failed_step() {
    let mock = MockClient::new();
    mock.fail_write(PT_DEC_SIM, false);
    let supervisor = supervisor(&mock);

    let result = supervisor.adjust_parameter("pressure", "down", 4).await;

    assert!(matches!(
        result,
        Err(SupervisorError::Incomplete { failed: 4, attempted: 4, .. })
    ));
    assert_eq!(mock.writes(), pulses(PT_DEC_SIM, 4));
}

#[tokio::test(start_paused = true)]
async fn test_low_pressure_scenario_raises_pressure_alert() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    supervisor.run_scenario("low_pressure").await.unwrap();

    // Strictly alternating set/clear, never two sets in a row
    assert_eq!(mock.writes(), pulses(PT_DEC_SIM, 8));
    assert_eq!(mock.register(0), 10);

    let snapshot = supervisor.snapshot().await.unwrap();
    assert_eq!(snapshot.register("pressure_value"), Some(10));
    assert_eq!(snapshot.alerts.as_slice(), &[Alert::Pressure]);
    assert!(snapshot.system_fault);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_faults_runs_in_order() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    supervisor.run_scenario("multiple_faults").await.unwrap();

    let mut expected = pulses(PT_DEC_SIM, 8);
    expected.extend(pulses(FT_DEC_SIM, 6));
    expected.extend(pulses(TURB_INC_SIM, 10));
    assert_eq!(mock.writes(), expected);

    let snapshot = supervisor.snapshot().await.unwrap();
    assert_eq!(
        snapshot.alerts.as_slice(),
        &[Alert::Pressure, Alert::Flow, Alert::Turbidity]
    );
}

#[tokio::test(start_paused = true)]
async fn test_scenario_keeps_going_after_failures() {
    let mock = MockClient::new();
    mock.fail_write(PT_DEC_SIM, true);
    let supervisor = supervisor(&mock);

    let result = supervisor.run_scenario("multiple_faults").await;

    assert!(matches!(
        result,
        Err(SupervisorError::Incomplete { failed: 8, attempted: 24, .. })
    ));
    assert_eq!(mock.writes_to(FT_DEC_SIM).len(), 12);
    assert_eq!(mock.writes_to(TURB_INC_SIM).len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_normal_startup_releases_estop_then_starts() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    let begin = Instant::now();
    supervisor.run_scenario("normal_startup").await.unwrap();

    let mut expected = vec![(EMERGENCY_BUTTON, false)];
    expected.extend(pulses(START_BUTTON, 1));
    assert_eq!(mock.writes(), expected);
    assert!(begin.elapsed() >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_scenario_does_no_io() {
    let mock = MockClient::new();
    let supervisor = supervisor(&mock);

    assert!(matches!(
        supervisor.run_scenario("meltdown").await,
        Err(SupervisorError::UnknownScenario(s)) if s == "meltdown"
    ));
    assert!(mock.log().is_empty());
}
