mod common;

use common::{group, recording_reporter, MockLedger};
use squall_core::prelude::RunFaultError;
use squall_runner::prelude::*;

fn plain_config() -> RunConfig {
    RunConfig {
        rounds: 1,
        step_policy: StepFailurePolicy::Skip,
        alliance: None,
        bulk_items: 0,
    }
}

#[tokio::test]
async fn failed_step_is_skipped_and_the_run_still_succeeds() {
    // 2 joins + 1 round of 3 steps each = 8 steps; the 4th submission is rejected.
    let client = MockLedger::new().fail_submission(3);
    let (reporter, records) = recording_reporter();
    let executor = RunExecutor::new(client.clone(), reporter, plain_config());
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("steps1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(records.count("trade_game", false), 7);
    assert_eq!(records.count("trade_game", true), 1);
    // The bootstrap zero sample plus the measured bootstrap itself.
    assert_eq!(records.count("operations", false), 2);
    assert_eq!(client.teardowns(), 1);
}

#[tokio::test]
async fn retry_in_place_resubmits_the_same_step() {
    // Submissions 3 and 4 fail: the 4th step fails once, is retried and fails again, then the
    // script moves on.
    let client = MockLedger::new().fail_submission(3).fail_submission(4);
    let (reporter, records) = recording_reporter();
    let config = RunConfig {
        step_policy: StepFailurePolicy::RetryInPlace { attempts: 2 },
        ..plain_config()
    };
    let executor = RunExecutor::new(client, reporter, config);
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("retry1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(records.count("trade_game", false), 7);
    assert_eq!(records.count("trade_game", true), 2);
}

#[tokio::test]
async fn bootstrap_failure_reports_immediately_and_submits_nothing() {
    let client = MockLedger::new().fail_bootstrap("boot1");
    let (reporter, records) = recording_reporter();
    let executor = RunExecutor::new(client.clone(), reporter, plain_config());
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("boot1", pool.lease().await, &pool).await;

    assert!(result.is_err());
    assert_eq!(records.count("trade_game", false), 0);
    assert_eq!(records.count("trade_game", true), 0);
    assert_eq!(records.count("operations", true), 1);
    assert_eq!(client.teardowns(), 0);

    // The group went back to the pool even though the run never started.
    let leased = tokio::time::timeout(std::time::Duration::from_millis(100), pool.lease())
        .await
        .expect("group should be back in the pool");
    assert_eq!(leased, group(&["Player1", "Player2"]));
}

#[tokio::test]
async fn run_fault_is_recorded_and_returned_as_a_normal_error() {
    let client = MockLedger::new().fault_bootstrap("fault1");
    let (reporter, records) = recording_reporter();
    let executor = RunExecutor::new(client, reporter, plain_config());
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("fault1", pool.lease().await, &pool).await;

    let err = result.unwrap_err();
    assert!(err.is::<RunFaultError>());
    // One failed sample from the measured bootstrap, one from the fault recovery handler.
    assert_eq!(records.count("operations", true), 2);
}

#[tokio::test]
async fn bulk_script_runs_after_the_game() {
    let client = MockLedger::new();
    let (reporter, records) = recording_reporter();
    let config = RunConfig {
        bulk_items: 5,
        ..plain_config()
    };
    let executor = RunExecutor::new(client, reporter, config);
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("bulk1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(records.count("trade_game", false), 8);
    assert_eq!(records.count("bulk_publish", false), 5);
}

#[tokio::test]
async fn alliance_checkpoint_deploys_one_side_channel() {
    let client = MockLedger::new();
    let (reporter, records) = recording_reporter();
    let config = RunConfig {
        rounds: 2,
        alliance: Some(AllianceConfig::default()),
        ..plain_config()
    };
    let executor = RunExecutor::new(client.clone(), reporter, config);
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2", "Player3"])]);

    let result = executor.run("ally1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(client.side_channels(), vec!["ally110012".to_string()]);
    assert_eq!(client.alliance_inits(), 1);
    // INIT produced at least one successful alliance sample.
    assert!(records.count("alliance", false) >= 1);
    assert_eq!(client.teardowns(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn observers_stop_before_run_handles_are_released() {
    // Slow INVOKEs keep the observer mid-submission while the main script finishes.
    let client = MockLedger::new().delay_alliance_invokes(std::time::Duration::from_millis(30));
    let (reporter, _records) = recording_reporter();
    let config = RunConfig {
        alliance: Some(AllianceConfig::default()),
        ..plain_config()
    };
    let executor = RunExecutor::new(client.clone(), reporter, config);
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("halt1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(client.teardowns(), 1);
    let events = client.events();
    let teardown = events
        .iter()
        .position(|event| *event == "teardown")
        .expect("the run must tear down");
    assert!(
        events[teardown..].iter().all(|event| *event != "alliance_invoke"),
        "an alliance INVOKE landed after the run's handles were released: {events:?}"
    );
}

#[tokio::test]
async fn mid_script_fault_still_tears_the_run_down() {
    // An empty group bootstraps no participants, so the first bulk step cannot be assigned an
    // actor and the run faults mid-script.
    let client = MockLedger::new();
    let (reporter, records) = recording_reporter();
    let config = RunConfig {
        bulk_items: 3,
        ..plain_config()
    };
    let executor = RunExecutor::new(client.clone(), reporter, config);
    let pool = ParticipantPool::new(vec![group(&[])]);

    let result = executor.run("fault2", pool.lease().await, &pool).await;

    let err = result.unwrap_err();
    assert!(err.is::<RunFaultError>());
    // The fault recovery handler recorded the failure and the run was still torn down.
    assert_eq!(records.count("operations", true), 1);
    assert_eq!(client.teardowns(), 1);
}

#[tokio::test]
async fn alliance_allies_are_drawn_from_joined_players() {
    // Four participants but only three game colors: the fourth never joins, so the alliance
    // forms between the last two players that did.
    let client = MockLedger::new();
    let (reporter, _records) = recording_reporter();
    let config = RunConfig {
        alliance: Some(AllianceConfig::default()),
        ..plain_config()
    };
    let executor = RunExecutor::new(client.clone(), reporter, config);
    let pool = ParticipantPool::new(vec![group(&[
        "Player1", "Player2", "Player3", "Player4",
    ])]);

    let result = executor.run("big1", pool.lease().await, &pool).await;

    assert!(result.is_ok());
    assert_eq!(
        client.ally_pairs(),
        vec![vec!["Player2".to_string(), "Player3".to_string()]]
    );
    assert_eq!(client.alliance_inits(), 1);
}

#[tokio::test]
async fn alliance_creation_failure_does_not_stop_the_script() {
    let client = MockLedger::new().fail_alliance_init();
    let (reporter, records) = recording_reporter();
    let config = RunConfig {
        alliance: Some(AllianceConfig::default()),
        ..plain_config()
    };
    let executor = RunExecutor::new(client.clone(), reporter, config);
    let pool = ParticipantPool::new(vec![group(&["Player1", "Player2"])]);

    let result = executor.run("allyfail1", pool.lease().await, &pool).await;

    // Every step still ran, and the alliance failure is surfaced in the run outcome.
    assert_eq!(records.count("trade_game", false), 8);
    assert!(result.is_err());
    assert_eq!(client.alliance_invokes(), 0);
    assert_eq!(client.teardowns(), 1);
}
