use blockpool_harness::scenarios::{self, ScenarioParams};
use blockpool_harness::{HarnessError, Scenario, ScenarioOutcome};

fn params() -> ScenarioParams {
    ScenarioParams {
        seed: 0x5EED,
        operations: 500,
        blocks_per_class: 8,
        ..ScenarioParams::default()
    }
}

#[test]
fn every_scenario_passes_with_default_shapes() {
    let params = params();
    for scenario in Scenario::ALL {
        let outcome = scenarios::run(scenario, &params).expect("scenario runs");
        assert_eq!(outcome.scenario(), scenario);
        if let Err(err) = outcome.check() {
            panic!("{err}\n{outcome}");
        }
    }
}

#[test]
fn simple_overflows_and_reuses_last_freed_block() {
    let ScenarioOutcome::Simple(outcome) = scenarios::run(Scenario::Simple, &params()).unwrap()
    else {
        panic!("wrong outcome variant");
    };
    assert_eq!(outcome.allocated, 5);
    assert!(outcome.rejected_overallocation);
    assert!(outcome.reused_last_freed);
    assert_eq!(outcome.stats.failed_allocations, 1);
    assert_eq!(outcome.free_after_cleanup, 5);
}

#[test]
fn race_reports_no_leaks() {
    let ScenarioOutcome::Race(outcome) = scenarios::run(Scenario::Race, &params()).unwrap() else {
        panic!("wrong outcome variant");
    };
    assert_eq!(outcome.actual_free, outcome.expected_free);
    assert_eq!(outcome.allocations, outcome.deallocations);
    assert_eq!(
        outcome.allocations + outcome.failed_allocations,
        (outcome.threads * outcome.iterations) as u64
    );
    assert_eq!(outcome.stats.current_usage, 0);
}

#[test]
fn threads_scenario_honours_worker_shape() {
    let params = ScenarioParams {
        threads: 3,
        iterations: 40,
        ..params()
    };
    let ScenarioOutcome::Threads(outcome) = scenarios::run(Scenario::Threads, &params).unwrap()
    else {
        panic!("wrong outcome variant");
    };
    assert_eq!(outcome.threads, 3);
    assert_eq!(outcome.iterations, 40);
    // 100 record blocks never run out for 120 attempts with ~half freed.
    assert!(outcome.allocations > 0);
    assert_eq!(outcome.corrupted, 0);
    assert_eq!(outcome.free_after_cleanup, outcome.capacity);
}

#[test]
fn size_class_outcome_lists_the_table() {
    let ScenarioOutcome::SizeClasses(outcome) =
        scenarios::run(Scenario::SizeClasses, &params()).unwrap()
    else {
        panic!("wrong outcome variant");
    };
    assert_eq!(outcome.classes.first(), Some(&8));
    assert_eq!(outcome.classes.last(), Some(&1024));
    assert_eq!(outcome.round_trips, 1024);
    assert_eq!(outcome.round_trip_failures, 0);
    assert!(outcome.zero_rejected);
    assert!(outcome.oversize_rejected);
    assert!(outcome.pools_whole_after_cleanup);
    assert_eq!(outcome.snapshot.blocks_per_class, 8);
}

#[test]
fn outcomes_serialize_with_scenario_tag() {
    let outcome = scenarios::run(Scenario::Reuse, &params()).unwrap();
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["scenario"], "reuse");
    assert_eq!(value["blocks"], 10);
    assert_eq!(value["reused"], 10);
    assert!(value["stats"]["allocations"].is_u64());

    let outcome = scenarios::run(Scenario::TwoPools, &params()).unwrap();
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["scenario"], "two_pools");
}

#[test]
fn text_report_carries_scenario_header_and_statistics() {
    let outcome = scenarios::run(Scenario::Performance, &params()).unwrap();
    let text = outcome.to_string();
    assert!(text.starts_with("=== performance ==="));
    assert!(text.contains("=== Memory Pool Statistics Report ==="));
}

#[test]
fn failed_outcome_names_the_scenario() {
    let ScenarioOutcome::Compare(mut outcome) =
        scenarios::run(Scenario::Compare, &params()).unwrap()
    else {
        panic!("wrong outcome variant");
    };
    outcome.pools_whole = false;
    let outcome = ScenarioOutcome::Compare(outcome);
    assert!(!outcome.passed());
    match outcome.check() {
        Err(HarnessError::ScenarioFailed { name, .. }) => assert_eq!(name, "compare"),
        other => panic!("unexpected check result: {other:?}"),
    }
}
