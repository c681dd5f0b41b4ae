use insta::assert_snapshot;
use pulsebench::{
    Configuration, Device, MatrixSettings, PwmModel, RunSettings, Scenario, ScenarioMatrix,
    Variant, reference_model, run_matrix, run_scenario,
};
use std::fs;

fn basic_scenarios() -> Vec<Scenario> {
    let matrix = MatrixSettings {
        duty_cycle: vec![0.5],
        prescale: vec![2, 4],
        padding: None,
    };
    ScenarioMatrix::new(Variant::Basic, 8, matrix)
        .scenarios()
        .unwrap()
}

#[test]
fn test_summary_of_passing_run() {
    let report = run_matrix(&basic_scenarios(), &RunSettings::default(), reference_model);
    assert!(report.is_success());
    assert_snapshot!(report.to_string(), @r"
    PASS pwm duty=0.5 prescale=2: duty 0.5000, period 2560 ns
    PASS pwm duty=0.5 prescale=4: duty 0.5000, period 5120 ns
    2 scenarios: 2 passed, 0 failed
    ");
}

#[test]
fn test_one_failure_does_not_affect_others() {
    // A 9-bit counter doubles the period, halving the duty for the same compare.
    let factory = |scenario: &Scenario| -> Box<dyn Device> {
        if scenario.configuration().prescale() == 4 {
            Box::new(PwmModel::new(9))
        } else {
            reference_model(scenario)
        }
    };
    let report = run_matrix(&basic_scenarios(), &RunSettings::default(), factory);
    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());
    assert_snapshot!(report.to_string(), @r"
    PASS pwm duty=0.5 prescale=2: duty 0.5000, period 2560 ns
    FAIL pwm duty=0.5 prescale=4: verification failed: mean duty cycle: measured 0.25, expected 0.5 (rel 0.1, abs 1e-12)
    2 scenarios: 1 passed, 1 failed
    ");
}

#[test]
fn test_json_report() {
    let report = run_matrix(&basic_scenarios(), &RunSettings::default(), reference_model);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["passed"], 2);
    assert_eq!(json["failed"], 0);
    let first = &json["scenarios"][0];
    assert_eq!(first["name"], "pwm duty=0.5 prescale=2");
    assert_eq!(first["variant"], "basic");
    assert_eq!(first["configuration"]["prescale"], 2);
    assert_eq!(first["means"]["period_ns"], 2560.0);
    assert!(first["error"].is_null());
}

#[test]
fn test_vcd_dump_per_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::new(
        Variant::Window,
        Configuration::new(8, 2, 0.5).unwrap().with_padding(2),
    );
    let settings = RunSettings::default().vcd_dir(dir.path());
    let outcome = run_scenario(&scenario, &settings, reference_model(&scenario));
    assert!(outcome.passed());

    let path = dir.path().join("pwm_window_duty0.5_prescale2_padding2.vcd");
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("$timescale 1ps $end"));
    assert!(content.contains("$scope module pwm_window $end"));
    assert!(content.contains("$var wire 1 ! clk $end"));
    assert!(content.contains("$var wire 32 $ prescale $end"));
    assert!(content.contains("$var wire 1 ' window $end"));
    assert!(content.contains("#0\n"));
    assert!(content.contains("#5000\n"));
}
