use pulsebench::{
    Configuration, RunSettings, Scenario, SimTime, Simulation, Testbench, Variant, measure,
    reference_model, run, run_scenario,
};
use test_case::test_case;

fn scenario(duty: f64, prescale: u64) -> Scenario {
    Scenario::new(
        Variant::Basic,
        Configuration::new(8, prescale, duty).unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Default matrix
// ---------------------------------------------------------------------------

#[test_case(0.5, 2  ; "duty 0.5 prescale 2")]
#[test_case(0.5, 4  ; "duty 0.5 prescale 4")]
#[test_case(0.5, 10 ; "duty 0.5 prescale 10")]
#[test_case(0.2, 2  ; "duty 0.2 prescale 2")]
#[test_case(0.2, 4  ; "duty 0.2 prescale 4")]
#[test_case(0.2, 10 ; "duty 0.2 prescale 10")]
#[test_case(0.8, 2  ; "duty 0.8 prescale 2")]
#[test_case(0.8, 4  ; "duty 0.8 prescale 4")]
#[test_case(0.8, 10 ; "duty 0.8 prescale 10")]
fn basic_matrix(duty: f64, prescale: u64) {
    let scenario = scenario(duty, prescale);
    let outcome = run_scenario(&scenario, &RunSettings::default(), reference_model(&scenario));
    let means = outcome.result.unwrap();

    let expected_period = 10.0 * (prescale / 2) as f64 * 256.0;
    assert_eq!(means.samples, 5);
    assert_eq!(means.period_ns, expected_period);
    assert!((means.duty - duty).abs() <= 0.1 * duty);
    assert_eq!(means.windows, 0);
}

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_half_duty_prescale_four() {
    let scenario = scenario(0.5, 4);
    let means = run_scenario(&scenario, &RunSettings::default(), reference_model(&scenario))
        .result
        .unwrap();
    assert_eq!(means.period_ns, 5120.0);
    assert_eq!(means.duty, 0.5);
}

#[test]
fn test_samples_are_consecutive_periods() {
    let sim = Simulation::builder()
        .device(pulsebench::PwmModel::new(8))
        .build()
        .unwrap();
    let tb = Testbench::new(&sim, SimTime::from_ns(10)).unwrap();
    let config = Configuration::new(8, 2, 0.25).unwrap();
    let samples = run(&sim, async {
        tb.reset().await?;
        tb.configure(&config)?;
        tb.enable(true).await?;
        measure(&tb, 3).await
    })
    .unwrap();

    assert_eq!(samples.len(), 3);
    for sample in samples.samples() {
        assert_eq!(sample.period(), SimTime::from_ns(2560));
        assert_eq!(sample.high_time(), SimTime::from_ns(640));
        assert_eq!(sample.window, None);
    }
    // Each sample starts at the rising edge after the previous sample's end.
    let s = samples.samples();
    assert_eq!(s[1].rising - s[0].next_rising, SimTime::from_ns(2560));
}

#[test]
fn test_rerun_is_idempotent() {
    let scenario = scenario(0.2, 10);
    let settings = RunSettings::default();
    let first = run_scenario(&scenario, &settings, reference_model(&scenario))
        .result
        .unwrap();
    let second = run_scenario(&scenario, &settings, reference_model(&scenario))
        .result
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_more_samples_keep_the_same_means() {
    let scenario = scenario(0.8, 4);
    let settings = RunSettings {
        samples: 12,
        ..RunSettings::default()
    };
    let means = run_scenario(&scenario, &settings, reference_model(&scenario))
        .result
        .unwrap();
    assert_eq!(means.samples, 12);
    assert_eq!(means.period_ns, 5120.0);
    assert_eq!(means.duty, 204.0 / 256.0);
}

#[test]
fn test_wide_counter_completes_within_derived_limit() {
    let scenario = Scenario::new(Variant::Basic, Configuration::new(15, 10, 0.5).unwrap());
    let settings = RunSettings::default().derived_time_limit();
    let means = run_scenario(&scenario, &settings, reference_model(&scenario))
        .result
        .unwrap();
    assert_eq!(means.period_ns, 1_638_400.0);
    assert_eq!(means.duty, 0.5);
}
