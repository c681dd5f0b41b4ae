use crate::{
    BenchConfig, BenchError, BenchSettings, ConfigError, Configuration, DEFAULT_PADDING,
    DISABLE_SETTLE, Device, Expectation, MatrixSettings, Means, PwmModel, SimTime, Simulation,
    Testbench, measure, measure_windowed, run, verify,
};
use itertools::iproduct;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which device interface a scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// `out` only.
    Basic,
    /// `out` plus the padded `window` output.
    Window,
}

impl Variant {
    pub fn device_name(self) -> &'static str {
        match self {
            Variant::Basic => "pwm",
            Variant::Window => "pwm_window",
        }
    }
}

/// One point of the scenario matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scenario {
    variant: Variant,
    configuration: Configuration,
}

impl Scenario {
    /// Padding is only meaningful for [`Variant::Window`] and is dropped otherwise.
    pub fn new(variant: Variant, configuration: Configuration) -> Self {
        let configuration = match variant {
            Variant::Basic => configuration.without_padding(),
            Variant::Window => configuration,
        };
        Self {
            variant,
            configuration,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Human-readable identifier, e.g. `pwm_window duty=0.5 prescale=4 padding=2`.
    pub fn name(&self) -> String {
        let c = &self.configuration;
        let mut name = format!(
            "{} duty={} prescale={}",
            self.variant.device_name(),
            c.duty_cycle(),
            c.prescale()
        );
        if let Some(padding) = c.padding() {
            name.push_str(&format!(" padding={}", padding));
        }
        name
    }

    /// File-name-safe form of [`Scenario::name`].
    pub fn slug(&self) -> String {
        self.name().replace(' ', "_").replace('=', "")
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Cross-product of duty cycles and prescales, plus paddings for the windowed
/// variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioMatrix {
    variant: Variant,
    data_width: u32,
    matrix: MatrixSettings,
}

impl ScenarioMatrix {
    pub fn new(variant: Variant, data_width: u32, matrix: MatrixSettings) -> Self {
        Self {
            variant,
            data_width,
            matrix,
        }
    }

    /// Resolves the padding list through [`BenchConfig::paddings`].
    pub fn from_config(config: &BenchConfig, variant: Variant) -> Result<Self, ConfigError> {
        let matrix = MatrixSettings {
            padding: Some(config.paddings()?),
            ..config.matrix.clone()
        };
        Ok(Self::new(variant, config.data_width()?, matrix))
    }

    /// Enumerates and validates every combination. Any invalid value fails
    /// the whole matrix before a single scenario is simulated.
    pub fn scenarios(&self) -> Result<Vec<Scenario>, ConfigError> {
        let m = &self.matrix;
        if m.duty_cycle.is_empty() {
            return Err(ConfigError::EmptyMatrix("duty_cycle"));
        }
        if m.prescale.is_empty() {
            return Err(ConfigError::EmptyMatrix("prescale"));
        }
        match self.variant {
            Variant::Basic => iproduct!(&m.duty_cycle, &m.prescale)
                .map(|(&duty, &prescale)| -> Result<Scenario, ConfigError> {
                    let config = Configuration::new(self.data_width, prescale, duty)?;
                    Ok(Scenario::new(Variant::Basic, config))
                })
                .collect(),
            Variant::Window => {
                let paddings = m.padding.as_deref().unwrap_or(&DEFAULT_PADDING);
                if paddings.is_empty() {
                    return Err(ConfigError::EmptyMatrix("padding"));
                }
                iproduct!(&m.duty_cycle, &m.prescale, paddings)
                    .map(|(&duty, &prescale, &padding)| -> Result<Scenario, ConfigError> {
                        let config = Configuration::new(self.data_width, prescale, duty)?
                            .with_padding(padding);
                        Ok(Scenario::new(Variant::Window, config))
                    })
                    .collect()
            }
        }
    }
}

/// Output periods a scenario may take, two per sample plus two for startup.
fn budgeted_periods(samples: usize) -> u64 {
    (samples as u64).saturating_mul(2).saturating_add(2)
}

/// Clock edges spent in reset, enable and disable.
const CONTROL_EDGES: u64 = 8;

/// Multiplier applied to the nominal run time of a scenario.
const TIME_LIMIT_FACTOR: u64 = 4;

/// Bound on the simulated time of each scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeLimit {
    #[default]
    Unlimited,
    Fixed(SimTime),
    /// Scaled to each scenario's expected period, see [`TimeLimit::resolve`].
    Derived,
}

impl TimeLimit {
    /// The limit applied to `scenario`. A derived limit covers every sampled
    /// period plus reset and disable, four times over.
    pub fn resolve(
        self,
        scenario: &Scenario,
        clock_period: SimTime,
        samples: usize,
    ) -> Option<SimTime> {
        match self {
            TimeLimit::Unlimited => None,
            TimeLimit::Fixed(limit) => Some(limit),
            TimeLimit::Derived => {
                let config = scenario.configuration();
                let clk = clock_period.as_ps();
                let period = clk
                    .saturating_mul(config.prescale() / 2)
                    .saturating_mul(1u64 << config.data_width());
                let nominal = period
                    .saturating_mul(budgeted_periods(samples))
                    .saturating_add(clk.saturating_mul(CONTROL_EDGES))
                    .saturating_add(DISABLE_SETTLE.as_ps());
                Some(SimTime::from_ps(nominal.saturating_mul(TIME_LIMIT_FACTOR)))
            }
        }
    }
}

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub clock_period: SimTime,
    pub samples: usize,
    pub time_limit: TimeLimit,
    /// One VCD file per scenario is written here when set.
    pub vcd_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            clock_period: SimTime::from_ns(crate::DEFAULT_CLOCK_PERIOD_NS),
            samples: crate::DEFAULT_SAMPLES,
            time_limit: TimeLimit::Unlimited,
            vcd_dir: None,
        }
    }
}

impl RunSettings {
    pub fn from_bench(bench: &BenchSettings) -> Result<Self, ConfigError> {
        if bench.samples == 0 {
            return Err(ConfigError::NoSamples);
        }
        Ok(Self {
            clock_period: bench.clock_period()?,
            samples: bench.samples,
            time_limit: match bench.time_limit()? {
                Some(limit) => TimeLimit::Fixed(limit),
                None => TimeLimit::Unlimited,
            },
            vcd_dir: None,
        })
    }

    pub fn vcd_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.vcd_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn time_limit(mut self, limit: SimTime) -> Self {
        self.time_limit = TimeLimit::Fixed(limit);
        self
    }

    /// Bounds each scenario by [`TimeLimit::Derived`].
    pub fn derived_time_limit(mut self) -> Self {
        self.time_limit = TimeLimit::Derived;
        self
    }
}

/// The behavioral model matching `scenario`.
pub fn reference_model(scenario: &Scenario) -> Box<dyn Device> {
    let config = scenario.configuration();
    match scenario.variant() {
        Variant::Basic => Box::new(PwmModel::new(config.data_width())),
        Variant::Window => Box::new(PwmModel::windowed(
            config.data_width(),
            config.padding().unwrap_or(0),
        )),
    }
}

fn execute(
    scenario: &Scenario,
    settings: &RunSettings,
    device: Box<dyn Device>,
) -> Result<Means, BenchError> {
    if settings.samples == 0 {
        return Err(ConfigError::NoSamples.into());
    }
    if settings.clock_period == SimTime::ZERO {
        return Err(ConfigError::InvalidClockPeriod(0).into());
    }

    let mut builder = Simulation::builder().boxed_device(device);
    let limit = settings
        .time_limit
        .resolve(scenario, settings.clock_period, settings.samples);
    if let Some(limit) = limit {
        builder = builder.time_limit(limit);
    }
    if let Some(dir) = &settings.vcd_dir {
        builder = builder.vcd(dir.join(format!("{}.vcd", scenario.slug())));
    }
    let sim = builder.build()?;
    let tb = Testbench::new(&sim, settings.clock_period)?;
    run(&sim, flow(&tb, scenario, settings))
}

/// reset, configure, enable, measure, verify, disable.
async fn flow(
    tb: &Testbench,
    scenario: &Scenario,
    settings: &RunSettings,
) -> Result<Means, BenchError> {
    let config = scenario.configuration();
    tb.reset().await?;
    tb.configure(config)?;
    tb.enable(true).await?;
    let samples = match scenario.variant() {
        Variant::Basic => measure(tb, settings.samples).await?,
        Variant::Window => measure_windowed(tb, settings.samples).await?,
    };
    let means = samples.means().ok_or(ConfigError::NoSamples)?;
    verify(&Expectation::derive(config, settings.clock_period), &means)?;
    tb.enable(false).await?;
    Ok(means)
}

/// Result of one scenario: the measured means, or why it did not pass.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub result: Result<Means, BenchError>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs `scenario` in a fresh simulation against `device`.
pub fn run_scenario(
    scenario: &Scenario,
    settings: &RunSettings,
    device: Box<dyn Device>,
) -> ScenarioOutcome {
    info!("running {}", scenario);
    let result = execute(scenario, settings, device);
    match &result {
        Ok(means) => info!(
            "{}: passed (duty {:.4}, period {} ns)",
            scenario, means.duty, means.period_ns
        ),
        Err(e) => warn!("{}: {}", scenario, e),
    }
    ScenarioOutcome {
        scenario: *scenario,
        result,
    }
}

/// Runs every scenario in order. A failing scenario does not stop the others.
pub fn run_matrix<F>(scenarios: &[Scenario], settings: &RunSettings, mut factory: F) -> ScenarioReport
where
    F: FnMut(&Scenario) -> Box<dyn Device>,
{
    let outcomes = scenarios
        .iter()
        .map(|scenario| run_scenario(scenario, settings, factory(scenario)))
        .collect();
    ScenarioReport { outcomes }
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    name: String,
    variant: Variant,
    configuration: &'a Configuration,
    passed: bool,
    means: Option<&'a Means>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ReportRecord<'a> {
    passed: usize,
    failed: usize,
    scenarios: Vec<OutcomeRecord<'a>>,
}

/// Outcomes of a matrix run.
#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let record = ReportRecord {
            passed: self.passed(),
            failed: self.failed(),
            scenarios: self
                .outcomes
                .iter()
                .map(|o| OutcomeRecord {
                    name: o.scenario.name(),
                    variant: o.scenario.variant(),
                    configuration: o.scenario.configuration(),
                    passed: o.passed(),
                    means: o.result.as_ref().ok(),
                    error: o.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&record)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(means) => writeln!(
                    f,
                    "PASS {}: duty {:.4}, period {} ns",
                    outcome.scenario, means.duty, means.period_ns
                )?,
                Err(e) => writeln!(f, "FAIL {}: {}", outcome.scenario, e)?,
            }
        }
        write!(
            f,
            "{} scenarios: {} passed, {} failed",
            self.outcomes.len(),
            self.passed(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(duty: &[f64], prescale: &[u64], padding: &[u64]) -> MatrixSettings {
        MatrixSettings {
            duty_cycle: duty.to_vec(),
            prescale: prescale.to_vec(),
            padding: Some(padding.to_vec()),
        }
    }

    #[test]
    fn test_default_matrix_sizes() {
        let config = BenchConfig::default();
        let basic = ScenarioMatrix::from_config(&config, Variant::Basic).unwrap();
        assert_eq!(basic.scenarios().unwrap().len(), 9);
        let window = ScenarioMatrix::from_config(&config, Variant::Window).unwrap();
        assert_eq!(window.scenarios().unwrap().len(), 27);
    }

    #[test]
    fn test_scenario_names() {
        let scenarios = ScenarioMatrix::new(Variant::Window, 8, matrix(&[0.5], &[4], &[2]))
            .scenarios()
            .unwrap();
        assert_eq!(scenarios[0].name(), "pwm_window duty=0.5 prescale=4 padding=2");
        assert_eq!(scenarios[0].slug(), "pwm_window_duty0.5_prescale4_padding2");

        let basic = Scenario::new(Variant::Basic, *scenarios[0].configuration());
        assert_eq!(basic.name(), "pwm duty=0.5 prescale=4");
    }

    #[test]
    fn test_invalid_matrix_rejected_up_front() {
        let odd = ScenarioMatrix::new(Variant::Basic, 8, matrix(&[0.5], &[2, 3], &[]));
        assert_eq!(odd.scenarios(), Err(ConfigError::InvalidPrescale(3)));

        let no_padding = ScenarioMatrix::new(Variant::Window, 8, matrix(&[0.5], &[2], &[]));
        assert_eq!(
            no_padding.scenarios(),
            Err(ConfigError::EmptyMatrix("padding"))
        );
    }

    #[test]
    fn test_matrix_without_padding_list_uses_builtin_paddings() {
        let mut settings = matrix(&[0.5], &[2], &[]);
        settings.padding = None;
        let scenarios = ScenarioMatrix::new(Variant::Window, 8, settings)
            .scenarios()
            .unwrap();
        let paddings: Vec<_> = scenarios
            .iter()
            .map(|s| s.configuration().padding())
            .collect();
        assert_eq!(paddings, [Some(2), Some(100), Some(2000)]);
    }

    #[test]
    fn test_default_padding_parameter_drives_window_matrix() {
        let config: BenchConfig = "[default]\nPADDING = 25\n[matrix]\nduty_cycle = [0.5]\nprescale = [2]"
            .parse()
            .unwrap();
        let scenarios = ScenarioMatrix::from_config(&config, Variant::Window)
            .unwrap()
            .scenarios()
            .unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].configuration().padding(), Some(25));
    }

    #[test]
    fn test_derived_time_limit_scales_with_period() {
        let narrow = Scenario::new(Variant::Basic, Configuration::new(8, 2, 0.5).unwrap());
        let clk = SimTime::from_ns(10);
        // (2560 ns * 12 + 8 clk + 1 us) * 4
        assert_eq!(
            TimeLimit::Derived.resolve(&narrow, clk, 5),
            Some(SimTime::from_ns(127_200))
        );

        let wide = Scenario::new(Variant::Basic, Configuration::new(15, 10, 0.5).unwrap());
        let limit = TimeLimit::Derived.resolve(&wide, clk, 5).unwrap();
        assert!(limit > SimTime::from_ns(1_638_400 * 12));

        assert_eq!(TimeLimit::Unlimited.resolve(&wide, clk, 5), None);
        assert_eq!(
            TimeLimit::Fixed(SimTime::from_us(3)).resolve(&wide, clk, 5),
            Some(SimTime::from_us(3))
        );
    }

    #[test]
    fn test_bench_time_limit_is_fixed() {
        let bench = BenchSettings {
            time_limit_us: Some(40),
            ..BenchSettings::default()
        };
        let settings = RunSettings::from_bench(&bench).unwrap();
        assert_eq!(settings.time_limit, TimeLimit::Fixed(SimTime::from_us(40)));
        let settings = RunSettings::from_bench(&BenchSettings::default()).unwrap();
        assert_eq!(settings.time_limit, TimeLimit::Unlimited);
    }

    #[test]
    fn test_zero_samples_rejected() {
        let bench = BenchSettings {
            samples: 0,
            ..BenchSettings::default()
        };
        assert_eq!(RunSettings::from_bench(&bench), Err(ConfigError::NoSamples));
    }
}
