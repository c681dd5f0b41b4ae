use crate::{ConfigError, SimTime, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_DATA_WIDTH: u64 = 8;
pub const DEFAULT_CLOCK_PERIOD_NS: u64 = 10;
pub const DEFAULT_SAMPLES: usize = 5;
/// Paddings enumerated when neither `[matrix] padding` nor `[default] PADDING` is set.
pub const DEFAULT_PADDING: [u64; 3] = [2, 100, 2000];

/// Flat name→value mapping of device parameters (the `[default]` table).
///
/// Names are matched case-insensitively. Values may be integers or strings
/// holding integers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, toml::Value>);

impl Parameters {
    pub fn get(&self, name: &str) -> Option<&toml::Value> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, ConfigError> {
        let value = self
            .get(name)
            .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))?;
        let parsed = match value {
            toml::Value::Integer(i) => u64::try_from(*i).ok(),
            toml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ConfigError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    pub fn get_u64_or(&self, name: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(name) {
            Some(_) => self.get_u64(name),
            None => Ok(default),
        }
    }

    /// Returns a copy with `name` overridden, replacing any differently cased entry.
    pub fn with(&self, name: &str, value: impl Into<toml::Value>) -> Self {
        let mut map = self.0.clone();
        map.retain(|key, _| !key.eq_ignore_ascii_case(name));
        map.insert(name.to_string(), value.into());
        Parameters(map)
    }
}

/// Timing settings shared by every scenario of a run (the `[bench]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchSettings {
    pub clock_period_ns: u64,
    pub samples: usize,
    pub time_limit_us: Option<u64>,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            clock_period_ns: DEFAULT_CLOCK_PERIOD_NS,
            samples: DEFAULT_SAMPLES,
            time_limit_us: None,
        }
    }
}

impl BenchSettings {
    pub fn clock_period(&self) -> Result<SimTime, ConfigError> {
        match SimTime::checked_new(self.clock_period_ns, TimeUnit::Ns) {
            Some(period) if period != SimTime::ZERO => Ok(period),
            _ => Err(ConfigError::InvalidClockPeriod(self.clock_period_ns)),
        }
    }

    pub fn time_limit(&self) -> Result<Option<SimTime>, ConfigError> {
        self.time_limit_us
            .map(|us| {
                SimTime::checked_new(us, TimeUnit::Us).ok_or(ConfigError::InvalidTimeLimit(us))
            })
            .transpose()
    }
}

/// Values enumerated by the scenario generator (the `[matrix]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixSettings {
    pub duty_cycle: Vec<f64>,
    pub prescale: Vec<u64>,
    /// `None` falls back to `[default] PADDING`, then to [`DEFAULT_PADDING`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<Vec<u64>>,
}

impl Default for MatrixSettings {
    fn default() -> Self {
        Self {
            duty_cycle: vec![0.5, 0.2, 0.8],
            prescale: vec![2, 4, 10],
            padding: None,
        }
    }
}

/// Contents of a parameter file.
///
/// ```toml
/// [default]
/// DATA_WIDTH = 8
///
/// [bench]
/// clock_period_ns = 10
/// samples = 5
///
/// [matrix]
/// duty_cycle = [0.5, 0.2, 0.8]
/// prescale = [2, 4, 10]
/// padding = [2, 100, 2000]
/// ```
///
/// Without `[matrix] padding`, a `PADDING` entry in `[default]` is the only
/// padding that is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(rename = "default")]
    pub parameters: Parameters,
    pub bench: BenchSettings,
    pub matrix: MatrixSettings,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            parameters: Parameters::default().with("DATA_WIDTH", DEFAULT_DATA_WIDTH as i64),
            bench: BenchSettings::default(),
            matrix: MatrixSettings::default(),
        }
    }
}

impl FromStr for BenchConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl BenchConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        text.parse()
    }

    pub fn data_width(&self) -> Result<u32, ConfigError> {
        let width = self.parameters.get_u64_or("DATA_WIDTH", DEFAULT_DATA_WIDTH)?;
        validate_data_width(width)
    }

    /// Paddings the windowed variant enumerates.
    pub fn paddings(&self) -> Result<Vec<u64>, ConfigError> {
        if let Some(list) = &self.matrix.padding {
            return Ok(list.clone());
        }
        match self.parameters.get("PADDING") {
            Some(_) => Ok(vec![self.parameters.get_u64("PADDING")?]),
            None => Ok(DEFAULT_PADDING.to_vec()),
        }
    }
}

pub(crate) fn validate_data_width(width: u64) -> Result<u32, ConfigError> {
    if !(1..=32).contains(&width) {
        return Err(ConfigError::InvalidDataWidth(width));
    }
    Ok(width as u32)
}

/// Validated, immutable configuration of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Configuration {
    data_width: u32,
    prescale: u64,
    duty_cycle: f64,
    padding: Option<u64>,
}

impl Configuration {
    pub fn new(data_width: u32, prescale: u64, duty_cycle: f64) -> Result<Self, ConfigError> {
        validate_data_width(u64::from(data_width))?;
        if prescale == 0 || prescale % 2 != 0 {
            return Err(ConfigError::InvalidPrescale(prescale));
        }
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ConfigError::InvalidDutyCycle(duty_cycle));
        }
        Ok(Self {
            data_width,
            prescale,
            duty_cycle,
            padding: None,
        })
    }

    /// Enables the window output check with the given padding.
    pub fn with_padding(mut self, padding: u64) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn without_padding(mut self) -> Self {
        self.padding = None;
        self
    }

    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn prescale(&self) -> u64 {
        self.prescale
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    pub fn padding(&self) -> Option<u64> {
        self.padding
    }

    /// Largest value the comparator register can hold.
    pub fn full_scale(&self) -> u64 {
        (1u64 << self.data_width) - 1
    }

    /// Value written to `compare`. The quantization is where duty jitter comes from.
    pub fn compare_value(&self) -> u64 {
        (self.duty_cycle * self.full_scale() as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_configuration() {
        assert_eq!(
            Configuration::new(8, 3, 0.5),
            Err(ConfigError::InvalidPrescale(3))
        );
        assert_eq!(
            Configuration::new(8, 0, 0.5),
            Err(ConfigError::InvalidPrescale(0))
        );
        assert_eq!(
            Configuration::new(8, 4, 1.5),
            Err(ConfigError::InvalidDutyCycle(1.5))
        );
        assert!(matches!(
            Configuration::new(8, 4, f64::NAN),
            Err(ConfigError::InvalidDutyCycle(_))
        ));
        assert_eq!(
            Configuration::new(0, 4, 0.5),
            Err(ConfigError::InvalidDataWidth(0))
        );
        assert_eq!(
            Configuration::new(33, 4, 0.5),
            Err(ConfigError::InvalidDataWidth(33))
        );
    }

    #[test]
    fn test_compare_value_rounds() {
        let config = Configuration::new(8, 4, 0.5).unwrap();
        assert_eq!(config.full_scale(), 255);
        assert_eq!(config.compare_value(), 128);
        assert_eq!(Configuration::new(8, 4, 0.2).unwrap().compare_value(), 51);
        assert_eq!(Configuration::new(8, 4, 0.8).unwrap().compare_value(), 204);
        assert_eq!(Configuration::new(8, 4, 1.0).unwrap().compare_value(), 255);
    }

    #[test]
    fn test_parse_parameter_file() {
        let config: BenchConfig = r#"
            [default]
            data_width = "10"
            PADDING = 4

            [bench]
            samples = 3
            time_limit_us = 500

            [matrix]
            duty_cycle = [0.25]
            prescale = [6]
        "#
        .parse()
        .unwrap();
        assert_eq!(config.data_width(), Ok(10));
        assert_eq!(config.parameters.get_u64("padding"), Ok(4));
        assert_eq!(config.bench.samples, 3);
        assert_eq!(config.bench.clock_period_ns, DEFAULT_CLOCK_PERIOD_NS);
        assert_eq!(config.bench.time_limit(), Ok(Some(SimTime::from_us(500))));
        assert_eq!(config.matrix.prescale, [6]);
        assert_eq!(config.matrix.padding, None);
        assert_eq!(config.paddings(), Ok(vec![4]));
    }

    #[test]
    fn test_matrix_padding_overrides_default_parameter() {
        let config: BenchConfig = "[default]\nPADDING = 4\n[matrix]\npadding = [7, 9]"
            .parse()
            .unwrap();
        assert_eq!(config.paddings(), Ok(vec![7, 9]));
    }

    #[test]
    fn test_padding_falls_back_to_builtin_list() {
        let config: BenchConfig = "[default]\nDATA_WIDTH = 8".parse().unwrap();
        assert_eq!(config.paddings(), Ok(DEFAULT_PADDING.to_vec()));

        let config: BenchConfig = "[default]\nPADDING = \"wide\"".parse().unwrap();
        assert!(matches!(
            config.paddings(),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unrepresentable_times_are_rejected() {
        let bench = BenchSettings {
            clock_period_ns: u64::MAX,
            samples: 5,
            time_limit_us: Some(u64::MAX / 10),
        };
        assert_eq!(
            bench.clock_period(),
            Err(ConfigError::InvalidClockPeriod(u64::MAX))
        );
        assert_eq!(
            bench.time_limit(),
            Err(ConfigError::InvalidTimeLimit(u64::MAX / 10))
        );
        let zero = BenchSettings {
            clock_period_ns: 0,
            ..BenchSettings::default()
        };
        assert_eq!(zero.clock_period(), Err(ConfigError::InvalidClockPeriod(0)));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = BenchConfig::default();
        assert_eq!(config.data_width(), Ok(8));
        assert_eq!(config.matrix.duty_cycle, [0.5, 0.2, 0.8]);
        assert_eq!(config.bench.clock_period(), Ok(SimTime::from_ns(10)));
    }

    #[test]
    fn test_invalid_parameter_value() {
        let params = Parameters::default().with("DATA_WIDTH", -3i64);
        assert_eq!(
            params.get_u64("data_width"),
            Err(ConfigError::InvalidParameter {
                name: "data_width".to_string(),
                value: "-3".to_string(),
            })
        );
        assert_eq!(
            params.get_u64("PADDING"),
            Err(ConfigError::MissingParameter("PADDING".to_string()))
        );
        assert!(matches!(
            "[bench]\nunknown = 1".parse::<BenchConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_override_replaces_any_case() {
        let params = Parameters::default().with("padding", 2i64).with("PADDING", 100i64);
        assert_eq!(params.get_u64("Padding"), Ok(100));
        assert_eq!(params.0.len(), 1);
    }
}
