//! Configuration types deserialized from `corebench.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use corebench_sim::{Edge, TextTrace};

/// The top-level bench configuration parsed from `corebench.toml`.
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct BenchConfig {
    /// Run length settings.
    #[serde(default)]
    pub run: RunSection,
    /// Reset sequencing.
    #[serde(default)]
    pub reset: ResetSection,
    /// Trace output.
    #[serde(default)]
    pub trace: TraceSection,
    /// Model selection and forwarded model arguments.
    #[serde(default)]
    pub dut: DutSection,
}

/// `[run]`: how long to simulate.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct RunSection {
    /// Tick budget. Signed so a negative value is reported as a validation
    /// error rather than a parse error.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: i64,
}

fn default_max_ticks() -> i64 {
    1000
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
        }
    }
}

/// `[reset]`: when the active-low reset is held asserted.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct ResetSection {
    /// With `false` the reset pin stays at its power-on (asserted) level.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// First tick with reset asserted.
    #[serde(default = "default_reset_start")]
    pub start: u64,
    /// First tick with reset released.
    #[serde(default = "default_reset_end")]
    pub end: u64,
    /// Clock edge on which reset is sampled.
    #[serde(default)]
    pub edge: Edge,
}

fn default_true() -> bool {
    true
}

fn default_reset_start() -> u64 {
    1
}

fn default_reset_end() -> u64 {
    10
}

impl Default for ResetSection {
    fn default() -> Self {
        Self {
            enabled: true,
            start: default_reset_start(),
            end: default_reset_end(),
            edge: Edge::default(),
        }
    }
}

/// `[trace]`: waveform and text sample output.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct TraceSection {
    /// Optional VCD output path, relative to the config file's directory.
    #[serde(default)]
    pub vcd: Option<String>,
    /// Abort the run if tracing fails.
    #[serde(default)]
    pub required: bool,
    /// Text sample log policy (`auto`, `always`, `never`).
    #[serde(default)]
    pub text: TextTrace,
}

/// `[dut]`: which model to build and what to pass it.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct DutSection {
    /// Built-in model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Arguments forwarded to the model, e.g. `["+reset_vector=0xfffe"]`.
    ///
    /// A single string is read as a command line and split on whitespace.
    #[serde(default, deserialize_with = "deserialize_model_args")]
    pub args: Vec<String>,
}

fn default_model() -> String {
    "counter".to_string()
}

impl Default for DutSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            args: Vec::new(),
        }
    }
}

/// Reads `dut.args` as either a list of arguments or one
/// `"+stride=2 +finish_at=0x40"` style command line.
fn deserialize_model_args<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ModelArgs;

    impl<'de> Visitor<'de> for ModelArgs {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a model command line or a list of model arguments")
        }

        fn visit_str<E: de::Error>(self, line: &str) -> Result<Self::Value, E> {
            Ok(line.split_whitespace().map(str::to_string).collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut args = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(arg) = seq.next_element::<String>()? {
                let arg = arg.trim();
                if arg.is_empty() {
                    return Err(de::Error::invalid_value(
                        de::Unexpected::Str(arg),
                        &"a non-empty model argument",
                    ));
                }
                args.push(arg.to_string());
            }
            Ok(args)
        }
    }

    deserializer.deserialize_any(ModelArgs)
}
