//! Probe configuration, read from the process environment.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `BTRACE_PROBE` | `off`, `log`, `sdt`, `dynamic` | `log` |
//! | `BTRACE_PROBE_LIBRARY` | library path, required for `dynamic` | unset |
//! | `BTRACE_PROBE_SYMBOL` | probe symbol for `dynamic` | `btrace_probe_event` |
//! | `BTRACE_NATIVE_LOG` | `tracing` filter directives | `warn,btrace::event=info` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::probe::{DisabledProbe, ProbeSink, TracingProbe};

pub const PROBE_ENV: &str = "BTRACE_PROBE";
pub const LIBRARY_ENV: &str = "BTRACE_PROBE_LIBRARY";
pub const SYMBOL_ENV: &str = "BTRACE_PROBE_SYMBOL";
pub const LOG_ENV: &str = "BTRACE_NATIVE_LOG";

pub const DEFAULT_SYMBOL: &str = "btrace_probe_event";
/// Warnings from the bridge plus every probe event of the `log` sink.
pub const DEFAULT_LOG_FILTER: &str = "warn,btrace::event=info";

/// Errors raised while turning the environment into a probe sink.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown probe mode `{0}` (expected off, log, sdt or dynamic)")]
    UnknownMode(String),
    #[error("probe mode `{mode}` needs the `{feature}` cargo feature")]
    FeatureDisabled {
        mode: ProbeMode,
        feature: &'static str,
    },
    #[error("probe mode `dynamic` needs BTRACE_PROBE_LIBRARY to name a library")]
    MissingLibrary,
    #[cfg(feature = "dynamic-probe")]
    #[error("failed to load probe `{symbol}` from {}: {source}", .library.display())]
    Load {
        library: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },
}

/// Which sink backs the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Drop every call.
    Off,
    /// Emit a `tracing` event per call.
    #[default]
    Log,
    /// Fire the `btrace:event` USDT probe.
    Sdt,
    /// Call a probe function loaded from a shared library.
    Dynamic,
}

impl FromStr for ProbeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" => Ok(ProbeMode::Off),
            "log" | "tracing" => Ok(ProbeMode::Log),
            "sdt" | "usdt" | "dtrace" => Ok(ProbeMode::Sdt),
            "dynamic" => Ok(ProbeMode::Dynamic),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeMode::Off => "off",
            ProbeMode::Log => "log",
            ProbeMode::Sdt => "sdt",
            ProbeMode::Dynamic => "dynamic",
        })
    }
}

/// Everything the bridge reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub mode: ProbeMode,
    pub library: Option<PathBuf>,
    pub symbol: String,
    pub log_filter: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            mode: ProbeMode::default(),
            library: None,
            symbol: DEFAULT_SYMBOL.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ProbeConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ProbeConfig::default();

        let mode = match get(PROBE_ENV) {
            Some(value) => value.parse()?,
            None => defaults.mode,
        };

        Ok(ProbeConfig {
            mode,
            library: get(LIBRARY_ENV).map(PathBuf::from),
            symbol: get(SYMBOL_ENV).unwrap_or(defaults.symbol),
            log_filter: get(LOG_ENV).unwrap_or(defaults.log_filter),
        })
    }

    /// Builds the sink this configuration selects.
    pub fn build_probe(&self) -> Result<Box<dyn ProbeSink>, ConfigError> {
        match self.mode {
            ProbeMode::Off => Ok(Box::new(DisabledProbe)),
            ProbeMode::Log => Ok(Box::new(TracingProbe)),
            ProbeMode::Sdt => self.build_sdt(),
            ProbeMode::Dynamic => self.build_dynamic(),
        }
    }

    #[cfg(feature = "usdt")]
    fn build_sdt(&self) -> Result<Box<dyn ProbeSink>, ConfigError> {
        Ok(Box::new(crate::probe::SdtProbe))
    }

    #[cfg(not(feature = "usdt"))]
    fn build_sdt(&self) -> Result<Box<dyn ProbeSink>, ConfigError> {
        Err(ConfigError::FeatureDisabled {
            mode: ProbeMode::Sdt,
            feature: "usdt",
        })
    }

    #[cfg(feature = "dynamic-probe")]
    fn build_dynamic(&self) -> Result<Box<dyn ProbeSink>, ConfigError> {
        let library = self.library.as_ref().ok_or(ConfigError::MissingLibrary)?;
        // SAFETY: the operator chose this library and symbol explicitly.
        let probe = unsafe { crate::probe::DynamicProbe::load(library, &self.symbol) }.map_err(
            |source| ConfigError::Load {
                library: library.clone(),
                symbol: self.symbol.clone(),
                source,
            },
        )?;
        Ok(Box::new(probe))
    }

    #[cfg(not(feature = "dynamic-probe"))]
    fn build_dynamic(&self) -> Result<Box<dyn ProbeSink>, ConfigError> {
        if self.library.is_none() {
            return Err(ConfigError::MissingLibrary);
        }
        Err(ConfigError::FeatureDisabled {
            mode: ProbeMode::Dynamic,
            feature: "dynamic-probe",
        })
    }
}
