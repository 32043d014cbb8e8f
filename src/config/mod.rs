// Configuration module

mod args;
mod env;

pub use args::Args;

use crate::monitor::SystemMemory;
use std::time::Duration;
use thiserror::Error;

/// Longest executable name the kernel keeps in `comm` (TASK_COMM_LEN - 1)
const MAX_COMM_LEN: usize = 15;

/// Default percentage threshold
const DEFAULT_PERCENT: f32 = 70.0;

/// Errors returned by the validating setters of [`Settings`]
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("max memory of {requested} bytes is greater than system total of {total}")]
    MaxMemoryExceedsTotal { requested: u64, total: u64 },

    #[error("percent of memory can not be 0 or greater than 100 (got {0})")]
    InvalidPercent(f32),

    #[error("process name must be set")]
    EmptyName,

    #[error("interval must be greater than 0")]
    ZeroInterval,

    #[error("allowed time ({allowed:?}) must be greater than interval ({interval:?})")]
    AllowedTimeTooShort { allowed: Duration, interval: Duration },

    #[error("--max-bytes and --percent are mutually exclusive")]
    ConflictingThresholds,

    #[error("invalid duration: {0} seconds")]
    InvalidDuration(f64),

    #[error("failed to read system memory: {0}")]
    SystemMemory(String),
}

/// Memory limit a tracked process is measured against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Resident set size in bytes
    Bytes(u64),
    /// Share of total system memory, in (0, 100]
    Percent(f32),
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "RSS >= {bytes} bytes"),
            Self::Percent(percent) => write!(f, "memory >= {percent:.1}%"),
        }
    }
}

/// Watchdog settings.
///
/// Every setter validates before mutating, so a failed call leaves the
/// settings untouched. The allowed time is validated against the interval
/// set at call time: set the interval first.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    threshold: Threshold,
    name: String,
    kill_all: bool,
    interval: Duration,
    allowed_time: Duration,
    debug: bool,
}

impl Settings {
    /// Create settings with the defaults: 70% threshold, 1s interval, 10s allowed
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from command-line arguments. Environment overrides are
    /// applied beforehand by [`Args::parse_with_env`].
    pub fn from_args<M: SystemMemory + ?Sized>(
        args: Args,
        memory: &M,
    ) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if args.max_bytes.is_some() && args.percent.is_some() {
            return Err(SettingsError::ConflictingThresholds.into());
        }
        if let Some(bytes) = args.max_bytes {
            settings.set_max_memory(bytes, memory)?;
        }
        if let Some(percent) = args.percent {
            settings.set_percent_memory(percent)?;
        }

        if let Some(name) = args.name.as_deref() {
            settings.set_name(name)?;
        }

        // Interval first, allowed time is checked against it
        if let Some(secs) = args.interval {
            settings.set_interval(secs_to_duration(secs)?)?;
        }
        if let Some(secs) = args.allowed {
            settings.set_allowed_time(secs_to_duration(secs)?)?;
        }

        if args.kill_all {
            settings.kill_all();
        }
        if args.debug {
            settings.enable_debug();
        }

        Ok(settings)
    }

    /// Set the absolute RSS threshold in bytes, clearing any percentage
    pub fn set_max_memory<M: SystemMemory + ?Sized>(
        &mut self,
        max_memory: u64,
        memory: &M,
    ) -> Result<(), SettingsError> {
        let total = memory
            .total_memory()
            .map_err(|e| SettingsError::SystemMemory(format!("{e:#}")))?;
        if max_memory > total {
            return Err(SettingsError::MaxMemoryExceedsTotal {
                requested: max_memory,
                total,
            });
        }
        self.threshold = Threshold::Bytes(max_memory);
        Ok(())
    }

    /// Set the percentage threshold, clearing any absolute one
    pub fn set_percent_memory(&mut self, percent: f32) -> Result<(), SettingsError> {
        // Written so that NaN is rejected too
        if !(percent > 0.0 && percent <= 100.0) {
            return Err(SettingsError::InvalidPercent(percent));
        }
        self.threshold = Threshold::Percent(percent);
        Ok(())
    }

    /// Set the executable name to watch. Every process with this name is tracked.
    pub fn set_name(&mut self, name: &str) -> Result<(), SettingsError> {
        if name.is_empty() {
            return Err(SettingsError::EmptyName);
        }
        self.name = if cfg!(target_os = "linux") {
            truncate_comm(name).to_string()
        } else {
            name.to_string()
        };
        Ok(())
    }

    /// Kill every tracked process as soon as one of them stays over for too long
    pub fn kill_all(&mut self) {
        self.kill_all = true;
    }

    /// Set how often processes are sampled
    pub fn set_interval(&mut self, interval: Duration) -> Result<(), SettingsError> {
        if interval.is_zero() {
            return Err(SettingsError::ZeroInterval);
        }
        self.interval = interval;
        Ok(())
    }

    /// Set how long a process may stay over the threshold
    pub fn set_allowed_time(&mut self, allowed_time: Duration) -> Result<(), SettingsError> {
        if allowed_time <= self.interval {
            return Err(SettingsError::AllowedTimeTooShort {
                allowed: allowed_time,
                interval: self.interval,
            });
        }
        self.allowed_time = allowed_time;
        Ok(())
    }

    pub fn enable_debug(&mut self) {
        self.debug = true;
    }

    pub const fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kills_all(&self) -> bool {
        self.kill_all
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn allowed_time(&self) -> Duration {
        self.allowed_time
    }

    pub const fn debug(&self) -> bool {
        self.debug
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: Threshold::Percent(DEFAULT_PERCENT),
            name: String::new(),
            kill_all: false,
            interval: Duration::from_secs(1),      // Sample every second
            allowed_time: Duration::from_secs(10), // Over threshold for 10s at most
            debug: false,
        }
    }
}

/// Truncate a name the way the kernel truncates `comm`, on a char boundary
fn truncate_comm(name: &str) -> &str {
    if name.len() <= MAX_COMM_LEN {
        return name;
    }
    let mut end = MAX_COMM_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Convert fractional seconds from the command line into a Duration
fn secs_to_duration(secs: f64) -> Result<Duration, SettingsError> {
    Duration::try_from_secs_f64(secs).map_err(|_| SettingsError::InvalidDuration(secs))
}
