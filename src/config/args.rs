// Command-line argument parsing

use anyhow::Result;
use clap::Parser;

/// RSS Guard - kill processes that stay over a memory threshold
///
/// Samples every process with the given executable name and terminates the
/// ones that keep using too much memory for longer than the allowed time.
#[derive(Parser, Debug, Default)]
#[command(name = "rss-guard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kill named processes that stay over a memory threshold", long_about = None)]
pub struct Args {
    /// Executable name to watch (truncated to 15 characters on Linux)
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// Absolute threshold: resident memory in bytes (alternative to -p)
    #[arg(short = 'b', long = "max-bytes", value_name = "BYTES")]
    pub max_bytes: Option<u64>,

    /// Percentage threshold of total system memory (default: 70)
    #[arg(short = 'p', long = "percent", value_name = "PERCENT")]
    pub percent: Option<f32>,

    /// Sample interval in seconds, fractions allowed (default: 1)
    #[arg(short = 'i', long = "interval", value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// How long a process may stay over the threshold, in seconds (default: 10)
    /// Must be greater than the interval
    #[arg(short = 'a', long = "allowed", value_name = "SECONDS")]
    pub allowed: Option<f64>,

    /// Kill every matching process when one of them stays over for too long
    #[arg(short = 'k', long = "kill-all")]
    pub kill_all: bool,

    /// Send SIGTERM first and escalate to SIGKILL instead of killing outright
    #[arg(long = "graceful")]
    pub graceful: bool,

    /// Script to run after each batch of kills
    #[arg(short = 'N', long = "post-kill-script", value_name = "PATH")]
    pub post_kill_script: Option<String>,

    /// Enable desktop notifications when killing processes
    #[arg(long = "notify")]
    pub notify: bool,

    /// Set daemon priority (-20 to 19, lower = higher priority)
    #[arg(long = "set-priority", value_name = "PRIORITY", allow_hyphen_values = true)]
    pub priority: Option<i32>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Use syslog instead of stdout/stderr for logging
    #[arg(long = "syslog")]
    pub syslog: bool,
}

impl Args {
    /// Parse arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse the command line, then apply `RSS_GUARD_*` environment overrides
    pub fn parse_with_env() -> Result<Self> {
        super::env::apply_env_overrides(Self::parse_args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "rss-guard",
            "-n",
            "memconsume",
            "-b",
            "104857600",
            "-i",
            "0.5",
            "-a",
            "3",
            "-k",
            "--set-priority",
            "-5",
        ])
        .unwrap();
        assert_eq!(args.name.as_deref(), Some("memconsume"));
        assert_eq!(args.max_bytes, Some(104_857_600));
        assert_eq!(args.interval, Some(0.5));
        assert_eq!(args.allowed, Some(3.0));
        assert!(args.kill_all);
        assert_eq!(args.priority, Some(-5));
        assert!(!args.graceful);
    }
}
