// Environment variable configuration support

use super::Args;
use anyhow::{Context, Result};
use std::env;

/// Apply environment variable overrides to the parsed arguments
pub fn apply_env_overrides(args: Args) -> Result<Args> {
    apply_overrides(args, |key| env::var(key).ok())
}

/// Apply overrides from any lookup; environment values win over the command line
fn apply_overrides<F>(mut args: Args, lookup: F) -> Result<Args>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("RSS_GUARD_NAME") {
        args.name = Some(val);
    }

    // Thresholds, an environment threshold replaces whichever one was given
    if let Some(val) = lookup("RSS_GUARD_MAX_BYTES") {
        args.max_bytes = Some(val.parse().context("RSS_GUARD_MAX_BYTES")?);
        args.percent = None;
    }
    if let Some(val) = lookup("RSS_GUARD_PERCENT") {
        args.percent = Some(val.parse().context("RSS_GUARD_PERCENT")?);
        args.max_bytes = None;
    }

    // Timing
    if let Some(val) = lookup("RSS_GUARD_INTERVAL") {
        args.interval = Some(val.parse().context("RSS_GUARD_INTERVAL")?);
    }
    if let Some(val) = lookup("RSS_GUARD_ALLOWED") {
        args.allowed = Some(val.parse().context("RSS_GUARD_ALLOWED")?);
    }

    // Behavior flags
    if let Some(val) = lookup("RSS_GUARD_KILL_ALL") {
        args.kill_all = parse_bool(&val)?;
    }
    if let Some(val) = lookup("RSS_GUARD_DEBUG") {
        args.debug = parse_bool(&val)?;
    }

    Ok(args)
}

/// Parse boolean value from string
/// Accepts: true/false, 1/0, yes/no, on/off (case-insensitive)
fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid boolean value: {}", s),
    }
}
