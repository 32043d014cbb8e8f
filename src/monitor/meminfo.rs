// Memory information parsing from /proc/meminfo

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Memory information structure
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    /// Total physical memory in KiB
    pub mem_total: u64,
    /// Available memory in KiB (more accurate than free)
    pub mem_available: u64,
}

impl MemInfo {
    /// Read memory information from /proc/meminfo
    pub fn read() -> Result<Self> {
        Self::read_from_path("/proc/meminfo")
    }

    /// Read memory information from a specific path (for testing)
    fn read_from_path(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {path}"))?;
        let reader = BufReader::new(file);

        let mut info = Self::default();

        for line in reader.lines() {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();

            if parts.len() < 2 {
                continue;
            }

            let key = parts[0].trim_end_matches(':');
            match key {
                "MemTotal" | "MemAvailable" => {
                    let value: u64 = parts[1]
                        .parse()
                        .with_context(|| format!("Failed to parse value for {key}"))?;
                    if key == "MemTotal" {
                        info.mem_total = value;
                    } else {
                        info.mem_available = value;
                    }
                }
                _ => {}
            }
        }

        if info.mem_total == 0 {
            anyhow::bail!("Failed to read MemTotal from {path}");
        }

        Ok(info)
    }

    /// Total physical memory in bytes
    pub const fn total_bytes(&self) -> u64 {
        self.mem_total * 1024
    }

    /// Share of total memory that `bytes` represents, in percent
    pub fn percent_of_total(&self, bytes: u64) -> f32 {
        if self.mem_total == 0 {
            return 0.0;
        }
        (bytes as f64 / self.total_bytes() as f64 * 100.0) as f32
    }

    /// Format a byte count in human-readable form
    pub fn format_bytes(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GiB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MiB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KiB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }
}

impl std::fmt::Display for MemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Memory: {} total, {} available",
            Self::format_bytes(self.total_bytes()),
            Self::format_bytes(self.mem_available * 1024),
        )
    }
}
