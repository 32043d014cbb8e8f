// Daemon module - watchdog engine and the service the binary runs

mod service;
mod watchdog;

pub use service::{DaemonOptions, DaemonService};
pub use watchdog::{EngineState, KillNotification, MonitorError, StopHandle, Watchdog};

use crate::config::Settings;
use anyhow::Result;

/// Run the RSS Guard daemon until interrupted
pub fn run(settings: Settings, options: DaemonOptions) -> Result<()> {
    let mut service = DaemonService::new(settings, options);
    service.run()
}
