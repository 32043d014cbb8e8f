// RSS Guard - per-process memory watchdog library

pub mod config;
pub mod daemon;
pub mod killer;
pub mod monitor;
pub mod notify;

// Re-export commonly used types
pub use config::{Settings, SettingsError, Threshold};
pub use daemon::{KillNotification, MonitorError, StopHandle, Watchdog};
pub use monitor::{Pid, ProcessProvider, ProcfsProvider, SystemMemory};
