// Process provider: the view of the system the watchdog samples through

mod meminfo;
mod process;

pub use meminfo::MemInfo;
pub use process::ProcfsProvider;

use anyhow::Result;

/// Process identifier as used by the kernel
pub type Pid = i32;

/// Source of the total amount of physical memory
pub trait SystemMemory {
    /// Total system memory in bytes
    fn total_memory(&self) -> Result<u64>;
}

/// Everything the watchdog needs to know about, and do to, processes.
///
/// `resolve` failing means the process is gone; the other calls may fail
/// for transient reasons and the watchdog treats those as non-fatal.
pub trait ProcessProvider: SystemMemory {
    /// Live reference to a process obtained from [`ProcessProvider::resolve`]
    type Handle;

    /// Pids of every running process whose executable name equals `name`
    fn find_by_name(&self, name: &str) -> Result<Vec<Pid>>;

    /// Look a pid up, failing if it no longer exists
    fn resolve(&self, pid: Pid) -> Result<Self::Handle>;

    /// Resident set size in bytes
    fn resident_memory(&self, handle: &Self::Handle) -> Result<u64>;

    /// Resident set size as a percentage of total system memory
    fn memory_percent(&self, handle: &Self::Handle) -> Result<f32>;

    /// Terminate the process
    fn terminate(&self, handle: &Self::Handle) -> Result<()>;
}
