// Process provider backed by procfs

use super::{MemInfo, Pid, ProcessProvider, SystemMemory};
use crate::killer::{kill_process, KillStrategy};
use anyhow::{bail, Context, Result};
use procfs::process::Process;

/// Linux process provider reading /proc and signalling through nix
#[derive(Debug, Clone, Copy)]
pub struct ProcfsProvider {
    strategy: KillStrategy,
}

impl ProcfsProvider {
    /// Create a provider that terminates processes with the given strategy
    pub const fn new(strategy: KillStrategy) -> Self {
        Self { strategy }
    }

    pub const fn strategy(&self) -> KillStrategy {
        self.strategy
    }
}

impl Default for ProcfsProvider {
    fn default() -> Self {
        Self::new(KillStrategy::Forceful)
    }
}

impl SystemMemory for ProcfsProvider {
    fn total_memory(&self) -> Result<u64> {
        Ok(MemInfo::read()?.total_bytes())
    }
}

impl ProcessProvider for ProcfsProvider {
    type Handle = Process;

    fn find_by_name(&self, name: &str) -> Result<Vec<Pid>> {
        let mut pids = Vec::new();

        for process in procfs::process::all_processes().context("Failed to list /proc")? {
            // Processes can exit between listing and reading their stat
            let Ok(process) = process else { continue };
            let Ok(stat) = process.stat() else { continue };

            if stat.comm == name && stat.state != 'Z' {
                pids.push(stat.pid);
            }
        }

        Ok(pids)
    }

    fn resolve(&self, pid: Pid) -> Result<Process> {
        let process = Process::new(pid).with_context(|| format!("pid {pid} not found"))?;
        if !process.is_alive() {
            bail!("pid {pid} has exited");
        }
        Ok(process)
    }

    fn resident_memory(&self, handle: &Process) -> Result<u64> {
        let stat = handle.stat()?;
        // stat.rss is in pages
        Ok(stat.rss * procfs::page_size())
    }

    fn memory_percent(&self, handle: &Process) -> Result<f32> {
        let rss = self.resident_memory(handle)?;
        Ok(MemInfo::read()?.percent_of_total(rss))
    }

    fn terminate(&self, handle: &Process) -> Result<()> {
        let result = kill_process(handle.pid(), self.strategy)?;
        if !result.is_success() {
            bail!("failed to kill pid {}: {}", handle.pid(), result.description());
        }
        Ok(())
    }
}
