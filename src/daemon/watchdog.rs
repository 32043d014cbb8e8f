// Watchdog engine: samples the watched processes on a fixed period and
// kills the ones that stay over the memory threshold for too long

use crate::config::{Settings, Threshold};
use crate::monitor::{MemInfo, Pid, ProcessProvider};
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that end a monitoring run
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("process name not properly supplied")]
    MissingName,

    #[error("failed to read total system memory: {0:#}")]
    SystemMemory(anyhow::Error),

    #[error("error trying to find pids: {0:#}")]
    ListProcesses(anyhow::Error),

    #[error("watchdog was stopped, reset it before running again")]
    NotReset,

    #[error("kill notification receiver was dropped")]
    ConsumerGone,
}

/// Lifecycle of a [`Watchdog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// Pids killed in a single sampling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillNotification {
    pids: Vec<Pid>,
}

impl KillNotification {
    pub fn new(mut pids: Vec<Pid>) -> Self {
        pids.sort_unstable();
        Self { pids }
    }

    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }
}

impl fmt::Display for KillNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pids: Vec<String> = self.pids.iter().map(ToString::to_string).collect();
        write!(f, "killed {} process(es): {}", self.pids.len(), pids.join(", "))
    }
}

/// Stop flag the run loop waits on between samples
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.cvar.notify_all();
    }

    fn is_raised(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `deadline` or until the signal is raised. Returns true if raised.
    /// Without a deadline only the signal ends the wait.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *stopped {
                return true;
            }
            let Some(deadline) = deadline else {
                stopped = self
                    .cvar
                    .wait(stopped)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
    }
}

/// Cloneable handle that stops a running [`Watchdog`] from another thread.
///
/// A handle belongs to one arming of the watchdog: after
/// [`Watchdog::reset`] it no longer affects the engine.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    /// Ask the run loop to return. Takes effect at the next cycle boundary;
    /// a cycle blocked publishing a notification finishes first.
    pub fn stop(&self) {
        self.signal.raise();
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.is_raised()
    }
}

/// Memory watchdog for every process sharing one executable name
pub struct Watchdog<P: ProcessProvider> {
    settings: Settings,
    provider: P,
    /// Accumulated time over threshold, per tracked pid
    tracked: HashMap<Pid, Duration>,
    killed_tx: Option<SyncSender<KillNotification>>,
    killed_rx: Option<Receiver<KillNotification>>,
    stop: Arc<StopSignal>,
    state: EngineState,
}

impl<P: ProcessProvider> Watchdog<P> {
    /// Create a watchdog bound to the given settings
    pub fn new(settings: Settings, provider: P) -> Self {
        let (killed_tx, killed_rx) = mpsc::sync_channel(0);
        Self {
            settings,
            provider,
            tracked: HashMap::new(),
            killed_tx: Some(killed_tx),
            killed_rx: Some(killed_rx),
            stop: Arc::new(StopSignal::default()),
            state: EngineState::Idle,
        }
    }

    /// Re-arm a stopped watchdog with no tracked processes, a new
    /// notification queue and a new stop signal.
    pub fn reset(&mut self) {
        let (killed_tx, killed_rx) = mpsc::sync_channel(0);
        self.tracked = HashMap::new();
        self.killed_tx = Some(killed_tx);
        self.killed_rx = Some(killed_rx);
        self.stop = Arc::new(StopSignal::default());
        self.state = EngineState::Idle;
    }

    /// Take the receiving end of the kill notification queue.
    ///
    /// The queue has no buffer: every publish waits for the receiver, so it
    /// must be drained continuously while the watchdog runs. Take it before
    /// calling [`Watchdog::run`]; a receiver still held by the watchdog is
    /// dropped when monitoring starts. Returns `None` if already taken since
    /// the last reset.
    pub fn take_notifications(&mut self) -> Option<Receiver<KillNotification>> {
        self.killed_rx.take()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: Arc::clone(&self.stop),
        }
    }

    pub const fn state(&self) -> EngineState {
        self.state
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Monitor until stopped.
    ///
    /// Samples once per interval, the first sample one interval after the
    /// call. Returns `Ok` once a [`StopHandle`] stops it; the notification
    /// queue is closed on every return path that started monitoring.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        if self.state == EngineState::Stopped {
            return Err(MonitorError::NotReset);
        }

        let system_memory = self
            .provider
            .total_memory()
            .map_err(MonitorError::SystemMemory)?;

        if self.settings.name().is_empty() {
            return Err(MonitorError::MissingName);
        }

        log::info!(
            "Monitoring '{}': kill when {} for {:.1}s (interval {:.1}s, system memory {})",
            self.settings.name(),
            self.settings.threshold(),
            self.settings.allowed_time().as_secs_f64(),
            self.settings.interval().as_secs_f64(),
            MemInfo::format_bytes(system_memory)
        );

        // An untaken receiver would make the first publish wait forever
        self.killed_rx = None;

        self.state = EngineState::Running;
        let result = self.monitor_loop();
        self.state = EngineState::Stopped;
        // Dropping the sender closes the queue for the consumer
        self.killed_tx = None;

        result
    }

    fn monitor_loop(&mut self) -> Result<(), MonitorError> {
        let interval = self.settings.interval();
        let stop = Arc::clone(&self.stop);
        // None when the interval reaches past what Instant can represent
        let mut next_tick = Instant::now().checked_add(interval);

        loop {
            if stop.wait_until(next_tick) {
                log::debug!("Watchdog for '{}' stopping", self.settings.name());
                return Ok(());
            }

            // Ticks missed while a cycle ran long are dropped, not replayed
            let now = Instant::now();
            while let Some(tick) = next_tick.filter(|tick| *tick <= now) {
                next_tick = tick.checked_add(interval);
            }

            let killed = self.run_cycle()?;
            if !killed.is_empty() {
                self.publish(killed)?;
            }
        }
    }

    /// One sample: refresh the tracked set, account overage, kill.
    /// Returns the pids that were killed.
    pub(crate) fn run_cycle(&mut self) -> Result<Vec<Pid>, MonitorError> {
        self.refresh_pids()?;
        self.debug_log(format_args!("tracking {:?}", self.tracked));

        let exceeded = self.check_exceeded();
        if exceeded.is_empty() {
            return Ok(exceeded);
        }

        let victims: Vec<Pid> = if self.settings.kills_all() {
            self.tracked.keys().copied().collect()
        } else {
            exceeded
        };

        log::warn!(
            "Killing {:?}: '{}' over {} for at least {:.1}s",
            victims,
            self.settings.name(),
            self.settings.threshold(),
            self.settings.allowed_time().as_secs_f64()
        );
        for &pid in &victims {
            self.kill(pid);
        }

        Ok(victims)
    }

    /// Start tracking newly found pids. Known pids keep their overage.
    fn refresh_pids(&mut self) -> Result<(), MonitorError> {
        let found = self
            .provider
            .find_by_name(self.settings.name())
            .map_err(MonitorError::ListProcesses)?;

        for pid in found {
            self.tracked.entry(pid).or_insert(Duration::ZERO);
        }
        Ok(())
    }

    /// Update the overage of every tracked pid and return those that have
    /// been over threshold for at least the allowed time. Pids that no
    /// longer resolve stop being tracked.
    fn check_exceeded(&mut self) -> Vec<Pid> {
        let interval = self.settings.interval();
        let allowed = self.settings.allowed_time();

        let mut exceeded = Vec::new();
        let mut gone = Vec::new();
        let mut updated = Vec::with_capacity(self.tracked.len());

        for (&pid, &overage) in &self.tracked {
            let Ok(handle) = self.provider.resolve(pid) else {
                self.debug_log(format_args!("pid {pid} no longer exists"));
                gone.push(pid);
                continue;
            };

            if self.is_over_threshold(pid, &handle) {
                let overage = overage.saturating_add(interval);
                self.debug_log(format_args!("pid {pid} is over the limit for {overage:?}"));
                if overage >= allowed {
                    exceeded.push(pid);
                }
                updated.push((pid, overage));
            } else if !overage.is_zero() {
                updated.push((pid, Duration::ZERO));
            }
        }

        for pid in gone {
            self.tracked.remove(&pid);
        }
        self.tracked.extend(updated);

        exceeded
    }

    /// Unreadable memory counts as under threshold
    fn is_over_threshold(&self, pid: Pid, handle: &P::Handle) -> bool {
        match self.settings.threshold() {
            Threshold::Bytes(max) => match self.provider.resident_memory(handle) {
                Ok(rss) => rss >= max,
                Err(e) => {
                    self.debug_log(format_args!("failed to read RSS of pid {pid}: {e:#}"));
                    false
                }
            },
            Threshold::Percent(max) => match self.provider.memory_percent(handle) {
                Ok(percent) => percent >= max,
                Err(e) => {
                    self.debug_log(format_args!("failed to read memory % of pid {pid}: {e:#}"));
                    false
                }
            },
        }
    }

    fn kill(&self, pid: Pid) {
        let result = self
            .provider
            .resolve(pid)
            .and_then(|handle| self.provider.terminate(&handle));
        if let Err(e) = result {
            self.debug_log(format_args!("error killing process {pid}: {e:#}"));
        }
    }

    /// Hand the notification to the consumer, waiting until it is received
    fn publish(&self, killed: Vec<Pid>) -> Result<(), MonitorError> {
        let tx = self.killed_tx.as_ref().ok_or(MonitorError::ConsumerGone)?;
        tx.send(KillNotification::new(killed))
            .map_err(|_| MonitorError::ConsumerGone)
    }

    fn debug_log(&self, args: fmt::Arguments<'_>) {
        if self.settings.debug() {
            log::debug!("{args}");
        }
    }
}
