// Daemon service: runs the watchdog on its own thread and consumes its
// kill notifications on the calling one

use super::watchdog::{KillNotification, StopHandle, Watchdog};
use crate::config::{Args, Settings};
use crate::killer::KillStrategy;
use crate::monitor::{MemInfo, ProcfsProvider};
use crate::notify::hooks::HookValidator;
use crate::notify::NotificationManager;
use anyhow::{anyhow, bail, Context, Result};
use libc::{setpriority, PRIO_PROCESS};
use std::fs;
use std::io::Error;
use std::thread;
use std::time::Instant;

/// Set daemon priority using the configured value
fn set_daemon_priority(priority: i32) {
    // SAFETY: setpriority only reads its integer arguments
    #[allow(unsafe_code)]
    let result = unsafe { setpriority(PRIO_PROCESS, 0, priority) };

    if result != 0 {
        let err = Error::last_os_error();
        log::warn!(
            "Failed to set niceness to {}: {}. May need root privileges.",
            priority,
            err
        );
    } else {
        log::info!("Set daemon niceness to {} (priority)", priority);
    }

    // Keep the kernel OOM killer away from the watchdog itself
    match fs::write("/proc/self/oom_score_adj", "-100") {
        Ok(()) => log::info!("Set oom_score_adj to -100 (protected from OOM killer)"),
        Err(e) => log::warn!(
            "Failed to set oom_score_adj: {}. Daemon may be killed under extreme memory pressure.",
            e
        ),
    }
}

/// Daemon behaviour outside of the watchdog settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    pub strategy: KillStrategy,
    pub post_kill_script: Option<String>,
    pub notify_dbus: bool,
    pub priority: Option<i32>,
}

impl DaemonOptions {
    /// Extract daemon options from command-line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        if let Some(priority) = args.priority {
            if !(-20..=19).contains(&priority) {
                bail!("priority must be between -20 and 19");
            }
        }

        Ok(Self {
            strategy: if args.graceful {
                KillStrategy::Graceful
            } else {
                KillStrategy::Forceful
            },
            post_kill_script: args.post_kill_script.clone(),
            notify_dbus: args.notify,
            priority: args.priority,
        })
    }
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            strategy: KillStrategy::Forceful,
            post_kill_script: None,
            notify_dbus: false,
            priority: None,
        }
    }
}

/// Daemon service that watches one executable name until interrupted
pub struct DaemonService {
    settings: Settings,
    options: DaemonOptions,
    kills: usize,
}

impl DaemonService {
    /// Create a new daemon service
    pub fn new(settings: Settings, options: DaemonOptions) -> Self {
        Self {
            settings,
            options,
            kills: 0,
        }
    }

    /// Main run loop
    pub fn run(&mut self) -> Result<()> {
        if let Some(priority) = self.options.priority {
            set_daemon_priority(priority);
        }

        HookValidator::validate_hooks(self.options.post_kill_script.as_deref())?;

        self.print_startup_info()?;

        let provider = ProcfsProvider::new(self.options.strategy);
        let mut watchdog = Watchdog::new(self.settings.clone(), provider);
        let notifications = watchdog
            .take_notifications()
            .context("Kill notifications already taken")?;

        Self::setup_signal_handlers(watchdog.stop_handle())?;

        let engine = thread::Builder::new()
            .name("rss-guard-watchdog".to_string())
            .spawn(move || watchdog.run())
            .context("Failed to spawn watchdog thread")?;

        let notifier = NotificationManager::new(
            self.options.notify_dbus,
            self.options.post_kill_script.clone(),
        );
        let started = Instant::now();

        // Ends once the watchdog returns and drops its sender
        for notification in &notifications {
            self.handle_kill(&notifier, &notification);
        }

        let result = engine
            .join()
            .map_err(|_| anyhow!("Watchdog thread panicked"))?;

        log::info!(
            "RSS Guard shutting down after {:.0}s, {} process(es) killed",
            started.elapsed().as_secs_f64(),
            self.kills
        );

        result.context("Watchdog stopped")
    }

    /// Setup signal handlers for graceful shutdown
    fn setup_signal_handlers(stop: StopHandle) -> Result<()> {
        // Handles SIGINT, SIGTERM and SIGHUP with the termination feature
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            stop.stop();
        })
        .map_err(|e| anyhow!("Failed to set signal handler: {}", e))?;

        Ok(())
    }

    /// Print startup information
    fn print_startup_info(&self) -> Result<()> {
        let meminfo = MemInfo::read()?;

        log::info!("=== RSS Guard v{} starting ===", env!("CARGO_PKG_VERSION"));
        log::info!("{}", meminfo);
        log::info!("Watching: '{}'", self.settings.name());
        log::info!(
            "Kill when {} for {:.1}s, sampling every {:.1}s",
            self.settings.threshold(),
            self.settings.allowed_time().as_secs_f64(),
            self.settings.interval().as_secs_f64()
        );

        if self.settings.kills_all() {
            log::info!("Kill-all mode: one offender takes down every matching process");
        }
        if self.options.strategy == KillStrategy::Graceful {
            log::info!("Graceful kills enabled (SIGTERM, then SIGKILL)");
        }
        if let Some(script) = &self.options.post_kill_script {
            log::info!("Post-kill script: {}", script);
        }
        if let Some(priority) = self.options.priority {
            log::info!("Daemon priority: {}", priority);
        }
        log::info!("==========================================");

        Ok(())
    }

    fn handle_kill(&mut self, notifier: &NotificationManager, notification: &KillNotification) {
        self.kills += notification.len();
        log::warn!("'{}': {}", self.settings.name(), notification);

        if let Err(e) = notifier.send_kill_notification(self.settings.name(), notification) {
            log::error!("Failed to send kill notification: {}", e);
        }
    }
}
