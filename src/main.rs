// RSS Guard - Main entry point

use nix::sys::mman::{mlockall, MlockAllFlags};
use rss_guard::config::{Args, Settings};
use rss_guard::daemon::{self, DaemonOptions};
use rss_guard::monitor::ProcfsProvider;
use std::process;

/// Setup logging based on configuration
fn setup_logging(debug: bool, use_syslog: bool) {
    let log_level = if debug { "debug" } else { "info" };

    if use_syslog {
        #[cfg(feature = "syslog")]
        {
            use syslog::{BasicLogger, Facility, Formatter3164};
            let formatter = Formatter3164 {
                facility: Facility::LOG_DAEMON,
                hostname: None,
                process: "rss_guard".into(),
                pid: std::process::id(),
            };

            match syslog::unix(formatter) {
                Ok(logger) => {
                    let level = if debug {
                        log::LevelFilter::Debug
                    } else {
                        log::LevelFilter::Info
                    };
                    if log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
                        .map(|()| log::set_max_level(level))
                        .is_ok()
                    {
                        return;
                    }
                }
                Err(e) => eprintln!("Failed to connect to syslog: {e}"),
            }
        }

        #[cfg(not(feature = "syslog"))]
        eprintln!("Warning: --syslog requires the 'syslog' feature to be enabled");
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn main() {
    // Environment overrides first so RSS_GUARD_DEBUG reaches the logger too
    let args = match Args::parse_with_env() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    setup_logging(args.debug, args.syslog);

    // Keep the watchdog resident while the machine is under memory pressure
    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => log::info!("Memory locked successfully - daemon will not be swapped"),
        Err(e) => {
            log::warn!("Failed to lock memory: {e}. Daemon may be slow under memory pressure.");
        }
    }

    let options = match DaemonOptions::from_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    let settings = match Settings::from_args(args, &ProcfsProvider::default()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    if let Err(e) = daemon::run(settings, options) {
        eprintln!("Fatal error: {e:#}");
        process::exit(1);
    }
}
