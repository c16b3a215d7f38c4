use std::time::Duration;

use bank_core::BankConfig;
use clap::Parser;

/// Demo supervisor for `bank-core`: seeds a couple of accounts and drives a scripted scenario
/// through the public API, printing a summary of what happened.
#[derive(Parser, Debug)]
#[command(name = "bank-cli", version, about = "bank-core demo supervisor")]
pub struct Args {
    /// How long an idle per-user worker may sit before shutting itself down.
    #[arg(long, default_value_t = 3600)]
    pub stale_handler_timeout_secs: u64,

    /// Liveness-check cadence for an external health-checker polling worker idleness.
    #[arg(long, default_value_t = 30)]
    pub stale_check_interval_secs: u64,

    /// Bound on each worker's inbox. Must be >= the admission cap.
    #[arg(long, default_value_t = 16)]
    pub worker_inbox_capacity: usize,

    /// How many concurrent transfers the storm scenario fires between the two demo users.
    #[arg(long, default_value_t = 40)]
    pub storm_size: usize,
}

impl Args {
    pub fn into_bank_config(self) -> Result<BankConfig, String> {
        let cfg = BankConfig {
            stale_handler_timeout: Duration::from_secs(self.stale_handler_timeout_secs.max(1)),
            stale_check_interval: Duration::from_secs(self.stale_check_interval_secs.max(1)),
            worker_inbox_capacity: self.worker_inbox_capacity,
        };
        validate(&cfg)?;
        Ok(cfg)
    }
}

fn validate(cfg: &BankConfig) -> Result<(), String> {
    if cfg.worker_inbox_capacity < bank_core::MAX_BACKLOG as usize {
        return Err(format!(
            "worker-inbox-capacity ({}) must be >= MAX_BACKLOG ({})",
            cfg.worker_inbox_capacity,
            bank_core::MAX_BACKLOG
        ));
    }
    Ok(())
}
