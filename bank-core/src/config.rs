use std::time::Duration;

/// The hard per-user admission cap. This is a fixed contract the testable properties (P1, P3)
/// are written against, not a deployment-time tunable. See DESIGN.md for why it is a constant
/// rather than a `BankConfig` field.
pub const MAX_BACKLOG: u32 = 10;

/// Runtime knobs consumed by the control plane. Grounded on the teacher's
/// `KeeperConfig::from_cli_and_deployment` shape: build from defaults, let the environment
/// override, validate once.
#[derive(Debug, Clone)]
pub struct BankConfig {
    /// How long a per-user Worker may sit idle before it shuts itself down.
    pub stale_handler_timeout: Duration,
    /// Granularity at which a Worker's idle timer is effectively polled. Not currently used to
    /// drive a separate polling loop (the Worker resets a single sleep future on every message),
    /// but exposed so a future external health-checker can poll Worker liveness on the same
    /// cadence the spec names.
    pub stale_check_interval: Duration,
    /// Bound on each Worker's inbox. Must be >= `MAX_BACKLOG` since admission caps concurrent
    /// in-flight requests at `MAX_BACKLOG` per user.
    pub worker_inbox_capacity: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            stale_handler_timeout: Duration::from_secs(3600),
            stale_check_interval: Duration::from_secs(30),
            worker_inbox_capacity: 16,
        }
    }
}

impl BankConfig {
    /// Builds a `BankConfig` from defaults, overridden by environment variables:
    /// `BANK_STALE_HANDLER_TIMEOUT_SECS`, `BANK_STALE_CHECK_INTERVAL_SECS`,
    /// `BANK_WORKER_INBOX_CAPACITY`. No file formats or wire protocols are involved.
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();

        if let Some(secs) = read_env_u64("BANK_STALE_HANDLER_TIMEOUT_SECS")? {
            cfg.stale_handler_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = read_env_u64("BANK_STALE_CHECK_INTERVAL_SECS")? {
            cfg.stale_check_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(cap) = read_env_u64("BANK_WORKER_INBOX_CAPACITY")? {
            cfg.worker_inbox_capacity = cap.max(MAX_BACKLOG as u64) as usize;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), String> {
        if self.worker_inbox_capacity < MAX_BACKLOG as usize {
            return Err(format!(
                "worker_inbox_capacity ({}) must be >= MAX_BACKLOG ({})",
                self.worker_inbox_capacity, MAX_BACKLOG
            ));
        }
        if self.stale_handler_timeout.is_zero() {
            return Err("stale_handler_timeout must be > 0".to_string());
        }
        Ok(())
    }
}

fn read_env_u64(key: &str) -> Result<Option<u64>, String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| format!("invalid {key}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("invalid {key}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BankConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inbox_capacity_below_max_backlog() {
        let mut cfg = BankConfig::default();
        cfg.worker_inbox_capacity = 1;
        assert!(cfg.validate().is_err());
    }
}
