use std::env;
use std::time::Duration;

use log::warn;

const DEFAULT_THREAD_SLEEP: Duration = Duration::from_millis(10);
const THREAD_SLEEP_ENV_VAR: &str = "PACKETMESH_THREAD_SLEEP_MS";

/// Tunables read once, at worker-thread construction time. There is no live
/// reconfiguration: a running router's quantum does not change underneath
/// it.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// How long a router or service-manager worker sleeps between polling
    /// its links/mailboxes when it finds nothing to do.
    pub thread_sleep_time: Duration,
}

impl Config {
    /// Builds a `Config`, honoring `PACKETMESH_THREAD_SLEEP_MS` when it is
    /// set to a valid, non-negative integer. A malformed value is logged
    /// and ignored rather than treated as fatal.
    pub fn from_env() -> Self {
        let thread_sleep_time = env::var(THREAD_SLEEP_ENV_VAR)
            .ok()
            .and_then(|value| match value.parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(_) => {
                    warn!(
                        "{} is set to {:?}, which is not a valid millisecond count; using default {:?}",
                        THREAD_SLEEP_ENV_VAR, value, DEFAULT_THREAD_SLEEP
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_THREAD_SLEEP);

        Config { thread_sleep_time }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            thread_sleep_time: DEFAULT_THREAD_SLEEP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quantum_is_ten_milliseconds() {
        assert_eq!(Config::default().thread_sleep_time, DEFAULT_THREAD_SLEEP);
    }

    #[test]
    fn env_override_is_honored() {
        env::set_var(THREAD_SLEEP_ENV_VAR, "1");
        assert_eq!(Config::from_env().thread_sleep_time, Duration::from_millis(1));
        env::remove_var(THREAD_SLEEP_ENV_VAR);
    }

    #[test]
    fn malformed_override_falls_back_to_default() {
        env::set_var(THREAD_SLEEP_ENV_VAR, "not-a-number");
        assert_eq!(Config::from_env().thread_sleep_time, DEFAULT_THREAD_SLEEP);
        env::remove_var(THREAD_SLEEP_ENV_VAR);
    }
}
