//! Configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use accrollup_smt::{DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH};
use tracing::warn;

/// Host configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Soft transactions taken from the queue per block
    pub max_soft_transactions: usize,
    /// Hard transactions fetched from the parent chain per block
    pub max_hard_transactions: usize,
    /// Parent chain blocks to wait after submission before confirming
    pub confirmation_period: u64,
    /// Seconds between confirmation sweeps
    pub confirmation_interval: u64,
    /// Seconds between blocks (node binary)
    pub block_time: u64,
    /// Maximum queued soft transactions
    pub queue_capacity: usize,
    /// Depth of the account tree
    pub state_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_soft_transactions: 10,
            max_hard_transactions: 100,
            confirmation_period: 0,
            confirmation_interval: 5,
            block_time: 2,
            queue_capacity: 10_000,
            state_depth: DEFAULT_TREE_DEPTH,
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_soft_transactions: env_or("MAX_SOFT_TRANSACTIONS", defaults.max_soft_transactions),
            max_hard_transactions: env_or("MAX_HARD_TRANSACTIONS", defaults.max_hard_transactions),
            confirmation_period: env_or("CONFIRMATION_PERIOD", defaults.confirmation_period),
            confirmation_interval: env_or("CONFIRMATION_INTERVAL", defaults.confirmation_interval),
            block_time: env_or("BLOCK_TIME", defaults.block_time),
            queue_capacity: env_or("QUEUE_CAPACITY", defaults.queue_capacity),
            state_depth: checked_depth(env_or("STATE_DEPTH", defaults.state_depth)),
        }
    }

    /// Time between confirmation sweeps
    pub const fn confirmation_interval(&self) -> Duration {
        Duration::from_secs(self.confirmation_interval)
    }

    /// Time between blocks
    pub const fn block_time(&self) -> Duration {
        Duration::from_secs(self.block_time)
    }
}

/// Depths the account tree cannot have fall back to the default
fn checked_depth(depth: usize) -> usize {
    if depth > MAX_TREE_DEPTH {
        warn!("STATE_DEPTH {} exceeds {}, using {}", depth, MAX_TREE_DEPTH, DEFAULT_TREE_DEPTH);
        return DEFAULT_TREE_DEPTH;
    }
    depth
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_soft_transactions, 10);
        assert_eq!(config.confirmation_period, 0);
        assert_eq!(config.confirmation_interval(), Duration::from_secs(5));
        assert_eq!(config.state_depth, 32);
    }

    #[test]
    fn test_state_depth_is_bounded() {
        assert_eq!(checked_depth(8), 8);
        assert_eq!(checked_depth(MAX_TREE_DEPTH), MAX_TREE_DEPTH);
        assert_eq!(checked_depth(40), DEFAULT_TREE_DEPTH);

        env::set_var("STATE_DEPTH", "40");
        assert_eq!(Config::from_env().state_depth, DEFAULT_TREE_DEPTH);
        env::remove_var("STATE_DEPTH");
    }

    #[test]
    fn test_env_or_ignores_garbage() {
        assert_eq!(env_or("ACCROLLUP_TEST_UNSET_VARIABLE", 7u64), 7);
        env::set_var("ACCROLLUP_TEST_GARBAGE_VARIABLE", "seven");
        assert_eq!(env_or("ACCROLLUP_TEST_GARBAGE_VARIABLE", 7u64), 7);
        env::set_var("ACCROLLUP_TEST_NUMERIC_VARIABLE", "9");
        assert_eq!(env_or("ACCROLLUP_TEST_NUMERIC_VARIABLE", 7u64), 9);
    }
}
