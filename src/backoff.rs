//! Cooldown calculation for consecutive opens.

use std::time::Duration;

use crate::config::RelayConfig;

/// Cooldown to wait after the `open_count`-th consecutive open.
///
/// Without backoff this is always `cool_down`. With backoff it is
/// `min(cool_down * 2^(open_count - 1), max_cooldown)`; `open_count` of 0 is
/// treated as 1.
pub fn cooldown_for(config: &RelayConfig, open_count: u32) -> Duration {
    if !config.use_exponential_backoff {
        return config.cool_down();
    }

    let exponent = open_count.saturating_sub(1);
    let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
    let delay_ms = config.cool_down_ms.saturating_mul(factor);

    Duration::from_millis(delay_ms.min(config.max_cooldown_ms))
}
