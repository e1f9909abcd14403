//! Exponential backoff with jitter (spec.md §4.3, §6.5): base 30s, factor 2,
//! cap 15 min, ±20% jitter.

use std::time::Duration;

use rand::Rng;

use super::config::DispatcherConfig;

/// `attempt` is the attempt number that just failed (1-based). Computes the
/// delay before the next attempt, capped and jittered.
pub fn compute_delay(config: &DispatcherConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let unjittered = config.backoff_base_s as f64 * config.backoff_factor.powi(exponent as i32);
    let capped = unjittered.min(config.backoff_cap_s as f64);

    let jitter_span = capped * config.jitter_fraction;
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    let jittered = (capped + jitter).max(0.0);

    Duration::from_secs_f64(jittered)
}
