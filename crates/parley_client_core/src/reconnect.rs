use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// What the manager does after an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
	/// Reconnect right away, forever.
	#[default]
	Immediate,
	/// Exponential backoff with +/-10% jitter, capped at `max`.
	Backoff { base: Duration, max: Duration },
}

impl ReconnectPolicy {
	pub fn backoff(base: Duration, max: Duration) -> Self {
		ReconnectPolicy::Backoff { base, max: max.max(base) }
	}
}

/// Delay before `attempt` (1-based) without jitter.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
	let base_ms = base.as_millis().min(u64::MAX as u128) as u64;
	let max_ms = max.as_millis().min(u64::MAX as u128) as u64;
	let pow = 2u64.saturating_pow(attempt.saturating_sub(1).min(16));
	Duration::from_millis(base_ms.saturating_mul(pow).min(max_ms))
}

pub fn schedule_reconnect(attempt: u32, base: Duration, max: Duration) -> (Instant, u64) {
	let delay_ms = backoff_delay(attempt, base, max).as_millis() as u64;
	let jitter_window = (delay_ms / 10).max(1);
	let mut rng = rand::rng();
	let jitter_offset = rng.random_range(0..=(jitter_window * 2));
	let final_ms = delay_ms.saturating_sub(jitter_window).saturating_add(jitter_offset);
	(Instant::now() + Duration::from_millis(final_ms), final_ms)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delay_doubles_until_capped() {
		let base = Duration::from_millis(500);
		let max = Duration::from_secs(30);
		assert_eq!(backoff_delay(1, base, max), Duration::from_millis(500));
		assert_eq!(backoff_delay(2, base, max), Duration::from_millis(1000));
		assert_eq!(backoff_delay(4, base, max), Duration::from_millis(4000));
		assert_eq!(backoff_delay(50, base, max), max);
	}

	#[test]
	fn attempt_zero_behaves_like_first_attempt() {
		let base = Duration::from_millis(100);
		assert_eq!(backoff_delay(0, base, DEFAULT_BACKOFF_MAX), base);
	}

	#[test]
	fn jitter_stays_within_ten_percent() {
		let base = Duration::from_millis(1000);
		for _ in 0..64 {
			let (_, ms) = schedule_reconnect(1, base, DEFAULT_BACKOFF_MAX);
			assert!((900..=1100).contains(&ms), "jittered delay out of range: {ms}");
		}
	}

	#[test]
	fn backoff_constructor_keeps_max_at_least_base() {
		let policy = ReconnectPolicy::backoff(Duration::from_secs(5), Duration::from_secs(1));
		assert_eq!(
			policy,
			ReconnectPolicy::Backoff {
				base: Duration::from_secs(5),
				max: Duration::from_secs(5)
			}
		);
		assert_eq!(ReconnectPolicy::default(), ReconnectPolicy::Immediate);
	}
}
