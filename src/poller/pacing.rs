//! Shared pacing clock gating every outbound request of one poller.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::Instant;
// self
use crate::rate_limit::RetryDirective;

/// Minimum spacing enforced between two requests, and the tolerance within which the clock
/// counts as "on schedule".
pub const MIN_SPACING: StdDuration = StdDuration::from_secs(1);

/// "Next eligible request time" shared by all targets of a poller.
///
/// Unset until the first request, which therefore goes out without waiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacingClock {
	next_eligible: Option<Instant>,
}
impl PacingClock {
	/// Returns the instant the next request becomes eligible, if any request was issued yet.
	pub fn next_eligible(&self) -> Option<Instant> {
		self.next_eligible
	}

	/// Returns how long a cycle starting at `now` must wait before requesting.
	pub fn delay_at(&self, now: Instant) -> StdDuration {
		pacing_delay(self.next_eligible, now)
	}

	/// Moves the next eligible instant, forwards or backwards.
	pub(crate) fn schedule(&mut self, at: Instant) {
		self.next_eligible = Some(at);
	}

	/// Moves the next eligible instant to the resume time advertised by a 429 response that
	/// was observed at `now`.
	pub(crate) fn back_off(&mut self, directive: &RetryDirective, now: Instant) {
		self.schedule(resume_instant(directive, now));
	}
}

/// Pacing policy applied before every request.
///
/// - Within one [`MIN_SPACING`] of the schedule, either side: wait exactly [`MIN_SPACING`].
/// - At least [`MIN_SPACING`] behind schedule: no wait, and no penalty carried forward.
/// - At least [`MIN_SPACING`] ahead of now: wait until the scheduled instant.
pub fn pacing_delay(next_eligible: Option<Instant>, now: Instant) -> StdDuration {
	let Some(next) = next_eligible else {
		return StdDuration::ZERO;
	};

	if next >= now {
		(next - now).max(MIN_SPACING)
	} else if now - next < MIN_SPACING {
		MIN_SPACING
	} else {
		StdDuration::ZERO
	}
}

fn resume_instant(directive: &RetryDirective, now: Instant) -> Instant {
	if directive.is_past() {
		let overdue = StdDuration::try_from(-directive.recommended_backoff).unwrap_or_default();

		now.checked_sub(overdue).unwrap_or(now)
	} else {
		now + directive.delay()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::{Duration, OffsetDateTime};
	// self
	use super::*;
	use crate::rate_limit::RetrySource;

	fn ms(value: u64) -> StdDuration {
		StdDuration::from_millis(value)
	}

	#[test]
	fn unset_clock_never_waits() {
		assert_eq!(pacing_delay(None, Instant::now()), StdDuration::ZERO);
	}

	#[test]
	fn near_schedule_waits_the_floor() {
		let now = Instant::now() + ms(10_000);

		assert_eq!(pacing_delay(Some(now), now), MIN_SPACING);
		assert_eq!(pacing_delay(Some(now + ms(999)), now), MIN_SPACING);
		assert_eq!(pacing_delay(Some(now - ms(999)), now), MIN_SPACING);
	}

	#[test]
	fn ahead_of_schedule_waits_exactly() {
		let now = Instant::now();

		assert_eq!(pacing_delay(Some(now + ms(1_000)), now), ms(1_000));
		assert_eq!(pacing_delay(Some(now + ms(60_000)), now), ms(60_000));
	}

	#[test]
	fn far_behind_schedule_catches_up() {
		let now = Instant::now() + ms(10_000);

		assert_eq!(pacing_delay(Some(now - ms(1_000)), now), StdDuration::ZERO);
		assert_eq!(pacing_delay(Some(now - ms(5_000)), now), StdDuration::ZERO);
	}

	#[test]
	fn back_off_moves_the_clock_both_ways() {
		let now = Instant::now() + ms(10_000);
		let observed = OffsetDateTime::now_utc();
		let mut clock = PacingClock::default();

		clock.back_off(
			&RetryDirective::new(
				observed + Duration::seconds(30),
				Duration::seconds(30),
				RetrySource::RetryAfter,
			),
			now,
		);

		assert_eq!(clock.next_eligible(), Some(now + ms(30_000)));

		clock.back_off(
			&RetryDirective::new(
				observed - Duration::seconds(5),
				Duration::seconds(-5),
				RetrySource::RateLimitReset,
			),
			now,
		);

		assert_eq!(clock.next_eligible(), Some(now - ms(5_000)));
		assert_eq!(clock.delay_at(now), StdDuration::ZERO);
	}
}
