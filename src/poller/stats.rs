//! Per-poller activity counters, readable through [`FairPoller::stats`](super::FairPoller::stats).

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::PollOutcome;

/// Thread-safe counters describing one poller's activity.
#[derive(Debug, Default)]
pub struct PollerStats {
	requests: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	rate_limited: AtomicU64,
	dropped_targets: AtomicU64,
	deliveries: AtomicU64,
	subscriber_failures: AtomicU64,
	restarts: AtomicU64,
}
impl PollerStats {
	/// Returns the number of upstream requests issued.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of polls that produced a payload.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of polls that failed for reasons other than rate limiting.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of polls answered with HTTP 429.
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	/// Returns the number of targets reaped after losing their last subscriber.
	pub fn dropped_targets(&self) -> u64 {
		self.dropped_targets.load(Ordering::Relaxed)
	}

	/// Returns the number of successful subscriber callbacks.
	pub fn deliveries(&self) -> u64 {
		self.deliveries.load(Ordering::Relaxed)
	}

	/// Returns the number of subscriber callbacks that failed or panicked.
	pub fn subscriber_failures(&self) -> u64 {
		self.subscriber_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of times the worker was restarted after a fatal error.
	pub fn restarts(&self) -> u64 {
		self.restarts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record(&self, outcome: PollOutcome) {
		let counter = match outcome {
			PollOutcome::Success => &self.successes,
			PollOutcome::Failed => &self.failures,
			PollOutcome::RateLimited => &self.rate_limited,
			PollOutcome::TargetDropped => &self.dropped_targets,
			PollOutcome::Delivered => &self.deliveries,
			PollOutcome::SubscriberFailed => &self.subscriber_failures,
			PollOutcome::WorkerRestarted => &self.restarts,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}
