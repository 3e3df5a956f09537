//! Observability helpers for poller workers.
//!
//! Pollers always log through `tracing`; installing a subscriber is left to the application.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `fair_poller_poll_total` counter for every poll and
//!   delivery event, labeled by `outcome`.

mod metrics;

pub use metrics::*;

// self
use crate::_prelude::*;

/// Events recorded by a poller worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PollOutcome {
	/// A poll returned a payload.
	Success,
	/// A poll failed for a reason other than rate limiting.
	Failed,
	/// A poll was answered with HTTP 429.
	RateLimited,
	/// A target was reaped after losing its last subscriber.
	TargetDropped,
	/// A subscriber callback completed.
	Delivered,
	/// A subscriber callback returned an error or panicked.
	SubscriberFailed,
	/// The worker restarted after a fatal error.
	WorkerRestarted,
}
impl PollOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PollOutcome::Success => "success",
			PollOutcome::Failed => "failed",
			PollOutcome::RateLimited => "rate_limited",
			PollOutcome::TargetDropped => "target_dropped",
			PollOutcome::Delivered => "delivered",
			PollOutcome::SubscriberFailed => "subscriber_failed",
			PollOutcome::WorkerRestarted => "worker_restarted",
		}
	}
}
impl Display for PollOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
