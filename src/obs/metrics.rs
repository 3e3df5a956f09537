// self
use crate::obs::PollOutcome;

/// Records a poller event via the global metrics recorder (when enabled).
pub fn record_poll_outcome(outcome: PollOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("fair_poller_poll_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_poll_outcome_without_recorder_is_harmless() {
		record_poll_outcome(PollOutcome::RateLimited);
	}

	#[test]
	fn outcome_labels_are_stable() {
		assert_eq!(PollOutcome::SubscriberFailed.to_string(), "subscriber_failed");
		assert_eq!(PollOutcome::WorkerRestarted.as_str(), "worker_restarted");
	}
}
