//! Fair, rate-paced polling of one endpoint template for many subscribers.
//!
//! A [`FairPoller`] owns one request quota. Its worker walks the registered targets in
//! insertion order, one paced request per target, and hands every successful payload to the
//! target's subscribers in registration order. Every target of an instance shares one
//! [`PacingClock`], so a rate-limit response on any target postpones all of them.
//!
//! The worker runs only while there is something to poll: a pass that starts with no targets
//! parks it in [`WorkerState::Idle`], and the next [`FairPoller::register`] starts it again.
//! A panic escaping the worker is logged and the worker is re-spawned from the shared
//! instance after [`RESTART_DELAY`].

pub mod pacing;

mod stats;
mod subscribers;

pub use pacing::{MIN_SPACING, PacingClock};
pub use stats::PollerStats;
pub use subscribers::{Payload, SubscriberFuture, SubscriberHandle};

pub use crate::api::EndpointTemplate;

// std
use std::{
	sync::{
		Weak,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use tokio::{runtime::Handle as RuntimeHandle, time::Instant};
use tracing::Instrument;
// self
use crate::{
	_prelude::*,
	api::ApiClient,
	auth::{Credential, PollTarget},
	error::ConfigError,
	obs::{self, PollOutcome},
};
use subscribers::{Callback, TargetTable};

/// Delay between a worker panic and the restarted worker.
pub const RESTART_DELAY: StdDuration = StdDuration::from_secs(1);

/// Quota, endpoint, and credential of one poller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollerConfig {
	/// Requests allowed per window.
	pub requests_per_window: u32,
	/// Window length in milliseconds.
	pub window_ms: u64,
	/// Endpoint polled for every target.
	pub endpoint: EndpointTemplate,
	/// Credential the requests are sent with.
	pub credential: Credential,
}
impl PollerConfig {
	/// Creates a configuration allowing `requests_per_window` requests every `window`.
	pub fn new(
		requests_per_window: u32,
		window: StdDuration,
		endpoint: EndpointTemplate,
		credential: Credential,
	) -> Self {
		let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

		Self { requests_per_window, window_ms, endpoint, credential }
	}

	/// Rejects quotas that cannot be paced.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.requests_per_window == 0 {
			return Err(ConfigError::ZeroRequestsPerWindow);
		}
		if self.window_ms == 0 {
			return Err(ConfigError::ZeroWindow);
		}

		Ok(())
	}

	/// Returns the window length.
	pub fn window(&self) -> StdDuration {
		StdDuration::from_millis(self.window_ms)
	}

	/// Returns the spacing between two requests, `window / requests_per_window`.
	pub fn interval(&self) -> StdDuration {
		self.window() / self.requests_per_window.max(1)
	}
}

/// Lifecycle of a poller's worker task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
	/// No worker is running; the next registration starts one.
	Idle,
	/// A worker is polling.
	Running,
	/// The worker panicked and is waiting to be restarted.
	RestartPending,
}

struct State {
	targets: TargetTable,
	worker: WorkerState,
}

struct Shared {
	config: PollerConfig,
	interval: StdDuration,
	label: String,
	api: ApiClient,
	runtime: RuntimeHandle,
	// Subscribers and the worker state share one lock so that "no targets, go idle" and
	// "registered, start the worker" cannot interleave.
	state: Mutex<State>,
	// Written only by the worker.
	pacing: Mutex<PacingClock>,
	stats: PollerStats,
	next_handle: AtomicU64,
}
impl Shared {
	fn subscribe(self: &Arc<Self>, target: PollTarget, callback: Callback) -> Subscription {
		let handle = SubscriberHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
		let start = {
			let mut state = self.state.lock();

			state.targets.insert(target.clone(), handle, callback);

			if state.worker == WorkerState::Idle {
				state.worker = WorkerState::Running;

				true
			} else {
				false
			}
		};

		tracing::debug!(endpoint = %self.label, poll_target = %target, %handle, "Subscriber registered.");

		if start {
			tracing::debug!(endpoint = %self.label, "Starting poll worker.");

			self.runtime.spawn(Arc::clone(self).supervise());
		}

		Subscription { shared: Arc::downgrade(self), target, handle }
	}

	fn unsubscribe(&self, target: &str, handle: SubscriberHandle) -> bool {
		let removed = self.state.lock().targets.remove(target, handle);

		if removed {
			tracing::debug!(endpoint = %self.label, poll_target = target, %handle, "Subscriber removed.");
		}

		removed
	}

	fn set_worker(&self, worker: WorkerState) {
		self.state.lock().worker = worker;
	}

	fn record(&self, outcome: PollOutcome) {
		self.stats.record(outcome);
		obs::record_poll_outcome(outcome);
	}

	async fn supervise(self: Arc<Self>) {
		loop {
			let worker = self.runtime.spawn(Arc::clone(&self).run());

			match worker.await {
				Ok(()) => return,
				Err(e) if e.is_panic() => {
					tracing::error!(
						endpoint = %self.label,
						error = %e,
						"Poll worker panicked; restarting after {}ms.",
						RESTART_DELAY.as_millis()
					);

					self.record(PollOutcome::WorkerRestarted);
					self.set_worker(WorkerState::RestartPending);

					tokio::time::sleep(RESTART_DELAY).await;

					self.set_worker(WorkerState::Running);
				},
				Err(e) => {
					tracing::debug!(endpoint = %self.label, error = %e, "Poll worker cancelled.");

					self.set_worker(WorkerState::Idle);

					return;
				},
			}
		}
	}

	async fn run(self: Arc<Self>) {
		loop {
			let targets = {
				let mut state = self.state.lock();
				let targets = state.targets.targets();

				if targets.is_empty() {
					state.worker = WorkerState::Idle;
				}

				targets
			};

			if targets.is_empty() {
				tracing::debug!(endpoint = %self.label, "No targets left; poll worker is going idle.");

				return;
			}

			for target in targets {
				let span = tracing::info_span!(
					"fair_poller.poll",
					endpoint = %self.label,
					poll_target = %target
				);

				self.poll_target(&target).instrument(span).await;
			}
		}
	}

	async fn poll_target(&self, target: &PollTarget) {
		let delay = self.pacing.lock().delay_at(Instant::now());

		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		if self.reap_if_empty(target) {
			return;
		}

		self.pacing.lock().schedule(Instant::now() + self.interval);
		self.stats.record_request();

		let path = self.config.endpoint.render(target);

		match self.api.fetch(&self.config.credential, &path).await {
			Ok(payload) => {
				self.record(PollOutcome::Success);
				self.deliver(target, Arc::new(payload)).await;
			},
			Err(e) => self.handle_failure(&e),
		}
	}

	/// Drops `target` if it has no subscribers left.
	fn reap_if_empty(&self, target: &PollTarget) -> bool {
		{
			let mut state = self.state.lock();

			if state.targets.subscriber_count(target) > 0 {
				return false;
			}

			state.targets.remove_target(target);
		}

		tracing::debug!("Target has no subscribers left; dropping it.");

		self.record(PollOutcome::TargetDropped);

		true
	}

	async fn deliver(&self, target: &PollTarget, payload: Payload) {
		let mut after = None;

		loop {
			let next = self.state.lock().targets.next_subscriber(target, after);
			let Some((handle, callback)) = next else {
				break;
			};
			let payload = Arc::clone(&payload);

			after = Some(handle);

			match self.runtime.spawn(async move { callback(payload).await }).await {
				Ok(Ok(())) => self.record(PollOutcome::Delivered),
				Ok(Err(e)) => {
					tracing::warn!(%handle, error = %e, "Subscriber callback failed.");

					self.record(PollOutcome::SubscriberFailed);
				},
				Err(e) => {
					tracing::warn!(%handle, error = %e, "Subscriber callback panicked.");

					self.record(PollOutcome::SubscriberFailed);
				},
			}
		}

		self.reap_if_empty(target);
	}

	fn handle_failure(&self, err: &Error) {
		if !err.is_rate_limited() {
			tracing::error!(error = %err, status = ?err.status(), "Poll request failed.");

			self.record(PollOutcome::Failed);

			return;
		}

		self.record(PollOutcome::RateLimited);

		let Some(directive) = err.retry_directive() else {
			tracing::warn!("Rate limited without a resume hint; keeping the regular pacing.");

			return;
		};

		if directive.is_past() {
			tracing::warn!(
				resume_at = %directive.earliest_retry_at,
				source = %directive.source,
				"Rate-limit resume time is already in the past."
			);
		} else {
			let delay = directive.delay();

			if delay > self.config.window() {
				tracing::warn!(
					delay_ms = delay.as_millis() as u64,
					window_ms = self.config.window_ms,
					"Rate-limit back-off exceeds a full window."
				);
			}

			tracing::warn!(
				resume_at = %directive.earliest_retry_at,
				delay_ms = delay.as_millis() as u64,
				"Rate limited; postponing every target of this poller."
			);
		}

		self.pacing.lock().back_off(directive, Instant::now());
	}
}

/// Shared, rate-paced poller for one endpoint template and credential.
///
/// Cloning is cheap and yields a handle to the same instance.
#[derive(Clone)]
pub struct FairPoller {
	shared: Arc<Shared>,
}
impl FairPoller {
	/// Creates an idle poller.
	///
	/// Must be called from within a Tokio runtime; the worker is spawned onto it.
	pub fn new(config: PollerConfig, api: ApiClient) -> Result<Self, ConfigError> {
		config.validate()?;

		let runtime = RuntimeHandle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let shared = Shared {
			interval: config.interval(),
			label: config.endpoint.label(),
			config,
			api,
			runtime,
			state: Mutex::new(State { targets: TargetTable::default(), worker: WorkerState::Idle }),
			pacing: Mutex::new(PacingClock::default()),
			stats: PollerStats::default(),
			next_handle: AtomicU64::new(0),
		};

		Ok(Self { shared: Arc::new(shared) })
	}

	/// Subscribes `callback` to every successful poll of `target`, starting the worker if it
	/// is idle.
	pub fn register<F, Fut>(&self, target: PollTarget, callback: F) -> Subscription
	where
		F: 'static + Send + Sync + Fn(Payload) -> Fut,
		Fut: 'static + Send + Future<Output = Result<(), BoxError>>,
	{
		let boxed: Callback =
			Arc::new(move |payload: Payload| -> SubscriberFuture { Box::pin(callback(payload)) });

		self.shared.subscribe(target, boxed)
	}

	/// Like [`register`](Self::register), decoding every payload into `T` first.
	///
	/// A payload that does not decode counts as a failure of this subscriber only.
	pub fn register_typed<T, F, Fut>(&self, target: PollTarget, callback: F) -> Subscription
	where
		T: 'static + Send + DeserializeOwned,
		F: 'static + Send + Sync + Fn(T) -> Fut,
		Fut: 'static + Send + Future<Output = Result<(), BoxError>>,
	{
		let path = self.shared.config.endpoint.render(&target);
		let callback = Arc::new(callback);

		self.register(target, move |payload: Payload| {
			let callback = Arc::clone(&callback);
			let path = path.clone();

			async move {
				let value = serde_path_to_error::deserialize::<_, T>(&*payload)
					.map_err(|source| Error::Decode { path, source })?;

				callback(value).await
			}
		})
	}

	/// Removes one subscriber. Returns false if it was not registered.
	///
	/// The target itself is dropped lazily, the next time the worker reaches it.
	pub fn unregister(&self, target: &str, handle: SubscriberHandle) -> bool {
		self.shared.unsubscribe(target, handle)
	}

	/// Returns the known targets in polling order, including ones awaiting reaping.
	pub fn targets(&self) -> Vec<PollTarget> {
		self.shared.state.lock().targets.targets()
	}

	/// Returns the number of live subscribers of `target`.
	pub fn subscriber_count(&self, target: &str) -> usize {
		self.shared.state.lock().targets.subscriber_count(target)
	}

	/// Returns the worker's lifecycle state.
	pub fn worker_state(&self) -> WorkerState {
		self.shared.state.lock().worker
	}

	/// Returns true unless the worker is idle.
	pub fn is_running(&self) -> bool {
		self.worker_state() != WorkerState::Idle
	}

	/// Returns the instant the next request becomes eligible, once any request was issued.
	pub fn next_eligible(&self) -> Option<Instant> {
		self.shared.pacing.lock().next_eligible()
	}

	/// Returns the spacing between two requests.
	pub fn interval(&self) -> StdDuration {
		self.shared.interval
	}

	/// Returns the configuration this poller was created with.
	pub fn config(&self) -> &PollerConfig {
		&self.shared.config
	}

	/// Returns the activity counters.
	pub fn stats(&self) -> &PollerStats {
		&self.shared.stats
	}

	/// Returns true if both handles refer to the same poller.
	pub fn same_instance(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.shared, &other.shared)
	}
}
impl Debug for FairPoller {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FairPoller")
			.field("endpoint", &self.shared.label)
			.field("interval", &self.shared.interval)
			.field("worker", &self.worker_state())
			.finish()
	}
}

/// Registration receipt; [`unregister`](Self::unregister) removes the subscriber.
///
/// Dropping the receipt keeps the subscriber registered.
#[must_use = "the subscription is the only way to unregister this subscriber"]
#[derive(Clone, Debug)]
pub struct Subscription {
	shared: Weak<Shared>,
	target: PollTarget,
	handle: SubscriberHandle,
}
impl Subscription {
	/// Returns the subscribed target.
	pub fn target(&self) -> &PollTarget {
		&self.target
	}

	/// Returns the subscriber handle.
	pub fn handle(&self) -> SubscriberHandle {
		self.handle
	}

	/// Removes the subscriber. Returns false if it was already removed or the poller is gone.
	pub fn unregister(&self) -> bool {
		self.shared.upgrade().is_some_and(|shared| shared.unsubscribe(&self.target, self.handle))
	}
}
