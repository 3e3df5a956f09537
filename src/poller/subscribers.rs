//! Insertion-ordered target table with per-target subscriber arenas.
//!
//! Targets keep the order they were first registered in (a target that is reaped and
//! registered again moves to the back), which is the round-robin order of the worker.
//! Subscribers are keyed by monotonically increasing handles, so ordering by handle is
//! registration order.

// std
use std::ops::Bound;
// self
use crate::{_prelude::*, auth::PollTarget};

/// Shared poll payload handed to every subscriber of a target.
pub type Payload = Arc<Value>;

/// Boxed future returned by subscriber callbacks.
pub type SubscriberFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

pub(crate) type Callback = Arc<dyn Fn(Payload) -> SubscriberFuture + Send + Sync>;

/// Stable subscriber identifier, unique for the lifetime of a poller and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberHandle(pub(crate) u64);
impl SubscriberHandle {
	/// Returns the raw handle value.
	pub fn get(self) -> u64 {
		self.0
	}
}
impl Display for SubscriberHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "#{}", self.0)
	}
}

struct TargetEntry {
	target: PollTarget,
	subscribers: BTreeMap<SubscriberHandle, Callback>,
}

// Targets per poller are few, so a linear scan beats keeping a second index in sync.
#[derive(Default)]
pub(crate) struct TargetTable {
	entries: Vec<TargetEntry>,
}
impl TargetTable {
	pub(crate) fn insert(&mut self, target: PollTarget, handle: SubscriberHandle, callback: Callback) {
		match self.entry_mut(&target) {
			Some(entry) => {
				entry.subscribers.insert(handle, callback);
			},
			None => {
				let subscribers = BTreeMap::from([(handle, callback)]);

				self.entries.push(TargetEntry { target, subscribers });
			},
		}
	}

	/// Removes one subscriber, leaving an emptied target in place for lazy reaping.
	pub(crate) fn remove(&mut self, target: &str, handle: SubscriberHandle) -> bool {
		self.entry_mut(target).is_some_and(|entry| entry.subscribers.remove(&handle).is_some())
	}

	pub(crate) fn remove_target(&mut self, target: &str) {
		self.entries.retain(|entry| entry.target.as_ref() != target);
	}

	pub(crate) fn targets(&self) -> Vec<PollTarget> {
		self.entries.iter().map(|entry| entry.target.clone()).collect()
	}

	pub(crate) fn subscriber_count(&self, target: &str) -> usize {
		self.entry(target).map_or(0, |entry| entry.subscribers.len())
	}

	/// Returns the first subscriber of `target` registered after `after`.
	///
	/// Walking the table this way observes removals and additions made between calls.
	pub(crate) fn next_subscriber(
		&self,
		target: &str,
		after: Option<SubscriberHandle>,
	) -> Option<(SubscriberHandle, Callback)> {
		let subscribers = &self.entry(target)?.subscribers;
		let mut candidates = match after {
			Some(handle) => subscribers.range((Bound::Excluded(handle), Bound::Unbounded)),
			None => subscribers.range(..),
		};

		candidates.next().map(|(handle, callback)| (*handle, Arc::clone(callback)))
	}

	fn entry(&self, target: &str) -> Option<&TargetEntry> {
		self.entries.iter().find(|entry| entry.target.as_ref() == target)
	}

	fn entry_mut(&mut self, target: &str) -> Option<&mut TargetEntry> {
		self.entries.iter_mut().find(|entry| entry.target.as_ref() == target)
	}
}
