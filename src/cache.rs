//! Single-flight memoizing cache for async get-or-create lookups.
//!
//! Each key owns an async once-cell. The first caller runs the factory while concurrent
//! callers for the same key await the same computation. The outcome is permanent: a
//! success is returned to every later caller, and so is a failure, wrapped in
//! [`Error::Memoized`] so it can be shared. Nothing expires, is evicted, or is invalidated.

// self
use crate::_prelude::*;

type Outcome<V> = Result<V, Arc<Error>>;
type Slot<V> = Arc<AsyncOnceCell<Outcome<V>>>;

/// Thread-safe single-flight cache with permanent entries.
pub struct MemoCache<K, V> {
	slots: Mutex<HashMap<K, Slot<V>>>,
}
impl<K, V> MemoCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self { slots: Mutex::new(HashMap::new()) }
	}

	/// Returns the value bound to `key`, running `factory` only if no computation for the key
	/// has started yet.
	///
	/// If the task driving a pending computation is dropped, one of the waiters runs its own
	/// factory instead, so a key is never bound to a cancelled computation.
	pub async fn get_or_create<F, Fut>(&self, key: K, factory: F) -> Result<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V>>,
	{
		let slot = self.slots.lock().entry(key).or_default().clone();
		let outcome = slot.get_or_init(|| async move { factory().await.map_err(Arc::new) }).await;

		match outcome {
			Ok(value) => Ok(value.clone()),
			Err(err) => Err(Error::Memoized(err.clone())),
		}
	}

	/// Returns the value for `key` if it resolved successfully.
	pub fn get<Q>(&self, key: &Q) -> Option<V>
	where
		K: std::borrow::Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		let slot = self.slots.lock().get(key).cloned()?;

		slot.get().and_then(|outcome| outcome.as_ref().ok().cloned())
	}

	/// Number of keys that are resolved or pending.
	pub fn len(&self) -> usize {
		self.slots.lock().len()
	}

	/// Returns true if no key was ever requested.
	pub fn is_empty(&self) -> bool {
		self.slots.lock().is_empty()
	}
}
impl<K, V> Default for MemoCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, V> Debug for MemoCache<K, V> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoCache").field("keys", &self.slots.lock().len()).finish()
	}
}
