//! Process-wide registry handing out one shared [`FairPoller`] per account and endpoint.
//!
//! Two memoizing caches back the registry. The identity cache resolves a credential (keyed by
//! its fingerprint) or a public handle to an [`AccountId`] at most once. The poller cache is
//! keyed by `account/endpoint-without-query`, so every consumer whose credential resolves to
//! the same account shares one request quota for that endpoint, whatever query suffix or
//! token it brings. Both caches keep failures as well as successes.

// self
use crate::{
	_prelude::*,
	api::ApiClient,
	auth::{AccountId, Credential, Handle},
	cache::MemoCache,
	poller::{FairPoller, PollerConfig},
};
#[cfg(feature = "reqwest")] use crate::api::ApiConfig;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum IdentityKey {
	Credential(String),
	Handle(Handle),
}

/// Shares pollers between consumers that poll the same endpoint for the same account.
#[derive(Debug)]
pub struct PollerRegistry {
	api: ApiClient,
	identities: MemoCache<IdentityKey, AccountId>,
	pollers: MemoCache<String, FairPoller>,
}
impl PollerRegistry {
	/// Creates an empty registry issuing requests through `api`.
	pub fn new(api: ApiClient) -> Self {
		Self { api, identities: MemoCache::new(), pollers: MemoCache::new() }
	}

	/// Returns the client used for identity lookups and by every poller.
	pub fn api(&self) -> &ApiClient {
		&self.api
	}

	/// Resolves the account owning `credential`, asking upstream at most once per token.
	pub async fn account_id(&self, credential: &Credential) -> Result<AccountId> {
		let key = IdentityKey::Credential(credential.fingerprint());

		self.identities.get_or_create(key, || self.api.account_id(credential)).await
	}

	/// Resolves a public handle to its account, asking upstream at most once per handle.
	pub async fn account_id_by_handle(
		&self,
		credential: &Credential,
		handle: &Handle,
	) -> Result<AccountId> {
		let key = IdentityKey::Handle(handle.clone());

		self.identities.get_or_create(key, || self.api.account_id_by_handle(credential, handle)).await
	}

	/// Returns the poller for `config`'s account and endpoint, creating it on first use.
	///
	/// The first configuration to reach a key decides the quota and credential of the shared
	/// poller; later callers get that instance unchanged.
	pub async fn get_poller(&self, config: PollerConfig) -> Result<FairPoller> {
		config.validate()?;

		let account = self.account_id(&config.credential).await?;
		let key = format!("{account}/{}", config.endpoint.without_query());
		let poller = self
			.pollers
			.get_or_create(key.clone(), || {
				let api = self.api.clone();
				let config = config.clone();
				let key = key.clone();

				async move {
					tracing::info!(
						poller = %key,
						interval_ms = config.interval().as_millis() as u64,
						"Creating poller."
					);

					Ok(FairPoller::new(config, api)?)
				}
			})
			.await?;
		let existing = poller.config();

		if existing.requests_per_window != config.requests_per_window
			|| existing.window_ms != config.window_ms
		{
			tracing::debug!(
				poller = %key,
				requested_per_window = config.requests_per_window,
				requested_window_ms = config.window_ms,
				active_per_window = existing.requests_per_window,
				active_window_ms = existing.window_ms,
				"Poller already exists with a different quota; keeping the existing one."
			);
		}

		Ok(poller)
	}

	/// Number of poller keys created or being created.
	pub fn poller_count(&self) -> usize {
		self.pollers.len()
	}
}
#[cfg(feature = "reqwest")]
impl PollerRegistry {
	/// Creates a registry backed by a default reqwest transport.
	pub fn with_reqwest(config: ApiConfig) -> Self {
		Self::new(ApiClient::with_reqwest(config))
	}
}
