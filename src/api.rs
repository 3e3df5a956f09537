//! Rate-aware upstream API client and identity lookups.
//!
//! [`ApiClient::fetch`] issues exactly one authenticated GET and reports HTTP 429 as
//! [`Error::RateLimited`] with the parsed resume hint, which is what the pollers need to
//! drive their own pacing. [`ApiClient::call`] wraps the same request in an unbounded retry
//! loop: it sleeps until an advertised future resume time, retries immediately when the hint
//! is in the past or missing, and propagates every non-429 failure at once.

pub mod template;

pub use template::*;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, Credential, Handle},
	error::ConfigError,
	http::{HttpRequest, PollHttpClient},
	rate_limit::RetryDirective,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Upstream API location and identity endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
	/// Base URL every request path is joined onto, treated as a directory.
	pub base_url: Url,
	/// Path of the endpoint returning the authenticated account.
	#[serde(default = "ApiConfig::default_identity_path")]
	pub identity_path: String,
	/// Template resolving a public handle to an account.
	#[serde(default = "ApiConfig::default_handle_lookup")]
	pub handle_lookup: EndpointTemplate,
}
impl ApiConfig {
	/// Default path of the authenticated-account endpoint.
	pub const IDENTITY_PATH: &str = "2/users/me";
	/// Default handle lookup template.
	pub const HANDLE_LOOKUP: &str = "2/users/by/username/%s";

	/// Creates a configuration rooted at `base_url` with the default identity endpoints.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url: with_trailing_slash(base_url),
			identity_path: Self::default_identity_path(),
			handle_lookup: Self::default_handle_lookup(),
		}
	}

	/// Parses `base_url` and creates a configuration rooted at it.
	pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(base_url).map_err(|e| ConfigError::invalid_url(base_url, e))?;

		Ok(Self::new(url))
	}

	/// Overrides the authenticated-account endpoint path.
	pub fn with_identity_path(mut self, path: impl Into<String>) -> Self {
		self.identity_path = path.into();

		self
	}

	/// Overrides the handle lookup template.
	pub fn with_handle_lookup(mut self, template: EndpointTemplate) -> Self {
		self.handle_lookup = template;

		self
	}

	/// Resolves a request path against the base URL.
	pub fn url(&self, path: &str) -> Result<Url, ConfigError> {
		let path = path.trim_start_matches('/');
		let joined = if self.base_url.path().ends_with('/') {
			self.base_url.join(path)
		} else {
			with_trailing_slash(self.base_url.clone()).join(path)
		};

		joined.map_err(|e| ConfigError::invalid_url(path, e))
	}

	fn default_identity_path() -> String {
		Self::IDENTITY_PATH.into()
	}

	fn default_handle_lookup() -> EndpointTemplate {
		EndpointTemplate(Self::HANDLE_LOOKUP.into())
	}
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

#[derive(Deserialize)]
struct UserEnvelope {
	data: UserData,
}
#[derive(Deserialize)]
struct UserData {
	id: AccountId,
}

/// Authenticated client for the upstream API.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct ApiClient {
	http_client: Arc<dyn PollHttpClient>,
	config: Arc<ApiConfig>,
}
impl ApiClient {
	/// Creates a client over a caller-provided transport.
	pub fn new(config: ApiConfig, http_client: Arc<dyn PollHttpClient>) -> Self {
		Self { http_client, config: Arc::new(config) }
	}

	/// Returns the upstream configuration.
	pub fn config(&self) -> &ApiConfig {
		&self.config
	}

	/// Issues one GET for `path` and decodes the JSON body, without retrying.
	pub async fn fetch(&self, credential: &Credential, path: &str) -> Result<Value> {
		let body = self.get_body(credential, path).await?;

		decode(path, &body)
	}

	/// Issues a GET for `path`, retrying through every HTTP 429, and decodes the body as `T`.
	///
	/// Retries are unbounded. A 429 without a usable resume hint is retried immediately, so
	/// callers that cannot tolerate a tight loop must bound this future themselves.
	pub async fn call<T>(&self, credential: &Credential, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		loop {
			match self.get_body(credential, path).await {
				Ok(body) => return decode(path, &body),
				Err(Error::RateLimited { retry: Some(directive) }) =>
					if directive.is_past() {
						tracing::warn!(
							path,
							resume_at = %directive.earliest_retry_at,
							source = %directive.source,
							"Rate-limit resume time is in the past; retrying immediately."
						);
					} else {
						tracing::info!(
							path,
							resume_at = %directive.earliest_retry_at,
							delay_ms = directive.delay().as_millis() as u64,
							"Rate limited; waiting for the advertised resume time."
						);
						tokio::time::sleep(directive.delay()).await;
					},
				Err(Error::RateLimited { retry: None }) => {
					tracing::warn!(path, "Rate limited without a resume hint; retrying immediately.");
				},
				Err(err) => return Err(err),
			}
		}
	}

	/// Resolves the account that owns `credential`.
	pub async fn account_id(&self, credential: &Credential) -> Result<AccountId> {
		let envelope = self.call::<UserEnvelope>(credential, &self.config.identity_path).await?;

		Ok(envelope.data.id)
	}

	/// Resolves a public handle to its account, authenticating with `credential`.
	pub async fn account_id_by_handle(
		&self,
		credential: &Credential,
		handle: &Handle,
	) -> Result<AccountId> {
		let path = self.config.handle_lookup.render(handle);
		let envelope = self.call::<UserEnvelope>(credential, &path).await?;

		Ok(envelope.data.id)
	}

	async fn get_body(&self, credential: &Credential, path: &str) -> Result<Vec<u8>> {
		let url = self.config.url(path)?;
		let response =
			self.http_client.get(HttpRequest { url, credential: credential.clone() }).await?;

		if response.is_success() {
			return Ok(response.body);
		}
		if response.is_rate_limited() {
			let retry = RetryDirective::from_headers(
				response.retry_after.as_deref(),
				response.rate_limit_reset.as_deref(),
				OffsetDateTime::now_utc(),
			);

			return Err(Error::RateLimited { retry });
		}

		Err(Error::Request {
			path: path.to_owned(),
			status: response.status,
			body_preview: response.body_preview(),
		})
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient {
	/// Creates a client backed by a default [`ReqwestHttpClient`].
	pub fn with_reqwest(config: ApiConfig) -> Self {
		Self::new(config, Arc::new(ReqwestHttpClient::default()))
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient").field("config", &self.config).finish()
	}
}

fn decode<T>(path: &str, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::Decode { path: path.to_owned(), source })
}
