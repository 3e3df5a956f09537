//! Transport primitives for authenticated upstream GET requests.
//!
//! The crate depends on an HTTP stack only through [`PollHttpClient`]. The default
//! [`ReqwestHttpClient`] covers production use; tests and custom stacks implement the trait
//! directly and hand it to [`ApiClient`](crate::api::ApiClient) behind an `Arc`.
//! Implementations return every HTTP status as an [`HttpResponse`]; only failures that
//! produced no response at all become a [`TransportError`].

// self
use crate::{_prelude::*, auth::Credential, error::TransportError};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	rate_limit::{RATE_LIMIT_RESET, RETRY_AFTER},
};

/// Boxed future returned by [`PollHttpClient::get`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to issue bearer-authenticated GET requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// poller and the registry, and the returned future must be `Send` so it can run inside a
/// spawned worker task.
pub trait PollHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Issues one GET request carrying `Authorization: Bearer <token>`.
	fn get(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Fully resolved GET request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Absolute request URL.
	pub url: Url,
	/// Credential forwarded as a bearer token.
	pub credential: Credential,
}

/// Status, rate-limit headers, and body of an upstream response.
///
/// Header values are kept raw; [`RetryDirective`](crate::rate_limit::RetryDirective) parses
/// them when the status is 429.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw `Retry-After` header value.
	pub retry_after: Option<String>,
	/// Raw `X-Rate-Limit-Reset` header value.
	pub rate_limit_reset: Option<String>,
	/// Response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	const PREVIEW_LEN: usize = 256;

	/// Builds a response with the provided status and body and no rate-limit headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into(), ..Default::default() }
	}

	/// Sets the raw `Retry-After` header value.
	pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
		self.retry_after = Some(value.into());

		self
	}

	/// Sets the raw `X-Rate-Limit-Reset` header value.
	pub fn with_rate_limit_reset(mut self, value: impl Into<String>) -> Self {
		self.rate_limit_reset = Some(value.into());

		self
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns true for HTTP 429.
	pub fn is_rate_limited(&self) -> bool {
		self.status == 429
	}

	/// Lossy UTF-8 rendering of the leading bytes of the body, for logs and errors.
	pub fn body_preview(&self) -> String {
		let end = self.body.len().min(Self::PREVIEW_LEN);

		String::from_utf8_lossy(&self.body[..end]).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the provided user agent.
	pub fn with_user_agent(user_agent: &str) -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().user_agent(user_agent).build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl PollHttpClient for ReqwestHttpClient {
	fn get(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let response = self
				.0
				.get(request.url)
				.header(reqwest::header::AUTHORIZATION, request.credential.bearer())
				.send()
				.await?;
			let status = response.status().as_u16();
			let headers = response.headers();
			let header = |name: &str| {
				headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
			};
			let retry_after = header(RETRY_AFTER);
			let rate_limit_reset = header(RATE_LIMIT_RESET);
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse { status, retry_after, rate_limit_reset, body })
		})
	}
}
