//! Crate-level error types shared by the API client, pollers, caches, and registry.

// self
use crate::{_prelude::*, auth::IdentifierError, rate_limit::RetryDirective};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by subscriber callbacks and transport builders.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, body read).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A memoized computation failed earlier; the key stays bound to that failure.
	#[error(transparent)]
	Memoized(Arc<Error>),

	/// Upstream answered with HTTP 429.
	#[error("Upstream rate limit reached{}.", resume_suffix(.retry))]
	RateLimited {
		/// Resume hint parsed from `Retry-After` or `X-Rate-Limit-Reset`, if any.
		retry: Option<RetryDirective>,
	},
	/// Upstream answered with a non-success, non-429 status.
	#[error("Upstream request to `{path}` failed with HTTP {status}.")]
	Request {
		/// Request path relative to the API base URL.
		path: String,
		/// HTTP status code.
		status: u16,
		/// Leading slice of the response body, for logs.
		body_preview: String,
	},
	/// Upstream returned a payload that does not match the expected shape.
	#[error("Upstream response for `{path}` could not be decoded.")]
	Decode {
		/// Request path relative to the API base URL.
		path: String,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns true for HTTP 429 responses, looking through memoized failures.
	pub fn is_rate_limited(&self) -> bool {
		match self {
			Self::RateLimited { .. } => true,
			Self::Memoized(inner) => inner.is_rate_limited(),
			_ => false,
		}
	}

	/// Returns the parsed resume hint for HTTP 429 responses.
	pub fn retry_directive(&self) -> Option<&RetryDirective> {
		match self {
			Self::RateLimited { retry } => retry.as_ref(),
			Self::Memoized(inner) => inner.retry_directive(),
			_ => None,
		}
	}

	/// Returns the HTTP status code when the failure came from an upstream response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::RateLimited { .. } => Some(429),
			Self::Request { status, .. } => Some(*status),
			Self::Memoized(inner) => inner.status(),
			_ => None,
		}
	}
}

fn resume_suffix(retry: &Option<RetryDirective>) -> String {
	match retry {
		Some(directive) => format!("; resume at {}", directive.earliest_retry_at),
		None => String::new(),
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A base URL or request path could not be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint template must contain exactly one placeholder.
	#[error("Endpoint template `{template}` must contain exactly one `%s` placeholder, found {found}.")]
	TemplatePlaceholder {
		/// Offending template.
		template: String,
		/// Number of placeholders found.
		found: usize,
	},
	/// Requests-per-window must be positive.
	#[error("Requests per window must be greater than zero.")]
	ZeroRequestsPerWindow,
	/// Window length must be positive.
	#[error("Window length must be greater than zero.")]
	ZeroWindow,
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// Pollers spawn their worker on a Tokio runtime, which must be running.
	#[error("No Tokio runtime is available to run the poller worker.")]
	MissingRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_url(value: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		ConfigError::from(e).into()
	}
}

/// Failures that produced no upstream response at all.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
