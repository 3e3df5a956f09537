//! Resume hints parsed from upstream 429 responses.
//!
//! Providers advertise when a throttled caller may try again through either a relative
//! `Retry-After` header (seconds, or an HTTP-date) or an absolute `X-Rate-Limit-Reset`
//! header (Unix epoch seconds). [`RetryDirective::from_headers`] prefers `Retry-After` and
//! falls back to the reset header when the former is missing or unparseable.

// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Lower-cased name of the relative resume header.
pub const RETRY_AFTER: &str = "retry-after";
/// Lower-cased name of the absolute (epoch seconds) resume header.
pub const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Header a [`RetryDirective`] was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetrySource {
	/// `Retry-After`, relative seconds or HTTP-date.
	RetryAfter,
	/// `X-Rate-Limit-Reset`, absolute epoch seconds.
	RateLimitReset,
}
impl RetrySource {
	/// Returns the header name the directive was read from.
	pub const fn header(self) -> &'static str {
		match self {
			RetrySource::RetryAfter => RETRY_AFTER,
			RetrySource::RateLimitReset => RATE_LIMIT_RESET,
		}
	}
}
impl Display for RetrySource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.header())
	}
}

/// Advises callers when a throttled request may be retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Wall-clock instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Delay between the moment the response was observed and `earliest_retry_at`.
	///
	/// Negative when the upstream advertised an instant that already passed.
	pub recommended_backoff: Duration,
	/// Header the directive was parsed from.
	pub source: RetrySource,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(
		earliest_retry_at: OffsetDateTime,
		recommended_backoff: Duration,
		source: RetrySource,
	) -> Self {
		Self { earliest_retry_at, recommended_backoff, source }
	}

	/// Parses raw header values observed at `observed_at`.
	///
	/// Returns `None` when neither header carries a usable value.
	pub fn from_headers(
		retry_after: Option<&str>,
		rate_limit_reset: Option<&str>,
		observed_at: OffsetDateTime,
	) -> Option<Self> {
		retry_after
			.and_then(|raw| parse_retry_after(raw, observed_at))
			.or_else(|| rate_limit_reset.and_then(|raw| parse_rate_limit_reset(raw, observed_at)))
	}

	/// Returns true when the advertised instant already passed. A zero back-off means "now".
	pub fn is_past(&self) -> bool {
		self.recommended_backoff.is_negative()
	}

	/// Returns the non-negative delay to wait before retrying.
	pub fn delay(&self) -> std::time::Duration {
		std::time::Duration::try_from(self.recommended_backoff).unwrap_or_default()
	}
}

fn parse_retry_after(raw: &str, observed_at: OffsetDateTime) -> Option<RetryDirective> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		let backoff = Duration::seconds(secs.into());

		return Some(RetryDirective::new(observed_at + backoff, backoff, RetrySource::RetryAfter));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		return Some(RetryDirective::new(moment, moment - observed_at, RetrySource::RetryAfter));
	}

	None
}

fn parse_rate_limit_reset(raw: &str, observed_at: OffsetDateTime) -> Option<RetryDirective> {
	let epoch = raw.trim().parse::<i64>().ok()?;
	let moment = OffsetDateTime::from_unix_timestamp(epoch).ok()?;

	Some(RetryDirective::new(moment, moment - observed_at, RetrySource::RateLimitReset))
}
