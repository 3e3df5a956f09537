//! Bearer credential wrapper that redacts sensitive material.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Opaque bearer token forwarded verbatim in `Authorization` headers.
///
/// The value is never interpreted. Formatters redact it, and caches key on
/// [`fingerprint`](Self::fingerprint) so the raw token never ends up in a map key or a log
/// field.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);
impl Credential {
	/// Wraps a new bearer token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns the `Authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Base64 (no padding) SHA-256 digest of the token.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		STANDARD_NO_PAD.encode(digest)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Credential").field(&"<redacted>").finish()
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_formatters_redact() {
		let credential = Credential::new("super-secret");

		assert_eq!(format!("{credential:?}"), "Credential(\"<redacted>\")");
		assert_eq!(format!("{credential}"), "<redacted>");
		assert_eq!(credential.bearer(), "Bearer super-secret");
	}

	#[test]
	fn fingerprint_is_stable_and_hides_the_token() {
		let a = Credential::new("token-a");
		let b = Credential::new("token-b");

		assert_eq!(a.fingerprint(), Credential::new("token-a").fingerprint());
		assert_ne!(a.fingerprint(), b.fingerprint());
		assert!(!a.fingerprint().contains("token-a"));
		// 32-byte digest without padding.
		assert_eq!(a.fingerprint().len(), 43);
	}
}
