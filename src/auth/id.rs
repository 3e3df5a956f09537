//! Strongly typed identifiers used as poll targets and cache keys.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (account, target, handle).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (account, target, handle).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (account, target, handle).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { AccountId, "Upstream account identity resolved from a credential.", "Account" }
def_id! { PollTarget, "Identifier substituted into an endpoint template and polled periodically.", "Target" }
def_id! { Handle, "Public account handle (username) used for identity lookups.", "Handle" }

impl Handle {
	/// Builds a handle from user input, trimming surrounding whitespace and lower-casing it.
	pub fn normalized(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Self::new(value.as_ref().trim().to_lowercase())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty() {
		assert!(PollTarget::new(" 12345").is_err(), "Leading whitespace must be rejected.");
		assert!(PollTarget::new("12345 ").is_err(), "Trailing whitespace must be rejected.");

		let target = PollTarget::new("12345").expect("Target fixture should be considered valid.");

		assert_eq!(target.as_ref(), "12345");
		assert!(AccountId::new("").is_err());
		assert!(Handle::new("with space").is_err());
	}

	#[test]
	fn handles_normalize_case_and_padding() {
		let handle = Handle::normalized("  JackDorsey \n").expect("Padded handle should normalize.");

		assert_eq!(handle.as_ref(), "jackdorsey");
		assert!(Handle::normalized("   ").is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let target: PollTarget =
			serde_json::from_str("\"1460323737035677698\"").expect("Target should deserialize.");

		assert_eq!(target.as_ref(), "1460323737035677698");
		assert!(serde_json::from_str::<PollTarget>("\"with space\"").is_err());
	}

	#[test]
	fn parsing_validates_like_new() {
		let target: PollTarget = "42".parse().expect("Numeric target should parse.");

		assert_eq!(target, PollTarget::new("42").expect("Numeric target should be valid."));
		assert_eq!(String::from(target), "42");
		assert!("with space".parse::<AccountId>().is_err());
	}

	#[test]
	fn length_limits() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		AccountId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(
			AccountId::new(&too_long),
			Err(IdentifierError::TooLong { kind: "Account", .. })
		));
	}
}
