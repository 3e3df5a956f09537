//! Endpoint templates with a single target placeholder.

// self
use crate::{_prelude::*, error::ConfigError};

/// Placeholder substituted with the (percent-encoded) target identifier.
pub const PLACEHOLDER: &str = "%s";

/// Request path containing exactly one [`PLACEHOLDER`] plus an optional query suffix.
///
/// ```
/// use fair_poller::api::EndpointTemplate;
///
/// let template = EndpointTemplate::new("1.1/followers/list.json?user_id=%s&count=200")?;
///
/// assert_eq!(template.render("42"), "1.1/followers/list.json?user_id=42&count=200");
/// assert_eq!(template.without_query(), "1.1/followers/list.json");
/// # Ok::<(), fair_poller::error::ConfigError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointTemplate(pub(crate) String);
impl EndpointTemplate {
	/// Validates that `value` carries exactly one placeholder.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();
		let found = value.matches(PLACEHOLDER).count();

		if found != 1 {
			return Err(ConfigError::TemplatePlaceholder { template: value, found });
		}

		Ok(Self(value))
	}

	/// Substitutes `target` into the placeholder.
	pub fn render(&self, target: &str) -> String {
		let encoded = url::form_urlencoded::byte_serialize(target.as_bytes()).collect::<String>();

		self.0.replacen(PLACEHOLDER, &encoded, 1)
	}

	/// Returns the template with everything from the first `?` removed.
	pub fn without_query(&self) -> &str {
		match self.0.split_once('?') {
			Some((path, _)) => path,
			None => &self.0,
		}
	}

	/// Log-friendly rendering with the placeholder spelled out.
	pub fn label(&self) -> String {
		self.0.replacen(PLACEHOLDER, "<param>", 1)
	}

	/// Returns the raw template.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for EndpointTemplate {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<EndpointTemplate> for String {
	fn from(value: EndpointTemplate) -> Self {
		value.0
	}
}
impl TryFrom<String> for EndpointTemplate {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for EndpointTemplate {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for EndpointTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "EndpointTemplate({})", self.0)
	}
}
impl Display for EndpointTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn placeholder_count_is_enforced() {
		assert!(matches!(
			EndpointTemplate::new("2/tweets/liking_users"),
			Err(ConfigError::TemplatePlaceholder { found: 0, .. })
		));
		assert!(matches!(
			EndpointTemplate::new("2/%s/x/%s"),
			Err(ConfigError::TemplatePlaceholder { found: 2, .. })
		));
		assert!(EndpointTemplate::new("2/tweets/%s/liking_users").is_ok());
	}

	#[test]
	fn render_encodes_targets() {
		let template =
			EndpointTemplate::new("2/tweets/%s/liking_users?user.fields=id").expect("Valid template.");

		assert_eq!(template.render("1460323737035677698"), "2/tweets/1460323737035677698/liking_users?user.fields=id");
		assert_eq!(template.render("a/b?c"), "2/tweets/a%2Fb%3Fc/liking_users?user.fields=id");
		assert_eq!(template.label(), "2/tweets/<param>/liking_users?user.fields=id");
	}

	#[test]
	fn query_suffix_is_stripped_for_sharing() {
		let a = EndpointTemplate::new("2/tweets/%s/liking_users?user.fields=id").expect("Valid template.");
		let b = EndpointTemplate::new("2/tweets/%s/liking_users").expect("Valid template.");

		assert_eq!(a.without_query(), b.without_query());
		assert!(serde_json::from_str::<EndpointTemplate>("\"no/placeholder\"").is_err());
	}
}
