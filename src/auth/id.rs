//! Strongly typed identifiers for clients and token resources.
//!
//! Resources are usually App ID URIs or API base URLs. They double as cache keys and hidden-frame
//! names, where whitespace would break the `resource` query parameter and the frame lookup.

// std
use std::{borrow::Borrow, ops::Deref};
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
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
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

// Tenant-scoped App ID URIs with path segments routinely exceed 128 characters.
const IDENTIFIER_MAX_LEN: usize = 512;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, resource).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, resource).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, resource).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "OAuth client (application) identifier registered with a provider.", "Client" }
def_id! { ResourceId, "Identifier of the API or audience a token is scoped to.", "Resource" }

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
	fn identifiers_reject_whitespace_and_empty_values() {
		assert!(ResourceId::new(" https://graph.example.com").is_err());
		assert!(ResourceId::new("https://graph.example.com ").is_err());
		assert!(ClientId::new("").is_err());

		let resource = ResourceId::new("https://graph.example.com")
			.expect("Resource fixture should be considered valid.");

		assert_eq!(resource.as_ref(), "https://graph.example.com");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let resource: ResourceId =
			serde_json::from_str("\"api-1\"").expect("Resource should deserialize successfully.");

		assert_eq!(resource.as_ref(), "api-1");
		assert!(serde_json::from_str::<ResourceId>("\"with space\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("api{}one", '\u{00A0}');

		assert!(ResourceId::new(&nbsp).is_err());

		ResourceId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(ResourceId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn long_app_id_uris_are_accepted() {
		let uri = format!(
			"https://contoso.onmicrosoft.com/{}/api/{}",
			"7f3d2c1b-0a9e-4d8c-b7a6-5f4e3d2c1b0a",
			"reporting/v2/".repeat(12)
		);

		assert!(uri.len() > 128);

		let resource = ResourceId::new(&uri).expect("Long App ID URI should be valid.");

		assert_eq!(resource.to_string(), uri);
		assert_eq!(format!("{resource:?}"), format!("Resource({uri})"));
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ResourceId, u8> = HashMap::from_iter([(
			ResourceId::new("api-7").expect("Resource used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("api-7"), Some(&7));
	}
}
