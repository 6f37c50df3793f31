//! Cached token entries and their expiry lifecycle.

// self
use crate::{
	_prelude::*,
	auth::{ResourceId, TokenSecret},
};

/// Lifecycle status of a cached entry at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
	/// Token is usable for at least the skew window.
	Valid,
	/// Token is inside the skew window or past its expiry and must be renewed.
	Expired,
}

/// Token cached for a single resource.
///
/// Entries are serialized whole under one storage key so a concurrent reader never observes a
/// token paired with another token's expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Resource the token is scoped to.
	pub resource: ResourceId,
	/// Bearer (or ID) token value.
	pub token: TokenSecret,
	/// Absolute expiry reported by the provider.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl CacheEntry {
	/// Creates an entry for the provided resource.
	pub fn new(resource: ResourceId, token: TokenSecret, expires_at: OffsetDateTime) -> Self {
		Self { resource, token, expires_at }
	}

	/// Computes the status at `now`, treating the token as expired `skew` early.
	pub fn status_at(&self, now: OffsetDateTime, skew: Duration) -> EntryStatus {
		if now < self.expires_at - skew { EntryStatus::Valid } else { EntryStatus::Expired }
	}

	/// Returns `true` iff `now < expires_at - skew`.
	pub fn is_valid_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		matches!(self.status_at(now, skew), EntryStatus::Valid)
	}

	/// Time left before the entry stops being valid, clamped at zero.
	pub fn remaining(&self, now: OffsetDateTime, skew: Duration) -> Duration {
		let remaining = self.expires_at - skew - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CacheEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CacheEntry")
			.field("resource", &self.resource)
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn entry(expires_at: OffsetDateTime) -> CacheEntry {
		CacheEntry::new(
			ResourceId::new("api1").expect("Resource fixture should be valid."),
			TokenSecret::new("token"),
			expires_at,
		)
	}

	#[test]
	fn validity_boundary_sits_at_expiry_minus_skew() {
		let expires = macros::datetime!(2025-01-01 01:00:00 UTC);
		let entry = entry(expires);
		let skew = Duration::seconds(5);

		assert!(entry.is_valid_at(macros::datetime!(2025-01-01 00:59:54 UTC), skew));
		assert_eq!(
			entry.status_at(macros::datetime!(2025-01-01 00:59:55 UTC), skew),
			EntryStatus::Expired
		);
		assert!(!entry.is_valid_at(macros::datetime!(2025-01-01 01:00:00 UTC), skew));
		assert!(entry.is_valid_at(macros::datetime!(2025-01-01 00:59:59 UTC), Duration::ZERO));
	}

	#[test]
	fn remaining_clamps_at_zero() {
		let entry = entry(macros::datetime!(2025-01-01 01:00 UTC));
		let skew = Duration::seconds(5);

		assert_eq!(
			entry.remaining(macros::datetime!(2025-01-01 00:59 UTC), skew),
			Duration::seconds(55)
		);
		assert_eq!(entry.remaining(macros::datetime!(2025-01-01 02:00 UTC), skew), Duration::ZERO);
	}

	#[test]
	fn debug_redacts_token() {
		let rendered = format!("{:?}", entry(macros::datetime!(2025-01-01 01:00 UTC)));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("\"token\""));
	}
}
