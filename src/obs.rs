//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_implicit.operation` with the
//!   `operation`, `stage` (call site), and `resource` fields, plus events for correlation
//!   mismatches, renewal timeouts, timer arming, and escalation to interactive login.
//! - Enable `metrics` to increment the `oauth2_implicit_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`, and the
//!   `oauth2_implicit_renewal_total` counter for every settled renewal, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Consumer token acquisition.
	Acquire,
	/// Hidden-frame renewal of one resource.
	SilentRenew,
	/// Renewal fired by the login-token expiry timer.
	ScheduledRenew,
	/// Interactive login redirect.
	Login,
	/// Logout redirect.
	Logout,
	/// Provider response handling.
	Callback,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Acquire => "acquire",
			Operation::SilentRenew => "silent_renew",
			Operation::ScheduledRenew => "scheduled_renew",
			Operation::Login => "login",
			Operation::Logout => "logout",
			Operation::Callback => "callback",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
