//! Counters for broker operations and settled renewals.

// self
use crate::{
	correlate::RenewalOutcome,
	obs::{Operation, OperationOutcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(operation: Operation, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_implicit_operation_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Counts a renewal outcome delivered to its waiters.
pub fn record_renewal_outcome(outcome: &RenewalOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_implicit_renewal_total", "outcome" => outcome.label())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
