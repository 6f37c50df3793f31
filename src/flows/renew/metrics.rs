// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for silent renewals.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	started: AtomicU64,
	joined: AtomicU64,
	succeeded: AtomicU64,
	failed: AtomicU64,
	timed_out: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of renewals that launched a navigation.
	pub fn started(&self) -> u64 {
		self.started.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that shared an already pending renewal.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals completed with a token.
	pub fn succeeded(&self) -> u64 {
		self.succeeded.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals completed with a provider error.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that received no response in time.
	pub fn timed_out(&self) -> u64 {
		self.timed_out.load(Ordering::Relaxed)
	}

	pub(crate) fn record_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_succeeded(&self) {
		self.succeeded.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_timed_out(&self) {
		self.timed_out.fetch_add(1, Ordering::Relaxed);
	}
}
