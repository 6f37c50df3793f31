//! Background renewal of the login token shortly before it expires.

// self
use crate::{
	_prelude::*,
	flows::Broker,
	host::{ScheduledJob, ScheduledTask, Scheduler},
	obs::{self, Operation, OperationOutcome, OperationSpan},
};

#[derive(Debug)]
struct ArmedTimer {
	fires_at: OffsetDateTime,
	task: ScheduledTask,
}

/// Single cancellable timer that renews the login token `lead` before it expires.
///
/// Arming replaces (and cancels) any timer already armed.
#[derive(Debug)]
pub struct ExpiryScheduler {
	lead: Duration,
	armed: Mutex<Option<ArmedTimer>>,
}
impl ExpiryScheduler {
	/// Creates a disarmed scheduler.
	pub fn new(lead: Duration) -> Self {
		Self { lead, armed: Mutex::new(None) }
	}

	/// Time before expiry at which the timer fires.
	pub fn lead(&self) -> Duration {
		self.lead
	}

	/// `expires_at - now - lead`; zero or negative means the renewal is already due.
	pub fn delay_for(&self, now: OffsetDateTime, expires_at: OffsetDateTime) -> Duration {
		expires_at - now - self.lead
	}

	/// Schedules `job` after `delay`, cancelling the previous timer.
	pub fn arm(
		&self,
		scheduler: &dyn Scheduler,
		now: OffsetDateTime,
		delay: Duration,
		job: ScheduledJob,
	) {
		let mut armed = self.armed.lock();

		if let Some(previous) = armed.take() {
			previous.task.cancel();
		}

		let task = scheduler.schedule(delay, job);

		*armed = Some(ArmedTimer { fires_at: now + delay, task });
	}

	/// Cancels the armed timer; returns `false` when none was armed.
	pub fn cancel(&self) -> bool {
		match self.armed.lock().take() {
			Some(timer) => {
				timer.task.cancel();

				true
			},
			None => false,
		}
	}

	/// Instant the armed timer fires at.
	pub fn armed_at(&self) -> Option<OffsetDateTime> {
		self.armed.lock().as_ref().map(|timer| timer.fires_at)
	}

	fn fired(&self) {
		self.armed.lock().take();
	}
}

impl Broker {
	/// Arms the login-token timer for a token expiring at `expires_at`.
	///
	/// When the renewal is already due the login resource is renewed immediately instead.
	pub fn arm_expiry(&self, expires_at: OffsetDateTime) {
		let inner = &self.inner;
		let now = self.now();
		let delay = inner.expiry.delay_for(now, expires_at);

		if !delay.is_positive() {
			inner.expiry.cancel();
			self.renew_login_resource();

			return;
		}

		let weak = self.weak();

		inner.expiry.arm(
			inner.scheduler.as_ref(),
			now,
			delay,
			Box::new(move || {
				if let Some(broker) = Broker::from_weak(&weak) {
					broker.inner.expiry.fired();
					broker.renew_login_resource();
				}
			}),
		);

		#[cfg(feature = "tracing")]
		tracing::debug!(fires_at = %(now + delay), "Armed the login-token renewal timer.");
	}

	/// Instant the login-token timer fires at, if armed.
	pub fn expiry_armed_at(&self) -> Option<OffsetDateTime> {
		self.inner.expiry.armed_at()
	}

	fn renew_login_resource(&self) {
		const OPERATION: Operation = Operation::ScheduledRenew;

		let _span = OperationSpan::new(OPERATION, "renew_login_resource").entered();

		obs::record_operation_outcome(OPERATION, OperationOutcome::Attempt);

		// The callback re-arms the timer when the renewal succeeds.
		match self.renew(&self.inner.config.login_resource) {
			Ok(_) => obs::record_operation_outcome(OPERATION, OperationOutcome::Success),
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %_e, "Scheduled login-token renewal failed to start.");

				obs::record_operation_outcome(OPERATION, OperationOutcome::Failure);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::host::{ManualClock, ManualScheduler};

	#[test]
	fn arming_replaces_the_previous_timer() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let clock = ManualClock::new(now);
		let scheduler = ManualScheduler::new(clock.clone());
		let expiry = ExpiryScheduler::new(Duration::seconds(300));
		let fired = Arc::new(Mutex::new(Vec::new()));
		let job = |label: &'static str| -> ScheduledJob {
			let fired = fired.clone();

			Box::new(move || fired.lock().push(label))
		};
		let delay = expiry.delay_for(now, now + Duration::seconds(400));

		assert_eq!(delay, Duration::seconds(100));

		expiry.arm(&scheduler, now, delay, job("first"));
		expiry.arm(&scheduler, now, Duration::seconds(200), job("second"));

		assert_eq!(expiry.armed_at(), Some(now + Duration::seconds(200)));
		assert_eq!(scheduler.advance(Duration::seconds(250)), 1);
		assert_eq!(*fired.lock(), vec!["second"]);
		assert!(expiry.cancel());
		assert!(!expiry.cancel());
		assert_eq!(expiry.armed_at(), None);
	}
}
