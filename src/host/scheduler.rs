//! One-shot timers: a manual queue driven by [`ManualClock`] and an optional Tokio backend.

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	host::{Clock, ManualClock},
};
#[cfg(feature = "tokio")] use crate::error::ConfigError;

/// One-shot job handed to a [`Scheduler`].
pub type ScheduledJob = Box<dyn FnOnce() + Send + 'static>;

/// Cancellation handle for a scheduled job; clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct ScheduledTask(Arc<AtomicBool>);
impl ScheduledTask {
	/// Creates a live (not cancelled) handle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Prevents the job from running if it has not fired yet.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// `true` once [`ScheduledTask::cancel`] has been called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Runs one-shot jobs after a delay.
///
/// Implementations must check [`ScheduledTask::is_cancelled`] right before running a job and
/// skip it when cancelled.
pub trait Scheduler
where
	Self: Send + Sync,
{
	/// Runs `job` once `delay` has elapsed.
	fn schedule(&self, delay: Duration, job: ScheduledJob) -> ScheduledTask;
}

struct QueuedJob {
	due: OffsetDateTime,
	seq: u64,
	task: ScheduledTask,
	job: ScheduledJob,
}

/// Scheduler driven by the host (or a test) advancing a [`ManualClock`].
pub struct ManualScheduler {
	clock: ManualClock,
	queue: Mutex<Vec<QueuedJob>>,
	seq: AtomicU64,
}
impl ManualScheduler {
	/// Creates a scheduler whose due times are measured against `clock`.
	pub fn new(clock: ManualClock) -> Self {
		Self { clock, queue: Mutex::new(Vec::new()), seq: AtomicU64::new(0) }
	}

	/// Number of jobs that are queued and not cancelled.
	pub fn pending(&self) -> usize {
		self.queue.lock().iter().filter(|queued| !queued.task.is_cancelled()).count()
	}

	/// Due time of the earliest live job.
	pub fn next_due(&self) -> Option<OffsetDateTime> {
		self.queue
			.lock()
			.iter()
			.filter(|queued| !queued.task.is_cancelled())
			.map(|queued| queued.due)
			.min()
	}

	/// Moves the clock forward by `by`, firing due jobs in due order at their due instants.
	///
	/// Jobs scheduled by a firing job run in the same call when they fall due before the
	/// target instant. Returns the number of jobs run.
	pub fn advance(&self, by: Duration) -> usize {
		let target = self.clock.now() + by;
		let mut fired = 0;

		while let Some(queued) = self.pop_due(target) {
			if queued.due > self.clock.now() {
				self.clock.set(queued.due);
			}

			(queued.job)();

			fired += 1;
		}

		self.clock.set(target);

		fired
	}

	/// Fires every job already due at the current instant.
	pub fn run_due(&self) -> usize {
		self.advance(Duration::ZERO)
	}

	fn pop_due(&self, target: OffsetDateTime) -> Option<QueuedJob> {
		let mut queue = self.queue.lock();

		queue.retain(|queued| !queued.task.is_cancelled());

		let idx = queue
			.iter()
			.enumerate()
			.filter(|(_, queued)| queued.due <= target)
			.min_by_key(|(_, queued)| (queued.due, queued.seq))
			.map(|(idx, _)| idx)?;

		Some(queue.swap_remove(idx))
	}
}
impl Scheduler for ManualScheduler {
	fn schedule(&self, delay: Duration, job: ScheduledJob) -> ScheduledTask {
		let task = ScheduledTask::new();
		let due = self.clock.now() + delay.max(Duration::ZERO);
		let seq = self.seq.fetch_add(1, Ordering::SeqCst);

		self.queue.lock().push(QueuedJob { due, seq, task: task.clone(), job });

		task
	}
}
impl Debug for ManualScheduler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ManualScheduler")
			.field("clock", &self.clock)
			.field("pending", &self.pending())
			.finish()
	}
}

/// Scheduler that sleeps on a Tokio runtime.
#[cfg(feature = "tokio")]
#[derive(Clone, Debug)]
pub struct TokioScheduler {
	handle: tokio::runtime::Handle,
}
#[cfg(feature = "tokio")]
impl TokioScheduler {
	/// Binds to the runtime the caller is running on.
	pub fn current() -> Result<Self, ConfigError> {
		tokio::runtime::Handle::try_current()
			.map(Self::with_handle)
			.map_err(|_| ConfigError::RuntimeUnavailable)
	}

	/// Binds to an explicit runtime handle.
	pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
		Self { handle }
	}
}
#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
	fn schedule(&self, delay: Duration, job: ScheduledJob) -> ScheduledTask {
		let task = ScheduledTask::new();
		let guard = task.clone();
		let delay = std::time::Duration::try_from(delay).unwrap_or_default();

		self.handle.spawn(async move {
			tokio::time::sleep(delay).await;

			if !guard.is_cancelled() {
				job();
			}
		});

		task
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> ScheduledJob) {
		let log = Arc::new(Mutex::new(Vec::new()));
		let sink = log.clone();
		let make = move |label: &'static str| {
			let sink = sink.clone();
			let job: ScheduledJob = Box::new(move || sink.lock().push(label));

			job
		};

		(log, make)
	}

	#[test]
	fn jobs_fire_in_due_order_and_skip_cancelled() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let scheduler = ManualScheduler::new(clock.clone());
		let (log, job) = recorder();

		scheduler.schedule(Duration::seconds(30), job("late"));
		scheduler.schedule(Duration::seconds(10), job("early"));

		let cancelled = scheduler.schedule(Duration::seconds(20), job("cancelled"));

		cancelled.cancel();

		assert_eq!(scheduler.pending(), 2);
		assert_eq!(scheduler.advance(Duration::seconds(15)), 1);
		assert_eq!(clock.now(), macros::datetime!(2025-01-01 00:00:15 UTC));
		assert_eq!(scheduler.advance(Duration::seconds(15)), 1);
		assert_eq!(*log.lock(), vec!["early", "late"]);
		assert_eq!(scheduler.pending(), 0);
	}

	#[test]
	fn jobs_scheduled_while_firing_run_when_due() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
		let fired_at = Arc::new(Mutex::new(Vec::new()));
		let inner_scheduler = scheduler.clone();
		let inner_clock = clock.clone();
		let inner_fired = fired_at.clone();

		scheduler.schedule(
			Duration::seconds(10),
			Box::new(move || {
				let clock = inner_clock.clone();
				let fired = inner_fired.clone();

				inner_fired.lock().push(inner_clock.now());
				inner_scheduler.schedule(
					Duration::seconds(10),
					Box::new(move || fired.lock().push(clock.now())),
				);
			}),
		);

		assert_eq!(scheduler.advance(Duration::minutes(1)), 2);
		assert_eq!(
			*fired_at.lock(),
			vec![
				macros::datetime!(2025-01-01 00:00:10 UTC),
				macros::datetime!(2025-01-01 00:00:20 UTC)
			]
		);
		assert_eq!(clock.now(), macros::datetime!(2025-01-01 00:01 UTC));
	}
}
