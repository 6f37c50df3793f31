//! Host-environment seams: navigation, time, and timers.
//!
//! The broker never touches a window, a frame, or an event loop directly. Hosts implement
//! [`Navigator`] for their page model, pick a [`Clock`], and supply a [`Scheduler`]; the
//! manual implementations here drive headless hosts and deterministic tests.

pub mod clock;
pub mod navigator;
pub mod scheduler;

pub use clock::*;
pub use navigator::*;
pub use scheduler::*;
