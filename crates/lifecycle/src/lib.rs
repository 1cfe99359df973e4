//! Process lifecycle: supervised background activities and their shutdown.
//!
//! ## Components
//!
//! - `ShutdownCoordinator`: owned by the process entrypoint; hands out one
//!   `ShutdownHandle` per background activity and drives the
//!   cancel-then-wait sequence with a single shared timeout.
//! - `ShutdownHandle`: the capability an activity receives; observe
//!   cancellation with `done()`, report completion with `notify()`.
//! - `Scheduler`: runs a named unit of work on a fixed period until its
//!   handle is cancelled, isolating failures of individual ticks.

pub mod panic;
pub mod scheduler;
pub mod shutdown;
pub mod signal;

pub use panic::panic_message;
pub use scheduler::Scheduler;
pub use shutdown::{ShutdownCoordinator, ShutdownError, ShutdownHandle};
pub use signal::wait_for_shutdown_signal;
