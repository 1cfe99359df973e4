//! Background jobs run by the binary under shutdown supervision.

pub mod cleanup;

pub use cleanup::{STALE_ENTRY_CLEANUP, run_stale_entry_cleanup};
